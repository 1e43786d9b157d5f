//! In-memory avatar model: node tree, meshes, skins, materials and clips.
//!
//! Node poses are mutated by the animation mixer every tick; world transforms
//! and skinned vertices are derived from them on demand.

use glam::{Mat4, Quat, Vec3};

use crate::model::animation::AnimationClip;
use crate::utils::{Mesh, Vertex};

/// Translation / rotation / scale of a node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: Option<String>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub rest: Transform,
    /// Current (animated) local transform
    pub pose: Transform,
    pub mesh: Option<usize>,
    pub skin: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Primitive {
    pub geometry: Mesh,
    /// Per-vertex joint indices into the owning node's skin
    pub joints: Option<Vec<[u16; 4]>>,
    pub weights: Option<Vec<[f32; 4]>>,
    pub material: Option<usize>,
}

impl Primitive {
    pub fn is_skinned(&self) -> bool {
        self.joints.is_some() && self.weights.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub name: Option<String>,
    pub primitives: Vec<Primitive>,
}

#[derive(Debug, Clone)]
pub struct Skin {
    /// Node index of every joint
    pub joints: Vec<usize>,
    pub inverse_bind_matrices: Vec<Mat4>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    /// Draw front faces only
    Back,
    /// Draw back faces only
    Front,
    None,
}

/// Texture coordinate addressing outside [0, 1], per glTF sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureWrap {
    #[default]
    Repeat,
    MirroredRepeat,
    ClampToEdge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: Option<String>,
    pub base_color: [f32; 4],
    /// Index into `AvatarModel::images`
    pub base_color_image: Option<usize>,
    pub cull: CullMode,
    pub blend: bool,
    pub unlit: bool,
    pub nearest_filter: bool,
    /// Addressing along u and v
    pub wrap: [TextureWrap; 2],
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: None,
            base_color: [1.0; 4],
            base_color_image: None,
            cull: CullMode::Back,
            blend: false,
            unlit: false,
            nearest_filter: false,
            wrap: [TextureWrap::Repeat; 2],
        }
    }
}

/// Decoded texture image (RGBA8)
#[derive(Debug, Clone)]
pub struct TextureImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// A mesh primitive placed in the scene by a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawItem {
    pub node: usize,
    pub mesh: usize,
    pub primitive: usize,
}

#[derive(Debug, Clone, Default)]
pub struct AvatarModel {
    pub nodes: Vec<Node>,
    pub roots: Vec<usize>,
    pub meshes: Vec<MeshData>,
    pub skins: Vec<Skin>,
    pub materials: Vec<Material>,
    pub images: Vec<TextureImage>,
    pub clips: Vec<AnimationClip>,
}

impl AvatarModel {
    pub fn find_node(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name.as_deref() == Some(name))
    }

    /// Every primitive reachable from a node, in node order
    pub fn draw_items(&self) -> Vec<DrawItem> {
        let mut items = Vec::new();
        for (node_idx, node) in self.nodes.iter().enumerate() {
            let Some(mesh_idx) = node.mesh else { continue };
            let Some(mesh) = self.meshes.get(mesh_idx) else { continue };
            for (prim_idx, prim) in mesh.primitives.iter().enumerate() {
                if prim.geometry.is_empty() {
                    continue;
                }
                items.push(DrawItem { node: node_idx, mesh: mesh_idx, primitive: prim_idx });
            }
        }
        items
    }

    pub fn primitive(&self, item: DrawItem) -> &Primitive {
        &self.meshes[item.mesh].primitives[item.primitive]
    }

    /// Node with this name plus all of its descendants
    pub fn subtree(&self, root: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            out.push(idx);
            stack.extend(self.nodes[idx].children.iter().copied());
        }
        out
    }

    pub fn reset_pose(&mut self) {
        for node in self.nodes.iter_mut() {
            node.pose = node.rest;
        }
    }

    /// Model-space transform of every node from the current pose
    pub fn world_transforms(&self) -> Vec<Mat4> {
        let mut world = vec![Mat4::IDENTITY; self.nodes.len()];
        let mut stack: Vec<(usize, Mat4)> = self.roots.iter().map(|&r| (r, Mat4::IDENTITY)).collect();
        while let Some((idx, parent)) = stack.pop() {
            let node = &self.nodes[idx];
            world[idx] = parent * node.pose.to_mat4();
            for &child in &node.children {
                stack.push((child, world[idx]));
            }
        }
        world
    }

    /// Joint matrices of a skin: world(joint) * inverse_bind(joint)
    pub fn joint_matrices(&self, skin: usize, world: &[Mat4]) -> Vec<Mat4> {
        let skin = &self.skins[skin];
        skin.joints
            .iter()
            .enumerate()
            .map(|(i, &node)| {
                let ibm = skin.inverse_bind_matrices.get(i).copied().unwrap_or(Mat4::IDENTITY);
                world.get(node).copied().unwrap_or(Mat4::IDENTITY) * ibm
            })
            .collect()
    }

    /// Model-space vertices of a skinned primitive (linear blend skinning).
    ///
    /// Returns `None` for primitives that are not skinned or whose node has no skin;
    /// those are drawn with the node's world transform instead.
    pub fn skinned_vertices(&self, item: DrawItem, world: &[Mat4]) -> Option<Vec<Vertex>> {
        let skin = self.nodes[item.node].skin?;
        let prim = self.primitive(item);
        let (joints, weights) = (prim.joints.as_ref()?, prim.weights.as_ref()?);
        let joint_mats = self.joint_matrices(skin, world);
        Some(skin_vertices(&prim.geometry.vertices, joints, weights, &joint_mats))
    }
}

/// Blend positions and normals by up to four joint matrices per vertex
pub fn skin_vertices(
    vertices: &[Vertex],
    joints: &[[u16; 4]],
    weights: &[[f32; 4]],
    joint_matrices: &[Mat4],
) -> Vec<Vertex> {
    vertices
        .iter()
        .zip(joints.iter().zip(weights.iter()))
        .map(|(v, (j, w))| {
            let mut skin = Mat4::ZERO;
            let mut total = 0.0;
            for k in 0..4 {
                if w[k] <= 0.0 {
                    continue;
                }
                if let Some(m) = joint_matrices.get(j[k] as usize) {
                    skin += *m * w[k];
                    total += w[k];
                }
            }
            if total <= 0.0 {
                return *v;
            }
            // weights are meant to sum to one, renormalize the ones we kept
            skin *= 1.0 / total;

            let pos = skin.transform_point3(Vec3::from(v.pos));
            let normal = skin.transform_vector3(Vec3::from(v.normal)).normalize_or_zero();
            Vertex { pos: pos.to_array(), normal: normal.to_array(), uv: v.uv }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, parent: Option<usize>, children: Vec<usize>, t: Vec3) -> Node {
        let rest = Transform { translation: t, ..Transform::IDENTITY };
        Node {
            name: Some(name.to_string()),
            parent,
            children,
            rest,
            pose: rest,
            mesh: None,
            skin: None,
        }
    }

    fn vertex(p: [f32; 3]) -> Vertex {
        Vertex { pos: p, normal: [0.0, 0.0, 1.0], uv: [0.0, 0.0] }
    }

    #[test]
    fn test_world_transforms_compose_parents() {
        let model = AvatarModel {
            nodes: vec![
                node("root", None, vec![1], Vec3::new(1.0, 0.0, 0.0)),
                node("head", Some(0), vec![], Vec3::new(0.0, 2.0, 0.0)),
            ],
            roots: vec![0],
            ..Default::default()
        };
        let world = model.world_transforms();
        assert_eq!(world[1].transform_point3(Vec3::ZERO), Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(model.find_node("head"), Some(1));
        assert_eq!(model.find_node("tail"), None);
        assert_eq!(model.subtree(0), vec![0, 1]);
    }

    #[test]
    fn test_identity_joints_keep_bind_pose() {
        let verts = vec![vertex([0.0, 1.0, 0.0]), vertex([1.0, 0.0, 0.5])];
        let joints = vec![[0, 1, 0, 0]; 2];
        let weights = vec![[0.5, 0.5, 0.0, 0.0]; 2];
        let skinned = skin_vertices(&verts, &joints, &weights, &[Mat4::IDENTITY, Mat4::IDENTITY]);
        assert_eq!(skinned, verts);
    }

    #[test]
    fn test_skinning_blends_translations() {
        let verts = vec![vertex([0.0, 0.0, 0.0])];
        let mats = [
            Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0)),
            Mat4::from_translation(Vec3::new(0.0, 4.0, 0.0)),
        ];
        let skinned = skin_vertices(&verts, &[[0, 1, 0, 0]], &[[0.5, 0.5, 0.0, 0.0]], &mats);
        assert_eq!(skinned[0].pos, [1.0, 2.0, 0.0]);
    }

    #[test]
    fn test_zero_weights_leave_vertex_unchanged() {
        let verts = vec![vertex([3.0, 2.0, 1.0])];
        let mats = [Mat4::from_translation(Vec3::X)];
        let skinned = skin_vertices(&verts, &[[0; 4]], &[[0.0; 4]], &mats);
        assert_eq!(skinned, verts);
    }
}
