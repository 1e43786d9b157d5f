//! Loading an `AvatarModel` from binary glTF.

use glam::{Mat4, Quat, Vec3};

use crate::error::ViewerError;
use crate::model::animation::{AnimatedProperty, AnimationClip, Channel, Interpolation};
use crate::model::avatar::{
    AvatarModel, CullMode, Material, MeshData, Node, Primitive, Skin, TextureImage, TextureWrap, Transform,
};
use crate::utils::{Mesh, Vertex};

/// Parse a `.glb` (or glTF with embedded buffers) into an `AvatarModel`
pub fn load_glb(bytes: &[u8]) -> Result<AvatarModel, ViewerError> {
    let (doc, buffers, images) = gltf::import_slice(bytes)?;
    let mut nodes: Vec<Node> = doc
        .nodes()
        .map(|node| {
            let (t, r, s) = node.transform().decomposed();
            let rest = Transform {
                translation: Vec3::from(t),
                rotation: Quat::from_array(r),
                scale: Vec3::from(s),
            };
            Node {
                name: node.name().map(String::from),
                parent: None,
                children: node.children().map(|c| c.index()).collect(),
                rest,
                pose: rest,
                mesh: node.mesh().map(|m| m.index()),
                skin: node.skin().map(|s| s.index()),
            }
        })
        .collect();

    link_parents(&mut nodes)?;

    let roots: Vec<usize> = match doc.default_scene().or_else(|| doc.scenes().next()) {
        Some(scene) => scene.nodes().map(|n| n.index()).collect(),
        None => (0..nodes.len()).filter(|&i| nodes[i].parent.is_none()).collect(),
    };

    let meshes = doc
        .meshes()
        .map(|mesh| MeshData {
            name: mesh.name().map(String::from),
            primitives: mesh
                .primitives()
                .filter_map(|prim| {
                    if !matches!(prim.mode(), gltf::mesh::Mode::Triangles) {
                        tracing::warn!(
                            "skipping {:?} primitive in mesh {:?}",
                            prim.mode(),
                            mesh.name()
                        );
                        return None;
                    }
                    Some(read_primitive(&prim, &buffers))
                })
                .collect(),
        })
        .collect();

    let skins = doc
        .skins()
        .map(|skin| {
            let joints: Vec<usize> = skin.joints().map(|j| j.index()).collect();
            let inverse_bind_matrices = skin
                .reader(|buffer| Some(&buffers[buffer.index()]))
                .read_inverse_bind_matrices()
                .map(|iter| iter.map(|m| Mat4::from_cols_array_2d(&m)).collect())
                .unwrap_or_else(|| vec![Mat4::IDENTITY; joints.len()]);
            Skin { joints, inverse_bind_matrices }
        })
        .collect();

    let materials = doc.materials().map(|m| read_material(&m)).collect();

    let images = images.iter().map(convert_to_rgba8).collect();

    let clips = doc
        .animations()
        .map(|anim| {
            let channels = anim
                .channels()
                .filter_map(|channel| read_channel(&channel, &buffers))
                .collect();
            AnimationClip::new(anim.name().map(String::from), channels)
        })
        .collect();

    let model = AvatarModel { nodes, roots, meshes, skins, materials, images, clips };
    if model.draw_items().is_empty() {
        return Err(ViewerError::EmptyModel);
    }

    tracing::debug!(
        nodes = model.nodes.len(),
        meshes = model.meshes.len(),
        skins = model.skins.len(),
        clips = model.clips.len(),
        "parsed glTF model"
    );
    Ok(model)
}

fn read_primitive(prim: &gltf::Primitive, buffers: &[gltf::buffer::Data]) -> Primitive {
    let reader = prim.reader(|buffer| Some(&buffers[buffer.index()]));

    let positions: Vec<[f32; 3]> = reader
        .read_positions()
        .map(|iter| iter.collect())
        .unwrap_or_default();
    let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(|iter| iter.collect());
    let uvs: Vec<[f32; 2]> = reader
        .read_tex_coords(0)
        .map(|iter| iter.into_f32().collect())
        .unwrap_or_else(|| vec![[0.0; 2]; positions.len()]);
    let indices: Vec<u32> = reader
        .read_indices()
        .map(|iter| iter.into_u32().collect())
        .unwrap_or_else(|| (0..positions.len() as u32).collect());

    let vertices = positions
        .iter()
        .enumerate()
        .map(|(i, &pos)| Vertex {
            pos,
            normal: normals.as_ref().and_then(|n| n.get(i).copied()).unwrap_or([0.0; 3]),
            uv: uvs.get(i).copied().unwrap_or([0.0; 2]),
        })
        .collect();

    let mut geometry = Mesh { vertices, indices };
    if normals.is_none() {
        geometry.compute_normals();
    }

    Primitive {
        geometry,
        joints: reader.read_joints(0).map(|iter| iter.into_u16().collect()),
        weights: reader.read_weights(0).map(|iter| iter.into_f32().collect()),
        material: prim.material().index(),
    }
}

/// Fill in `Node::parent`, rejecting anything that is not a forest: a node
/// listed as a child twice, or a chain of parents that loops.
fn link_parents(nodes: &mut [Node]) -> Result<(), ViewerError> {
    for idx in 0..nodes.len() {
        for child in nodes[idx].children.clone() {
            let node = nodes.get_mut(child).ok_or_else(|| {
                ViewerError::InvalidHierarchy(format!("node {idx} lists missing child {child}"))
            })?;
            if let Some(parent) = node.parent {
                return Err(ViewerError::InvalidHierarchy(format!(
                    "node {child} has two parents ({parent} and {idx})"
                )));
            }
            node.parent = Some(idx);
        }
    }

    // with one parent each, a walk up either reaches a root or goes round a cycle
    for start in 0..nodes.len() {
        let mut current = start;
        for _ in 0..=nodes.len() {
            match nodes[current].parent {
                Some(parent) if parent == start => {
                    return Err(ViewerError::InvalidHierarchy(format!("node {start} is its own ancestor")));
                }
                Some(parent) => current = parent,
                None => break,
            }
        }
    }
    Ok(())
}

fn wrap_mode(mode: gltf::texture::WrappingMode) -> TextureWrap {
    use gltf::texture::WrappingMode;

    match mode {
        WrappingMode::Repeat => TextureWrap::Repeat,
        WrappingMode::MirroredRepeat => TextureWrap::MirroredRepeat,
        WrappingMode::ClampToEdge => TextureWrap::ClampToEdge,
    }
}

fn read_material(m: &gltf::Material) -> Material {
    let pbr = m.pbr_metallic_roughness();
    let texture = pbr.base_color_texture();
    let nearest_filter = texture
        .as_ref()
        .and_then(|info| info.texture().sampler().mag_filter())
        .map_or(false, |f| matches!(f, gltf::texture::MagFilter::Nearest));
    let wrap = texture.as_ref().map_or([TextureWrap::Repeat; 2], |info| {
        let sampler = info.texture().sampler();
        [wrap_mode(sampler.wrap_s()), wrap_mode(sampler.wrap_t())]
    });

    Material {
        name: m.name().map(String::from),
        base_color: pbr.base_color_factor(),
        base_color_image: texture.map(|info| info.texture().source().index()),
        cull: if m.double_sided() { CullMode::None } else { CullMode::Back },
        blend: matches!(m.alpha_mode(), gltf::material::AlphaMode::Blend),
        unlit: m.unlit(),
        nearest_filter,
        wrap,
    }
}

fn read_channel(channel: &gltf::animation::Channel, buffers: &[gltf::buffer::Data]) -> Option<Channel> {
    use gltf::animation::util::ReadOutputs;

    let target = channel.target();
    let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));
    let keyframe_ts: Vec<f32> = reader.read_inputs()?.collect();

    let (property, data): (AnimatedProperty, Vec<f32>) = match reader.read_outputs()? {
        ReadOutputs::Translations(iter) => (AnimatedProperty::Translation, iter.flatten().collect()),
        ReadOutputs::Rotations(rot) => (AnimatedProperty::Rotation, rot.into_f32().flatten().collect()),
        ReadOutputs::Scales(iter) => (AnimatedProperty::Scale, iter.flatten().collect()),
        ReadOutputs::MorphTargetWeights(_) => {
            tracing::debug!("skipping morph target weight channel on node {}", target.node().index());
            return None;
        }
    };

    let interpolation = match channel.sampler().interpolation() {
        gltf::animation::Interpolation::Step => Interpolation::Step,
        gltf::animation::Interpolation::Linear => Interpolation::Linear,
        gltf::animation::Interpolation::CubicSpline => Interpolation::CubicSpline,
    };

    Some(Channel {
        node: target.node().index(),
        property,
        interpolation,
        keyframe_ts,
        data,
    })
}

fn convert_to_rgba8(img: &gltf::image::Data) -> TextureImage {
    use gltf::image::Format;

    let pixels = match img.format {
        Format::R8G8B8A8 => img.pixels.clone(),
        Format::R8G8B8 => img
            .pixels
            .chunks_exact(3)
            .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 255])
            .collect(),
        Format::R8G8 => img
            .pixels
            .chunks_exact(2)
            .flat_map(|rg| [rg[0], rg[0], rg[0], rg[1]])
            .collect(),
        Format::R8 => img.pixels.iter().flat_map(|&r| [r, r, r, 255]).collect(),
        other => {
            tracing::warn!("unsupported glTF image format {other:?}, using white");
            vec![255u8; (img.width * img.height * 4) as usize]
        }
    };

    TextureImage { pixels, width: img.width, height: img.height }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    const DEFAULT_NODES: &str = r#"[
                {"name": "head", "children": [1]},
                {"name": "sixcen_png_face", "mesh": 0, "translation": [0.0, 0.0, 0.5]}
            ]"#;

    /// A two-node GLB: "head" with child "sixcen_png_face" holding one triangle,
    /// plus a one-second translation clip on "head".
    pub(crate) fn test_glb() -> Vec<u8> {
        glb_with_nodes(DEFAULT_NODES)
    }

    /// The same buffers and clip with a replacement `nodes` array
    fn glb_with_nodes(nodes: &str) -> Vec<u8> {
        let mut bin: Vec<u8> = Vec::new();
        for f in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
            bin.extend_from_slice(&f.to_le_bytes());
        }
        for i in [0u16, 1, 2] {
            bin.extend_from_slice(&i.to_le_bytes());
        }
        bin.extend_from_slice(&[0, 0]);
        for f in [0.0f32, 1.0, 0.0, 0.0, 0.0, 0.0, 2.0, 0.0] {
            bin.extend_from_slice(&f.to_le_bytes());
        }
        assert_eq!(bin.len(), 76);

        let json = r#"{
            "asset": {"version": "2.0"},
            "scene": 0,
            "scenes": [{"nodes": [0]}],
            "nodes": NODES,
            "meshes": [{"name": "face", "primitives": [{"attributes": {"POSITION": 0}, "indices": 1, "material": 0}]}],
            "materials": [{"name": "skin", "doubleSided": true}],
            "animations": [{
                "name": "bob",
                "channels": [{"sampler": 0, "target": {"node": 0, "path": "translation"}}],
                "samplers": [{"input": 2, "output": 3, "interpolation": "LINEAR"}]
            }],
            "buffers": [{"byteLength": 76}],
            "bufferViews": [
                {"buffer": 0, "byteOffset": 0, "byteLength": 36, "target": 34962},
                {"buffer": 0, "byteOffset": 36, "byteLength": 6, "target": 34963},
                {"buffer": 0, "byteOffset": 44, "byteLength": 32}
            ],
            "accessors": [
                {"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]},
                {"bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR"},
                {"bufferView": 2, "byteOffset": 0, "componentType": 5126, "count": 2, "type": "SCALAR", "min": [0.0], "max": [1.0]},
                {"bufferView": 2, "byteOffset": 8, "componentType": 5126, "count": 2, "type": "VEC3"}
            ]
        }"#;
        let mut json = json.replace("NODES", nodes).into_bytes();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }

        let total = 12 + 8 + json.len() + 8 + bin.len();
        let mut glb = Vec::with_capacity(total);
        glb.extend_from_slice(b"glTF");
        glb.extend_from_slice(&2u32.to_le_bytes());
        glb.extend_from_slice(&(total as u32).to_le_bytes());
        glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"JSON");
        glb.extend_from_slice(&json);
        glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"BIN\0");
        glb.extend_from_slice(&bin);
        glb
    }

    #[test]
    fn test_load_in_memory_glb() {
        let model = load_glb(&test_glb()).expect("test GLB should parse");

        assert_eq!(model.roots, vec![0]);
        let face = model.find_node("sixcen_png_face").expect("face node");
        assert_eq!(model.nodes[face].parent, Some(0));
        assert_eq!(model.nodes[face].rest.translation, Vec3::new(0.0, 0.0, 0.5));

        let items = model.draw_items();
        assert_eq!(items.len(), 1);
        let prim = model.primitive(items[0]);
        assert_eq!(prim.geometry.indices, vec![0, 1, 2]);
        // normals computed from the winding
        assert_eq!(prim.geometry.vertices[0].normal, [0.0, 0.0, 1.0]);
        assert!(!prim.is_skinned());

        assert_eq!(model.materials[0].cull, CullMode::None);

        assert_eq!(model.clips.len(), 1);
        assert_eq!(model.clips[0].name.as_deref(), Some("bob"));
        assert_eq!(model.clips[0].duration, 1.0);
        assert_eq!(model.clips[0].channels[0].property, AnimatedProperty::Translation);
    }

    #[test]
    fn test_default_material_repeats() {
        let model = load_glb(&test_glb()).expect("test GLB should parse");
        assert_eq!(model.materials[0].base_color_image, None);
        assert_eq!(model.materials[0].wrap, [TextureWrap::Repeat; 2]);
        assert_eq!(wrap_mode(gltf::texture::WrappingMode::MirroredRepeat), TextureWrap::MirroredRepeat);
        assert_eq!(wrap_mode(gltf::texture::WrappingMode::ClampToEdge), TextureWrap::ClampToEdge);
    }

    #[test]
    fn test_cyclic_hierarchy_rejected() {
        let looped = r#"[
                {"name": "head", "children": [1]},
                {"name": "sixcen_png_face", "mesh": 0, "children": [0]}
            ]"#;
        let err = load_glb(&glb_with_nodes(looped)).unwrap_err();
        assert!(matches!(err, ViewerError::InvalidHierarchy(_)), "{err}");
    }

    #[test]
    fn test_self_parent_rejected() {
        let looped = r#"[
                {"name": "head", "children": [0]},
                {"name": "sixcen_png_face", "mesh": 0}
            ]"#;
        assert!(matches!(load_glb(&glb_with_nodes(looped)), Err(ViewerError::InvalidHierarchy(_))));
    }

    #[test]
    fn test_shared_child_rejected() {
        let shared = r#"[
                {"name": "head", "children": [1]},
                {"name": "sixcen_png_face", "mesh": 0},
                {"name": "hat", "children": [1]}
            ]"#;
        assert!(matches!(load_glb(&glb_with_nodes(shared)), Err(ViewerError::InvalidHierarchy(_))));
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(load_glb(b"definitely not a model").is_err());
    }
}
