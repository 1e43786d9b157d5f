use glam::{Mat4, Vec3};

use crate::config::ViewerConfig;
use crate::controller::orientation::look_at_rotation;
use crate::error::ViewerError;
use crate::model::animation::{AnimationMixer, LoopMode};
use crate::model::avatar::{AvatarModel, CullMode, DrawItem, Material, TextureWrap, Transform};
use crate::model::camera::Camera;
use crate::utils::Vertex;

pub struct DirectionalLight {
    /// Direction the light travels, normalized
    pub direction: Vec3,
    pub color: [f32; 3],
    pub intensity: f32,
}

impl DirectionalLight {
    /// Light placed at `position` shining toward `target`
    pub fn new(position: Vec3, target: Vec3, color: [f32; 3], intensity: f32) -> Self {
        Self {
            direction: (target - position).try_normalize().unwrap_or(Vec3::NEG_Z),
            color,
            intensity,
        }
    }
}

/// One primitive as the scene draws it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvatarDraw {
    pub item: DrawItem,
    /// Material index into the model's materials, after the face swap
    pub material: Option<usize>,
    /// Uses the dynamic face texture
    pub face: bool,
}

/// Per-frame result of posing one draw
pub struct PosedDraw {
    pub model_matrix: Mat4,
    /// Model-space vertices for skinned primitives
    pub skinned: Option<Vec<Vertex>>,
}

pub struct LoadedAvatar {
    pub model: AvatarModel,
    pub mixer: AnimationMixer,
    pub root: Transform,
    pub draws: Vec<AvatarDraw>,
    pub face_material: usize,
}

impl LoadedAvatar {
    pub fn root_matrix(&self) -> Mat4 {
        self.root.to_mat4()
    }

    /// Model matrices and skinned vertices for the current pose, in `draws` order
    pub fn pose(&self) -> Vec<PosedDraw> {
        let world = self.model.world_transforms();
        let root = self.root_matrix();
        self.draws
            .iter()
            .map(|draw| match self.model.skinned_vertices(draw.item, &world) {
                Some(vertices) => PosedDraw { model_matrix: root, skinned: Some(vertices) },
                None => PosedDraw { model_matrix: root * world[draw.item.node], skinned: None },
            })
            .collect()
    }

    pub fn material(&self, draw: &AvatarDraw) -> Material {
        draw.material
            .and_then(|m| self.model.materials.get(m).cloned())
            .unwrap_or_default()
    }
}

/// Lifecycle of the avatar model. `Loading` moves to `Loaded` or `Failed` exactly once.
pub enum ModelState {
    Loading,
    Loaded(Box<LoadedAvatar>),
    Failed(String),
}

impl ModelState {
    pub fn label(&self) -> &'static str {
        match self {
            ModelState::Loading => "loading",
            ModelState::Loaded(_) => "loaded",
            ModelState::Failed(_) => "failed",
        }
    }
}

/// Camera, light and (eventually) the avatar
pub struct Scene {
    pub camera: Camera,
    pub light: DirectionalLight,
    pub state: ModelState,
    face_node_name: String,
    model_scale: f32,
    model_position: Vec3,
    animation_tick: f32,
}

impl Scene {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            camera: Camera::from_config(config),
            light: DirectionalLight::new(
                config.light_position,
                Vec3::ZERO,
                config.light_color,
                config.light_intensity,
            ),
            state: ModelState::Loading,
            face_node_name: config.face_node_name.clone(),
            model_scale: config.model_scale,
            model_position: config.model_position,
            animation_tick: config.animation_tick,
        }
    }

    pub fn avatar(&self) -> Option<&LoadedAvatar> {
        match &self.state {
            ModelState::Loaded(avatar) => Some(avatar),
            _ => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.avatar().is_some()
    }

    /// Take ownership of a freshly loaded model: place it, swap the face
    /// material and start every clip looping.
    pub fn attach_model(&mut self, mut model: AvatarModel) -> Result<(), ViewerError> {
        if !matches!(self.state, ModelState::Loading) {
            return Err(ViewerError::AlreadyAttached(self.state.label()));
        }

        model.materials.push(Material {
            name: Some("face".to_string()),
            base_color: [1.0; 4],
            base_color_image: None,
            cull: CullMode::Front,
            blend: true,
            unlit: true,
            nearest_filter: true,
            wrap: [TextureWrap::ClampToEdge; 2],
        });
        let face_material = model.materials.len() - 1;

        let face_nodes = match model.find_node(&self.face_node_name) {
            Some(node) => model.subtree(node),
            None => {
                tracing::warn!("face node {:?} not found, face texture unused", self.face_node_name);
                Vec::new()
            }
        };

        let draws: Vec<AvatarDraw> = model
            .draw_items()
            .into_iter()
            .map(|item| {
                let face = face_nodes.contains(&item.node);
                AvatarDraw {
                    item,
                    material: if face { Some(face_material) } else { model.primitive(item).material },
                    face,
                }
            })
            .collect();

        let mixer = AnimationMixer::play_all(&model.clips, LoopMode::Repeat);
        tracing::info!(
            draws = draws.len(),
            face_draws = draws.iter().filter(|d| d.face).count(),
            clips = model.clips.len(),
            "avatar attached"
        );

        self.state = ModelState::Loaded(Box::new(LoadedAvatar {
            model,
            mixer,
            root: Transform {
                translation: self.model_position,
                rotation: glam::Quat::IDENTITY,
                scale: Vec3::splat(self.model_scale),
            },
            draws,
            face_material,
        }));
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        if matches!(self.state, ModelState::Loading) {
            self.state = ModelState::Failed(reason.into());
        }
    }

    /// Advance animation by one tick and turn the avatar toward `target`.
    /// Does nothing until a model is attached.
    pub fn update(&mut self, target: Vec3) {
        let ModelState::Loaded(avatar) = &mut self.state else { return };
        let LoadedAvatar { model, mixer, root, .. } = &mut **avatar;
        mixer.update(self.animation_tick, &model.clips, &mut model.nodes);
        root.rotation = look_at_rotation(root.translation, target, Vec3::Y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::gltf_import::{load_glb, tests::test_glb};

    fn loaded_scene() -> Scene {
        let mut scene = Scene::new(&ViewerConfig::default());
        scene.attach_model(load_glb(&test_glb()).expect("glb")).expect("attach");
        scene
    }

    #[test]
    fn test_loading_to_loaded_is_one_shot() {
        let mut scene = Scene::new(&ViewerConfig::default());
        assert!(!scene.is_loaded());
        scene.attach_model(load_glb(&test_glb()).expect("glb")).expect("attach");
        assert!(scene.is_loaded());

        assert!(scene.attach_model(load_glb(&test_glb()).expect("glb")).is_err());
        scene.fail("late failure");
        assert!(scene.is_loaded());
    }

    #[test]
    fn test_failure_is_terminal() {
        let mut scene = Scene::new(&ViewerConfig::default());
        scene.fail("404");
        assert!(matches!(scene.state, ModelState::Failed(ref r) if r == "404"));
        assert!(scene.attach_model(load_glb(&test_glb()).expect("glb")).is_err());
        // updates without a model are a no-op
        scene.update(Vec3::new(0.0, 0.0, 2.7));
    }

    #[test]
    fn test_face_material_swapped() {
        let scene = loaded_scene();
        let avatar = scene.avatar().expect("loaded");
        assert_eq!(avatar.draws.len(), 1);
        assert!(avatar.draws[0].face);
        let material = avatar.material(&avatar.draws[0]);
        assert!(material.unlit && material.blend && material.nearest_filter);
        assert_eq!(material.cull, CullMode::Front);
        assert_eq!(avatar.root.scale, Vec3::splat(1.5));
    }

    #[test]
    fn test_update_animates_and_orients() {
        let mut scene = loaded_scene();
        let target = Vec3::new(0.5, -0.5, 2.7);
        for _ in 0..50 {
            scene.update(target);
        }
        let avatar = scene.avatar().expect("loaded");
        // 50 ticks of 0.01s into the one-second clip
        assert!((avatar.mixer.actions[0].time - 0.5).abs() < 1e-4);
        let head = avatar.model.find_node("head").expect("head");
        assert!((avatar.model.nodes[head].pose.translation.y - 1.0).abs() < 1e-3);

        let forward = avatar.root.rotation * Vec3::Z;
        assert!((forward - target.normalize()).length() < 1e-4);

        let posed = avatar.pose();
        assert_eq!(posed.len(), 1);
        assert!(posed[0].skinned.is_none());
    }
}
