// MODEL: Avatar data, animation and scene state
pub mod avatar;
pub mod animation;
pub mod camera;
pub mod gltf_import;
pub mod scene;

pub use avatar::{AvatarModel, CullMode, DrawItem, Material};
pub use animation::{AnimationClip, AnimationMixer, LoopMode};
pub use camera::Camera;
pub use gltf_import::load_glb;
pub use scene::{ModelState, Scene};
