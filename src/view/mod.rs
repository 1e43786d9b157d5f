// VIEW: Rendering and graphics
pub mod render;
pub mod gpu_init;
pub mod texture;

pub use render::{RenderState, AvatarGpu, CameraResources, PipelineResources};
pub use gpu_init::GpuContext;
pub use texture::{GpuTexture, SamplerKey, Samplers};
