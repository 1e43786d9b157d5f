// CONTROLLER: Input, smoothing, face frames and the update loop
pub mod input;
pub mod orientation;
pub mod face_frames;
pub mod frame_loop;

pub use input::{InputEvent, InputState, Viewport};
pub use orientation::OrientationSmoother;
pub use face_frames::{FaceFrame, FaceFrameSelector, UvTransform};
pub use frame_loop::{FrameLoopContext, CameraUniform, DrawUniform};
