use std::rc::Rc;
use std::cell::RefCell;
use glam::{Mat4, Vec2, Vec3};
use wgpu::{Device, Queue};

use crate::config::{FaceSource, ViewerConfig};
use crate::controller::face_frames::{wall_clock_ms, FaceFrame, FaceFrameSelector, UvTransform};
use crate::controller::input::InputState;
use crate::controller::orientation::OrientationSmoother;
use crate::model::avatar::TextureImage;
use crate::model::camera::Camera;
use crate::model::scene::{DirectionalLight, Scene};
use crate::ui::{self, DebugInfo};
use crate::view::render::RenderState;
use crate::view::texture::GpuTexture;

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub light_dir: [f32; 3],
    pub light_intensity: f32,
    pub light_color: [f32; 3],
    pub _pad: f32,
}

impl CameraUniform {
    pub fn new(camera: &Camera, light: &DirectionalLight) -> Self {
        Self {
            view_proj: camera.view_proj().to_cols_array_2d(),
            light_dir: light.direction.to_array(),
            light_intensity: light.intensity,
            light_color: light.color,
            _pad: 0.0,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawUniform {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    pub uv_transform: [f32; 4],
    pub base_color: [f32; 4],
    pub flags: [f32; 4],
}

impl DrawUniform {
    pub fn new(model: Mat4, uv: UvTransform, base_color: [f32; 4], unlit: bool, blend: bool) -> Self {
        let normal_matrix = if model.determinant().abs() > f32::EPSILON {
            model.inverse().transpose()
        } else {
            model
        };
        Self {
            model: model.to_cols_array_2d(),
            normal_matrix: normal_matrix.to_cols_array_2d(),
            uv_transform: uv.to_array(),
            base_color,
            flags: [unlit as u32 as f32, blend as u32 as f32, 0.0, 0.0],
        }
    }
}

/// What one tick produced, before any GPU work
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    pub dt: f32,
    pub pointer: Vec2,
    pub target: Vec3,
    /// `None` while the face shows a video
    pub face_frame: Option<FaceFrame>,
    pub face_uv: UvTransform,
}

/// Per-tick update state shared by the web and native loops
pub struct FrameLoopContext {
    pub scene: Rc<RefCell<Scene>>,
    pub input_state: Rc<RefCell<InputState>>,
    pub smoother: OrientationSmoother,
    pub face_selector: FaceFrameSelector,
    /// Sprite sheet decoded by the loader, uploaded on the next tick
    pub pending_face: Rc<RefCell<Option<TextureImage>>>,
    pub video_face: bool,
    #[cfg(target_arch = "wasm32")]
    pub video: Option<crate::view::texture::VideoFace>,
    pub egui_ctx: egui::Context,
    pub egui_events: Rc<RefCell<Vec<egui::Event>>>,
    pub show_debug: bool,
    pub last_time: Option<f64>,
}

impl FrameLoopContext {
    pub fn new(
        config: &ViewerConfig,
        scene: Rc<RefCell<Scene>>,
        input_state: Rc<RefCell<InputState>>,
        pending_face: Rc<RefCell<Option<TextureImage>>>,
    ) -> Self {
        Self {
            scene,
            input_state,
            smoother: OrientationSmoother::new(config.initial_target, config.damping),
            face_selector: FaceFrameSelector::new(config.face_frame_ms, config.face_gap_ms),
            pending_face,
            video_face: matches!(config.face_source, FaceSource::Video { .. }),
            #[cfg(target_arch = "wasm32")]
            video: None,
            egui_ctx: egui::Context::default(),
            egui_events: Rc::new(RefCell::new(Vec::new())),
            show_debug: config.debug_overlay,
            last_time: None,
        }
    }

    /// Advance everything that does not touch the GPU: smoothing, face frame,
    /// animation and orientation. `now_ms` is a monotonic clock, `wall_ms` the
    /// wall clock driving the sprite frames.
    pub fn advance(&mut self, now_ms: f64, wall_ms: f64) -> FrameTick {
        let dt = match self.last_time.replace(now_ms) {
            Some(last) => ((now_ms - last) / 1000.0).clamp(0.0, 0.1) as f32,
            None => 0.0,
        };

        let (face_frame, face_uv) = if self.video_face {
            (None, UvTransform::IDENTITY)
        } else {
            (Some(self.face_selector.frame_at(wall_ms)), self.face_selector.uv_at(wall_ms))
        };

        let pointer = self.input_state.borrow().pointer;
        let target = self.smoother.tick(pointer);
        self.scene.borrow_mut().update(target);

        FrameTick { dt, pointer, target, face_frame, face_uv }
    }

    /// Run one full tick and stage GPU data for the next `draw_frame`
    pub fn update(&mut self, device: &Device, queue: &Queue, render_state: &mut RenderState, now_ms: f64, dpr: f32) {
        if let Some(image) = self.pending_face.borrow_mut().take() {
            tracing::info!(width = image.width, height = image.height, "face sprite sheet ready");
            render_state.set_face_texture(device, GpuTexture::from_rgba(device, queue, &image, "face_sprite"));
        }

        #[cfg(target_arch = "wasm32")]
        {
            if let Some(video) = self.video.as_mut() {
                if let Some(texture) = video.copy_frame(device, queue, &render_state.face_texture) {
                    render_state.set_face_texture(device, texture);
                }
            }
        }

        let tick = self.advance(now_ms, wall_clock_ms());

        {
            let scene = self.scene.borrow();
            if let Some(avatar) = scene.avatar() {
                if render_state.avatar.is_none() {
                    render_state.upload_avatar(device, queue, avatar);
                }
                if let Some(gpu) = render_state.avatar.as_ref() {
                    gpu.update(queue, avatar, tick.face_uv);
                }
            }
            render_state.write_camera(queue, &CameraUniform::new(&scene.camera, &scene.light));
        }

        let events: Vec<egui::Event> = self.egui_events.borrow_mut().drain(..).collect();
        if !self.show_debug {
            return;
        }

        self.egui_ctx.set_pixels_per_point(dpr);
        let info = DebugInfo {
            dt: tick.dt,
            state: self.scene.borrow().state.label(),
            pointer: tick.pointer,
            target: tick.target,
            face_frame: tick.face_frame,
        };
        let mut full_output = ui::build_ui(
            &self.egui_ctx,
            &info,
            events,
            render_state.width as f32 / dpr,
            render_state.height as f32 / dpr,
            now_ms,
        );

        // Tessellate and store for rendering in next step
        let primitives = self.egui_ctx.tessellate(std::mem::take(&mut full_output.shapes), dpr);
        render_state.egui_primitives = Some(primitives);
        render_state.egui_full_output = Some(full_output);
        render_state.egui_dpr = dpr;
    }
}
