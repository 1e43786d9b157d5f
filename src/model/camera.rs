use glam::{Mat4, Vec3};

use crate::config::ViewerConfig;

pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y: f32,
    pub aspect: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 3.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: 75f32.to_radians(),
            aspect: width as f32 / height.max(1) as f32,
            z_near: 0.1,
            z_far: 1000.0,
        }
    }

    pub fn from_config(config: &ViewerConfig) -> Self {
        let mut cam = Self::new(config.viewport_width, config.viewport_height);
        cam.eye = config.camera_eye;
        cam.fov_y = config.fov_y_degrees.to_radians();
        cam.z_near = config.z_near;
        cam.z_far = config.z_far;
        cam.set_look_at(config.camera_look_at);
        cam
    }

    pub fn forward(&self) -> Vec3 {
        (self.target - self.eye).normalize_or_zero()
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn set_look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.z_near, self.z_far)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_projects_to_center() {
        let cam = Camera::from_config(&ViewerConfig::default());
        let clip = cam.view_proj() * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        // wgpu depth range
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn test_config_camera() {
        let cam = Camera::from_config(&ViewerConfig::default());
        assert_eq!(cam.eye, Vec3::new(0.0, -1.8, 3.0));
        assert!((cam.fov_y - 75f32.to_radians()).abs() < 1e-6);
        assert_eq!(cam.aspect, 1.0);
        assert!(cam.forward().y > 0.0 && cam.forward().z < 0.0);
    }
}
