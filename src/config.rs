use glam::{Vec2, Vec3};

/// Where the face texture comes from
#[derive(Debug, Clone, PartialEq)]
pub enum FaceSource {
    /// Two-frame sprite sheet image (blinking face)
    SpriteSheet { path: String },
    /// Live `<video>` element, copied into the face texture every frame
    Video { element_id: String },
}

/// All tunable constants of the viewer
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub container_id: String,
    pub viewport_width: u32,
    pub viewport_height: u32,

    // Camera
    pub fov_y_degrees: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub camera_eye: Vec3,
    pub camera_look_at: Vec3,

    // Light
    pub light_position: Vec3,
    pub light_color: [f32; 3],
    pub light_intensity: f32,
    pub clear_color: [f64; 4],

    // Pointer following
    pub damping: f32,
    pub resting_pointer: Vec2,
    pub initial_target: Vec3,

    // Face frames (milliseconds)
    pub face_frame_ms: f64,
    pub face_gap_ms: f64,
    pub face_node_name: String,
    pub face_source: FaceSource,

    // Model
    pub model_path: String,
    pub model_scale: f32,
    pub model_position: Vec3,
    /// Fixed animation step applied on every tick, in seconds
    pub animation_tick: f32,

    pub debug_overlay: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            container_id: "scene-container".to_string(),
            viewport_width: 350,
            viewport_height: 350,

            fov_y_degrees: 75.0,
            z_near: 0.1,
            z_far: 1000.0,
            camera_eye: Vec3::new(0.0, -1.8, 3.0),
            camera_look_at: Vec3::ZERO,

            light_position: Vec3::new(0.0, 0.0, 3.0),
            light_color: [1.0, 1.0, 1.0],
            light_intensity: 5.0,
            clear_color: [1.0, 1.0, 1.0, 1.0],

            damping: 0.1,
            resting_pointer: Vec2::new(0.0, -1.5),
            initial_target: Vec3::new(0.0, 0.0, 2.7),

            face_frame_ms: 6000.0,
            face_gap_ms: 500.0,
            face_node_name: "sixcen_png_face".to_string(),
            face_source: FaceSource::SpriteSheet { path: "spritesheet.png".to_string() },

            model_path: "/sixcen_head_3.glb".to_string(),
            model_scale: 1.5,
            model_position: Vec3::ZERO,
            animation_tick: 0.01,

            debug_overlay: false,
        }
    }
}

impl ViewerConfig {
    pub fn aspect(&self) -> f32 {
        self.viewport_width as f32 / self.viewport_height.max(1) as f32
    }

    /// Apply overrides given as `(key, value)` pairs.
    ///
    /// Keys match the container's data attributes without the `data-` prefix:
    /// `model`, `spritesheet`, `video`, `face-node`, `debug`.
    /// Unknown keys are ignored.
    pub fn apply_overrides<'a>(&mut self, pairs: impl IntoIterator<Item = (&'a str, String)>) {
        for (key, value) in pairs {
            match key {
                "model" => self.model_path = value,
                "spritesheet" => self.face_source = FaceSource::SpriteSheet { path: value },
                "video" => self.face_source = FaceSource::Video { element_id: value },
                "face-node" => self.face_node_name = value,
                "debug" => self.debug_overlay = !matches!(value.as_str(), "false" | "0" | "off"),
                other => tracing::debug!("ignoring unknown config key {other:?}"),
            }
        }
    }

    /// Read overrides from `data-*` attributes of the container element
    #[cfg(target_arch = "wasm32")]
    pub fn apply_element_overrides(&mut self, element: &web_sys::Element) {
        const KEYS: [&str; 5] = ["model", "spritesheet", "video", "face-node", "debug"];
        let pairs: Vec<(&str, String)> = KEYS
            .iter()
            .filter_map(|key| element.get_attribute(&format!("data-{key}")).map(|v| (*key, v)))
            .collect();
        self.apply_overrides(pairs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_viewer_constants() {
        let config = ViewerConfig::default();
        assert_eq!((config.viewport_width, config.viewport_height), (350, 350));
        assert_eq!(config.fov_y_degrees, 75.0);
        assert_eq!(config.damping, 0.1);
        assert_eq!(config.face_frame_ms, 6000.0);
        assert_eq!(config.face_gap_ms, 500.0);
        assert_eq!(config.resting_pointer, Vec2::new(0.0, -1.5));
        assert_eq!(config.aspect(), 1.0);
    }

    #[test]
    fn test_overrides() {
        let mut config = ViewerConfig::default();
        config.apply_overrides([
            ("model", "head.glb".to_string()),
            ("video", "cam".to_string()),
            ("debug", "".to_string()),
            ("bogus", "x".to_string()),
        ]);
        assert_eq!(config.model_path, "head.glb");
        assert_eq!(config.face_source, FaceSource::Video { element_id: "cam".to_string() });
        assert!(config.debug_overlay);

        config.apply_overrides([("debug", "false".to_string())]);
        assert!(!config.debug_overlay);
    }
}
