/// Platform-agnostic pointer tracking
use glam::Vec2;

/// Platform-independent input events, positions in client pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerMove { x: f32, y: f32 },
    TouchStart { x: f32, y: f32 },
    TouchMove { x: f32, y: f32 },
    TouchEnd,
}

/// Size of the area pointer positions are normalized against
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    /// Map client pixels to pointer space: x spans [-1, 1] left to right,
    /// y spans [-1, -3] top to bottom, so the centre sits at (0, -2)
    pub fn normalize(&self, x: f32, y: f32) -> Vec2 {
        Vec2::new(
            (x / self.width) * 2.0 - 1.0,
            -(y / self.height) * 2.0 - 1.0,
        )
    }
}

/// Current normalized pointer position
#[derive(Debug, Clone)]
pub struct InputState {
    pub pointer: Vec2,
    resting: Vec2,
}

impl InputState {
    /// Starts at the resting position
    pub fn new(resting: Vec2) -> Self {
        Self { pointer: resting, resting }
    }

    pub fn resting(&self) -> Vec2 {
        self.resting
    }

    /// Process an input event and update state
    pub fn process_event(&mut self, event: &InputEvent, viewport: Viewport) {
        match *event {
            InputEvent::PointerMove { x, y }
            | InputEvent::TouchStart { x, y }
            | InputEvent::TouchMove { x, y } => {
                if viewport.is_degenerate() {
                    tracing::trace!("dropping pointer event for empty viewport {viewport:?}");
                    return;
                }
                self.pointer = viewport.normalize(x, y);
            }
            InputEvent::TouchEnd => self.reset(),
        }
    }

    pub fn reset(&mut self) {
        self.pointer = self.resting;
    }
}

#[cfg(target_arch = "wasm32")]
pub mod wasm {
    use super::*;
    use web_sys::{MouseEvent, TouchEvent};

    pub fn mouse_move_to_input(e: &MouseEvent) -> InputEvent {
        InputEvent::PointerMove { x: e.client_x() as f32, y: e.client_y() as f32 }
    }

    /// Convert a touch event by its DOM type; the first touch point is used
    pub fn touch_event_to_input(e: &TouchEvent) -> Option<InputEvent> {
        let first = e.touches().get(0).map(|t| (t.client_x() as f32, t.client_y() as f32));
        match (e.type_().as_str(), first) {
            ("touchstart", Some((x, y))) => Some(InputEvent::TouchStart { x, y }),
            ("touchmove", Some((x, y))) => Some(InputEvent::TouchMove { x, y }),
            ("touchend", _) => Some(InputEvent::TouchEnd),
            _ => None,
        }
    }

    /// Window inner size in CSS pixels
    pub fn window_viewport(window: &web_sys::Window) -> Viewport {
        let dim = |v: Result<wasm_bindgen::JsValue, wasm_bindgen::JsValue>| {
            v.ok().and_then(|v| v.as_f64()).unwrap_or(0.0) as f32
        };
        Viewport::new(dim(window.inner_width()), dim(window.inner_height()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESTING: Vec2 = Vec2::new(0.0, -1.5);

    #[test]
    fn test_center_maps_below_origin() {
        let viewport = Viewport::new(1280.0, 720.0);
        let mut input = InputState::new(RESTING);
        input.process_event(&InputEvent::PointerMove { x: 640.0, y: 360.0 }, viewport);
        assert_eq!(input.pointer, Vec2::new(0.0, -2.0));
    }

    #[test]
    fn test_vertical_sweep() {
        let viewport = Viewport::new(350.0, 350.0);
        for (client_y, expected) in [(0.0, -1.0), (175.0, -2.0), (350.0, -3.0)] {
            assert_eq!(viewport.normalize(175.0, client_y), Vec2::new(0.0, expected));
        }
    }

    #[test]
    fn test_resting_pointer_is_on_screen() {
        // touch-end parks the head where a pointer between top and centre would
        let top = Viewport::new(350.0, 350.0).normalize(175.0, 0.0).y;
        let bottom = Viewport::new(350.0, 350.0).normalize(175.0, 350.0).y;
        assert!(RESTING.y < top && RESTING.y > bottom);
    }

    #[test]
    fn test_corners() {
        let viewport = Viewport::new(200.0, 100.0);
        let mut input = InputState::new(RESTING);

        input.process_event(&InputEvent::TouchStart { x: 0.0, y: 0.0 }, viewport);
        assert_eq!(input.pointer, Vec2::new(-1.0, -1.0));

        input.process_event(&InputEvent::TouchMove { x: 200.0, y: 100.0 }, viewport);
        assert_eq!(input.pointer, Vec2::new(1.0, -3.0));
    }

    #[test]
    fn test_touch_end_resets_to_resting() {
        let viewport = Viewport::new(350.0, 350.0);
        let mut input = InputState::new(RESTING);
        for (x, y) in [(10.0, 20.0), (300.0, 5.0), (175.0, 175.0)] {
            input.process_event(&InputEvent::PointerMove { x, y }, viewport);
            input.process_event(&InputEvent::TouchEnd, viewport);
            assert_eq!(input.pointer, Vec2::new(0.0, -1.5));
        }
    }

    #[test]
    fn test_starts_at_resting() {
        assert_eq!(InputState::new(RESTING).pointer, RESTING);
    }

    #[test]
    fn test_degenerate_viewport_keeps_state() {
        let mut input = InputState::new(RESTING);
        input.process_event(&InputEvent::PointerMove { x: 5.0, y: 5.0 }, Viewport::new(0.0, 100.0));
        assert_eq!(input.pointer, RESTING);
        assert!(input.pointer.is_finite());
    }
}
