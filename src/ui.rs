use egui::Context;
use glam::{Vec2, Vec3};

use crate::controller::FaceFrame;

/// Values shown in the debug overlay
pub struct DebugInfo {
    pub dt: f32,
    pub state: &'static str,
    pub pointer: Vec2,
    pub target: Vec3,
    pub face_frame: Option<FaceFrame>,
}

/// Build the debug overlay and return egui output
pub fn build_ui(
    egui_ctx: &Context,
    info: &DebugInfo,
    events: Vec<egui::Event>,
    screen_width: f32,
    screen_height: f32,
    now: f64,
) -> egui::FullOutput {
    let mut raw_input = egui::RawInput::default();
    raw_input.time = Some(now / 1000.0);
    raw_input.screen_rect = Some(egui::Rect::from_min_size(
        egui::Pos2::new(0.0, 0.0),
        egui::vec2(screen_width, screen_height),
    ));
    raw_input.events = events;

    egui_ctx.run(raw_input, |ctx| {
        draw_debug_window(ctx, info);
    })
}

fn draw_debug_window(ctx: &Context, info: &DebugInfo) {
    let face = match info.face_frame {
        Some(FaceFrame::Open) => "open",
        Some(FaceFrame::Closed) => "closed",
        None => "video",
    };

    egui::Window::new("Debug")
        .default_pos([4.0, 4.0])
        .collapsible(true)
        .show(ctx, |ui| {
            ui.label(
                egui::RichText::new(format!("FPS: {:.0}", if info.dt > 0.0 { 1.0 / info.dt } else { 0.0 }))
                    .small(),
            );
            ui.label(egui::RichText::new(format!("Model: {}", info.state)).small());
            ui.label(egui::RichText::new(format!("Pointer: x: {:.2} y: {:.2}", info.pointer.x, info.pointer.y)).small());
            ui.label(
                egui::RichText::new(format!(
                    "Target: x: {:.2} y: {:.2} z: {:.2}",
                    info.target.x, info.target.y, info.target.z
                ))
                .small(),
            );
            ui.label(egui::RichText::new(format!("Face: {face}")).small());
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_builds_shapes() {
        let ctx = Context::default();
        let info = DebugInfo {
            dt: 1.0 / 60.0,
            state: "loaded",
            pointer: Vec2::new(0.0, -1.5),
            target: Vec3::new(0.0, 0.0, 2.7),
            face_frame: Some(FaceFrame::Open),
        };
        // new windows are measured invisibly on their first frame
        build_ui(&ctx, &info, Vec::new(), 350.0, 350.0, 0.0);
        let output = build_ui(&ctx, &info, Vec::new(), 350.0, 350.0, 16.0);
        assert!(!output.shapes.is_empty());
    }
}
