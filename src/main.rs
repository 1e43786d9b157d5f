use winit::{
    event::*,
    event_loop::EventLoop,
    window::Window,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

// Import from the library crate
use avatar_head::{
    assets, logging,
    config::ViewerConfig,
    controller::{FrameLoopContext, InputEvent, InputState, Viewport},
    model::Scene,
    view::{GpuContext, RenderState},
    ViewerError,
};

struct App {
    window: Arc<Window>,
    gpu: GpuContext,
    render_state: RenderState,
    frame_ctx: FrameLoopContext,
    input_state: Rc<RefCell<InputState>>,

    // egui
    egui_state: egui_winit::State,
    show_debug: bool,

    started: std::time::Instant,
}

impl App {
    async fn new(window: Arc<Window>, config: &ViewerConfig) -> Result<Self, ViewerError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| ViewerError::Gpu(format!("window surface: {e}")))?;
        let gpu = GpuContext::new_native(&instance, surface, size.width, size.height).await?;

        let render_state = RenderState::new(
            gpu.device.as_ref(),
            gpu.queue.as_ref(),
            gpu.format,
            gpu.config.alpha_mode,
            gpu.config.width,
            gpu.config.height,
            config.clear_color,
        );

        let scene = Rc::new(RefCell::new(Scene::new(config)));
        let input_state = Rc::new(RefCell::new(InputState::new(config.resting_pointer)));
        let pending_face = Rc::new(RefCell::new(None));
        let frame_ctx = FrameLoopContext::new(config, scene.clone(), input_state.clone(), pending_face.clone());

        // Assets load before the first frame; failures leave an empty scene
        match pollster::block_on(assets::load_avatar(&config.model_path)) {
            Ok(model) => scene.borrow_mut().attach_model(model)?,
            Err(e) => {
                tracing::error!("avatar {} failed to load: {e}", config.model_path);
                scene.borrow_mut().fail(e.to_string());
            }
        }
        match &config.face_source {
            avatar_head::FaceSource::SpriteSheet { path } => {
                match pollster::block_on(assets::load_sprite_sheet(path)) {
                    Ok(image) => *pending_face.borrow_mut() = Some(image),
                    Err(e) => tracing::error!("face sprite sheet {path} failed to load: {e}"),
                }
            }
            avatar_head::FaceSource::Video { element_id } => {
                tracing::warn!("video faces need a browser, #{element_id} ignored");
            }
        }

        let egui_state = egui_winit::State::new(
            frame_ctx.egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            None,
            None,
            None,
        );

        Ok(Self {
            window,
            gpu,
            render_state,
            frame_ctx,
            input_state,
            egui_state,
            show_debug: config.debug_overlay,
            started: std::time::Instant::now(),
        })
    }

    fn viewport(&self) -> Viewport {
        let size = self.window.inner_size();
        Viewport::new(size.width as f32, size.height as f32)
    }

    fn input(&mut self, event: &WindowEvent) -> bool {
        // First let egui process the event
        if self.show_debug && self.egui_state.on_window_event(self.window.as_ref(), event).consumed {
            return true;
        }

        let input = match event {
            WindowEvent::CursorMoved { position, .. } => InputEvent::PointerMove {
                x: position.x as f32,
                y: position.y as f32,
            },
            WindowEvent::Touch(Touch { phase, location, .. }) => {
                let (x, y) = (location.x as f32, location.y as f32);
                match phase {
                    TouchPhase::Started => InputEvent::TouchStart { x, y },
                    TouchPhase::Moved => InputEvent::TouchMove { x, y },
                    TouchPhase::Ended | TouchPhase::Cancelled => InputEvent::TouchEnd,
                }
            }
            _ => return false,
        };
        let viewport = self.viewport();
        self.input_state.borrow_mut().process_event(&input, viewport);
        true
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        self.render_state
            .resize(self.gpu.device.as_ref(), &self.gpu.surface, new_size.width, new_size.height);
        self.frame_ctx
            .scene
            .borrow_mut()
            .camera
            .set_aspect(self.render_state.width, self.render_state.height);
    }

    fn redraw(&mut self) {
        let now = self.started.elapsed().as_secs_f64() * 1000.0;
        let dpr = self.window.scale_factor() as f32;

        if self.show_debug {
            let raw_input = self.egui_state.take_egui_input(&self.window);
            self.frame_ctx.egui_events.borrow_mut().extend(raw_input.events);
        }

        self.frame_ctx
            .update(self.gpu.device.as_ref(), self.gpu.queue.as_ref(), &mut self.render_state, now, dpr);
        self.render_state
            .draw_frame(self.gpu.device.as_ref(), self.gpu.queue.as_ref(), &self.gpu.surface);
    }
}

/// `avatar-head [MODEL] [SPRITESHEET] [--debug]`
fn parse_args(args: impl IntoIterator<Item = String>) -> ViewerConfig {
    let mut config = ViewerConfig::default();
    // the web default is site-absolute, natively look next to the binary
    config.model_path = config.model_path.trim_start_matches('/').to_string();

    let mut positional = Vec::new();
    for arg in args {
        if arg == "--debug" {
            config.debug_overlay = true;
        } else {
            positional.push(arg);
        }
    }
    let keys = ["model", "spritesheet"];
    config.apply_overrides(keys.into_iter().zip(positional));
    config
}

#[allow(deprecated)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let config = parse_args(std::env::args().skip(1));
    tracing::info!(model = %config.model_path, face = ?config.face_source, "starting avatar viewer");

    let event_loop = EventLoop::new()?;
    let window_attributes = Window::default_attributes()
        .with_title("Avatar Head")
        .with_inner_size(winit::dpi::LogicalSize::new(config.viewport_width, config.viewport_height));
    let window = Arc::new(event_loop.create_window(window_attributes)?);

    let mut app = pollster::block_on(App::new(window.clone(), &config))?;

    event_loop.run(move |event, elwt| {
        match event {
            Event::WindowEvent {
                ref event,
                window_id,
            } if window_id == app.window.id() => {
                if !app.input(event) {
                    match event {
                        WindowEvent::CloseRequested => elwt.exit(),
                        WindowEvent::Resized(physical_size) => {
                            app.resize(*physical_size);
                        }
                        WindowEvent::RedrawRequested => app.redraw(),
                        _ => {}
                    }
                }
            }
            Event::AboutToWait => {
                app.window.request_redraw();
            }
            _ => {}
        }
    })?;

    Ok(())
}
