// Re-export all public modules so they can be used from main.rs
pub mod assets;
pub mod config;
pub mod error;
pub mod logging;
pub mod utils;
pub mod ui;

// MVC Architecture
pub mod model;
pub mod view;
pub mod controller;

pub use config::{FaceSource, ViewerConfig};
pub use error::ViewerError;

#[cfg(target_arch = "wasm32")]
mod web {
    use std::cell::RefCell;
    use std::rc::Rc;

    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::{JsCast, JsValue};
    use web_sys::{Document, Event, HtmlCanvasElement, HtmlVideoElement, MouseEvent, TouchEvent, Window};

    use crate::assets;
    use crate::config::{FaceSource, ViewerConfig};
    use crate::controller::input::wasm::{mouse_move_to_input, touch_event_to_input, window_viewport};
    use crate::controller::{FrameLoopContext, InputState};
    use crate::error::ViewerError;
    use crate::model::avatar::TextureImage;
    use crate::model::Scene;
    use crate::view::texture::VideoFace;
    use crate::view::{GpuContext, RenderState};

    /// Build the viewer inside the configured container and start both frame loops
    pub async fn run() -> Result<(), ViewerError> {
        let window = web_sys::window().ok_or_else(|| ViewerError::MissingElement("window".into()))?;
        let document = window.document().ok_or_else(|| ViewerError::MissingElement("document".into()))?;

        let mut config = ViewerConfig::default();
        let container = document
            .get_element_by_id(&config.container_id)
            .ok_or_else(|| ViewerError::MissingElement(format!("#{}", config.container_id)))?;
        config.apply_element_overrides(&container);
        tracing::info!(model = %config.model_path, face = ?config.face_source, "starting avatar viewer");

        let canvas = create_canvas(&document, config.viewport_width, config.viewport_height)?;
        container.append_child(&canvas)?;

        let gpu = Rc::new(GpuContext::new(&canvas, config.viewport_width, config.viewport_height).await?);

        let scene = Rc::new(RefCell::new(Scene::new(&config)));
        let input_state = Rc::new(RefCell::new(InputState::new(config.resting_pointer)));
        let pending_face: Rc<RefCell<Option<TextureImage>>> = Rc::new(RefCell::new(None));

        let mut frame_ctx = FrameLoopContext::new(&config, scene.clone(), input_state.clone(), pending_face.clone());

        match &config.face_source {
            FaceSource::SpriteSheet { path } => {
                let path = path.clone();
                wasm_bindgen_futures::spawn_local(async move {
                    match assets::load_sprite_sheet(&path).await {
                        Ok(image) => *pending_face.borrow_mut() = Some(image),
                        Err(e) => tracing::error!("face sprite sheet {path} failed to load: {e}"),
                    }
                });
            }
            FaceSource::Video { element_id } => {
                match document.get_element_by_id(element_id).and_then(|e| e.dyn_into::<HtmlVideoElement>().ok()) {
                    Some(video) => frame_ctx.video = Some(VideoFace::new(video)),
                    None => tracing::warn!("video element #{element_id} not found, face stays blank"),
                }
            }
        }

        {
            let scene = scene.clone();
            let path = config.model_path.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let result = assets::load_avatar(&path).await.and_then(|model| scene.borrow_mut().attach_model(model));
                if let Err(e) = result {
                    tracing::error!("avatar {path} failed to load: {e}");
                    scene.borrow_mut().fail(e.to_string());
                }
            });
        }

        setup_input_listeners(&window, input_state, frame_ctx.egui_events.clone(), config.debug_overlay)?;

        let render_state = Rc::new(RefCell::new(RenderState::new(
            gpu.device.as_ref(),
            gpu.queue.as_ref(),
            gpu.format,
            gpu.config.alpha_mode,
            gpu.config.width,
            gpu.config.height,
            config.clear_color,
        )));

        // Render and update run as two independent requestAnimationFrame loops
        FrameScheduler::new(window.clone(), {
            let gpu = gpu.clone();
            let render_state = render_state.clone();
            move || {
                render_state
                    .borrow_mut()
                    .draw_frame(gpu.device.as_ref(), gpu.queue.as_ref(), &gpu.surface);
            }
        })
        .start()?;

        FrameScheduler::new(window.clone(), {
            let window = window.clone();
            move || {
                let now = window.performance().map(|p| p.now()).unwrap_or(0.0);
                let dpr = window.device_pixel_ratio() as f32;
                frame_ctx.update(gpu.device.as_ref(), gpu.queue.as_ref(), &mut render_state.borrow_mut(), now, dpr);
            }
        })
        .start()?;

        Ok(())
    }

    fn create_canvas(document: &Document, width: u32, height: u32) -> Result<HtmlCanvasElement, ViewerError> {
        let canvas = document
            .create_element("canvas")?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| ViewerError::Js("failed to create canvas".into()))?;
        canvas.set_width(width);
        canvas.set_height(height);
        Ok(canvas)
    }

    /// Pointer and touch listeners on the window; the viewport is the window's inner size
    fn setup_input_listeners(
        window: &Window,
        input_state: Rc<RefCell<InputState>>,
        egui_events: Rc<RefCell<Vec<egui::Event>>>,
        forward_to_egui: bool,
    ) -> Result<(), ViewerError> {
        // Mouse move
        {
            let input_state = input_state.clone();
            let window_vp = window.clone();
            let mm = Closure::wrap(Box::new(move |e: MouseEvent| {
                input_state
                    .borrow_mut()
                    .process_event(&mouse_move_to_input(&e), window_viewport(&window_vp));
                if forward_to_egui {
                    let pos = egui::pos2(e.client_x() as f32, e.client_y() as f32);
                    egui_events.borrow_mut().push(egui::Event::PointerMoved(pos));
                }
            }) as Box<dyn FnMut(MouseEvent)>);
            window.add_event_listener_with_callback("mousemove", mm.as_ref().unchecked_ref())?;
            mm.forget();
        }

        // Touch start / move / end share one handler keyed on the event type
        for kind in ["touchstart", "touchmove", "touchend"] {
            let input_state = input_state.clone();
            let window_vp = window.clone();
            let touch = Closure::wrap(Box::new(move |e: Event| {
                let Some(event) = e.dyn_ref::<TouchEvent>().and_then(touch_event_to_input) else {
                    return;
                };
                input_state.borrow_mut().process_event(&event, window_viewport(&window_vp));
            }) as Box<dyn FnMut(Event)>);
            window.add_event_listener_with_callback(kind, touch.as_ref().unchecked_ref())?;
            touch.forget();
        }

        Ok(())
    }

    /// Runs a callback on every animation frame, forever
    struct FrameScheduler {
        inner: Rc<RefCell<Box<dyn FnMut()>>>,
        window: Window,
    }

    impl FrameScheduler {
        fn new(window: Window, f: impl FnMut() + 'static) -> Self {
            Self {
                inner: Rc::new(RefCell::new(Box::new(f))),
                window,
            }
        }

        fn start(self) -> Result<(), JsValue> {
            let inner = self.inner.clone();
            let window = self.window.clone();

            let callback = Rc::new(RefCell::new(None::<Closure<dyn FnMut()>>));
            let callback_clone = callback.clone();

            *callback.borrow_mut() = Some(Closure::wrap(Box::new(move || {
                inner.borrow_mut().as_mut()();

                // Recursively schedule next frame
                if let Some(cb) = callback_clone.borrow().as_ref() {
                    if let Err(e) = window.request_animation_frame(cb.as_ref().unchecked_ref()) {
                        tracing::error!("requestAnimationFrame failed: {e:?}");
                    }
                }
            }) as Box<dyn FnMut()>));

            if let Some(cb) = callback.borrow().as_ref() {
                self.window.request_animation_frame(cb.as_ref().unchecked_ref())?;
            }

            // Leak the closure to keep it alive
            std::mem::forget(callback);
            Ok(())
        }
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub async fn start() -> Result<(), wasm_bindgen::JsValue> {
    logging::init();
    web::run().await.map_err(|e| {
        tracing::error!("avatar viewer failed to start: {e}");
        e.into()
    })
}
