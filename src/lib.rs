// Re-export all public modules so they can be used from main.rs
pub mod config;
pub mod error;
pub mod logging;
pub mod utils;
pub mod ui;

// MVC Architecture
pub mod model;
pub mod view;
pub mod controller;

pub use config::SandboxConfig;
pub use controller::Simulation;
pub use error::{Result, SandboxError};

#[cfg(target_arch = "wasm32")]
mod web {
    use std::cell::RefCell;
    use std::rc::Rc;

    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::{prelude::wasm_bindgen, JsCast, JsValue};
    use web_sys::{Document, Event, HtmlAudioElement, HtmlCanvasElement, KeyboardEvent, MouseEvent, Window};

    use crate::config::SandboxConfig;
    use crate::controller::input::{wasm as web_input, InputEvent};
    use crate::controller::Simulation;
    use crate::logging;
    use crate::model::assets;
    use crate::model::overlay::Overlays;
    use crate::ui::{self, DevPanel};
    use crate::view::render::{EguiFrame, RenderState};
    use crate::view::GpuContext;

    // frames longer than this are treated as a pause (tab in background)
    const MAX_FRAME_MS: f64 = 250.0;

    struct App {
        window: Window,
        canvas: HtmlCanvasElement,
        gpu: GpuContext,
        render: RenderState,
        sim: Simulation,
        overlays: Overlays,
        dev: DevPanel,
        egui_ctx: egui::Context,
        egui_events: Vec<egui::Event>,
        audio: Vec<(u64, HtmlAudioElement)>,
        last_time: f64,
    }

    impl App {
        fn now(&self) -> f64 {
            self.window.performance().map(|p| p.now()).unwrap_or(0.0)
        }

        fn frame(&mut self) {
            let now = self.now();
            let elapsed = (now - self.last_time).clamp(0.0, MAX_FRAME_MS);
            self.last_time = now;

            self.sim.frame(elapsed);
            ui::pump_overlays(&mut self.sim, &mut self.overlays, elapsed);
            self.sync_audio();

            let raw_input = egui::RawInput {
                time: Some(now / 1000.0),
                screen_rect: Some(egui::Rect::from_min_size(
                    egui::Pos2::ZERO,
                    egui::vec2(self.render.width as f32, self.render.height as f32),
                )),
                events: std::mem::take(&mut self.egui_events),
                ..Default::default()
            };
            let full = ui::build_ui(
                &self.egui_ctx,
                raw_input,
                &mut self.sim,
                &mut self.overlays,
                &mut self.dev,
                (elapsed / 1000.0) as f32,
            );
            let primitives = self.egui_ctx.tessellate(full.shapes, full.pixels_per_point);
            let egui_frame = EguiFrame {
                primitives,
                textures_delta: full.textures_delta,
                pixels_per_point: full.pixels_per_point,
            };

            if let Err(e) = self.render.draw_frame(&self.gpu, &self.sim.scene, &self.sim.camera, Some(egui_frame)) {
                tracing::error!("{e}");
            }
        }

        /// Starts audio for new overlay sounds and stops the expired ones.
        fn sync_audio(&mut self) {
            let active = self.overlays.sounds();
            self.audio.retain(|(id, el)| {
                let keep = active.iter().any(|s| s.id == *id);
                if !keep {
                    let _ = el.pause();
                }
                keep
            });
            for sound in active {
                if self.audio.iter().any(|(id, _)| *id == sound.id) {
                    continue;
                }
                match HtmlAudioElement::new_with_src(&sound.path) {
                    Ok(el) => {
                        el.set_volume(sound.volume as f64);
                        if let Err(e) = el.play() {
                            tracing::warn!(path = %sound.path, "audio play failed: {e:?}");
                        }
                        self.audio.push((sound.id, el));
                    }
                    Err(e) => tracing::warn!(path = %sound.path, "audio element failed: {e:?}"),
                }
            }
        }

        fn resize(&mut self) {
            let (w, h) = window_size(&self.window);
            self.canvas.set_width(w);
            self.canvas.set_height(h);
            self.gpu.resize(w, h);
            self.render.resize(self.gpu.device.as_ref(), w, h);
            self.sim.resize(w, h);
        }

        fn canvas_pos(&self, e: &MouseEvent) -> egui::Pos2 {
            let rect = self.canvas.get_bounding_client_rect();
            egui::pos2(
                (e.client_x() as f64 - rect.left()) as f32,
                (e.client_y() as f64 - rect.top()) as f32,
            )
        }
    }

    #[wasm_bindgen(start)]
    pub async fn start() -> Result<(), JsValue> {
        logging::init();
        let (window, document, canvas) = init_canvas()?;
        setup_app(window, document, canvas).await
    }

    /// Main application setup for WASM
    async fn setup_app(window: Window, document: Document, canvas: HtmlCanvasElement) -> Result<(), JsValue> {
        let (width, height) = (canvas.width(), canvas.height());
        let gpu = GpuContext::new(&canvas, width, height)
            .await
            .map_err(|e| js_error(e.to_string()))?;
        let render = RenderState::new(&gpu);
        let sim = Simulation::new(SandboxConfig::load(), width, height);

        let app = Rc::new(RefCell::new(App {
            last_time: window.performance().map(|p| p.now()).unwrap_or(0.0),
            window: window.clone(),
            canvas: canvas.clone(),
            gpu,
            render,
            sim,
            overlays: Overlays::new(),
            dev: DevPanel::default(),
            egui_ctx: egui::Context::default(),
            egui_events: Vec::new(),
            audio: Vec::new(),
        }));

        setup_input_listeners(&document, &window, &canvas, app.clone())?;

        // The model shows up whenever loading finishes; frames before that
        // run without a character.
        {
            let app = app.clone();
            wasm_bindgen_futures::spawn_local(async move {
                match assets::load_builtin(assets::CHARACTER) {
                    Ok(model) => app.borrow_mut().sim.attach_character(model),
                    Err(e) => tracing::error!("{e}"),
                }
            });
        }

        let f = RcCellCallback::new(window, move || app.borrow_mut().frame());
        f.start();

        Ok(())
    }

    /// Setup all input event listeners
    fn setup_input_listeners(
        document: &Document,
        window: &Window,
        canvas: &HtmlCanvasElement,
        app: Rc<RefCell<App>>,
    ) -> Result<(), JsValue> {
        // Keyboard down
        {
            let app = app.clone();
            let keydown = Closure::wrap(Box::new(move |e: KeyboardEvent| {
                let mut app = app.borrow_mut();
                if app.egui_ctx.wants_keyboard_input() {
                    push_egui_key(&mut app.egui_events, &e, true);
                    return;
                }
                let key = e.key();
                if matches!(
                    key.as_str(),
                    "ArrowUp" | "ArrowDown" | "ArrowLeft" | "ArrowRight" | " "
                ) {
                    e.prevent_default();
                }
                app.sim.handle_input(web_input::keyboard_event_to_input(&e, true));
            }) as Box<dyn FnMut(KeyboardEvent)>);
            document.add_event_listener_with_callback("keydown", keydown.as_ref().unchecked_ref())?;
            keydown.forget();
        }

        // Keyboard up always reaches the simulation so no key stays stuck
        {
            let app = app.clone();
            let keyup = Closure::wrap(Box::new(move |e: KeyboardEvent| {
                let mut app = app.borrow_mut();
                push_egui_key(&mut app.egui_events, &e, false);
                app.sim.handle_input(web_input::keyboard_event_to_input(&e, false));
            }) as Box<dyn FnMut(KeyboardEvent)>);
            document.add_event_listener_with_callback("keyup", keyup.as_ref().unchecked_ref())?;
            keyup.forget();
        }

        // Focus loss - clear all keys
        {
            let app = app.clone();
            let blur = Closure::wrap(Box::new(move |_e: Event| {
                app.borrow_mut().sim.handle_input(InputEvent::FocusLost);
            }) as Box<dyn FnMut(Event)>);
            window.add_event_listener_with_callback("blur", blur.as_ref().unchecked_ref())?;
            blur.forget();
        }

        // Visibility change - clear all keys
        {
            let app = app.clone();
            let doc = document.clone();
            let visibility = Closure::wrap(Box::new(move |_e: Event| {
                let visible = !doc.hidden();
                app.borrow_mut().sim.handle_input(InputEvent::VisibilityChanged { visible });
            }) as Box<dyn FnMut(Event)>);
            document.add_event_listener_with_callback("visibilitychange", visibility.as_ref().unchecked_ref())?;
            visibility.forget();
        }

        // Mouse move: orbit drag plus pointer position for egui and picking
        {
            let app = app.clone();
            let canvas_mm = canvas.clone();
            let mm = Closure::wrap(Box::new(move |e: MouseEvent| {
                let mut app = app.borrow_mut();
                let pos = app.canvas_pos(&e);
                app.egui_events.push(egui::Event::PointerMoved(pos));
                app.sim.handle_input(web_input::mouse_move_to_input(&e));
                let ndc = web_input::pointer_ndc(&e, &canvas_mm);
                app.sim.handle_input(InputEvent::PointerMoved { ndc });
            }) as Box<dyn FnMut(MouseEvent)>);
            document.add_event_listener_with_callback("mousemove", mm.as_ref().unchecked_ref())?;
            mm.forget();
        }

        // Mouse down on the canvas; the UI gets first pick
        {
            let app = app.clone();
            let mousedown = Closure::wrap(Box::new(move |e: MouseEvent| {
                let mut app = app.borrow_mut();
                let pos = app.canvas_pos(&e);
                if let Some(button) = egui_button(e.button()) {
                    app.egui_events.push(egui::Event::PointerButton {
                        pos,
                        button,
                        pressed: true,
                        modifiers: egui::Modifiers::default(),
                    });
                }
                if !app.egui_ctx.is_pointer_over_area() {
                    app.sim.handle_input(web_input::mouse_button_to_input(&e, true));
                }
                e.prevent_default();
            }) as Box<dyn FnMut(MouseEvent)>);
            canvas.add_event_listener_with_callback("mousedown", mousedown.as_ref().unchecked_ref())?;
            mousedown.forget();
        }

        // Mouse up anywhere ends a drag
        {
            let app = app.clone();
            let mouseup = Closure::wrap(Box::new(move |e: MouseEvent| {
                let mut app = app.borrow_mut();
                let pos = app.canvas_pos(&e);
                if let Some(button) = egui_button(e.button()) {
                    app.egui_events.push(egui::Event::PointerButton {
                        pos,
                        button,
                        pressed: false,
                        modifiers: egui::Modifiers::default(),
                    });
                }
                app.sim.handle_input(web_input::mouse_button_to_input(&e, false));
            }) as Box<dyn FnMut(MouseEvent)>);
            document.add_event_listener_with_callback("mouseup", mouseup.as_ref().unchecked_ref())?;
            mouseup.forget();
        }

        // Click - interaction raycast
        {
            let app = app.clone();
            let canvas_click = canvas.clone();
            let click = Closure::wrap(Box::new(move |e: MouseEvent| {
                let mut app = app.borrow_mut();
                if app.egui_ctx.is_pointer_over_area() {
                    return;
                }
                let ndc = web_input::pointer_ndc(&e, &canvas_click);
                app.sim.handle_input(InputEvent::Click { ndc });
            }) as Box<dyn FnMut(MouseEvent)>);
            canvas.add_event_listener_with_callback("click", click.as_ref().unchecked_ref())?;
            click.forget();
        }

        // Context menu prevention
        {
            let contextmenu = Closure::wrap(Box::new(move |e: MouseEvent| {
                e.prevent_default();
            }) as Box<dyn FnMut(MouseEvent)>);
            document.add_event_listener_with_callback("contextmenu", contextmenu.as_ref().unchecked_ref())?;
            contextmenu.forget();
        }

        // Window resize
        {
            let app = app.clone();
            let resize = Closure::wrap(Box::new(move |_e: Event| {
                app.borrow_mut().resize();
            }) as Box<dyn FnMut(Event)>);
            window.add_event_listener_with_callback("resize", resize.as_ref().unchecked_ref())?;
            resize.forget();
        }

        Ok(())
    }

    fn egui_button(button: i16) -> Option<egui::PointerButton> {
        match button {
            0 => Some(egui::PointerButton::Primary),
            1 => Some(egui::PointerButton::Middle),
            2 => Some(egui::PointerButton::Secondary),
            _ => None,
        }
    }

    fn push_egui_key(events: &mut Vec<egui::Event>, e: &KeyboardEvent, pressed: bool) {
        let key = e.key();
        if let Some(k) = egui::Key::from_name(&key) {
            events.push(egui::Event::Key {
                key: k,
                physical_key: None,
                pressed,
                repeat: e.repeat(),
                modifiers: egui::Modifiers::default(),
            });
        }
        if pressed && key.chars().count() == 1 {
            events.push(egui::Event::Text(key));
        }
    }

    fn window_size(window: &Window) -> (u32, u32) {
        let w = window.inner_width().ok().and_then(|v| v.as_f64()).unwrap_or(800.0);
        let h = window.inner_height().ok().and_then(|v| v.as_f64()).unwrap_or(600.0);
        (w.max(1.0) as u32, h.max(1.0) as u32)
    }

    fn init_canvas() -> Result<(Window, Document, HtmlCanvasElement), JsValue> {
        let window = web_sys::window().ok_or(js_error("no global `window`"))?;
        let document = window.document().ok_or(js_error("no document on window"))?;
        let body = document.body().ok_or(js_error("no body on document"))?;
        let canvas_el = document
            .create_element("canvas")?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| js_error("failed to create canvas"))?;
        let (width, height) = window_size(&window);
        canvas_el.set_width(width);
        canvas_el.set_height(height);
        body.append_child(&canvas_el)?;
        Ok((window, document, canvas_el))
    }

    fn js_error<E: Into<String>>(msg: E) -> JsValue {
        JsValue::from_str(&msg.into())
    }

    struct RcCellCallback {
        inner: Rc<RefCell<Box<dyn FnMut()>>>,
        window: Window,
    }

    impl RcCellCallback {
        fn new(window: Window, f: impl FnMut() + 'static) -> Self {
            Self {
                inner: Rc::new(RefCell::new(Box::new(f))),
                window,
            }
        }

        fn start(self) {
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
                if let Err(e) = self.window.request_animation_frame(cb.as_ref().unchecked_ref()) {
                    tracing::error!("requestAnimationFrame start failed: {e:?}");
                }
            }

            // Leak the closure to keep it alive
            std::mem::forget(callback);
        }
    }
}
