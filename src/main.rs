use std::sync::Arc;

use glam::Vec2;
use winit::{
    event::*,
    event_loop::EventLoop,
    keyboard::{Key, NamedKey},
    window::Window,
};

// Import from the library crate
use udsandbox::{
    config::SandboxConfig,
    controller::input::{InputEvent, MouseButton as SandboxButton},
    logging,
    model::{assets, overlay::Overlays},
    ui::{self, DevPanel},
    view::{render::EguiFrame, GpuContext, RenderState},
    Simulation,
};

// frames longer than this are treated as a pause
const MAX_FRAME_MS: f64 = 250.0;

struct App {
    window: Arc<Window>,
    gpu: GpuContext,
    render: RenderState,

    // egui
    egui_state: egui_winit::State,
    egui_ctx: egui::Context,

    sim: Simulation,
    overlays: Overlays,
    dev: DevPanel,

    // Input handling
    last_mouse_pos: Option<(f64, f64)>,
    pointer_ndc: Vec2,

    // Frame timing
    last_frame_time: std::time::Instant,
}

/// Maps a winit key to the `KeyboardEvent.key` spelling the bindings use.
fn key_name(key: &Key) -> Option<String> {
    match key {
        Key::Character(s) => Some(s.to_string()),
        Key::Named(NamedKey::Space) => Some(" ".into()),
        Key::Named(NamedKey::ArrowUp) => Some("ArrowUp".into()),
        Key::Named(NamedKey::ArrowDown) => Some("ArrowDown".into()),
        Key::Named(NamedKey::ArrowLeft) => Some("ArrowLeft".into()),
        Key::Named(NamedKey::ArrowRight) => Some("ArrowRight".into()),
        Key::Named(NamedKey::Shift) => Some("Shift".into()),
        Key::Named(NamedKey::Escape) => Some("Escape".into()),
        _ => None,
    }
}

fn sandbox_button(button: MouseButton) -> SandboxButton {
    match button {
        MouseButton::Left => SandboxButton::Left,
        MouseButton::Right => SandboxButton::Right,
        MouseButton::Middle => SandboxButton::Middle,
        _ => SandboxButton::Other,
    }
}

impl App {
    async fn new(window: Arc<Window>) -> udsandbox::Result<Self> {
        let size = window.inner_size();
        let gpu = GpuContext::new_native(window.clone(), size.width, size.height).await?;
        let render = RenderState::new(&gpu);

        // Initialize egui
        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            None,
            None,
            None,
        );

        let mut sim = Simulation::new(SandboxConfig::load(), size.width, size.height);
        match assets::load_builtin(assets::CHARACTER) {
            Ok(model) => sim.attach_character(model),
            Err(e) => tracing::error!("{e}"),
        }

        Ok(Self {
            window,
            gpu,
            render,
            egui_state,
            egui_ctx,
            sim,
            overlays: Overlays::new(),
            dev: DevPanel::default(),
            last_mouse_pos: None,
            pointer_ndc: Vec2::ZERO,
            last_frame_time: std::time::Instant::now(),
        })
    }

    fn input(&mut self, event: &WindowEvent) -> bool {
        // First let egui process the event
        let egui_captured = self.egui_state.on_window_event(self.window.as_ref(), event).consumed;

        match event {
            WindowEvent::KeyboardInput { event: KeyEvent { state, logical_key, .. }, .. } => {
                let Some(key) = key_name(logical_key) else { return egui_captured };
                match state {
                    ElementState::Pressed if !egui_captured => {
                        self.sim.handle_input(InputEvent::KeyDown(key));
                    }
                    // releases always go through so nothing stays held
                    ElementState::Released => self.sim.handle_input(InputEvent::KeyUp(key)),
                    _ => {}
                }
                true
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if egui_captured && *state == ElementState::Pressed {
                    return true;
                }
                let button = sandbox_button(*button);
                match state {
                    ElementState::Pressed => {
                        self.sim.handle_input(InputEvent::MouseDown { button });
                        if button == SandboxButton::Left {
                            self.sim.handle_input(InputEvent::Click { ndc: self.pointer_ndc });
                        }
                    }
                    ElementState::Released => self.sim.handle_input(InputEvent::MouseUp { button }),
                }
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let Some((lx, ly)) = self.last_mouse_pos {
                    self.sim.handle_input(InputEvent::MouseMove {
                        dx: (position.x - lx) as f32,
                        dy: (position.y - ly) as f32,
                    });
                }
                self.last_mouse_pos = Some((position.x, position.y));

                let size = self.window.inner_size();
                let w = size.width.max(1) as f64;
                let h = size.height.max(1) as f64;
                self.pointer_ndc = Vec2::new(
                    (position.x / w * 2.0 - 1.0) as f32,
                    (1.0 - position.y / h * 2.0) as f32,
                );
                self.sim.handle_input(InputEvent::PointerMoved { ndc: self.pointer_ndc });
                true
            }
            WindowEvent::Focused(false) => {
                self.sim.handle_input(InputEvent::FocusLost);
                false
            }
            WindowEvent::Occluded(occluded) => {
                self.sim.handle_input(InputEvent::VisibilityChanged { visible: !occluded });
                false
            }
            _ => egui_captured,
        }
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.gpu.resize(new_size.width, new_size.height);
            self.render.resize(self.gpu.device.as_ref(), new_size.width, new_size.height);
            self.sim.resize(new_size.width, new_size.height);
        }
    }

    fn update(&mut self, elapsed_ms: f64) {
        self.sim.frame(elapsed_ms);
        ui::pump_overlays(&mut self.sim, &mut self.overlays, elapsed_ms);
    }

    fn render(&mut self, elapsed_ms: f64) -> udsandbox::Result<()> {
        let raw_input = self.egui_state.take_egui_input(&self.window);
        let output = ui::build_ui(
            &self.egui_ctx,
            raw_input,
            &mut self.sim,
            &mut self.overlays,
            &mut self.dev,
            (elapsed_ms / 1000.0) as f32,
        );
        self.egui_state.handle_platform_output(&self.window, output.platform_output);

        let primitives = self.egui_ctx.tessellate(output.shapes, output.pixels_per_point);
        let egui_frame = EguiFrame {
            primitives,
            textures_delta: output.textures_delta,
            pixels_per_point: output.pixels_per_point,
        };
        self.render.draw_frame(&self.gpu, &self.sim.scene, &self.sim.camera, Some(egui_frame))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let event_loop = EventLoop::new()?;
    let window_attributes = Window::default_attributes()
        .with_title("UD Sandbox")
        .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));
    let window = Arc::new(event_loop.create_window(window_attributes)?);

    let mut app = pollster::block_on(App::new(window.clone()))?;

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { ref event, window_id } if window_id == app.window.id() => {
            if !app.input(event) {
                match event {
                    WindowEvent::CloseRequested => elwt.exit(),
                    WindowEvent::Resized(physical_size) => app.resize(*physical_size),
                    WindowEvent::RedrawRequested => {
                        let now = std::time::Instant::now();
                        let elapsed_ms = ((now - app.last_frame_time).as_secs_f64() * 1000.0).min(MAX_FRAME_MS);
                        app.last_frame_time = now;

                        app.update(elapsed_ms);
                        if let Err(e) = app.render(elapsed_ms) {
                            tracing::error!("{e}");
                        }
                    }
                    _ => {}
                }
            }
        }
        Event::AboutToWait => app.window.request_redraw(),
        _ => {}
    })?;

    Ok(())
}
