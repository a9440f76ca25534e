/// Platform-agnostic input handling system
use std::collections::HashSet;

use glam::Vec2;
use serde::Deserialize;

/// Platform-independent input events
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    // Keyboard events
    KeyDown(String),
    KeyUp(String),

    // Mouse events
    MouseDown { button: MouseButton },
    MouseUp { button: MouseButton },
    /// Relative pointer movement in pixels.
    MouseMove { dx: f32, dy: f32 },
    /// Absolute pointer position in normalized device coordinates.
    PointerMoved { ndc: Vec2 },
    Click { ndc: Vec2 },

    // Window events
    FocusLost,
    VisibilityChanged { visible: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other,
}

impl MouseButton {
    pub fn from_web_button(button: i16) -> Self {
        match button {
            0 => MouseButton::Left,
            1 => MouseButton::Middle,
            2 => MouseButton::Right,
            _ => MouseButton::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Forward,
    Backward,
    StrafeLeft,
    StrafeRight,
    Jump,
}

/// Key mapping configuration. Keys are the lower-cased `KeyboardEvent.key`
/// values (`" "` is the space bar).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub forward: Vec<String>,
    pub backward: Vec<String>,
    pub strafe_left: Vec<String>,
    pub strafe_right: Vec<String>,
    pub jump: Vec<String>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        let keys = |ks: &[&str]| ks.iter().map(|k| k.to_string()).collect::<Vec<_>>();
        Self {
            forward: keys(&["w", "arrowup"]),
            backward: keys(&["s", "arrowdown"]),
            strafe_left: keys(&["a", "arrowleft"]),
            strafe_right: keys(&["d", "arrowright"]),
            jump: keys(&[" "]),
        }
    }
}

impl KeyBindings {
    pub fn keys(&self, action: Action) -> &[String] {
        match action {
            Action::Forward => &self.forward,
            Action::Backward => &self.backward,
            Action::StrafeLeft => &self.strafe_left,
            Action::StrafeRight => &self.strafe_right,
            Action::Jump => &self.jump,
        }
    }

    pub fn action_for(&self, key: &str) -> Option<Action> {
        [
            Action::Forward,
            Action::Backward,
            Action::StrafeLeft,
            Action::StrafeRight,
            Action::Jump,
        ]
        .into_iter()
        .find(|a| self.keys(*a).iter().any(|k| k.eq_ignore_ascii_case(key)))
    }
}

pub fn normalize_key(key: &str) -> String {
    key.to_lowercase()
}

/// Held keys, the jump edge and the orbit drag, fed by raw events and read
/// by the character controller once per frame.
pub struct InputState {
    bindings: KeyBindings,
    pressed_keys: HashSet<String>,
    jump_edge: bool,
    orbiting: bool,
    orbit_dx: f32,
    pub pointer_ndc: Vec2,
}

impl InputState {
    pub fn new(bindings: KeyBindings) -> Self {
        Self {
            bindings,
            pressed_keys: HashSet::new(),
            jump_edge: false,
            orbiting: false,
            orbit_dx: 0.0,
            pointer_ndc: Vec2::ZERO,
        }
    }

    /// Process an input event and update state
    pub fn process_event(&mut self, event: &InputEvent) {
        match event {
            InputEvent::KeyDown(key) => {
                let key = normalize_key(key);
                let fresh = self.pressed_keys.insert(key.clone());
                // auto-repeat keydowns arrive with the key already held
                if fresh && self.bindings.action_for(&key) == Some(Action::Jump) {
                    self.jump_edge = true;
                }
            }
            InputEvent::KeyUp(key) => {
                self.pressed_keys.remove(&normalize_key(key));
            }
            InputEvent::MouseDown { button: MouseButton::Right } => {
                self.orbiting = true;
                self.orbit_dx = 0.0;
            }
            InputEvent::MouseUp { button: MouseButton::Right } => {
                self.end_orbit();
            }
            InputEvent::MouseMove { dx, .. } => {
                if self.orbiting && dx.is_finite() {
                    self.orbit_dx += dx;
                }
            }
            InputEvent::PointerMoved { ndc } | InputEvent::Click { ndc } => {
                if ndc.is_finite() {
                    self.pointer_ndc = *ndc;
                }
            }
            InputEvent::FocusLost | InputEvent::VisibilityChanged { .. } => {
                self.clear_keys();
                self.end_orbit();
            }
            _ => {}
        }
    }

    pub fn is_key_pressed(&self, key: &str) -> bool {
        self.pressed_keys.contains(&normalize_key(key))
    }

    pub fn is_held(&self, action: Action) -> bool {
        self.bindings
            .keys(action)
            .iter()
            .any(|k| self.pressed_keys.contains(&normalize_key(k)))
    }

    /// True at most once per physical press of a jump key.
    pub fn consume_jump_edge(&mut self) -> bool {
        std::mem::take(&mut self.jump_edge)
    }

    /// Horizontal drag since the last poll; zero unless orbiting.
    pub fn poll_orbit_delta(&mut self) -> f32 {
        if !self.orbiting {
            return 0.0;
        }
        std::mem::take(&mut self.orbit_dx)
    }

    pub fn is_orbiting(&self) -> bool {
        self.orbiting
    }

    pub fn clear_keys(&mut self) {
        self.pressed_keys.clear();
    }

    fn end_orbit(&mut self) {
        self.orbiting = false;
        self.orbit_dx = 0.0;
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self::new(KeyBindings::default())
    }
}

pub mod wasm {
    use super::*;
    use web_sys::{HtmlCanvasElement, KeyboardEvent, MouseEvent};

    pub fn keyboard_event_to_input(e: &KeyboardEvent, is_down: bool) -> InputEvent {
        let key = e.key();
        if is_down {
            InputEvent::KeyDown(key)
        } else {
            InputEvent::KeyUp(key)
        }
    }

    pub fn mouse_move_to_input(e: &MouseEvent) -> InputEvent {
        InputEvent::MouseMove {
            dx: e.movement_x() as f32,
            dy: e.movement_y() as f32,
        }
    }

    pub fn mouse_button_to_input(e: &MouseEvent, is_down: bool) -> InputEvent {
        let button = MouseButton::from_web_button(e.button());
        if is_down {
            InputEvent::MouseDown { button }
        } else {
            InputEvent::MouseUp { button }
        }
    }

    /// Pointer position relative to the canvas, in normalized device
    /// coordinates (y up).
    pub fn pointer_ndc(e: &MouseEvent, canvas: &HtmlCanvasElement) -> Vec2 {
        let rect = canvas.get_bounding_client_rect();
        let w = rect.width().max(1.0);
        let h = rect.height().max(1.0);
        let x = (e.client_x() as f64 - rect.left()) / w;
        let y = (e.client_y() as f64 - rect.top()) / h;
        Vec2::new((x * 2.0 - 1.0) as f32, (1.0 - y * 2.0) as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_down(k: &str) -> InputEvent {
        InputEvent::KeyDown(k.to_string())
    }

    fn key_up(k: &str) -> InputEvent {
        InputEvent::KeyUp(k.to_string())
    }

    #[test]
    fn held_actions_are_case_insensitive() {
        let mut input = InputState::default();
        input.process_event(&key_down("W"));
        assert!(input.is_held(Action::Forward));
        input.process_event(&key_up("w"));
        assert!(!input.is_held(Action::Forward));

        input.process_event(&key_down("ArrowDown"));
        assert!(input.is_held(Action::Backward));
    }

    #[test]
    fn jump_edge_fires_once_per_press() {
        let mut input = InputState::default();
        input.process_event(&key_down(" "));
        input.process_event(&key_down(" ")); // auto-repeat
        assert!(input.consume_jump_edge());
        assert!(!input.consume_jump_edge());

        input.process_event(&key_down(" "));
        assert!(!input.consume_jump_edge());

        input.process_event(&key_up(" "));
        input.process_event(&key_down(" "));
        assert!(input.consume_jump_edge());
    }

    #[test]
    fn tap_between_frames_is_not_lost() {
        let mut input = InputState::default();
        input.process_event(&key_down(" "));
        input.process_event(&key_up(" "));
        assert!(input.consume_jump_edge());
    }

    #[test]
    fn orbit_delta_only_while_right_button_held() {
        let mut input = InputState::default();
        input.process_event(&InputEvent::MouseMove { dx: 10.0, dy: 0.0 });
        assert_eq!(input.poll_orbit_delta(), 0.0);

        input.process_event(&InputEvent::MouseDown { button: MouseButton::Right });
        input.process_event(&InputEvent::MouseMove { dx: 10.0, dy: 3.0 });
        input.process_event(&InputEvent::MouseMove { dx: -4.0, dy: 3.0 });
        assert_eq!(input.poll_orbit_delta(), 6.0);
        assert_eq!(input.poll_orbit_delta(), 0.0);

        input.process_event(&InputEvent::MouseMove { dx: 5.0, dy: 0.0 });
        input.process_event(&InputEvent::MouseUp { button: MouseButton::Right });
        assert_eq!(input.poll_orbit_delta(), 0.0);
    }

    #[test]
    fn left_button_does_not_orbit() {
        let mut input = InputState::default();
        input.process_event(&InputEvent::MouseDown { button: MouseButton::Left });
        input.process_event(&InputEvent::MouseMove { dx: 10.0, dy: 0.0 });
        assert!(!input.is_orbiting());
        assert_eq!(input.poll_orbit_delta(), 0.0);
    }

    #[test]
    fn focus_loss_releases_everything() {
        let mut input = InputState::default();
        input.process_event(&key_down("w"));
        input.process_event(&InputEvent::MouseDown { button: MouseButton::Right });
        input.process_event(&InputEvent::FocusLost);
        assert!(!input.is_held(Action::Forward));
        assert!(!input.is_orbiting());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let mut input = InputState::default();
        input.process_event(&key_down("F13"));
        assert!(input.is_key_pressed("f13"));
        assert!(!input.consume_jump_edge());
        assert_eq!(input_bindings_action("F13"), None);
    }

    fn input_bindings_action(key: &str) -> Option<Action> {
        KeyBindings::default().action_for(key)
    }
}
