use glam::Vec3;

use crate::config::CharacterConfig;
use crate::controller::animation::LocomotionFrame;
use crate::controller::input::{Action, InputState};
use crate::model::camera::Camera;
use crate::model::physics::{BodyHandle, PhysicsWorld};

/// Slack when comparing the body height against the ground threshold; the
/// engine hands positions back with float noise.
pub const GROUND_EPSILON: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharacterState {
    pub position: Vec3,
    /// Yaw in radians; 0 faces +z.
    pub heading: f32,
    pub vertical_velocity: f32,
    pub grounded: bool,
    pub airborne: bool,
}

/// Kinematic third-person movement. Planar motion follows the camera,
/// vertical motion is integrated here with a per-step gravity instead of
/// the engine's, and the result is written straight onto the body.
pub struct CharacterController {
    move_speed: f32,
    jump_impulse: f32,
    gravity_per_step: f32,
    ground_contact: f32,
    state: CharacterState,
}

impl CharacterController {
    pub fn new(cfg: &CharacterConfig) -> Self {
        let mut position = Vec3::from_array(cfg.spawn);
        position.y = position.y.max(cfg.ground_contact);
        let airborne = position.y > cfg.ground_contact + GROUND_EPSILON;
        Self {
            move_speed: cfg.move_speed,
            jump_impulse: cfg.jump_impulse,
            gravity_per_step: cfg.gravity_per_step,
            ground_contact: cfg.ground_contact,
            state: CharacterState {
                position,
                heading: 0.0,
                vertical_velocity: 0.0,
                grounded: !airborne,
                airborne,
            },
        }
    }

    pub fn state(&self) -> &CharacterState {
        &self.state
    }

    pub fn ground_contact(&self) -> f32 {
        self.ground_contact
    }

    pub fn heading(&self) -> f32 {
        self.state.heading
    }

    pub fn rotate(&mut self, delta: f32) {
        self.state.heading = (self.state.heading + delta).rem_euclid(std::f32::consts::TAU);
    }

    /// Direction the character faces when the camera gives no usable
    /// horizontal direction.
    pub fn facing(&self) -> Vec3 {
        let h = self.state.heading;
        Vec3::new(h.sin(), 0.0, h.cos())
    }

    /// Planar displacement for the held keys. Backward beats forward and
    /// strafe-right beats strafe-left; opposing keys never sum.
    pub fn planar_move(&self, input: &InputState, camera: &Camera) -> Vec3 {
        let forward = camera.planar_forward().unwrap_or_else(|| self.facing());
        let right = forward.cross(Vec3::Y).normalize_or_zero();

        let along = if input.is_held(Action::Backward) {
            -1.0
        } else if input.is_held(Action::Forward) {
            1.0
        } else {
            0.0
        };
        let side = if input.is_held(Action::StrafeRight) {
            1.0
        } else if input.is_held(Action::StrafeLeft) {
            -1.0
        } else {
            0.0
        };

        (forward * along + right * side) * self.move_speed
    }

    pub fn step(
        &mut self,
        input: &mut InputState,
        camera: &Camera,
        physics: &mut PhysicsWorld,
        body: BodyHandle,
    ) -> LocomotionFrame {
        let mut pos = physics.position(body).unwrap_or(self.state.position);
        pos += self.planar_move(input, camera);

        let mut jumped = false;
        let mut landed = false;

        // edges that arrive while airborne are swallowed
        if input.consume_jump_edge()
            && !self.state.airborne
            && pos.y <= self.ground_contact + GROUND_EPSILON
        {
            self.state.airborne = true;
            self.state.vertical_velocity = self.jump_impulse;
            jumped = true;
        }

        if self.state.airborne {
            self.state.vertical_velocity += self.gravity_per_step;
            pos.y += self.state.vertical_velocity;
            if pos.y <= self.ground_contact {
                pos.y = self.ground_contact;
                self.state.vertical_velocity = 0.0;
                self.state.airborne = false;
                landed = true;
            }
        } else {
            pos.y = self.ground_contact;
            self.state.vertical_velocity = 0.0;
        }
        self.state.grounded = !self.state.airborne;

        physics.set_translation(body, pos);
        self.state.position = pos;

        if jumped {
            tracing::debug!(?pos, "jump");
        }

        LocomotionFrame {
            airborne: self.state.airborne,
            forward: input.is_held(Action::Forward),
            backward: input.is_held(Action::Backward),
            strafing: input.is_held(Action::StrafeLeft) || input.is_held(Action::StrafeRight),
            jumped,
            landed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CameraConfig;
    use crate::controller::input::InputEvent;
    use crate::model::physics::BodyDesc;

    struct Rig {
        controller: CharacterController,
        input: InputState,
        camera: Camera,
        physics: PhysicsWorld,
        body: BodyHandle,
    }

    fn rig() -> Rig {
        let cfg = CharacterConfig::default();
        let mut physics = PhysicsWorld::new(Vec3::new(0.0, -9.82, 0.0));
        physics.add_body(&BodyDesc::ground());
        let body = physics.add_body(&BodyDesc::character(Vec3::from_array(cfg.spawn), cfg.radius));
        let mut camera = Camera::new(800, 600, &CameraConfig::default());
        // behind the character, looking toward +z
        camera.eye = Vec3::new(0.0, 5.5, -10.0);
        camera.look_at(Vec3::new(0.0, 0.5, 0.0));
        Rig {
            controller: CharacterController::new(&cfg),
            input: InputState::default(),
            camera,
            physics,
            body,
        }
    }

    impl Rig {
        fn press(&mut self, key: &str) {
            self.input.process_event(&InputEvent::KeyDown(key.to_string()));
        }

        fn release(&mut self, key: &str) {
            self.input.process_event(&InputEvent::KeyUp(key.to_string()));
        }

        fn step(&mut self) -> LocomotionFrame {
            self.physics.step(1.0 / 60.0);
            self.controller
                .step(&mut self.input, &self.camera, &mut self.physics, self.body)
        }
    }

    #[test]
    fn forward_follows_camera_direction() {
        let mut r = rig();
        r.press("w");
        r.step();
        let p = r.controller.state().position;
        assert!((p.z - 0.03).abs() < 1e-4, "{p:?}");
        assert!(p.x.abs() < 1e-4);
    }

    #[test]
    fn backward_wins_over_forward() {
        let mut r = rig();
        r.press("w");
        r.press("s");
        let frame = r.step();
        assert!(r.controller.state().position.z < 0.0);
        assert!(frame.forward && frame.backward);
    }

    #[test]
    fn strafe_right_wins_and_moves_screen_right() {
        let mut r = rig();
        r.press("a");
        r.press("d");
        r.step();
        // looking down +z, screen right is -x
        assert!(r.controller.state().position.x < 0.0);
    }

    #[test]
    fn jump_rises_then_lands_on_threshold() {
        let mut r = rig();
        r.press(" ");
        let first = r.step();
        assert!(first.jumped && first.airborne);
        assert!((r.controller.state().vertical_velocity - 0.28).abs() < 1e-6);

        let mut peak: f32 = 0.0;
        let mut landed_at = None;
        for i in 0..100 {
            let f = r.step();
            let s = r.controller.state();
            assert!(s.position.y >= 0.5);
            assert_ne!(s.airborne, s.grounded);
            peak = peak.max(s.position.y);
            if f.landed {
                landed_at = Some(i);
                assert_eq!(s.position.y, 0.5);
                assert_eq!(s.vertical_velocity, 0.0);
                break;
            }
        }
        assert!(landed_at.is_some());
        assert!(peak > 2.0);
    }

    #[test]
    fn repeated_jump_while_airborne_is_ignored() {
        let mut r = rig();
        r.press(" ");
        r.step();
        let v = r.controller.state().vertical_velocity;
        r.release(" ");
        r.press(" ");
        r.step();
        assert!((r.controller.state().vertical_velocity - (v - 0.02)).abs() < 1e-6);
        // the edge was consumed in the air, so nothing is pending on landing
        assert!(!r.input.consume_jump_edge());
    }

    #[test]
    fn grounded_height_is_exact() {
        let mut r = rig();
        for _ in 0..30 {
            r.step();
            assert_eq!(r.controller.state().position.y, 0.5);
            assert!(r.controller.state().grounded);
        }
    }
}
