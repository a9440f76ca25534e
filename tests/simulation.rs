use glam::{Vec2, Vec3};

use udsandbox::config::{SandboxConfig, DEFAULT_CONFIG_TOML};
use udsandbox::controller::animation::AnimState;
use udsandbox::controller::input::{InputEvent, MouseButton};
use udsandbox::controller::interaction::Interaction;
use udsandbox::controller::mining::MiningStep;
use udsandbox::model::assets::{self, CHARACTER};
use udsandbox::model::overlay::{Severity, UiCommand};
use udsandbox::Simulation;

const FRAME_MS: f64 = 16.0;

fn sim() -> Simulation {
    let cfg = SandboxConfig::from_toml_str(DEFAULT_CONFIG_TOML).unwrap();
    Simulation::new(cfg, 800, 600)
}

fn sim_with_character() -> Simulation {
    let mut s = sim();
    s.attach_character(assets::load_builtin(CHARACTER).unwrap());
    s
}

fn key(s: &mut Simulation, k: &str, down: bool) {
    let k = k.to_string();
    s.handle_input(if down { InputEvent::KeyDown(k) } else { InputEvent::KeyUp(k) });
}

fn cube_ndc(s: &Simulation) -> Vec2 {
    let world = s.scene.world_matrix(s.cube().node).w_axis.truncate();
    s.camera.project(world)
}

fn assert_consistent(s: &Simulation) {
    let st = s.character_state();
    assert_eq!(st.airborne, !st.grounded);
    assert!(st.position.y >= 0.5);
    if st.grounded {
        assert_eq!(st.vertical_velocity, 0.0);
        assert_eq!(st.position.y, 0.5);
    }
}

#[test]
fn jump_rises_then_lands_at_ground_contact() {
    let mut s = sim_with_character();
    s.frame(FRAME_MS);
    assert_eq!(s.animation_state(), Some(AnimState::Idle));

    key(&mut s, " ", true);
    s.frame(FRAME_MS);
    let st = *s.character_state();
    assert!(st.airborne);
    assert!((st.vertical_velocity - 0.28).abs() < 1e-6);
    assert!(st.position.y > 0.5);
    assert_eq!(s.animation_state(), Some(AnimState::Jump));
    key(&mut s, " ", false);

    let mut peak = st.position.y;
    let mut landed_after = None;
    for i in 0..120 {
        s.frame(FRAME_MS);
        assert_consistent(&s);
        peak = peak.max(s.character_state().position.y);
        if landed_after.is_none() && s.character_state().grounded {
            landed_after = Some(i);
            assert_eq!(s.animation_state(), Some(AnimState::Idle));
        }
    }
    assert!(landed_after.is_some());
    assert!(peak > 2.0, "peak {peak}");
    assert_eq!(s.character_state().position.y, 0.5);
}

#[test]
fn jump_pressed_again_while_airborne_is_ignored() {
    let mut s = sim_with_character();
    key(&mut s, " ", true);
    s.frame(FRAME_MS);
    key(&mut s, " ", false);
    key(&mut s, " ", true);
    s.frame(FRAME_MS);
    let st = s.character_state();
    assert!(st.airborne);
    // a second impulse would have reset the velocity to 0.28
    assert!((st.vertical_velocity - 0.26).abs() < 1e-6);
    key(&mut s, " ", false);

    for _ in 0..120 {
        s.frame(FRAME_MS);
    }
    assert!(s.character_state().grounded);
}

#[test]
fn forward_and_backward_together_walk_backward() {
    let mut s = sim_with_character();
    key(&mut s, "w", true);
    key(&mut s, "s", true);
    for _ in 0..10 {
        s.frame(FRAME_MS);
    }
    // camera sits behind the character looking +z
    assert!(s.character_state().position.z < -0.2);
    assert_eq!(s.animation_state(), Some(AnimState::WalkBackward));
}

#[test]
fn orbit_drag_turns_character_and_camera_together() {
    let mut s = sim_with_character();
    s.handle_input(InputEvent::MouseDown { button: MouseButton::Right });
    s.handle_input(InputEvent::MouseMove { dx: 100.0, dy: 0.0 });
    s.frame(FRAME_MS);
    let heading = s.character_state().heading;
    assert!((heading - 0.5).abs() < 1e-5);

    let target = s.character_state().position;
    let planar = Vec3::new(s.camera.eye.x - target.x, 0.0, s.camera.eye.z - target.z).length();
    assert!((planar - 10.0).abs() < 1e-4);
}

#[test]
fn orbit_and_walk_in_one_frame_moves_along_the_new_heading() {
    let mut s = sim_with_character();
    s.frame(FRAME_MS);
    let start = s.character_state().position;

    key(&mut s, "w", true);
    s.handle_input(InputEvent::MouseDown { button: MouseButton::Right });
    s.handle_input(InputEvent::MouseMove { dx: 100.0, dy: 0.0 });
    s.frame(FRAME_MS);

    let moved = s.character_state().position - start;
    let expected = Vec3::new(0.5f32.sin(), 0.0, 0.5f32.cos());
    assert!(moved.x > 0.0, "moved {moved}");
    assert!(moved.normalize().dot(expected) > 0.999, "moved {moved}");
}

#[test]
fn drag_before_the_model_arrives_is_applied_after_attach() {
    let mut s = sim();
    s.handle_input(InputEvent::MouseDown { button: MouseButton::Right });
    s.handle_input(InputEvent::MouseMove { dx: 100.0, dy: 0.0 });
    s.frame(FRAME_MS);
    s.frame(FRAME_MS);
    assert_eq!(s.character_state().heading, 0.0);

    s.attach_character(assets::load_builtin(CHARACTER).unwrap());
    s.frame(FRAME_MS);
    assert!((s.character_state().heading - 0.5).abs() < 1e-5);
}

#[test]
fn missing_jump_clip_leaves_the_character_unanimated_but_jumping() {
    let mut cfg = SandboxConfig::from_toml_str(DEFAULT_CONFIG_TOML).unwrap();
    cfg.animation.jump.name = "Backflip".into();
    let mut s = Simulation::new(cfg, 800, 600);
    s.attach_character(assets::load_builtin(CHARACTER).unwrap());
    assert!(s.character_node().is_some());

    key(&mut s, " ", true);
    s.frame(FRAME_MS);
    key(&mut s, " ", false);
    assert_eq!(s.animation_state(), None);
    assert!(s.character_state().airborne);
    assert!(s.character_state().position.y > 0.5);

    for _ in 0..120 {
        s.frame(FRAME_MS);
        assert_consistent(&s);
    }
    assert!(s.character_state().grounded);
    assert_eq!(s.character_state().position.y, 0.5);
    assert_eq!(s.animation_state(), None);
}

#[test]
fn without_a_model_the_controller_does_not_run() {
    let mut s = sim();
    key(&mut s, "w", true);
    key(&mut s, " ", true);
    for _ in 0..10 {
        s.frame(FRAME_MS);
    }
    let st = s.character_state();
    assert_eq!(st.position, Vec3::new(0.0, 0.5, 0.0));
    assert!(st.grounded);
    assert_eq!(s.animation_state(), None);
    assert!(s.character_node().is_none());
}

#[test]
fn prop_nodes_follow_their_bodies_every_frame() {
    let mut s = sim();
    for _ in 0..90 {
        s.frame(FRAME_MS);
        for prop in s.props() {
            let body = prop.body.unwrap();
            let t = s.physics.transform(body).unwrap();
            let local = s.scene.node(prop.node).local;
            assert_eq!(local.translation, t.position);
            assert_eq!(local.rotation, t.rotation);
        }
    }
    // the crate has settled on the ground
    let y = s.physics.position(s.cube().body.unwrap()).unwrap().y;
    assert!((y - 0.5).abs() < 0.05, "y {y}");
}

#[test]
fn clicking_the_cube_starts_mining_once_per_click() {
    let mut s = sim();
    let ndc = cube_ndc(&s);

    assert_eq!(s.click(ndc), Some(Interaction::Mine));
    let cmds = s.drain_ui_commands();
    let progress = cmds.iter().filter(|c| matches!(c, UiCommand::ShowProgress { .. })).count();
    assert_eq!(progress, 1);
    assert!(cmds.contains(&UiCommand::RefreshInventory));
    assert_eq!(s.inventory().quantity_of(1), 1);
    assert_eq!(s.mining_step(), MiningStep::Progress);

    s.handle_input(InputEvent::Click { ndc });
    let progress = s
        .drain_ui_commands()
        .iter()
        .filter(|c| matches!(c, UiCommand::ShowProgress { .. }))
        .count();
    assert_eq!(progress, 1);
    assert_eq!(s.inventory().quantity_of(1), 2);
}

#[test]
fn clicking_empty_space_does_nothing() {
    let mut s = sim();
    assert_eq!(s.click(Vec2::new(0.0, 0.95)), None);
    // the ground is hit but has no interaction
    assert_eq!(s.click(Vec2::new(0.0, -0.95)), None);
    assert!(s.drain_ui_commands().is_empty());
    assert_eq!(s.mining_step(), MiningStep::Idle);
    assert!(s.inventory().stacks().is_empty());
}

#[test]
fn mining_removes_then_respawns_the_cube() {
    let mut s = sim();
    let ndc = cube_ndc(&s);
    s.click(ndc);
    s.drain_ui_commands();

    let node = s.cube().node;
    let mut frames = 0;
    while s.mining_step() == MiningStep::Progress {
        s.frame(FRAME_MS);
        frames += 1;
        assert!(frames < 1000);
    }
    assert!(s.clock_ms() >= 3000.0);
    assert!(!s.scene.in_scene(node));
    assert!(s.cube().body.is_none());
    assert_eq!(s.physics.body_count(), 2);
    // a click on the empty spot finds nothing to mine
    assert_eq!(s.click(ndc), None);

    let cmds = s.drain_ui_commands();
    assert!(cmds.iter().any(|c| matches!(c, UiCommand::Notify { severity: Severity::Success, .. })));
    assert!(cmds.iter().any(|c| matches!(c, UiCommand::PlaySound { .. })));

    while s.mining_step() == MiningStep::Removed {
        s.frame(FRAME_MS);
        frames += 1;
        assert!(frames < 1000);
    }
    assert!(s.clock_ms() >= 5000.0);
    assert!(s.scene.in_scene(node));
    let respawn = Vec3::new(2.0, 1.0, 0.0);
    assert_eq!(s.scene.node(node).local.translation, respawn);
    assert_eq!(s.physics.position(s.cube().body.unwrap()), Some(respawn));
    assert_eq!(s.physics.body_count(), 3);
    assert!(s.drain_ui_commands().contains(&UiCommand::RefreshInventory));
    assert_eq!(s.inventory().quantity_of(1), 1);
}
