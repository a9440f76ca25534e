//! Built-in models.
//!
//! Models are assembled from primitive shapes in code and ship with
//! procedural animation clips: each clip is a set of channels that move a
//! named node of the model over one loop of the clip.

use std::f32::consts::TAU;

use glam::{Quat, Vec3};

use crate::error::{Result, SandboxError};
use crate::model::scene::{NodeDesc, Shape, Transform};

pub const CHARACTER: &str = "character";
pub const HELICOPTER: &str = "helicopter";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Motion {
    /// Full turns about `axis` per loop.
    Spin { axis: Vec3, turns: f32 },
    /// Sinusoidal translation.
    Bob { amplitude: Vec3, cycles: f32, phase: f32 },
    /// Sinusoidal rotation of `amplitude` radians about `axis`.
    Tilt { axis: Vec3, amplitude: f32, cycles: f32, phase: f32 },
}

impl Motion {
    /// Pose offset at normalized loop position `u` in [0, 1).
    pub fn sample(&self, u: f32) -> Transform {
        match *self {
            Motion::Spin { axis, turns } => {
                Transform::IDENTITY.with_rotation(Quat::from_axis_angle(axis, TAU * turns * u))
            }
            Motion::Bob { amplitude, cycles, phase } => {
                Transform::from_translation(amplitude * (TAU * (cycles * u + phase)).sin())
            }
            Motion::Tilt { axis, amplitude, cycles, phase } => Transform::IDENTITY.with_rotation(
                Quat::from_axis_angle(axis, amplitude * (TAU * (cycles * u + phase)).sin()),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub node: String,
    pub motion: Motion,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    /// Loop length in seconds.
    pub duration: f32,
    pub channels: Vec<Channel>,
}

impl AnimationClip {
    fn new(name: &str, duration: f32) -> Self {
        Self { name: name.to_string(), duration, channels: Vec::new() }
    }

    fn channel(mut self, node: &str, motion: Motion) -> Self {
        self.channels.push(Channel { node: node.to_string(), motion });
        self
    }
}

#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub name: String,
    pub root: NodeDesc,
    pub clips: Vec<AnimationClip>,
}

pub fn load_builtin(name: &str) -> Result<LoadedModel> {
    let model = match name {
        CHARACTER => character(),
        HELICOPTER => helicopter(),
        other => return Err(SandboxError::UnknownAsset(other.to_string())),
    };
    tracing::info!(model = name, clips = model.clips.len(), "model loaded");
    Ok(model)
}

fn part(name: &str, half: Vec3, at: Vec3, color: [f32; 4]) -> NodeDesc {
    NodeDesc::new(name, Shape::Box { half_extents: half })
        .color(color)
        .at(Transform::from_translation(at))
}

/// Limbs hang from a pivot group so tilting the pivot swings the limb.
fn limb(name: &str, pivot: Vec3, half: Vec3, color: [f32; 4]) -> NodeDesc {
    NodeDesc::group(name)
        .at(Transform::from_translation(pivot))
        .child(part(&format!("{name}Mesh"), half, Vec3::new(0.0, -half.y, 0.0), color))
}

// Origin at the center of the 0.5 radius collision sphere.
fn character() -> LoadedModel {
    const SKIN: [f32; 4] = [0.93, 0.76, 0.62, 1.0];
    const SHIRT: [f32; 4] = [0.2, 0.45, 0.8, 1.0];
    const PANTS: [f32; 4] = [0.25, 0.25, 0.3, 1.0];

    let torso = NodeDesc::group("Torso")
        .child(part("Chest", Vec3::new(0.2, 0.22, 0.12), Vec3::new(0.0, 0.12, 0.0), SHIRT))
        .child(
            NodeDesc::new("Head", Shape::Sphere { radius: 0.14 })
                .color(SKIN)
                .at(Transform::from_translation(Vec3::new(0.0, 0.5, 0.0))),
        )
        .child(limb("LeftArm", Vec3::new(-0.26, 0.32, 0.0), Vec3::new(0.06, 0.2, 0.06), SKIN))
        .child(limb("RightArm", Vec3::new(0.26, 0.32, 0.0), Vec3::new(0.06, 0.2, 0.06), SKIN));

    let root = NodeDesc::group("Character")
        .child(torso)
        .child(limb("LeftLeg", Vec3::new(-0.1, -0.1, 0.0), Vec3::new(0.07, 0.2, 0.07), PANTS))
        .child(limb("RightLeg", Vec3::new(0.1, -0.1, 0.0), Vec3::new(0.07, 0.2, 0.07), PANTS));

    let swing = |amplitude: f32, phase: f32| Motion::Tilt { axis: Vec3::X, amplitude, cycles: 1.0, phase };

    let clips = vec![
        AnimationClip::new("Idle", 2.0).channel(
            "Torso",
            Motion::Bob { amplitude: Vec3::new(0.0, 0.015, 0.0), cycles: 1.0, phase: 0.0 },
        ),
        AnimationClip::new("Walk_Forward", 1.0)
            .channel("LeftLeg", swing(0.5, 0.0))
            .channel("RightLeg", swing(0.5, 0.5))
            .channel("LeftArm", swing(0.4, 0.5))
            .channel("RightArm", swing(0.4, 0.0))
            .channel("Torso", Motion::Bob { amplitude: Vec3::new(0.0, 0.02, 0.0), cycles: 2.0, phase: 0.0 }),
        // same gait with reversed phase
        AnimationClip::new("Walk_Backward", 1.0)
            .channel("LeftLeg", swing(-0.4, 0.0))
            .channel("RightLeg", swing(-0.4, 0.5))
            .channel("LeftArm", swing(-0.3, 0.5))
            .channel("RightArm", swing(-0.3, 0.0)),
        AnimationClip::new("Jump", 0.8)
            .channel("LeftLeg", Motion::Tilt { axis: Vec3::X, amplitude: -0.6, cycles: 0.5, phase: 0.0 })
            .channel("RightLeg", Motion::Tilt { axis: Vec3::X, amplitude: -0.6, cycles: 0.5, phase: 0.0 })
            .channel("LeftArm", Motion::Tilt { axis: Vec3::Z, amplitude: -1.2, cycles: 0.5, phase: 0.0 })
            .channel("RightArm", Motion::Tilt { axis: Vec3::Z, amplitude: 1.2, cycles: 0.5, phase: 0.0 }),
    ];

    LoadedModel { name: CHARACTER.to_string(), root, clips }
}

fn helicopter() -> LoadedModel {
    const BODY: [f32; 4] = [0.35, 0.45, 0.3, 1.0];
    const DARK: [f32; 4] = [0.15, 0.15, 0.15, 1.0];
    const GLASS: [f32; 4] = [0.6, 0.8, 0.9, 1.0];

    let blade = |name: &str, yaw: f32| {
        NodeDesc::new(name, Shape::Box { half_extents: Vec3::new(2.2, 0.02, 0.12) })
            .color(DARK)
            .at(Transform::IDENTITY.with_rotation(Quat::from_rotation_y(yaw)))
    };

    let root = NodeDesc::group("Helicopter")
        .child(part("Fuselage", Vec3::new(0.7, 0.55, 1.2), Vec3::new(0.0, 0.9, 0.0), BODY))
        .child(
            NodeDesc::new("Cockpit", Shape::Sphere { radius: 0.6 })
                .color(GLASS)
                .at(Transform::from_translation(Vec3::new(0.0, 1.0, 1.05))),
        )
        .child(part("TailBoom", Vec3::new(0.12, 0.12, 1.3), Vec3::new(0.0, 1.1, -2.4), BODY))
        .child(part("TailFin", Vec3::new(0.04, 0.35, 0.2), Vec3::new(0.0, 1.4, -3.5), BODY))
        .child(part("LeftSkid", Vec3::new(0.05, 0.05, 1.2), Vec3::new(-0.6, 0.05, 0.0), DARK))
        .child(part("RightSkid", Vec3::new(0.05, 0.05, 1.2), Vec3::new(0.6, 0.05, 0.0), DARK))
        .child(
            NodeDesc::group("Rotor")
                .at(Transform::from_translation(Vec3::new(0.0, 1.6, 0.0)))
                .child(part("Mast", Vec3::new(0.05, 0.12, 0.05), Vec3::new(0.0, -0.1, 0.0), DARK))
                .child(blade("BladeA", 0.0))
                .child(blade("BladeB", std::f32::consts::FRAC_PI_2)),
        );

    let clips = vec![AnimationClip::new("Rotation", 0.5)
        .channel("Rotor", Motion::Spin { axis: Vec3::Y, turns: 1.0 })];

    LoadedModel { name: HELICOPTER.to_string(), root, clips }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::scene::SceneGraph;

    #[test]
    fn unknown_asset_is_an_error() {
        assert!(matches!(load_builtin("dragon"), Err(SandboxError::UnknownAsset(_))));
    }

    #[test]
    fn every_channel_targets_a_node_of_its_model() {
        for name in [CHARACTER, HELICOPTER] {
            let model = load_builtin(name).unwrap();
            let mut scene = SceneGraph::new();
            let root = scene.instantiate(&model.root, scene.root());
            for clip in &model.clips {
                for ch in &clip.channels {
                    assert!(scene.find_in(root, &ch.node).is_some(), "{}: {}", clip.name, ch.node);
                }
            }
        }
    }

    #[test]
    fn character_ships_locomotion_clips() {
        let model = load_builtin(CHARACTER).unwrap();
        let names: Vec<_> = model.clips.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Idle", "Walk_Forward", "Walk_Backward", "Jump"]);
    }

    #[test]
    fn spin_completes_a_turn_per_loop() {
        let spin = Motion::Spin { axis: Vec3::Y, turns: 1.0 };
        let half = spin.sample(0.5).rotation;
        assert!((half.angle_between(Quat::IDENTITY) - std::f32::consts::PI).abs() < 1e-4);
    }
}
