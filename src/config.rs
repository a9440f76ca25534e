//! Sandbox configuration.
//!
//! Defaults live in `config/sandbox.toml`, which is embedded so the wasm build
//! needs no filesystem. Every table is `#[serde(default)]`, so a partial file
//! only overrides what it names.

use glam::Vec3;
use serde::Deserialize;

use crate::controller::input::KeyBindings;
use crate::error::{Result, SandboxError};

pub const DEFAULT_CONFIG_TOML: &str = include_str!("../config/sandbox.toml");

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub physics: PhysicsConfig,
    pub character: CharacterConfig,
    pub camera: CameraConfig,
    pub animation: AnimationConfig,
    pub keys: KeyBindings,
    pub mining: MiningConfig,
    pub world: WorldConfig,
}

impl SandboxConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Embedded defaults, overridden on native by the file named in
    /// `SANDBOX_CONFIG`. A broken override is logged and ignored.
    pub fn load() -> Self {
        let embedded = Self::from_toml_str(DEFAULT_CONFIG_TOML).unwrap_or_else(|e| {
            tracing::error!("embedded config invalid, using built-in defaults: {e}");
            Self::default()
        });

        #[cfg(not(target_arch = "wasm32"))]
        if let Ok(path) = std::env::var("SANDBOX_CONFIG") {
            match Self::from_file(&path) {
                Ok(cfg) => {
                    tracing::info!(%path, "loaded config override");
                    return cfg;
                }
                Err(e) => tracing::error!("{e}"),
            }
        }

        embedded
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_file(path: &str) -> Result<Self> {
        let txt = std::fs::read_to_string(path).map_err(|source| SandboxError::ConfigRead {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml_str(&txt)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub gravity: [f32; 3],
    pub fixed_step_hz: u32,
}

impl PhysicsConfig {
    pub fn gravity(&self) -> Vec3 {
        Vec3::from_array(self.gravity)
    }

    /// Constant step used for physics, kinematics and clip advancement.
    pub fn fixed_step(&self) -> f32 {
        1.0 / self.fixed_step_hz.max(1) as f32
    }
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, -9.82, 0.0],
            fixed_step_hz: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CharacterConfig {
    pub spawn: [f32; 3],
    pub radius: f32,
    /// Planar distance per frame.
    pub move_speed: f32,
    /// Vertical velocity (units per frame) set when a jump starts.
    pub jump_impulse: f32,
    /// Added to the vertical velocity every airborne frame.
    pub gravity_per_step: f32,
    /// Body height at which the character counts as standing on the ground.
    pub ground_contact: f32,
}

impl Default for CharacterConfig {
    fn default() -> Self {
        Self {
            spawn: [0.0, 0.5, 0.0],
            radius: 0.5,
            move_speed: 0.03,
            jump_impulse: 0.3,
            gravity_per_step: -0.02,
            ground_contact: 0.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub distance: f32,
    pub height_offset: f32,
    pub orbit_sensitivity: f32,
    pub fov_y_degrees: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            distance: 10.0,
            height_offset: 5.0,
            orbit_sensitivity: 0.005,
            fov_y_degrees: 50.0,
            z_near: 0.1,
            z_far: 1000.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClipSpec {
    pub name: String,
    #[serde(default = "default_rate")]
    pub rate: f32,
}

fn default_rate() -> f32 {
    1.0
}

impl ClipSpec {
    fn new(name: &str, rate: f32) -> Self {
        Self {
            name: name.to_string(),
            rate,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub crossfade_seconds: f32,
    pub idle: ClipSpec,
    pub walk_forward: ClipSpec,
    pub walk_backward: ClipSpec,
    pub jump: ClipSpec,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            crossfade_seconds: 0.25,
            idle: ClipSpec::new("Idle", 1.0),
            walk_forward: ClipSpec::new("Walk_Forward", 1.0),
            walk_backward: ClipSpec::new("Walk_Backward", 0.8),
            jump: ClipSpec::new("Jump", 1.2),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    pub progress_title: String,
    pub progress_message: String,
    pub progress_duration_ms: f64,
    pub item: u32,
    pub amount: u32,
    pub notify_title: String,
    pub notify_message: String,
    pub notify_duration_ms: f64,
    pub sound_path: String,
    pub sound_volume: f32,
    pub sound_duration_ms: f64,
    pub respawn_delay_ms: f64,
    pub respawn_position: [f32; 3],
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            progress_title: "Mining".to_string(),
            progress_message: "Mining copper ore...".to_string(),
            progress_duration_ms: 3000.0,
            item: 1,
            amount: 1,
            notify_title: "Mining".to_string(),
            notify_message: "You mined some copper ore!".to_string(),
            notify_duration_ms: 3000.0,
            sound_path: "assets/sounds/boom1.wav".to_string(),
            sound_volume: 0.5,
            sound_duration_ms: 2000.0,
            respawn_delay_ms: 2000.0,
            respawn_position: [2.0, 1.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub ground_size: f32,
    pub cube_position: [f32; 3],
    pub cube_half_extents: [f32; 3],
    pub helicopter_position: [f32; 3],
    pub helicopter_scale: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            ground_size: 40.0,
            cube_position: [2.0, 1.0, 0.5],
            cube_half_extents: [0.5, 0.5, 0.5],
            helicopter_position: [-4.0, 0.5, -3.0],
            helicopter_scale: 0.8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_config_parses() {
        let cfg = SandboxConfig::from_toml_str(DEFAULT_CONFIG_TOML).expect("embedded config");
        assert_eq!(cfg.physics.fixed_step_hz, 60);
        assert_eq!(cfg.character.ground_contact, 0.5);
        assert_eq!(cfg.animation.idle.name, "Idle");
        assert!(cfg.keys.jump.iter().any(|k| k == " "));
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let cfg = SandboxConfig::from_toml_str("[character]\njump_impulse = 0.4\n").unwrap();
        assert_eq!(cfg.character.jump_impulse, 0.4);
        assert_eq!(cfg.character.gravity_per_step, -0.02);
        assert_eq!(cfg.camera.distance, 10.0);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let err = SandboxConfig::from_toml_str("[physics]\nfixed_step_hz = \"fast\"\n");
        assert!(matches!(err, Err(SandboxError::Config(_))));
    }
}
