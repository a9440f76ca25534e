// CONTROLLER: Input, game logic, and update loop
pub mod input;
pub mod scheduler;
pub mod character;
pub mod animation;
pub mod camera_rig;
pub mod interaction;
pub mod mining;
pub mod frame_loop;

pub use input::{InputEvent, InputState, KeyBindings};
pub use character::{CharacterController, CharacterState};
pub use animation::{AnimState, AnimationMixer, CharacterAnimator};
pub use camera_rig::CameraRig;
pub use scheduler::{TaskScheduler, TaskToken};
pub use frame_loop::Simulation;
