// MODEL: Game state and data
pub mod camera;
pub mod scene;
pub mod physics;
pub mod assets;
pub mod inventory;
pub mod overlay;

pub use camera::Camera;
pub use scene::{NodeId, SceneGraph};
pub use physics::{BodyHandle, PhysicsWorld};
pub use inventory::Inventory;
pub use overlay::{Overlays, Severity, UiCommand};
