// VIEW: Rendering and graphics
pub mod render;
pub mod gpu_init;

pub use render::{CameraUniform, LightingUniform, RenderState};
pub use gpu_init::GpuContext;
