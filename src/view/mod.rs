// VIEW: GPU setup, pipelines and per-frame drawing
pub mod gpu_init;
pub mod pipelines;
pub mod render;
pub mod targets;

pub use gpu_init::GpuContext;
pub use render::{EguiFrame, RenderState};
