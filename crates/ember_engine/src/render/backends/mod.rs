//! [`GpuDevice`](crate::render::api::GpuDevice) implementations
//!
//! - [`gl::GlDevice`]: OpenGL 3.3 core through `glow`
//! - [`recording::RecordingDevice`]: no context, records every command

pub mod gl;
pub mod recording;

pub use gl::GlDevice;
pub use recording::{CallLog, GpuCall, RecordingDevice};
