//! Backend-agnostic rendering API
//!
//! Defines the command interface implemented by the OpenGL backend and the
//! recording backend used in tests.

pub mod device;

pub use device::{
    Attachment, BlendFactor, BufferId, Capability, ClearMask, Face, FramebufferBinding, FramebufferId,
    GpuDevice, ProgramId, ProgramSources, RenderbufferId, StencilFunc, StencilOp, TextureDesc,
    TextureFilter, TextureFormat, TextureId, TextureKind, UniformLocation, UniformValue,
    VertexArrayId, VertexAttribute,
};
