//! GPU resources: textures, framebuffers and shader programs

pub mod framebuffer;
pub mod loader;
pub mod shader;
pub mod texture;

pub use framebuffer::{FrameBuffer, FrameBufferBuilder};
pub use loader::{TextureLoader, CUBE_FACES};
pub use shader::{BuiltinShader, ShaderLibrary, ShaderProgram, ShaderSource};
pub use texture::Texture;
