//! GPU command interface
//!
//! [`GpuDevice`] is the single seam through which the renderer talks to the
//! graphics API. Every method maps onto one driver command (or a short fixed
//! sequence for resource creation), so the state cache above it can reason
//! about exactly which commands were issued.
//!
//! ## Design Goals
//! - **Backend agnostic**: renderers never see `glow` types
//! - **Observable**: a recording implementation can replay and count commands
//! - **Handle based**: resources are referenced by copyable slotmap keys

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::foundation::math::{Mat4, Vec3, Vec4};

slotmap::new_key_type! {
    /// Linked shader program
    pub struct ProgramId;
    /// Texture object
    pub struct TextureId;
    /// Vertex array object
    pub struct VertexArrayId;
    /// Vertex or index buffer
    pub struct BufferId;
    /// Framebuffer object
    pub struct FramebufferId;
    /// Renderbuffer object
    pub struct RenderbufferId;
    /// Location of a uniform inside a program
    pub struct UniformLocation;
}

/// Texture target kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    /// Regular 2D texture
    Texture2D,
    /// Multisampled 2D texture (render target only)
    Texture2DMultisample,
    /// Six-face cube map
    TextureCube,
}

/// Texel storage format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    /// Single 8-bit channel
    Red,
    /// 8-bit RGB
    Rgb,
    /// 8-bit RGBA
    Rgba,
    /// Depth component
    Depth,
}

impl TextureFormat {
    /// Number of channels stored per texel
    pub const fn channels(self) -> u32 {
        match self {
            Self::Red | Self::Depth => 1,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

/// Parameters for allocating texture storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    /// Texture target
    pub kind: TextureKind,
    /// Width in texels (per face for cube maps)
    pub width: u32,
    /// Height in texels (per face for cube maps)
    pub height: u32,
    /// Texel format
    pub format: TextureFormat,
    /// Sample count for multisampled textures
    pub samples: u32,
}

/// Texture sampling filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFilter {
    /// Nearest texel
    Nearest,
    /// Linear filtering without mipmaps
    Bilinear,
    /// Linear filtering with mipmaps
    Trilinear,
}

/// Framebuffer binding target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramebufferBinding {
    /// Read and draw target
    Full,
    /// Read target (blit source)
    ReadOnly,
    /// Draw target (blit destination)
    WriteOnly,
}

/// Framebuffer attachment point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    /// First color attachment
    Color0,
    /// Depth attachment
    Depth,
    /// Combined depth and stencil attachment
    DepthStencil,
}

/// Fixed-function capability toggled with enable/disable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Alpha blending
    Blend,
    /// Depth testing
    DepthTest,
    /// Face culling
    CullFace,
    /// Stencil testing
    StencilTest,
    /// User clip distance with the given index
    ClipDistance(u32),
}

/// Blend factor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    /// Source alpha
    SrcAlpha,
    /// Constant one
    One,
    /// One minus source alpha
    OneMinusSrcAlpha,
}

/// Polygon face selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Face {
    /// Back faces
    Back,
    /// Front faces
    Front,
    /// Both faces
    FrontAndBack,
}

/// Stencil buffer update operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StencilOp {
    /// Keep the stored value
    Keep,
    /// Replace with the reference value
    Replace,
}

/// Stencil comparison function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StencilFunc {
    /// Always pass
    Always,
    /// Pass where stored value differs from the reference
    NotEqual,
}

bitflags! {
    /// Buffers cleared or blitted
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClearMask: u32 {
        /// Color buffer
        const COLOR = 1;
        /// Depth buffer
        const DEPTH = 1 << 1;
        /// Stencil buffer
        const STENCIL = 1 << 2;
    }
}

/// Vertex attribute slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttribute {
    /// Object-space position (vec3, or vec2 for screen-space meshes)
    Position,
    /// Texture coordinates (vec2)
    TexCoord,
    /// Normal vector (vec3)
    Normal,
    /// Tangent vector (vec3)
    Tangent,
}

impl VertexAttribute {
    /// Shader attribute location
    pub const fn location(self) -> u32 {
        match self {
            Self::Position => 0,
            Self::TexCoord => 1,
            Self::Normal => 2,
            Self::Tangent => 3,
        }
    }
}

/// Value written to a shader uniform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    /// `int`, `bool` or sampler slot
    Int(i32),
    /// `float`
    Float(f32),
    /// `vec3`
    Vec3(Vec3),
    /// `vec4`
    Vec4(Vec4),
    /// `mat4`
    Mat4(Mat4),
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for UniformValue {
    fn from(value: u32) -> Self {
        Self::Int(i32::try_from(value).unwrap_or(i32::MAX))
    }
}

impl From<bool> for UniformValue {
    fn from(value: bool) -> Self {
        Self::Int(i32::from(value))
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<Vec3> for UniformValue {
    fn from(value: Vec3) -> Self {
        Self::Vec3(value)
    }
}

impl From<Vec4> for UniformValue {
    fn from(value: Vec4) -> Self {
        Self::Vec4(value)
    }
}

impl From<Mat4> for UniformValue {
    fn from(value: Mat4) -> Self {
        Self::Mat4(value)
    }
}

/// Shader stage sources for one program
#[derive(Debug, Clone, Copy)]
pub struct ProgramSources<'a> {
    /// Vertex stage
    pub vertex: &'a str,
    /// Fragment stage
    pub fragment: &'a str,
    /// Optional geometry stage
    pub geometry: Option<&'a str>,
}

/// Low-level GPU command interface
///
/// Commands that depend on a bound object (attachments, uploads of the bound
/// buffer) act on whatever the caller bound last; binding is left to the
/// state cache so its bookkeeping stays truthful.
pub trait GpuDevice {
    // Programs

    /// Compile and link a program, returning the driver log on failure
    fn create_program(&mut self, sources: &ProgramSources<'_>) -> Result<ProgramId, String>;

    /// Delete a program
    fn delete_program(&mut self, program: ProgramId);

    /// Make a program current, or none
    fn use_program(&mut self, program: Option<ProgramId>);

    /// Look up a uniform by name
    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation>;

    /// Write a uniform of the current program
    fn set_uniform(&mut self, location: UniformLocation, value: &UniformValue);

    // Textures

    /// Allocate texture storage; data is uploaded separately
    fn create_texture(&mut self, desc: &TextureDesc) -> TextureId;

    /// Replace the texels of a 2D texture or one cube face (face index 0-5)
    ///
    /// The texture must be bound on the active slot.
    fn upload_texture(&mut self, desc: &TextureDesc, face: u32, data: &[u8]);

    /// Set min/mag filtering of the texture bound on the active slot
    fn set_texture_filter(&mut self, kind: TextureKind, filter: TextureFilter);

    /// Delete a texture
    fn delete_texture(&mut self, texture: TextureId);

    /// Select the active texture slot
    fn active_texture(&mut self, slot: u32);

    /// Bind a texture (or nothing) on the active slot
    fn bind_texture(&mut self, kind: TextureKind, texture: Option<TextureId>);

    /// Row alignment used when reading client texel data
    fn set_unpack_alignment(&mut self, alignment: i32);

    // Geometry

    /// Create a vertex array object
    fn create_vertex_array(&mut self) -> VertexArrayId;

    /// Bind a vertex array (or nothing)
    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>);

    /// Upload a float attribute into the bound vertex array
    fn upload_attribute(&mut self, attribute: VertexAttribute, components: i32, data: &[f32], dynamic: bool) -> BufferId;

    /// Replace the contents of an attribute buffer of the bound vertex array
    fn update_attribute(&mut self, buffer: BufferId, data: &[f32]);

    /// Upload an index buffer into the bound vertex array
    fn upload_indices(&mut self, indices: &[u32]) -> BufferId;

    /// Delete a vertex array and the given buffers
    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId, buffers: &[BufferId]);

    /// Draw non-indexed triangles
    fn draw_arrays(&mut self, first: i32, count: i32);

    /// Draw indexed triangles, `offset` in bytes into the index buffer
    fn draw_elements(&mut self, count: i32, offset: i32);

    // Framebuffers

    /// Create a framebuffer object, returning the driver message on failure
    fn create_framebuffer(&mut self) -> Result<FramebufferId, String>;

    /// Bind a framebuffer (or the default one)
    fn bind_framebuffer(&mut self, binding: FramebufferBinding, framebuffer: Option<FramebufferId>);

    /// Attach a texture to the bound framebuffer
    fn attach_texture(&mut self, attachment: Attachment, kind: TextureKind, texture: TextureId);

    /// Create a depth-stencil renderbuffer, returning the driver message on failure
    fn create_renderbuffer(&mut self, width: u32, height: u32, samples: u32) -> Result<RenderbufferId, String>;

    /// Attach a depth-stencil renderbuffer to the bound framebuffer
    fn attach_renderbuffer(&mut self, renderbuffer: RenderbufferId);

    /// Disable color draw and read buffers of the bound framebuffer
    fn disable_color_buffers(&mut self);

    /// Whether the bound framebuffer is complete
    fn framebuffer_complete(&mut self) -> bool;

    /// Delete a framebuffer and its renderbuffer
    fn delete_framebuffer(&mut self, framebuffer: FramebufferId, renderbuffer: Option<RenderbufferId>);

    /// Copy the read framebuffer into the draw framebuffer
    fn blit_framebuffer(&mut self, width: u32, height: u32, mask: ClearMask, linear: bool);

    // Fixed function state

    /// Enable or disable a capability
    fn set_capability(&mut self, capability: Capability, enabled: bool);

    /// Set blend factors
    fn blend_func(&mut self, source: BlendFactor, destination: BlendFactor);

    /// Enable or disable depth writes
    fn depth_mask(&mut self, enabled: bool);

    /// Select culled faces
    fn cull_face(&mut self, face: Face);

    /// Stencil write mask
    fn stencil_mask(&mut self, mask: u32);

    /// Stencil comparison
    fn stencil_func(&mut self, func: StencilFunc, reference: i32, mask: u32);

    /// Stencil update operations
    fn stencil_op(&mut self, stencil_fail: StencilOp, depth_fail: StencilOp, pass: StencilOp);

    /// Rasterize as lines (`true`) or filled polygons
    fn polygon_mode(&mut self, wireframe: bool);

    /// Set the viewport rectangle
    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32);

    /// Color used by color clears
    fn clear_color(&mut self, color: Vec4);

    /// Clear the selected buffers of the draw framebuffer
    fn clear(&mut self, mask: ClearMask);
}
