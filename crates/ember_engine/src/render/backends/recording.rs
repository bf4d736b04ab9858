//! Recording GPU backend
//!
//! [`RecordingDevice`] implements [`GpuDevice`] without a graphics context. Each
//! command is appended to a [`CallLog`] shared with the caller, which makes it
//! possible to assert on bind counts, draw order and uniform writes in tests
//! and headless tools.

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use slotmap::SlotMap;

use crate::foundation::math::Vec4;
use crate::render::api::{
    Attachment, BlendFactor, BufferId, Capability, ClearMask, Face, FramebufferBinding, FramebufferId,
    GpuDevice, ProgramId, ProgramSources, RenderbufferId, StencilFunc, StencilOp, TextureDesc,
    TextureFilter, TextureId, TextureKind, UniformLocation, UniformValue, VertexArrayId, VertexAttribute,
};

/// One recorded command
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum GpuCall {
    CreateProgram(ProgramId),
    UseProgram(Option<ProgramId>),
    SetUniform { program: Option<ProgramId>, name: String, value: UniformValue },
    CreateTexture(TextureId, TextureDesc),
    UploadTexture { face: u32, bytes: usize },
    SetTextureFilter(TextureKind, TextureFilter),
    ActiveTexture(u32),
    BindTexture(TextureKind, Option<TextureId>),
    UnpackAlignment(i32),
    BindVertexArray(Option<VertexArrayId>),
    UploadAttribute(VertexAttribute, usize),
    UpdateAttribute(BufferId, usize),
    UploadIndices(usize),
    DrawArrays { first: i32, count: i32 },
    DrawElements { count: i32, offset: i32 },
    CreateFramebuffer(FramebufferId),
    BindFramebuffer(FramebufferBinding, Option<FramebufferId>),
    AttachTexture(Attachment, TextureId),
    AttachRenderbuffer(RenderbufferId),
    DisableColorBuffers,
    Blit { width: u32, height: u32, mask: ClearMask, linear: bool },
    SetCapability(Capability, bool),
    BlendFunc(BlendFactor, BlendFactor),
    DepthMask(bool),
    CullFace(Face),
    StencilMask(u32),
    StencilFunc(StencilFunc, i32, u32),
    StencilOp(StencilOp, StencilOp, StencilOp),
    PolygonMode(bool),
    Viewport { x: i32, y: i32, width: u32, height: u32 },
    ClearColor(Vec4),
    Clear(ClearMask),
    DeleteProgram(ProgramId),
    DeleteTexture(TextureId),
    DeleteVertexArray { vertex_array: VertexArrayId, buffers: usize },
    DeleteFramebuffer(FramebufferId),
}

impl GpuCall {
    /// Whether the call is a draw command
    pub const fn is_draw(&self) -> bool {
        matches!(self, Self::DrawArrays { .. } | Self::DrawElements { .. })
    }

    /// Whether the call deletes a GPU object
    pub const fn is_delete(&self) -> bool {
        matches!(
            self,
            Self::DeleteProgram(_) | Self::DeleteTexture(_) | Self::DeleteVertexArray { .. } | Self::DeleteFramebuffer(_)
        )
    }
}

/// Shared, append-only log of recorded commands
#[derive(Debug, Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<GpuCall>>>);

impl CallLog {
    fn push(&self, call: GpuCall) {
        self.0.borrow_mut().push(call);
    }

    /// Borrow all recorded calls
    pub fn calls(&self) -> Ref<'_, Vec<GpuCall>> {
        self.0.borrow()
    }

    /// Drop recorded calls
    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    /// Number of calls matching a predicate
    pub fn count(&self, predicate: impl Fn(&GpuCall) -> bool) -> usize {
        self.0.borrow().iter().filter(|c| predicate(c)).count()
    }

    /// Number of draw calls
    pub fn draw_count(&self) -> usize {
        self.count(GpuCall::is_draw)
    }

    /// Values written to a uniform, in order
    pub fn uniform_values(&self, name: &str) -> Vec<UniformValue> {
        self.0
            .borrow()
            .iter()
            .filter_map(|c| match c {
                GpuCall::SetUniform { name: n, value, .. } if n == name => Some(*value),
                _ => None,
            })
            .collect()
    }

    /// Last value written to a uniform
    pub fn last_uniform(&self, name: &str) -> Option<UniformValue> {
        self.uniform_values(name).pop()
    }

    /// Index of the first call matching a predicate
    pub fn position(&self, predicate: impl Fn(&GpuCall) -> bool) -> Option<usize> {
        self.0.borrow().iter().position(predicate)
    }
}

/// Context-free [`GpuDevice`] that records every command
#[derive(Debug, Default)]
pub struct RecordingDevice {
    log: CallLog,
    programs: SlotMap<ProgramId, ()>,
    textures: SlotMap<TextureId, ()>,
    vertex_arrays: SlotMap<VertexArrayId, ()>,
    buffers: SlotMap<BufferId, ()>,
    framebuffers: SlotMap<FramebufferId, ()>,
    renderbuffers: SlotMap<RenderbufferId, ()>,
    uniforms: SlotMap<UniformLocation, String>,
    current_program: Option<ProgramId>,
    compile_error: Option<String>,
    incomplete_framebuffers: bool,
    failing_framebuffers: bool,
}

impl RecordingDevice {
    /// Create a device with an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the shared call log
    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    /// Make every following program creation fail with `message`
    pub fn with_compile_error(mut self, message: impl Into<String>) -> Self {
        self.compile_error = Some(message.into());
        self
    }

    /// Report every framebuffer as incomplete
    pub fn with_incomplete_framebuffers(mut self) -> Self {
        self.incomplete_framebuffers = true;
        self
    }

    /// Make framebuffer and renderbuffer creation fail
    pub fn with_failing_framebuffers(mut self) -> Self {
        self.failing_framebuffers = true;
        self
    }
}

impl GpuDevice for RecordingDevice {
    fn create_program(&mut self, _sources: &ProgramSources<'_>) -> Result<ProgramId, String> {
        if let Some(message) = &self.compile_error {
            return Err(message.clone());
        }
        let id = self.programs.insert(());
        self.log.push(GpuCall::CreateProgram(id));
        Ok(id)
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(program);
        self.log.push(GpuCall::DeleteProgram(program));
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.current_program = program;
        self.log.push(GpuCall::UseProgram(program));
    }

    fn uniform_location(&mut self, _program: ProgramId, name: &str) -> Option<UniformLocation> {
        Some(self.uniforms.insert(name.to_string()))
    }

    fn set_uniform(&mut self, location: UniformLocation, value: &UniformValue) {
        let name = self.uniforms.get(location).cloned().unwrap_or_default();
        self.log.push(GpuCall::SetUniform { program: self.current_program, name, value: *value });
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> TextureId {
        let id = self.textures.insert(());
        self.log.push(GpuCall::CreateTexture(id, *desc));
        id
    }

    fn upload_texture(&mut self, _desc: &TextureDesc, face: u32, data: &[u8]) {
        self.log.push(GpuCall::UploadTexture { face, bytes: data.len() });
    }

    fn set_texture_filter(&mut self, kind: TextureKind, filter: TextureFilter) {
        self.log.push(GpuCall::SetTextureFilter(kind, filter));
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.textures.remove(texture);
        self.log.push(GpuCall::DeleteTexture(texture));
    }

    fn active_texture(&mut self, slot: u32) {
        self.log.push(GpuCall::ActiveTexture(slot));
    }

    fn bind_texture(&mut self, kind: TextureKind, texture: Option<TextureId>) {
        self.log.push(GpuCall::BindTexture(kind, texture));
    }

    fn set_unpack_alignment(&mut self, alignment: i32) {
        self.log.push(GpuCall::UnpackAlignment(alignment));
    }

    fn create_vertex_array(&mut self) -> VertexArrayId {
        self.vertex_arrays.insert(())
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) {
        self.log.push(GpuCall::BindVertexArray(vertex_array));
    }

    fn upload_attribute(&mut self, attribute: VertexAttribute, _components: i32, data: &[f32], _dynamic: bool) -> BufferId {
        self.log.push(GpuCall::UploadAttribute(attribute, data.len()));
        self.buffers.insert(())
    }

    fn update_attribute(&mut self, buffer: BufferId, data: &[f32]) {
        self.log.push(GpuCall::UpdateAttribute(buffer, data.len()));
    }

    fn upload_indices(&mut self, indices: &[u32]) -> BufferId {
        self.log.push(GpuCall::UploadIndices(indices.len()));
        self.buffers.insert(())
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId, buffers: &[BufferId]) {
        self.vertex_arrays.remove(vertex_array);
        for buffer in buffers {
            self.buffers.remove(*buffer);
        }
        self.log.push(GpuCall::DeleteVertexArray { vertex_array, buffers: buffers.len() });
    }

    fn draw_arrays(&mut self, first: i32, count: i32) {
        self.log.push(GpuCall::DrawArrays { first, count });
    }

    fn draw_elements(&mut self, count: i32, offset: i32) {
        self.log.push(GpuCall::DrawElements { count, offset });
    }

    fn create_framebuffer(&mut self) -> Result<FramebufferId, String> {
        if self.failing_framebuffers {
            return Err("out of framebuffer names".to_string());
        }
        let id = self.framebuffers.insert(());
        self.log.push(GpuCall::CreateFramebuffer(id));
        Ok(id)
    }

    fn bind_framebuffer(&mut self, binding: FramebufferBinding, framebuffer: Option<FramebufferId>) {
        self.log.push(GpuCall::BindFramebuffer(binding, framebuffer));
    }

    fn attach_texture(&mut self, attachment: Attachment, _kind: TextureKind, texture: TextureId) {
        self.log.push(GpuCall::AttachTexture(attachment, texture));
    }

    fn create_renderbuffer(&mut self, _width: u32, _height: u32, _samples: u32) -> Result<RenderbufferId, String> {
        if self.failing_framebuffers {
            return Err("out of renderbuffer names".to_string());
        }
        Ok(self.renderbuffers.insert(()))
    }

    fn attach_renderbuffer(&mut self, renderbuffer: RenderbufferId) {
        self.log.push(GpuCall::AttachRenderbuffer(renderbuffer));
    }

    fn disable_color_buffers(&mut self) {
        self.log.push(GpuCall::DisableColorBuffers);
    }

    fn framebuffer_complete(&mut self) -> bool {
        !self.incomplete_framebuffers
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId, renderbuffer: Option<RenderbufferId>) {
        self.framebuffers.remove(framebuffer);
        if let Some(renderbuffer) = renderbuffer {
            self.renderbuffers.remove(renderbuffer);
        }
        self.log.push(GpuCall::DeleteFramebuffer(framebuffer));
    }

    fn blit_framebuffer(&mut self, width: u32, height: u32, mask: ClearMask, linear: bool) {
        self.log.push(GpuCall::Blit { width, height, mask, linear });
    }

    fn set_capability(&mut self, capability: Capability, enabled: bool) {
        self.log.push(GpuCall::SetCapability(capability, enabled));
    }

    fn blend_func(&mut self, source: BlendFactor, destination: BlendFactor) {
        self.log.push(GpuCall::BlendFunc(source, destination));
    }

    fn depth_mask(&mut self, enabled: bool) {
        self.log.push(GpuCall::DepthMask(enabled));
    }

    fn cull_face(&mut self, face: Face) {
        self.log.push(GpuCall::CullFace(face));
    }

    fn stencil_mask(&mut self, mask: u32) {
        self.log.push(GpuCall::StencilMask(mask));
    }

    fn stencil_func(&mut self, func: StencilFunc, reference: i32, mask: u32) {
        self.log.push(GpuCall::StencilFunc(func, reference, mask));
    }

    fn stencil_op(&mut self, stencil_fail: StencilOp, depth_fail: StencilOp, pass: StencilOp) {
        self.log.push(GpuCall::StencilOp(stencil_fail, depth_fail, pass));
    }

    fn polygon_mode(&mut self, wireframe: bool) {
        self.log.push(GpuCall::PolygonMode(wireframe));
    }

    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.log.push(GpuCall::Viewport { x, y, width, height });
    }

    fn clear_color(&mut self, color: Vec4) {
        self.log.push(GpuCall::ClearColor(color));
    }

    fn clear(&mut self, mask: ClearMask) {
        self.log.push(GpuCall::Clear(mask));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_names_are_recorded() {
        let mut device = RecordingDevice::new();
        let log = device.log();
        let program = device.create_program(&ProgramSources { vertex: "", fragment: "", geometry: None }).unwrap();
        device.use_program(Some(program));
        let location = device.uniform_location(program, "fog.density").unwrap();
        device.set_uniform(location, &UniformValue::Float(0.5));

        assert_eq!(log.last_uniform("fog.density"), Some(UniformValue::Float(0.5)));
        assert_eq!(log.uniform_values("missing"), Vec::new());
    }

    #[test]
    fn test_compile_error_is_reported() {
        let mut device = RecordingDevice::new().with_compile_error("syntax error");
        let result = device.create_program(&ProgramSources { vertex: "", fragment: "", geometry: None });
        assert_eq!(result, Err("syntax error".to_string()));
    }
}
