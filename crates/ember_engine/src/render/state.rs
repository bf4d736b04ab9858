//! # GPU State Cache
//!
//! Every bind and fixed-function toggle issued by the renderers goes through
//! [`StateCache`]. It remembers what is currently bound or enabled and skips a
//! command when the requested state is already in place.
//!
//! ## Design Goals
//! - **Single choke point**: no renderer talks to the device for bindings
//! - **Truthful bookkeeping**: commands that bind as a side effect (resource
//!   creation) update the cache too
//! - **Unknown until set**: toggles start unknown, so the first request is
//!   always issued
//!
//! Framebuffers are tracked in three slots (full, read-only, write-only)
//! because a blit binds different read and draw targets. Textures are tracked
//! per texture slot.
//!
//! GPU resources hold a [`ReleaseQueue`] handle and push their ids onto it when
//! their last owner drops them. [`StateCache::collect_released`] deletes the
//! queued objects through the device and forgets any binding that referred to
//! them; the cache also drains the queue when it is dropped.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::render::api::{
    BlendFactor, BufferId, Capability, Face, FramebufferBinding, FramebufferId, GpuDevice, ProgramId,
    RenderbufferId, StencilFunc, StencilOp, TextureDesc, TextureId, TextureKind, VertexArrayId,
};
use crate::render::mesh::MeshBuffers;
use crate::render::resources::{FrameBuffer, ShaderProgram, Texture};

/// Alpha blending equation preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlendFunction {
    /// `SRC_ALPHA, ONE`
    Additive,
    /// `SRC_ALPHA, ONE_MINUS_SRC_ALPHA`
    #[default]
    Normal,
}

impl BlendFunction {
    const fn factors(self) -> (BlendFactor, BlendFactor) {
        match self {
            Self::Additive => (BlendFactor::SrcAlpha, BlendFactor::One),
            Self::Normal => (BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha),
        }
    }
}

/// Stencil update preset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StencilAction {
    /// Write the reference value where fragments pass
    Replace,
    /// Leave the stencil buffer untouched
    Keep,
}

/// GPU object whose last owner went away
#[derive(Debug, Clone, PartialEq)]
pub enum Released {
    /// Shader program
    Program(ProgramId),
    /// Texture of any kind
    Texture(TextureId),
    /// Vertex array with its attribute and index buffers
    VertexArray(VertexArrayId, Vec<BufferId>),
    /// Framebuffer with its depth-stencil renderbuffer
    Framebuffer(FramebufferId, Option<RenderbufferId>),
}

/// Shared list of GPU objects waiting to be deleted
///
/// Cloned into every resource at creation. Pushing never touches the device,
/// so resources can be dropped anywhere.
#[derive(Debug, Clone, Default)]
pub struct ReleaseQueue(Rc<RefCell<Vec<Released>>>);

impl ReleaseQueue {
    /// Queue an object for deletion
    pub fn push(&self, released: Released) {
        self.0.borrow_mut().push(released);
    }

    /// Number of objects waiting
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Whether nothing is waiting
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    fn take(&self) -> Vec<Released> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

/// Deduplicating wrapper around a [`GpuDevice`]
pub struct StateCache {
    device: Box<dyn GpuDevice>,
    releases: ReleaseQueue,
    program: Option<ProgramId>,
    vertex_array: Option<VertexArrayId>,
    framebuffer_full: Option<FramebufferId>,
    framebuffer_read: Option<FramebufferId>,
    framebuffer_write: Option<FramebufferId>,
    active_slot: Option<u32>,
    textures: HashMap<u32, (TextureKind, TextureId)>,
    blend_enabled: Option<bool>,
    blend_function: Option<BlendFunction>,
    depth_test: Option<bool>,
    depth_mask: Option<bool>,
    face_cull: Option<bool>,
    culled_side: Option<Face>,
    stencil_test: Option<bool>,
    wireframe: Option<bool>,
}

impl StateCache {
    /// Wrap a device; all cached state starts unknown
    pub fn new(device: Box<dyn GpuDevice>) -> Self {
        Self {
            device,
            releases: ReleaseQueue::default(),
            program: None,
            vertex_array: None,
            framebuffer_full: None,
            framebuffer_read: None,
            framebuffer_write: None,
            active_slot: None,
            textures: HashMap::new(),
            blend_enabled: None,
            blend_function: None,
            depth_test: None,
            depth_mask: None,
            face_cull: None,
            culled_side: None,
            stencil_test: None,
            wireframe: None,
        }
    }

    /// Direct access for commands that carry no cached state
    /// (uniforms, draws, viewport, clears)
    pub fn device(&mut self) -> &mut dyn GpuDevice {
        self.device.as_mut()
    }

    /// Handle resources use to queue themselves for deletion
    pub fn release_queue(&self) -> ReleaseQueue {
        self.releases.clone()
    }

    /// Delete every queued object and forget bindings that referred to it
    ///
    /// Returns the number of objects deleted.
    pub fn collect_released(&mut self) -> usize {
        let released = self.releases.take();
        for object in &released {
            match object {
                Released::Program(id) => {
                    if self.program == Some(*id) {
                        self.program = None;
                    }
                    self.device.delete_program(*id);
                }
                Released::Texture(id) => {
                    self.textures.retain(|_, (_, bound)| *bound != *id);
                    self.device.delete_texture(*id);
                }
                Released::VertexArray(id, buffers) => {
                    if self.vertex_array == Some(*id) {
                        self.vertex_array = None;
                    }
                    self.device.delete_vertex_array(*id, buffers);
                }
                Released::Framebuffer(id, renderbuffer) => {
                    // Deleting a bound framebuffer reverts that target to the default one
                    for slot in [&mut self.framebuffer_full, &mut self.framebuffer_read, &mut self.framebuffer_write] {
                        if *slot == Some(*id) {
                            *slot = None;
                        }
                    }
                    self.device.delete_framebuffer(*id, *renderbuffer);
                }
            }
        }
        if !released.is_empty() {
            log::debug!(target: "state_cache", "Released {} GPU objects.", released.len());
        }
        released.len()
    }

    // Bindings

    /// Make a shader program current
    pub fn activate_shader_program(&mut self, program: &ShaderProgram) {
        if self.program == Some(program.id()) {
            return;
        }
        self.device.use_program(Some(program.id()));
        self.program = Some(program.id());
    }

    /// Bind the vertex array of a mesh
    pub fn bind_mesh(&mut self, mesh: &MeshBuffers) {
        if self.vertex_array == Some(mesh.vertex_array()) {
            return;
        }
        self.device.bind_vertex_array(Some(mesh.vertex_array()));
        self.vertex_array = Some(mesh.vertex_array());
    }

    /// Select the active texture slot
    pub fn set_texture_slot(&mut self, slot: u32) {
        if self.active_slot == Some(slot) {
            return;
        }
        self.device.active_texture(slot);
        self.active_slot = Some(slot);
    }

    /// Bind a texture on the active slot
    pub fn bind_texture(&mut self, texture: &Texture) {
        let slot = self.current_slot();
        let entry = (texture.kind(), texture.id());
        if self.textures.get(&slot) == Some(&entry) {
            return;
        }
        self.device.bind_texture(entry.0, Some(entry.1));
        self.textures.insert(slot, entry);
    }

    /// Unbind the texture of `kind` from the active slot; no-op if none is bound
    pub fn unbind_texture(&mut self, kind: TextureKind) {
        let slot = self.current_slot();
        if let Some((bound_kind, _)) = self.textures.get(&slot) {
            if *bound_kind == kind {
                self.device.bind_texture(kind, None);
                self.textures.remove(&slot);
            }
        }
    }

    /// Unbind every texture on every slot and forget all texture bindings
    pub fn unbind_all_textures(&mut self) {
        let active = self.current_slot();
        let mut bound: Vec<(u32, TextureKind)> = self.textures.iter().map(|(slot, (kind, _))| (*slot, *kind)).collect();
        bound.sort_by_key(|(slot, _)| *slot);
        for (slot, kind) in bound {
            self.set_texture_slot(slot);
            self.device.bind_texture(kind, None);
        }
        self.textures.clear();
        self.set_texture_slot(active);
    }

    /// Bind a framebuffer to one of the three framebuffer slots
    ///
    /// A full bind occupies the read and write slots as well.
    pub fn bind_framebuffer(&mut self, framebuffer: &FrameBuffer, binding: FramebufferBinding) {
        self.bind_framebuffer_id(framebuffer.id(), binding);
    }

    fn bind_framebuffer_id(&mut self, id: FramebufferId, binding: FramebufferBinding) {
        let target = Some(id);
        match binding {
            FramebufferBinding::Full => {
                if self.framebuffer_full == target {
                    return;
                }
                self.framebuffer_full = target;
                self.framebuffer_read = target;
                self.framebuffer_write = target;
            }
            FramebufferBinding::ReadOnly => {
                if self.framebuffer_read == target {
                    return;
                }
                self.framebuffer_read = target;
                self.framebuffer_full = if self.framebuffer_write == target { target } else { None };
            }
            FramebufferBinding::WriteOnly => {
                if self.framebuffer_write == target {
                    return;
                }
                self.framebuffer_write = target;
                self.framebuffer_full = if self.framebuffer_read == target { target } else { None };
            }
        }
        self.device.bind_framebuffer(binding, target);
    }

    /// Bind the default framebuffer and clear all three slots
    pub fn unbind_framebuffer(&mut self) {
        self.device.bind_framebuffer(FramebufferBinding::Full, None);
        self.framebuffer_full = None;
        self.framebuffer_read = None;
        self.framebuffer_write = None;
    }

    /// Framebuffer currently bound for drawing, if any
    pub fn bound_draw_framebuffer(&self) -> Option<FramebufferId> {
        self.framebuffer_write
    }

    // Resource creation

    /// Allocate a texture; it is left bound on the active slot
    pub fn create_texture(&mut self, desc: &TextureDesc) -> TextureId {
        let slot = self.current_slot();
        self.set_texture_slot(slot);
        let id = self.device.create_texture(desc);
        self.textures.insert(slot, (desc.kind, id));
        id
    }

    /// Upload texels into a texture (or one cube face)
    pub fn upload_texture(&mut self, texture: &Texture, face: u32, data: &[u8]) {
        self.bind_texture(texture);
        self.device.upload_texture(&texture.desc(), face, data);
    }

    /// Create a vertex array; it is left bound
    pub fn create_vertex_array(&mut self) -> VertexArrayId {
        let id = self.device.create_vertex_array();
        self.vertex_array = Some(id);
        id
    }

    /// Create a framebuffer; it is left bound to the full slot
    pub fn create_framebuffer(&mut self) -> Result<FramebufferId, String> {
        let id = self.device.create_framebuffer()?;
        self.framebuffer_full = Some(id);
        self.framebuffer_read = Some(id);
        self.framebuffer_write = Some(id);
        Ok(id)
    }

    fn current_slot(&self) -> u32 {
        self.active_slot.unwrap_or(0)
    }

    // Alpha blending

    /// Enable or disable alpha blending
    pub fn enable_blend(&mut self, enabled: bool) {
        if self.blend_enabled == Some(enabled) {
            return;
        }
        self.device.set_capability(Capability::Blend, enabled);
        self.blend_enabled = Some(enabled);
    }

    /// Select the blending equation
    pub fn set_blend_function(&mut self, function: BlendFunction) {
        if self.blend_function == Some(function) {
            log::trace!(target: "state_cache", "Blend function {:?} already active.", function);
            return;
        }
        let (source, destination) = function.factors();
        self.device.blend_func(source, destination);
        self.blend_function = Some(function);
    }

    // Depth

    /// Enable or disable depth testing
    pub fn enable_depth_test(&mut self, enabled: bool) {
        if self.depth_test == Some(enabled) {
            return;
        }
        self.device.set_capability(Capability::DepthTest, enabled);
        self.depth_test = Some(enabled);
    }

    /// Enable or disable depth writes
    pub fn enable_depth_mask(&mut self, enabled: bool) {
        if self.depth_mask == Some(enabled) {
            return;
        }
        self.device.depth_mask(enabled);
        self.depth_mask = Some(enabled);
    }

    /// Whether depth testing is known to be enabled
    pub fn is_depth_test_enabled(&self) -> bool {
        self.depth_test == Some(true)
    }

    // Face culling

    /// Enable or disable face culling
    pub fn enable_face_cull(&mut self, enabled: bool) {
        if self.face_cull == Some(enabled) {
            return;
        }
        self.device.set_capability(Capability::CullFace, enabled);
        self.face_cull = Some(enabled);
    }

    /// Select which faces are culled
    pub fn set_culled_side(&mut self, side: Face) {
        if self.culled_side == Some(side) {
            return;
        }
        self.device.cull_face(side);
        self.culled_side = Some(side);
    }

    // Stencil

    /// Enable or disable stencil testing
    pub fn enable_stencil_test(&mut self, enabled: bool) {
        if self.stencil_test == Some(enabled) {
            return;
        }
        self.device.set_capability(Capability::StencilTest, enabled);
        self.stencil_test = Some(enabled);
    }

    /// Allow (`0xFF` mask) or forbid (`0x00`) stencil writes
    pub fn enable_stencil_drawing(&mut self, enabled: bool) {
        self.device.stencil_mask(if enabled { 0xFF } else { 0x00 });
    }

    /// Choose what passing fragments do to the stencil buffer
    pub fn set_stencil_action(&mut self, action: StencilAction) {
        match action {
            StencilAction::Replace => self.device.stencil_op(StencilOp::Keep, StencilOp::Keep, StencilOp::Replace),
            StencilAction::Keep => self.device.stencil_op(StencilOp::Keep, StencilOp::Keep, StencilOp::Keep),
        }
    }

    /// Stencil test always passes with reference `value`
    pub fn stencil_passes_always(&mut self, value: i32) {
        self.device.stencil_func(StencilFunc::Always, value, 0xFF);
    }

    /// Stencil test passes where the stored value differs from `value`
    pub fn stencil_passes_not_equal(&mut self, value: i32) {
        self.device.stencil_func(StencilFunc::NotEqual, value, 0xFF);
    }

    // Misc

    /// Enable or disable user clip distance `index`
    pub fn enable_clip_distance(&mut self, index: u32, enabled: bool) {
        self.device.set_capability(Capability::ClipDistance(index), enabled);
    }

    /// Rasterize polygons as lines or filled
    pub fn set_wireframe(&mut self, wireframe: bool) {
        if self.wireframe == Some(wireframe) {
            return;
        }
        self.device.polygon_mode(wireframe);
        self.wireframe = Some(wireframe);
    }
}

impl Drop for StateCache {
    fn drop(&mut self) {
        self.collect_released();
    }
}
