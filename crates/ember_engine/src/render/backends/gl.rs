//! OpenGL 3.3 core backend built on `glow`
//!
//! Resource handles handed out to the engine are slotmap keys; the native GL
//! names live only inside [`GlDevice`]. Creation commands leave the new object
//! bound (texture on the active slot, vertex array, framebuffer on both
//! targets); the state cache records that binding.
//!
//! Every `unsafe` block here calls into the driver through `glow`. They are
//! sound as long as the context is current on the calling thread and every
//! native name came from this same context, which [`GlDevice`] guarantees by
//! owning both.

#![allow(unsafe_code)]

use glow::HasContext;
use slotmap::SlotMap;

use crate::foundation::math::Vec4;
use crate::render::api::{
    Attachment, BlendFactor, BufferId, Capability, ClearMask, Face, FramebufferBinding, FramebufferId,
    GpuDevice, ProgramId, ProgramSources, RenderbufferId, StencilFunc, StencilOp, TextureDesc,
    TextureFilter, TextureFormat, TextureId, TextureKind, UniformLocation, UniformValue, VertexArrayId,
    VertexAttribute,
};

/// [`GpuDevice`] issuing real OpenGL commands
pub struct GlDevice {
    gl: glow::Context,
    programs: SlotMap<ProgramId, glow::NativeProgram>,
    textures: SlotMap<TextureId, glow::NativeTexture>,
    vertex_arrays: SlotMap<VertexArrayId, glow::NativeVertexArray>,
    buffers: SlotMap<BufferId, glow::NativeBuffer>,
    framebuffers: SlotMap<FramebufferId, glow::NativeFramebuffer>,
    renderbuffers: SlotMap<RenderbufferId, glow::NativeRenderbuffer>,
    uniforms: SlotMap<UniformLocation, glow::NativeUniformLocation>,
}

impl GlDevice {
    /// Wrap a loaded context; the context must be current on this thread
    pub fn new(gl: glow::Context) -> Self {
        // SAFETY: context is current, see module docs.
        let version = unsafe { gl.get_parameter_string(glow::VERSION) };
        log::info!(target: "gl_device", "OpenGL context: {}", version);
        Self {
            gl,
            programs: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            vertex_arrays: SlotMap::with_key(),
            buffers: SlotMap::with_key(),
            framebuffers: SlotMap::with_key(),
            renderbuffers: SlotMap::with_key(),
            uniforms: SlotMap::with_key(),
        }
    }

    fn compile_stage(&self, stage: u32, source: &str) -> Result<glow::NativeShader, String> {
        // SAFETY: context is current, see module docs.
        unsafe {
            let shader = self.gl.create_shader(stage)?;
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
            if self.gl.get_shader_compile_status(shader) {
                Ok(shader)
            } else {
                let log = self.gl.get_shader_info_log(shader);
                self.gl.delete_shader(shader);
                Err(log)
            }
        }
    }

    const fn texture_target(kind: TextureKind) -> u32 {
        match kind {
            TextureKind::Texture2D => glow::TEXTURE_2D,
            TextureKind::Texture2DMultisample => glow::TEXTURE_2D_MULTISAMPLE,
            TextureKind::TextureCube => glow::TEXTURE_CUBE_MAP,
        }
    }

    /// (internal format, pixel format, pixel type)
    const fn texel_layout(format: TextureFormat) -> (u32, u32, u32) {
        match format {
            TextureFormat::Red => (glow::R8, glow::RED, glow::UNSIGNED_BYTE),
            TextureFormat::Rgb => (glow::RGB8, glow::RGB, glow::UNSIGNED_BYTE),
            TextureFormat::Rgba => (glow::RGBA8, glow::RGBA, glow::UNSIGNED_BYTE),
            TextureFormat::Depth => (glow::DEPTH_COMPONENT24, glow::DEPTH_COMPONENT, glow::FLOAT),
        }
    }

    const fn framebuffer_target(binding: FramebufferBinding) -> u32 {
        match binding {
            FramebufferBinding::Full => glow::FRAMEBUFFER,
            FramebufferBinding::ReadOnly => glow::READ_FRAMEBUFFER,
            FramebufferBinding::WriteOnly => glow::DRAW_FRAMEBUFFER,
        }
    }

    const fn capability(capability: Capability) -> u32 {
        match capability {
            Capability::Blend => glow::BLEND,
            Capability::DepthTest => glow::DEPTH_TEST,
            Capability::CullFace => glow::CULL_FACE,
            Capability::StencilTest => glow::STENCIL_TEST,
            Capability::ClipDistance(index) => glow::CLIP_DISTANCE0 + index,
        }
    }

    const fn blend_factor(factor: BlendFactor) -> u32 {
        match factor {
            BlendFactor::SrcAlpha => glow::SRC_ALPHA,
            BlendFactor::One => glow::ONE,
            BlendFactor::OneMinusSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
        }
    }

    const fn stencil_op_value(op: StencilOp) -> u32 {
        match op {
            StencilOp::Keep => glow::KEEP,
            StencilOp::Replace => glow::REPLACE,
        }
    }

    fn mask_bits(mask: ClearMask) -> u32 {
        let mut bits = 0;
        if mask.contains(ClearMask::COLOR) {
            bits |= glow::COLOR_BUFFER_BIT;
        }
        if mask.contains(ClearMask::DEPTH) {
            bits |= glow::DEPTH_BUFFER_BIT;
        }
        if mask.contains(ClearMask::STENCIL) {
            bits |= glow::STENCIL_BUFFER_BIT;
        }
        bits
    }
}

fn gl_size(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

impl GpuDevice for GlDevice {
    fn create_program(&mut self, sources: &ProgramSources<'_>) -> Result<ProgramId, String> {
        let mut stages = vec![
            self.compile_stage(glow::VERTEX_SHADER, sources.vertex)?,
            self.compile_stage(glow::FRAGMENT_SHADER, sources.fragment)?,
        ];
        if let Some(geometry) = sources.geometry {
            stages.push(self.compile_stage(glow::GEOMETRY_SHADER, geometry)?);
        }

        // SAFETY: context is current, see module docs.
        unsafe {
            let program = self.gl.create_program()?;
            for shader in &stages {
                self.gl.attach_shader(program, *shader);
            }
            self.gl.link_program(program);
            for shader in stages {
                self.gl.detach_shader(program, shader);
                self.gl.delete_shader(shader);
            }
            if !self.gl.get_program_link_status(program) {
                let log = self.gl.get_program_info_log(program);
                self.gl.delete_program(program);
                return Err(log);
            }
            Ok(self.programs.insert(program))
        }
    }

    fn delete_program(&mut self, program: ProgramId) {
        if let Some(native) = self.programs.remove(program) {
            // SAFETY: context is current, see module docs.
            unsafe { self.gl.delete_program(native) };
        }
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        let native = program.and_then(|p| self.programs.get(p).copied());
        // SAFETY: context is current, see module docs.
        unsafe { self.gl.use_program(native) };
    }

    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let native = *self.programs.get(program)?;
        // SAFETY: context is current, see module docs.
        let location = unsafe { self.gl.get_uniform_location(native, name) }?;
        Some(self.uniforms.insert(location))
    }

    fn set_uniform(&mut self, location: UniformLocation, value: &UniformValue) {
        let Some(native) = self.uniforms.get(location) else {
            return;
        };
        // SAFETY: context is current, see module docs.
        unsafe {
            match value {
                UniformValue::Int(v) => self.gl.uniform_1_i32(Some(native), *v),
                UniformValue::Float(v) => self.gl.uniform_1_f32(Some(native), *v),
                UniformValue::Vec3(v) => self.gl.uniform_3_f32(Some(native), v.x, v.y, v.z),
                UniformValue::Vec4(v) => self.gl.uniform_4_f32(Some(native), v.x, v.y, v.z, v.w),
                UniformValue::Mat4(m) => self.gl.uniform_matrix_4_f32_slice(Some(native), false, m.as_slice()),
            }
        }
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> TextureId {
        let target = Self::texture_target(desc.kind);
        let (internal, format, ty) = Self::texel_layout(desc.format);
        let (width, height) = (gl_size(desc.width), gl_size(desc.height));

        // SAFETY: context is current, see module docs.
        unsafe {
            let texture = match self.gl.create_texture() {
                Ok(texture) => texture,
                Err(e) => {
                    log::error!(target: "gl_device", "Texture creation failed: {}", e);
                    return TextureId::default();
                }
            };
            self.gl.bind_texture(target, Some(texture));
            match desc.kind {
                TextureKind::Texture2DMultisample => {
                    self.gl.tex_image_2d_multisample(target, gl_size(desc.samples.max(1)), internal as i32, width, height, true);
                }
                TextureKind::Texture2D => {
                    self.gl.tex_image_2d(target, 0, internal as i32, width, height, 0, format, ty, None);
                    if desc.format == TextureFormat::Depth {
                        self.gl.tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, glow::NEAREST as i32);
                        self.gl.tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, glow::NEAREST as i32);
                        self.gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_BORDER as i32);
                        self.gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_BORDER as i32);
                        self.gl.tex_parameter_f32_slice(target, glow::TEXTURE_BORDER_COLOR, &[1.0, 1.0, 1.0, 1.0]);
                    } else {
                        self.gl.tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
                        self.gl.tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
                        self.gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_S, glow::REPEAT as i32);
                        self.gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_T, glow::REPEAT as i32);
                    }
                }
                TextureKind::TextureCube => {
                    for face in 0..6 {
                        self.gl.tex_image_2d(glow::TEXTURE_CUBE_MAP_POSITIVE_X + face, 0, internal as i32, width, height, 0, format, ty, None);
                    }
                    let filter = if desc.format == TextureFormat::Depth { glow::NEAREST } else { glow::LINEAR };
                    self.gl.tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, filter as i32);
                    self.gl.tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, filter as i32);
                    self.gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
                    self.gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
                    self.gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_R, glow::CLAMP_TO_EDGE as i32);
                }
            }
            self.textures.insert(texture)
        }
    }

    fn upload_texture(&mut self, desc: &TextureDesc, face: u32, data: &[u8]) {
        let (internal, format, ty) = Self::texel_layout(desc.format);
        let target = match desc.kind {
            TextureKind::TextureCube => glow::TEXTURE_CUBE_MAP_POSITIVE_X + face.min(5),
            TextureKind::Texture2D => glow::TEXTURE_2D,
            TextureKind::Texture2DMultisample => {
                log::warn!(target: "gl_device", "Multisampled textures cannot receive texel data.");
                return;
            }
        };
        // SAFETY: context is current, see module docs.
        unsafe {
            self.gl.tex_image_2d(target, 0, internal as i32, gl_size(desc.width), gl_size(desc.height), 0, format, ty, Some(data));
        }
    }

    fn set_texture_filter(&mut self, kind: TextureKind, filter: TextureFilter) {
        let target = Self::texture_target(kind);
        let (min, mag) = match filter {
            TextureFilter::Nearest => (glow::NEAREST, glow::NEAREST),
            TextureFilter::Bilinear => (glow::LINEAR, glow::LINEAR),
            TextureFilter::Trilinear => (glow::LINEAR_MIPMAP_LINEAR, glow::LINEAR),
        };
        // SAFETY: context is current, see module docs.
        unsafe {
            if filter == TextureFilter::Trilinear {
                self.gl.generate_mipmap(target);
            }
            self.gl.tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, min as i32);
            self.gl.tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, mag as i32);
        }
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if let Some(native) = self.textures.remove(texture) {
            // SAFETY: context is current, see module docs.
            unsafe { self.gl.delete_texture(native) };
        }
    }

    fn active_texture(&mut self, slot: u32) {
        // SAFETY: context is current, see module docs.
        unsafe { self.gl.active_texture(glow::TEXTURE0 + slot) };
    }

    fn bind_texture(&mut self, kind: TextureKind, texture: Option<TextureId>) {
        let native = texture.and_then(|t| self.textures.get(t).copied());
        // SAFETY: context is current, see module docs.
        unsafe { self.gl.bind_texture(Self::texture_target(kind), native) };
    }

    fn set_unpack_alignment(&mut self, alignment: i32) {
        // SAFETY: context is current, see module docs.
        unsafe { self.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, alignment) };
    }

    fn create_vertex_array(&mut self) -> VertexArrayId {
        // SAFETY: context is current, see module docs.
        unsafe {
            match self.gl.create_vertex_array() {
                Ok(vao) => {
                    self.gl.bind_vertex_array(Some(vao));
                    self.vertex_arrays.insert(vao)
                }
                Err(e) => {
                    log::error!(target: "gl_device", "Vertex array creation failed: {}", e);
                    VertexArrayId::default()
                }
            }
        }
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) {
        let native = vertex_array.and_then(|v| self.vertex_arrays.get(v).copied());
        // SAFETY: context is current, see module docs.
        unsafe { self.gl.bind_vertex_array(native) };
    }

    fn upload_attribute(&mut self, attribute: VertexAttribute, components: i32, data: &[f32], dynamic: bool) -> BufferId {
        let usage = if dynamic { glow::DYNAMIC_DRAW } else { glow::STATIC_DRAW };
        // SAFETY: context is current, see module docs.
        unsafe {
            let buffer = match self.gl.create_buffer() {
                Ok(buffer) => buffer,
                Err(e) => {
                    log::error!(target: "gl_device", "Buffer creation failed: {}", e);
                    return BufferId::default();
                }
            };
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
            self.gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, bytemuck::cast_slice(data), usage);
            self.gl.vertex_attrib_pointer_f32(attribute.location(), components, glow::FLOAT, false, 0, 0);
            self.gl.enable_vertex_attrib_array(attribute.location());
            self.buffers.insert(buffer)
        }
    }

    fn update_attribute(&mut self, buffer: BufferId, data: &[f32]) {
        let Some(native) = self.buffers.get(buffer).copied() else {
            return;
        };
        // SAFETY: context is current, see module docs.
        unsafe {
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(native));
            self.gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, bytemuck::cast_slice(data), glow::DYNAMIC_DRAW);
        }
    }

    fn upload_indices(&mut self, indices: &[u32]) -> BufferId {
        // SAFETY: context is current, see module docs.
        unsafe {
            let buffer = match self.gl.create_buffer() {
                Ok(buffer) => buffer,
                Err(e) => {
                    log::error!(target: "gl_device", "Index buffer creation failed: {}", e);
                    return BufferId::default();
                }
            };
            self.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(buffer));
            self.gl.buffer_data_u8_slice(glow::ELEMENT_ARRAY_BUFFER, bytemuck::cast_slice(indices), glow::STATIC_DRAW);
            self.buffers.insert(buffer)
        }
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayId, buffers: &[BufferId]) {
        // SAFETY: context is current, see module docs.
        unsafe {
            for buffer in buffers {
                if let Some(native) = self.buffers.remove(*buffer) {
                    self.gl.delete_buffer(native);
                }
            }
            if let Some(native) = self.vertex_arrays.remove(vertex_array) {
                self.gl.delete_vertex_array(native);
            }
        }
    }

    fn draw_arrays(&mut self, first: i32, count: i32) {
        // SAFETY: context is current, see module docs.
        unsafe { self.gl.draw_arrays(glow::TRIANGLES, first, count) };
    }

    fn draw_elements(&mut self, count: i32, offset: i32) {
        // SAFETY: context is current, see module docs.
        unsafe { self.gl.draw_elements(glow::TRIANGLES, count, glow::UNSIGNED_INT, offset) };
    }

    fn create_framebuffer(&mut self) -> Result<FramebufferId, String> {
        // SAFETY: context is current, see module docs.
        unsafe {
            let framebuffer = self.gl.create_framebuffer()?;
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
            Ok(self.framebuffers.insert(framebuffer))
        }
    }

    fn bind_framebuffer(&mut self, binding: FramebufferBinding, framebuffer: Option<FramebufferId>) {
        let native = framebuffer.and_then(|f| self.framebuffers.get(f).copied());
        // SAFETY: context is current, see module docs.
        unsafe { self.gl.bind_framebuffer(Self::framebuffer_target(binding), native) };
    }

    fn attach_texture(&mut self, attachment: Attachment, kind: TextureKind, texture: TextureId) {
        let native = self.textures.get(texture).copied();
        let point = match attachment {
            Attachment::Color0 => glow::COLOR_ATTACHMENT0,
            Attachment::Depth => glow::DEPTH_ATTACHMENT,
            Attachment::DepthStencil => glow::DEPTH_STENCIL_ATTACHMENT,
        };
        // SAFETY: context is current, see module docs.
        unsafe {
            match kind {
                TextureKind::TextureCube => self.gl.framebuffer_texture(glow::FRAMEBUFFER, point, native, 0),
                _ => self.gl.framebuffer_texture_2d(glow::FRAMEBUFFER, point, Self::texture_target(kind), native, 0),
            }
        }
    }

    fn create_renderbuffer(&mut self, width: u32, height: u32, samples: u32) -> Result<RenderbufferId, String> {
        // SAFETY: context is current, see module docs.
        unsafe {
            let renderbuffer = self.gl.create_renderbuffer()?;
            self.gl.bind_renderbuffer(glow::RENDERBUFFER, Some(renderbuffer));
            if samples > 1 {
                self.gl.renderbuffer_storage_multisample(glow::RENDERBUFFER, gl_size(samples), glow::DEPTH24_STENCIL8, gl_size(width), gl_size(height));
            } else {
                self.gl.renderbuffer_storage(glow::RENDERBUFFER, glow::DEPTH24_STENCIL8, gl_size(width), gl_size(height));
            }
            self.gl.bind_renderbuffer(glow::RENDERBUFFER, None);
            Ok(self.renderbuffers.insert(renderbuffer))
        }
    }

    fn attach_renderbuffer(&mut self, renderbuffer: RenderbufferId) {
        let native = self.renderbuffers.get(renderbuffer).copied();
        // SAFETY: context is current, see module docs.
        unsafe {
            self.gl.framebuffer_renderbuffer(glow::FRAMEBUFFER, glow::DEPTH_STENCIL_ATTACHMENT, glow::RENDERBUFFER, native);
        }
    }

    fn disable_color_buffers(&mut self) {
        // SAFETY: context is current, see module docs.
        unsafe {
            self.gl.draw_buffer(glow::NONE);
            self.gl.read_buffer(glow::NONE);
        }
    }

    fn framebuffer_complete(&mut self) -> bool {
        // SAFETY: context is current, see module docs.
        unsafe { self.gl.check_framebuffer_status(glow::FRAMEBUFFER) == glow::FRAMEBUFFER_COMPLETE }
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId, renderbuffer: Option<RenderbufferId>) {
        // SAFETY: context is current, see module docs.
        unsafe {
            if let Some(native) = renderbuffer.and_then(|r| self.renderbuffers.remove(r)) {
                self.gl.delete_renderbuffer(native);
            }
            if let Some(native) = self.framebuffers.remove(framebuffer) {
                self.gl.delete_framebuffer(native);
            }
        }
    }

    fn blit_framebuffer(&mut self, width: u32, height: u32, mask: ClearMask, linear: bool) {
        let (w, h) = (gl_size(width), gl_size(height));
        let filter = if linear { glow::LINEAR } else { glow::NEAREST };
        // SAFETY: context is current, see module docs.
        unsafe { self.gl.blit_framebuffer(0, 0, w, h, 0, 0, w, h, Self::mask_bits(mask), filter) };
    }

    fn set_capability(&mut self, capability: Capability, enabled: bool) {
        let cap = Self::capability(capability);
        // SAFETY: context is current, see module docs.
        unsafe {
            if enabled {
                self.gl.enable(cap);
            } else {
                self.gl.disable(cap);
            }
        }
    }

    fn blend_func(&mut self, source: BlendFactor, destination: BlendFactor) {
        // SAFETY: context is current, see module docs.
        unsafe { self.gl.blend_func(Self::blend_factor(source), Self::blend_factor(destination)) };
    }

    fn depth_mask(&mut self, enabled: bool) {
        // SAFETY: context is current, see module docs.
        unsafe { self.gl.depth_mask(enabled) };
    }

    fn cull_face(&mut self, face: Face) {
        let mode = match face {
            Face::Back => glow::BACK,
            Face::Front => glow::FRONT,
            Face::FrontAndBack => glow::FRONT_AND_BACK,
        };
        // SAFETY: context is current, see module docs.
        unsafe { self.gl.cull_face(mode) };
    }

    fn stencil_mask(&mut self, mask: u32) {
        // SAFETY: context is current, see module docs.
        unsafe { self.gl.stencil_mask(mask) };
    }

    fn stencil_func(&mut self, func: StencilFunc, reference: i32, mask: u32) {
        let func = match func {
            StencilFunc::Always => glow::ALWAYS,
            StencilFunc::NotEqual => glow::NOTEQUAL,
        };
        // SAFETY: context is current, see module docs.
        unsafe { self.gl.stencil_func(func, reference, mask) };
    }

    fn stencil_op(&mut self, stencil_fail: StencilOp, depth_fail: StencilOp, pass: StencilOp) {
        // SAFETY: context is current, see module docs.
        unsafe {
            self.gl.stencil_op(
                Self::stencil_op_value(stencil_fail),
                Self::stencil_op_value(depth_fail),
                Self::stencil_op_value(pass),
            );
        }
    }

    fn polygon_mode(&mut self, wireframe: bool) {
        let mode = if wireframe { glow::LINE } else { glow::FILL };
        // SAFETY: context is current, see module docs.
        unsafe { self.gl.polygon_mode(glow::FRONT_AND_BACK, mode) };
    }

    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        // SAFETY: context is current, see module docs.
        unsafe { self.gl.viewport(x, y, gl_size(width), gl_size(height)) };
    }

    fn clear_color(&mut self, color: Vec4) {
        // SAFETY: context is current, see module docs.
        unsafe { self.gl.clear_color(color.x, color.y, color.z, color.w) };
    }

    fn clear(&mut self, mask: ClearMask) {
        // SAFETY: context is current, see module docs.
        unsafe { self.gl.clear(Self::mask_bits(mask)) };
    }
}
