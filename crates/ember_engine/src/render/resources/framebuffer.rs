//! Offscreen render targets
//!
//! A [`FrameBuffer`] owns at most one RGB color texture, one depth texture,
//! one depth cube map and one depth-stencil renderbuffer. The textures are
//! reference counted so other renderers can sample them after the pass that
//! filled them. Dropping a framebuffer releases the framebuffer object and its
//! renderbuffer; each texture goes when its last owner lets go.

use std::rc::Rc;

use crate::error::{EngineError, EngineResult};
use crate::render::api::{Attachment, FramebufferId, RenderbufferId, TextureDesc, TextureFormat, TextureKind};
use crate::render::resources::Texture;
use crate::render::state::{ReleaseQueue, Released, StateCache};

/// GPU framebuffer with its attachments
#[derive(Debug)]
pub struct FrameBuffer {
    id: FramebufferId,
    name: String,
    width: u32,
    height: u32,
    rgb_texture: Option<Rc<Texture>>,
    depth_texture: Option<Rc<Texture>>,
    depth_cube_texture: Option<Rc<Texture>>,
    depth_stencil_buffer: Option<RenderbufferId>,
    releases: ReleaseQueue,
}

impl FrameBuffer {
    /// Start describing a framebuffer
    pub fn builder(name: impl Into<String>) -> FrameBufferBuilder {
        FrameBufferBuilder {
            name: name.into(),
            size: (0, 0),
            samples: 1,
            rgb: false,
            depth: false,
            depth_cube: false,
            depth_stencil: false,
            color_buffers: true,
        }
    }

    /// Device handle
    pub fn id(&self) -> FramebufferId {
        self.id
    }

    /// Framebuffer name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attachment size
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// RGB color attachment
    pub fn rgb_texture(&self) -> Option<&Rc<Texture>> {
        self.rgb_texture.as_ref()
    }

    /// Depth attachment
    pub fn depth_texture(&self) -> Option<&Rc<Texture>> {
        self.depth_texture.as_ref()
    }

    /// Depth cube-map attachment
    pub fn depth_cube_texture(&self) -> Option<&Rc<Texture>> {
        self.depth_cube_texture.as_ref()
    }

    /// Whether a depth-stencil renderbuffer is attached
    pub fn has_depth_stencil_buffer(&self) -> bool {
        self.depth_stencil_buffer.is_some()
    }
}

impl Drop for FrameBuffer {
    fn drop(&mut self) {
        log::trace!(target: "frame_buffer", "Frame buffer [{}] released.", self.name);
        self.releases.push(Released::Framebuffer(self.id, self.depth_stencil_buffer));
    }
}

/// Builder for [`FrameBuffer`]
#[derive(Debug, Clone)]
pub struct FrameBufferBuilder {
    name: String,
    size: (u32, u32),
    samples: u32,
    rgb: bool,
    depth: bool,
    depth_cube: bool,
    depth_stencil: bool,
    color_buffers: bool,
}

impl FrameBufferBuilder {
    /// Size of every attachment (cube faces use the width)
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
    }

    /// Multisample color and depth-stencil attachments
    pub fn with_samples(mut self, samples: u32) -> Self {
        self.samples = samples.max(1);
        self
    }

    /// Attach an RGB color texture
    pub fn with_rgb_texture(mut self) -> Self {
        self.rgb = true;
        self
    }

    /// Attach a depth texture
    pub fn with_depth_texture(mut self) -> Self {
        self.depth = true;
        self
    }

    /// Attach a depth cube map
    pub fn with_depth_cube_texture(mut self) -> Self {
        self.depth_cube = true;
        self
    }

    /// Attach a depth-stencil renderbuffer
    pub fn with_depth_stencil_buffer(mut self) -> Self {
        self.depth_stencil = true;
        self
    }

    /// Disable color draw/read buffers (depth-only targets)
    pub fn without_color_buffers(mut self) -> Self {
        self.color_buffers = false;
        self
    }

    /// Create the framebuffer and its attachments
    ///
    /// Leaves the default framebuffer bound.
    pub fn build(self, state: &mut StateCache) -> EngineResult<FrameBuffer> {
        let (width, height) = self.size;
        let attachments = self.rgb || self.depth || self.depth_cube || self.depth_stencil;
        if attachments && (width == 0 || height == 0) {
            return Err(EngineError::usage(
                &self.name,
                "FrameBufferBuilder::build",
                "Frame buffer size value out of range: {0 < VALUE}.",
            ));
        }

        let id = state
            .create_framebuffer()
            .map_err(|e| EngineError::resource(&self.name, "FrameBufferBuilder::build", format!("Frame buffer creation failed: {e}")))?;
        let mut framebuffer = FrameBuffer {
            id,
            name: self.name.clone(),
            width,
            height,
            rgb_texture: None,
            depth_texture: None,
            depth_cube_texture: None,
            depth_stencil_buffer: None,
            releases: state.release_queue(),
        };

        if self.rgb {
            let kind = if self.samples > 1 { TextureKind::Texture2DMultisample } else { TextureKind::Texture2D };
            let desc = TextureDesc { kind, width, height, format: TextureFormat::Rgb, samples: self.samples };
            let texture = Texture::create(state, format!("{}_rgb", self.name), desc);
            state.device().attach_texture(Attachment::Color0, kind, texture.id());
            framebuffer.rgb_texture = Some(Rc::new(texture));
        }

        if self.depth {
            let desc = TextureDesc { kind: TextureKind::Texture2D, width, height, format: TextureFormat::Depth, samples: 1 };
            let texture = Texture::create(state, format!("{}_depth", self.name), desc);
            state.device().attach_texture(Attachment::Depth, TextureKind::Texture2D, texture.id());
            framebuffer.depth_texture = Some(Rc::new(texture));
        }

        if self.depth_cube {
            let desc = TextureDesc { kind: TextureKind::TextureCube, width, height: width, format: TextureFormat::Depth, samples: 1 };
            let texture = Texture::create(state, format!("{}_depth_cube", self.name), desc);
            state.device().attach_texture(Attachment::Depth, TextureKind::TextureCube, texture.id());
            framebuffer.depth_cube_texture = Some(Rc::new(texture));
        }

        if self.depth_stencil {
            let renderbuffer = match state.device().create_renderbuffer(width, height, self.samples) {
                Ok(renderbuffer) => renderbuffer,
                Err(e) => {
                    state.unbind_framebuffer();
                    return Err(EngineError::resource(
                        &self.name,
                        "FrameBufferBuilder::build",
                        format!("Depth-stencil buffer creation failed: {e}"),
                    ));
                }
            };
            state.device().attach_renderbuffer(renderbuffer);
            framebuffer.depth_stencil_buffer = Some(renderbuffer);
        }

        if !self.color_buffers {
            state.device().disable_color_buffers();
        }

        let complete = state.device().framebuffer_complete();
        state.unbind_framebuffer();
        if !complete {
            return Err(EngineError::resource(
                &self.name,
                "FrameBufferBuilder::build",
                "Frame buffer is not complete.",
            ));
        }

        log::debug!(target: "frame_buffer", "Frame buffer [{}] created ({}x{}).", self.name, width, height);
        Ok(framebuffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::recording::{GpuCall, RecordingDevice};

    #[test]
    fn test_depth_only_framebuffer() {
        let device = RecordingDevice::new();
        let log = device.log();
        let mut state = StateCache::new(Box::new(device));

        let fb = FrameBuffer::builder("depth_map_dir_light")
            .with_size(1024, 1024)
            .with_depth_texture()
            .without_color_buffers()
            .build(&mut state)
            .unwrap();

        assert!(fb.depth_texture().is_some());
        assert!(fb.rgb_texture().is_none());
        assert_eq!(log.count(|c| matches!(c, GpuCall::AttachTexture(Attachment::Depth, _))), 1);
        assert_eq!(log.count(|c| *c == GpuCall::DisableColorBuffers), 1);
        assert_eq!(state.bound_draw_framebuffer(), None);
    }

    #[test]
    fn test_multisampled_color_attachment() {
        let mut state = StateCache::new(Box::new(RecordingDevice::new()));
        let fb = FrameBuffer::builder("multisample")
            .with_size(800, 600)
            .with_samples(4)
            .with_rgb_texture()
            .with_depth_stencil_buffer()
            .build(&mut state)
            .unwrap();
        assert_eq!(fb.rgb_texture().map(|t| t.kind()), Some(TextureKind::Texture2DMultisample));
        assert!(fb.has_depth_stencil_buffer());
    }

    #[test]
    fn test_incomplete_framebuffer_is_an_error() {
        let mut state = StateCache::new(Box::new(RecordingDevice::new().with_incomplete_framebuffers()));
        let result = FrameBuffer::builder("broken").with_size(4, 4).with_rgb_texture().build(&mut state);
        assert!(matches!(result, Err(EngineError::ResourceLoad { .. })));
    }

    #[test]
    fn test_creation_failure_is_an_error() {
        let device = RecordingDevice::new().with_failing_framebuffers();
        let mut state = StateCache::new(Box::new(device));
        let result = FrameBuffer::builder("refused").with_size(4, 4).with_depth_texture().build(&mut state);
        assert!(matches!(result, Err(EngineError::ResourceLoad { .. })));
    }

    #[test]
    fn test_dropping_releases_framebuffer_and_unshared_textures() {
        let device = RecordingDevice::new();
        let log = device.log();
        let mut state = StateCache::new(Box::new(device));
        let fb = FrameBuffer::builder("reflection")
            .with_size(64, 64)
            .with_rgb_texture()
            .with_depth_texture()
            .build(&mut state)
            .unwrap();
        let sampled = Rc::clone(fb.rgb_texture().unwrap());
        drop(fb);
        state.collect_released();

        assert_eq!(log.count(|c| matches!(c, GpuCall::DeleteFramebuffer(_))), 1);
        assert_eq!(log.count(|c| matches!(c, GpuCall::DeleteTexture(_))), 1, "Sampled color texture stays alive");

        drop(sampled);
        state.collect_released();
        assert_eq!(log.count(|c| matches!(c, GpuCall::DeleteTexture(_))), 2);
    }

    #[test]
    fn test_zero_size_is_rejected() {
        let mut state = StateCache::new(Box::new(RecordingDevice::new()));
        let result = FrameBuffer::builder("empty").with_rgb_texture().build(&mut state);
        assert!(matches!(result, Err(EngineError::Usage { .. })));
    }
}
