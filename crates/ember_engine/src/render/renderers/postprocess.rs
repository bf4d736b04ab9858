//! Postprocess pass
//!
//! The visible scene is drawn into a multisampled target. At the end of the
//! frame it is resolved into a single-sample texture with a blit and drawn
//! on a full-screen quad through the effect shader.

use super::clear_target;
use crate::error::EngineResult;
use crate::foundation::math::Vec3;
use crate::render::api::{ClearMask, FramebufferBinding, TextureKind};
use crate::render::mesh::{MeshBuffers, MeshData, MeshKind};
use crate::render::resources::{BuiltinShader, FrameBuffer, ShaderLibrary, ShaderProgram};
use crate::render::settings::PostprocessConfig;
use crate::render::state::StateCache;

const SCREEN_TEXTURE_SLOT: u32 = 0;

#[rustfmt::skip]
const SCREEN_POSITIONS: [f32; 18] = [
    -1.0,  1.0, 0.0,  -1.0, -1.0, 0.0,   1.0,  1.0, 0.0,
     1.0,  1.0, 0.0,  -1.0, -1.0, 0.0,   1.0, -1.0, 0.0,
];

#[rustfmt::skip]
const SCREEN_TEX_COORDS: [f32; 12] = [
    0.0, 1.0,  0.0, 0.0,  1.0, 1.0,
    1.0, 1.0,  0.0, 0.0,  1.0, 0.0,
];

/// Multisampled scene target plus the full-screen effect pass
pub struct PostprocessRenderer {
    shader: ShaderProgram,
    screen: MeshBuffers,
    multisample_framebuffer: FrameBuffer,
    resolve_framebuffer: FrameBuffer,
}

impl PostprocessRenderer {
    /// Create targets of `size` pixels with `samples` samples per pixel
    pub fn new(state: &mut StateCache, library: &ShaderLibrary, size: (u32, u32), samples: u32) -> EngineResult<Self> {
        let shader = library.load(state, BuiltinShader::Postprocess)?;
        let screen = MeshBuffers::upload(
            state,
            &MeshData::positions(SCREEN_POSITIONS.to_vec(), 3).with_tex_coords(SCREEN_TEX_COORDS.to_vec()),
        );

        let (width, height) = size;
        let multisample_framebuffer = FrameBuffer::builder("postprocess_frame_buffer_multisample")
            .with_size(width, height)
            .with_samples(samples)
            .with_rgb_texture()
            .with_depth_stencil_buffer()
            .build(state)?;
        let resolve_framebuffer = FrameBuffer::builder("postprocess_frame_buffer_simple")
            .with_size(width, height)
            .with_rgb_texture()
            .build(state)?;

        log::debug!(target: "postprocess_renderer", "Postprocess renderer created ({}x{}, {} samples).", width, height, samples);
        Ok(Self { shader, screen, multisample_framebuffer, resolve_framebuffer })
    }

    /// Target the visible scene is drawn into
    pub fn scene_framebuffer(&self) -> &FrameBuffer {
        &self.multisample_framebuffer
    }

    /// Single-sample copy of the scene, valid after [`Self::render`]
    pub fn resolved_framebuffer(&self) -> &FrameBuffer {
        &self.resolve_framebuffer
    }

    /// Bind the scene target and clear it to `background`
    pub fn begin_scene(&self, state: &mut StateCache, background: Vec3) {
        state.bind_framebuffer(&self.multisample_framebuffer, FramebufferBinding::Full);
        clear_target(state, background, self.multisample_framebuffer.size());
    }

    /// Resolve the scene and draw it to the default framebuffer through `config`'s effect
    pub fn render(&mut self, state: &mut StateCache, config: &PostprocessConfig, background: Vec3, display_size: (u32, u32)) {
        state.enable_blend(false);
        let shader = &mut self.shader;
        state.activate_shader_program(shader);
        shader.set_uniform(state, "color.screen_texture", SCREEN_TEXTURE_SLOT);
        shader.set_uniform(state, "color.kernel_size", config.kernel_size);
        shader.set_uniform(state, "color.effect", config.effect.shader_id());
        shader.set_uniform(state, "color.tint_color", config.tint_color);

        state.bind_mesh(&self.screen);
        self.resolve(state);
        state.set_texture_slot(SCREEN_TEXTURE_SLOT);
        match self.resolve_framebuffer.rgb_texture() {
            Some(texture) => state.bind_texture(texture),
            None => state.unbind_texture(TextureKind::Texture2D),
        }

        state.unbind_framebuffer();
        clear_target(state, background, display_size);
        MeshKind::ScreenQuad.draw(state);
    }

    fn resolve(&self, state: &mut StateCache) {
        let (width, height) = self.multisample_framebuffer.size();
        state.bind_framebuffer(&self.multisample_framebuffer, FramebufferBinding::ReadOnly);
        state.bind_framebuffer(&self.resolve_framebuffer, FramebufferBinding::WriteOnly);
        state.device().blit_framebuffer(width, height, ClearMask::COLOR, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::{TextureDesc, UniformValue};
    use crate::render::backends::recording::GpuCall;
    use crate::render::renderers::test_support::fixture;
    use crate::render::settings::PostprocessEffect;

    #[test]
    fn test_scene_target_is_multisampled() {
        let (mut state, log, _settings) = fixture();
        let renderer = PostprocessRenderer::new(&mut state, &ShaderLibrary::Embedded, (320, 180), 4).unwrap();
        assert_eq!(renderer.scene_framebuffer().size(), (320, 180));
        assert!(renderer.scene_framebuffer().has_depth_stencil_buffer());
        assert!(log.calls().iter().any(|c| matches!(
            c,
            GpuCall::CreateTexture(_, TextureDesc { kind: TextureKind::Texture2DMultisample, samples: 4, .. })
        )));
        assert_eq!(
            renderer.resolved_framebuffer().rgb_texture().map(|t| t.kind()),
            Some(TextureKind::Texture2D)
        );
    }

    #[test]
    fn test_resolve_then_draw_to_default_framebuffer() {
        let (mut state, log, _settings) = fixture();
        let mut renderer = PostprocessRenderer::new(&mut state, &ShaderLibrary::Embedded, (320, 180), 4).unwrap();
        let config = PostprocessConfig { effect: PostprocessEffect::Grayscale, ..PostprocessConfig::default() };
        renderer.begin_scene(&mut state, Vec3::zeros());
        assert_eq!(state.bound_draw_framebuffer(), Some(renderer.scene_framebuffer().id()));
        log.clear();

        renderer.render(&mut state, &config, Vec3::zeros(), (640, 360));

        let blit = log.position(|c| matches!(c, GpuCall::Blit { width: 320, height: 180, linear: true, .. })).unwrap();
        let unbind = log.position(|c| matches!(c, GpuCall::BindFramebuffer(FramebufferBinding::Full, None))).unwrap();
        let draw = log.position(|c| matches!(c, GpuCall::DrawArrays { first: 0, count: 6 })).unwrap();
        assert!(blit < unbind && unbind < draw);
        assert_eq!(log.last_uniform("color.effect"), Some(UniformValue::Int(2)));
        assert!(log.calls().iter().any(|c| matches!(c, GpuCall::Viewport { width: 640, height: 360, .. })));
        assert_eq!(state.bound_draw_framebuffer(), None);
    }
}
