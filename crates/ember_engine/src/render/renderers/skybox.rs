//! Skybox pass

use super::FrameContext;
use crate::error::EngineResult;
use crate::render::api::TextureKind;
use crate::render::mesh::{MeshKind, Skybox};
use crate::render::resources::{BuiltinShader, ShaderLibrary, ShaderProgram};
use crate::render::state::StateCache;

const CUBE_TEXTURE_SLOT: u32 = 0;

/// Draws the active skybox behind everything else
///
/// Depth writes are off so later passes always cover the sky.
pub struct SkyboxRenderer {
    shader: ShaderProgram,
}

impl SkyboxRenderer {
    /// Build the skybox shader
    pub fn new(state: &mut StateCache, library: &ShaderLibrary) -> EngineResult<Self> {
        let shader = library.load(state, BuiltinShader::Skybox)?;
        log::debug!(target: "skybox_renderer", "Skybox renderer created.");
        Ok(Self { shader })
    }

    /// Draw `skybox`, if any
    pub fn render(&mut self, state: &mut StateCache, ctx: &FrameContext<'_>, skybox: Option<&Skybox>) {
        let Some(skybox) = skybox else { return };

        state.unbind_all_textures();
        let shader = &mut self.shader;
        state.activate_shader_program(shader);
        {
            let camera = ctx.camera.borrow();
            shader.set_uniform(state, "matrices.view_matrix", camera.static_view_matrix());
            shader.set_uniform(state, "matrices.projection_matrix", camera.projection_matrix());
        }
        shader.set_uniform(state, "matrices.model_matrix", skybox.transform().model_matrix());

        shader.set_uniform(state, "color.filter_color", skybox.filter_color());
        shader.set_uniform(state, "color.cube_texture", CUBE_TEXTURE_SLOT);
        shader.set_uniform(state, "color.light_color", ctx.lights.directional_light().color());

        let fog = ctx.fog;
        shader.set_uniform(state, "fog.enabled", fog.enabled);
        shader.set_uniform(state, "fog.color", fog.color);
        shader.set_uniform(state, "fog.density", fog.skybox.density);
        shader.set_uniform(state, "fog.transition_power", fog.skybox.transition_power);
        shader.set_uniform(state, "fog.height", fog.skybox.height);

        state.enable_depth_test(true);
        state.enable_depth_mask(false);
        state.enable_blend(false);

        state.set_texture_slot(CUBE_TEXTURE_SLOT);
        match skybox.texture() {
            Some(texture) => state.bind_texture(texture),
            None => state.unbind_texture(TextureKind::TextureCube),
        }

        state.bind_mesh(skybox.buffers());
        MeshKind::SkyboxCube.draw(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::render::api::{Capability, UniformValue};
    use crate::render::backends::recording::GpuCall;
    use crate::render::renderers::test_support::fixture;

    #[test]
    fn test_no_skybox_draws_nothing() {
        let (mut state, log, settings) = fixture();
        let mut renderer = SkyboxRenderer::new(&mut state, &ShaderLibrary::Embedded).unwrap();
        log.clear();
        renderer.render(&mut state, &settings.context(), None);
        assert!(log.calls().is_empty());
    }

    #[test]
    fn test_draws_cube_without_depth_writes() {
        let (mut state, log, mut settings) = fixture();
        let mut renderer = SkyboxRenderer::new(&mut state, &ShaderLibrary::Embedded).unwrap();
        let mut skybox = Skybox::new(&mut state, "sky");
        skybox.set_filter_color(Vec3::new(0.5, 0.5, 0.5));
        settings.camera.borrow_mut().set_position(Vec3::new(10.0, 2.0, 3.0));
        log.clear();

        renderer.render(&mut state, &settings.context(), Some(&skybox));

        assert_eq!(log.count(|c| matches!(c, GpuCall::DrawArrays { first: 0, count: 36 })), 1);
        assert!(log.calls().iter().any(|c| matches!(c, GpuCall::DepthMask(false))));
        assert!(!log.calls().iter().any(|c| matches!(c, GpuCall::SetCapability(Capability::Blend, true))));
        assert_eq!(log.last_uniform("color.filter_color"), Some(UniformValue::Vec3(Vec3::new(0.5, 0.5, 0.5))));

        // The static view ignores the camera position
        match log.last_uniform("matrices.view_matrix") {
            Some(UniformValue::Mat4(view)) => approx::assert_relative_eq!(view[(0, 3)], 0.0),
            other => panic!("Unexpected uniform: {:?}", other),
        }
    }
}
