//! Particle pass
//!
//! Every particle is a camera-facing quad: the model matrix carries the
//! particle position and the transpose of the view rotation, so the view
//! transform cancels out and only the scale remains. Systems are advanced
//! after they are drawn.

use super::FrameContext;
use crate::error::EngineResult;
use crate::foundation::math::{Mat4, Vec3};
use crate::render::api::{Face, TextureKind};
use crate::render::mesh::{MeshBuffers, MeshData, MeshKind, ParticleSystem};
use crate::render::resources::{BuiltinShader, ShaderLibrary, ShaderProgram};
use crate::render::state::StateCache;

const PARTICLE_TEXTURE_SLOT: u32 = 0;

#[rustfmt::skip]
const QUAD_POSITIONS: [f32; 18] = [
    -0.1,  0.1, 0.0,  -0.1, -0.1, 0.0,   0.1,  0.1, 0.0,
     0.1,  0.1, 0.0,  -0.1, -0.1, 0.0,   0.1, -0.1, 0.0,
];

/// Draws particle systems as textured billboards
pub struct ParticleRenderer {
    shader: ShaderProgram,
    quad: MeshBuffers,
}

impl ParticleRenderer {
    /// Build the particle shader and the shared billboard quad
    pub fn new(state: &mut StateCache, library: &ShaderLibrary) -> EngineResult<Self> {
        let shader = library.load(state, BuiltinShader::Particle)?;
        let quad = MeshBuffers::upload(state, &MeshData::positions(QUAD_POSITIONS.to_vec(), 3));
        log::debug!(target: "particle_renderer", "Particle renderer created.");
        Ok(Self { shader, quad })
    }

    /// Draw every system, then advance it by the frame delta
    pub fn render(&mut self, state: &mut StateCache, ctx: &FrameContext<'_>, systems: &mut [ParticleSystem]) -> EngineResult<()> {
        if systems.is_empty() {
            return Ok(());
        }

        state.bind_mesh(&self.quad);
        state.enable_depth_test(true);
        state.enable_face_cull(true);
        state.set_culled_side(Face::Back);
        state.enable_blend(true);
        // Particles are sorted back to front, not depth tested against each other
        state.enable_depth_mask(false);

        state.set_texture_slot(PARTICLE_TEXTURE_SLOT);
        let shader = &mut self.shader;
        state.activate_shader_program(shader);

        let (view, camera_position) = {
            let camera = ctx.camera.borrow();
            shader.set_uniform(state, "view_matrix", camera.view_matrix());
            shader.set_uniform(state, "projection_matrix", camera.projection_matrix());
            (camera.view_matrix(), camera.position())
        };
        shader.set_uniform(state, "particle_texture", PARTICLE_TEXTURE_SLOT);

        for system in systems.iter_mut() {
            state.set_blend_function(system.blend_function());
            match system.texture() {
                Some(texture) => state.bind_texture(texture),
                None => state.unbind_texture(TextureKind::Texture2D),
            }

            let atlas_size = system.atlas_size();
            let animated = system.is_animated();
            shader.set_uniform(state, "atlas_size", atlas_size);
            for particle in system.particles_mut() {
                shader.set_uniform(state, "model_matrix", billboard_matrix(&view, particle.position(), particle.scale()));

                if animated {
                    particle.advance_texture_index(atlas_size);
                }
                let index = particle.texture_index();
                let row = index / atlas_size.max(1);
                let col = index - row * atlas_size.max(1);
                shader.set_uniform(state, "texture_row", row);
                shader.set_uniform(state, "texture_col", col);

                MeshKind::Billboard.draw(state);
            }

            system.update(ctx.delta, camera_position)?;
        }
        Ok(())
    }
}

/// Model matrix of a quad at `position` that always faces the viewer of `view`
fn billboard_matrix(view: &Mat4, position: Vec3, scale: f32) -> Mat4 {
    let mut model = Mat4::new_translation(&position);
    let rotation = view.fixed_view::<3, 3>(0, 0).transpose();
    model.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotation);
    model * Mat4::new_scaling(scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4Ext;
    use crate::render::api::UniformValue;
    use crate::render::backends::recording::GpuCall;
    use crate::render::mesh::Particle;
    use crate::render::renderers::test_support::fixture;
    use crate::render::state::BlendFunction;

    fn system_with(particles: usize) -> ParticleSystem {
        let mut system = ParticleSystem::new("sparks", 10.0).unwrap();
        for i in 0..particles {
            system.emit(Particle::simple(Vec3::new(i as f32, 0.0, 0.0), Vec3::zeros(), 5.0, 2.0).unwrap());
        }
        system
    }

    #[test]
    fn test_billboard_cancels_view_rotation() {
        let view = Mat4::rotation_y(0.7) * Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        let model = billboard_matrix(&view, Vec3::new(4.0, 5.0, 6.0), 2.0);
        let model_view = view * model;
        approx::assert_relative_eq!(model_view[(0, 0)], 2.0, epsilon = 1e-5);
        approx::assert_relative_eq!(model_view[(1, 1)], 2.0, epsilon = 1e-5);
        approx::assert_relative_eq!(model_view[(0, 2)], 0.0, epsilon = 1e-5);
        approx::assert_relative_eq!(model[(0, 3)], 4.0);
    }

    #[test]
    fn test_one_draw_per_particle() {
        let (mut state, log, settings) = fixture();
        let mut renderer = ParticleRenderer::new(&mut state, &ShaderLibrary::Embedded).unwrap();
        let mut systems = vec![system_with(3), system_with(2)];
        systems[1].set_blend_function(BlendFunction::Additive);
        log.clear();

        renderer.render(&mut state, &settings.context(), &mut systems).unwrap();

        assert_eq!(log.count(|c| matches!(c, GpuCall::DrawArrays { first: 0, count: 6 })), 5);
        assert_eq!(log.uniform_values("model_matrix").len(), 5);
        assert_eq!(log.last_uniform("particle_texture"), Some(UniformValue::Int(0)));
        assert!(log.calls().iter().any(|c| matches!(c, GpuCall::DepthMask(false))));
        // Systems were advanced after drawing
        assert!(systems.iter().all(|s| s.particles().iter().all(|p| p.elapsed_time() > 0.0)));
    }

    #[test]
    fn test_atlas_cell_row_and_column() {
        let (mut state, log, settings) = fixture();
        let mut renderer = ParticleRenderer::new(&mut state, &ShaderLibrary::Embedded).unwrap();
        let mut system = ParticleSystem::new("smoke", 10.0).unwrap();
        system.set_atlas_size(2).unwrap();
        system.set_animated(false);
        let mut particle = Particle::simple(Vec3::zeros(), Vec3::zeros(), 4.0, 1.0).unwrap();
        // Age into the fourth cell: each of the 4 cells lasts 1 second
        for _ in 0..3 {
            particle.update(1.01);
            particle.advance_texture_index(2);
        }
        system.emit(particle);
        let mut systems = [system];
        log.clear();

        renderer.render(&mut state, &settings.context(), &mut systems).unwrap();

        assert_eq!(log.last_uniform("texture_row"), Some(UniformValue::Int(1)));
        assert_eq!(log.last_uniform("texture_col"), Some(UniformValue::Int(1)));
        assert_eq!(log.last_uniform("atlas_size"), Some(UniformValue::Int(2)));
    }
}
