//! # Water Renderer
//!
//! Two offscreen passes feed the water shader before the visible pass:
//! - **reflection**: the camera is mirrored below the surface and the scene
//!   above the water is drawn into an RGB target with a depth-stencil buffer
//! - **refraction**: the scene below the water is drawn into an RGB target
//!   with a depth texture used for shoreline softening
//!
//! Both passes draw the skybox and objects through the other renderers with
//! clip distance 0 enabled. Only the first water tile of a scene is drawn.

use std::rc::Rc;

use super::{set_fog_uniforms, set_light_sources, FrameContext, ObjectRenderer, SkyboxRenderer};
use crate::error::{ensure, EngineResult};
use crate::foundation::math::{Vec3, Vec4};
use crate::render::api::{ClearMask, FramebufferBinding, TextureKind};
use crate::render::mesh::{MeshKind, Object3D, Skybox, WaterTile};
use crate::render::resources::{BuiltinShader, FrameBuffer, ShaderLibrary, ShaderProgram, Texture};
use crate::render::settings::WaterConfig;
use crate::render::state::StateCache;

const REFLECTION_SLOT: u32 = 0;
const REFRACTION_SLOT: u32 = 1;
const DUDV_SLOT: u32 = 2;
const NORMAL_MAP_SLOT: u32 = 3;
const DEPTH_MAP_SLOT: u32 = 4;

/// Lifts the reflection clip plane slightly to hide seams at the water edge
const REFLECTION_CLIP_OFFSET: f32 = 0.02;

/// Renders reflective and refractive water tiles
pub struct WaterRenderer {
    shader: ShaderProgram,
    reflection_size: (u32, u32),
    refraction_size: (u32, u32),
    reflection_framebuffer: Option<FrameBuffer>,
    refraction_framebuffer: Option<FrameBuffer>,
    warned_extra_tiles: bool,
}

impl WaterRenderer {
    /// Build the water shader; targets are created on the first water frame
    pub fn new(state: &mut StateCache, library: &ShaderLibrary, config: &WaterConfig) -> EngineResult<Self> {
        let shader = library.load(state, BuiltinShader::Water)?;
        log::debug!(target: "water_renderer", "Water renderer created.");
        Ok(Self {
            shader,
            reflection_size: (config.reflection_width, config.reflection_height),
            refraction_size: (config.refraction_width, config.refraction_height),
            reflection_framebuffer: None,
            refraction_framebuffer: None,
            warned_extra_tiles: false,
        })
    }

    /// Size of the reflection target
    ///
    /// Ignored with a warning once the targets exist.
    pub fn set_reflection_resolution(&mut self, width: u32, height: u32) -> EngineResult<()> {
        ensure(
            width > 0 && height > 0,
            "water_renderer",
            "WaterRenderer::set_reflection_resolution",
            "Reflection resolution value out of range: {0 < VALUE}.",
        )?;
        if self.reflection_framebuffer.is_some() {
            log::warn!(target: "water_renderer", "Cannot change reflection resolution during rendering.");
            return Ok(());
        }
        self.reflection_size = (width, height);
        Ok(())
    }

    /// Size of the refraction target
    ///
    /// Ignored with a warning once the targets exist.
    pub fn set_refraction_resolution(&mut self, width: u32, height: u32) -> EngineResult<()> {
        ensure(
            width > 0 && height > 0,
            "water_renderer",
            "WaterRenderer::set_refraction_resolution",
            "Refraction resolution value out of range: {0 < VALUE}.",
        )?;
        if self.refraction_framebuffer.is_some() {
            log::warn!(target: "water_renderer", "Cannot change refraction resolution during rendering.");
            return Ok(());
        }
        self.refraction_size = (width, height);
        Ok(())
    }

    /// Reflection target size
    pub fn reflection_resolution(&self) -> (u32, u32) {
        self.reflection_size
    }

    /// Refraction target size
    pub fn refraction_resolution(&self) -> (u32, u32) {
        self.refraction_size
    }

    /// Reflection target, once created
    pub fn reflection_framebuffer(&self) -> Option<&FrameBuffer> {
        self.reflection_framebuffer.as_ref()
    }

    /// Refraction target, once created
    pub fn refraction_framebuffer(&self) -> Option<&FrameBuffer> {
        self.refraction_framebuffer.as_ref()
    }

    fn create_framebuffers(&mut self, state: &mut StateCache) -> EngineResult<()> {
        let (width, height) = self.reflection_size;
        let reflection = FrameBuffer::builder("reflection_frame_buffer")
            .with_size(width, height)
            .with_rgb_texture()
            .with_depth_stencil_buffer()
            .build(state)?;

        let (width, height) = self.refraction_size;
        let refraction = FrameBuffer::builder("refraction_frame_buffer")
            .with_size(width, height)
            .with_rgb_texture()
            .with_depth_texture()
            .build(state)?;

        self.reflection_framebuffer = Some(reflection);
        self.refraction_framebuffer = Some(refraction);
        Ok(())
    }

    fn first_tile<'t, T>(&mut self, tiles: &'t [T]) -> Option<&'t T> {
        if tiles.len() > 1 && !self.warned_extra_tiles {
            log::warn!(target: "water_renderer", "Only the first of {} water tiles is rendered.", tiles.len());
            self.warned_extra_tiles = true;
        }
        tiles.first()
    }

    /// Fill the reflection and refraction targets for the first tile
    ///
    /// The camera is mirrored for the reflection pass and restored after it.
    /// Leaves the refraction target bound.
    #[allow(clippy::too_many_arguments)]
    pub fn render_to_framebuffers(
        &mut self,
        state: &mut StateCache,
        ctx: &FrameContext<'_>,
        object_renderer: &mut ObjectRenderer,
        skybox_renderer: &mut SkyboxRenderer,
        tile: Option<&WaterTile>,
        objects: &[Object3D],
        skybox: Option<&Skybox>,
    ) -> EngineResult<()> {
        let Some(tile) = tile else { return Ok(()) };
        if self.reflection_framebuffer.is_none() || self.refraction_framebuffer.is_none() {
            self.create_framebuffers(state)?;
        }

        state.enable_depth_mask(true);
        state.enable_depth_test(true);
        state.enable_blend(false);
        state.enable_face_cull(true);

        let mirrors_box = {
            let mut camera = ctx.camera.borrow_mut();
            let mirrors_box = camera.updates_frustum_box();
            camera.set_updates_frustum_box(false);
            mirrors_box
        };
        let full_render = object_renderer.is_full_render();
        object_renderer.set_full_render(false);

        let level = tile.level();
        if let Some(reflection) = &self.reflection_framebuffer {
            let camera_position = ctx.camera.borrow().position();
            {
                let mut camera = ctx.camera.borrow_mut();
                let offset = 2.0 * (camera_position.y - level);
                camera.set_position(camera_position - Vec3::new(0.0, offset, 0.0));
                camera.flip_pitch();
            }

            render_clipped(
                state,
                ctx,
                object_renderer,
                skybox_renderer,
                reflection,
                Vec4::new(0.0, 1.0, 0.0, -level + REFLECTION_CLIP_OFFSET),
                objects,
                skybox,
            );

            let mut camera = ctx.camera.borrow_mut();
            camera.set_position(camera_position);
            camera.flip_pitch();
        }

        if let Some(refraction) = &self.refraction_framebuffer {
            render_clipped(
                state,
                ctx,
                object_renderer,
                skybox_renderer,
                refraction,
                Vec4::new(0.0, -1.0, 0.0, level),
                objects,
                skybox,
            );
        }

        object_renderer.set_full_render(full_render);
        ctx.camera.borrow_mut().set_updates_frustum_box(mirrors_box);
        Ok(())
    }

    /// Draw the first tile with the offscreen results
    ///
    /// Advances the tile's wave scroll by `wave_speed * delta`.
    pub fn render(&mut self, state: &mut StateCache, ctx: &FrameContext<'_>, tiles: &mut [WaterTile]) {
        if self.first_tile(tiles).is_none() {
            return;
        }
        let Some(tile) = tiles.first_mut() else { return };

        state.enable_depth_mask(true);
        state.enable_depth_test(true);
        state.enable_blend(false);
        state.enable_face_cull(true);

        let shader = &mut self.shader;
        state.activate_shader_program(shader);

        shader.set_uniform(state, "move_factor", tile.move_factor());
        tile.advance_move_factor(ctx.delta);

        let reflection = self.reflection_framebuffer.as_ref().and_then(FrameBuffer::rgb_texture);
        let refraction = self.refraction_framebuffer.as_ref().and_then(FrameBuffer::rgb_texture);
        let depth = self.refraction_framebuffer.as_ref().and_then(FrameBuffer::depth_texture);
        let bindings = [
            (REFLECTION_SLOT, "reflection_texture", reflection),
            (REFRACTION_SLOT, "refraction_texture", refraction),
            (DUDV_SLOT, "dudv_map", tile.dudv_texture()),
            (NORMAL_MAP_SLOT, "normal_map", tile.normal_texture()),
            (DEPTH_MAP_SLOT, "depth_map", depth),
        ];
        for (slot, name, texture) in bindings {
            shader.set_uniform(state, name, slot);
            bind_slot(state, slot, texture);
        }

        {
            let camera = ctx.camera.borrow();
            shader.set_uniform(state, "matrices.view_matrix", camera.view_matrix());
            shader.set_uniform(state, "matrices.projection_matrix", camera.projection_matrix());
            shader.set_uniform(state, "matrices.model_matrix", tile.transform().model_matrix());
            shader.set_uniform(state, "camera_position", camera.position());
            shader.set_uniform(state, "clip_near", camera.near_plane());
            shader.set_uniform(state, "clip_far", camera.far_plane());
        }

        shader.set_uniform(state, "texture_tiling", tile.texture_tiling());
        shader.set_uniform(state, "shininess", tile.shininess());
        shader.set_uniform(state, "water_color", tile.water_color());
        shader.set_uniform(state, "wave_strenght", tile.wave_strength());
        set_fog_uniforms(shader, state, ctx.fog);
        set_light_sources(shader, state, ctx.lights, ctx.lights.is_lighting_enabled());

        state.bind_mesh(tile.buffers());
        MeshKind::WaterTile.draw(state);
    }
}

fn bind_slot(state: &mut StateCache, slot: u32, texture: Option<&Rc<Texture>>) {
    state.set_texture_slot(slot);
    match texture {
        Some(texture) => state.bind_texture(texture),
        None => state.unbind_texture(TextureKind::Texture2D),
    }
}

#[allow(clippy::too_many_arguments)]
fn render_clipped(
    state: &mut StateCache,
    ctx: &FrameContext<'_>,
    object_renderer: &mut ObjectRenderer,
    skybox_renderer: &mut SkyboxRenderer,
    target: &FrameBuffer,
    clip_plane: Vec4,
    objects: &[Object3D],
    skybox: Option<&Skybox>,
) {
    let (width, height) = target.size();
    state.bind_framebuffer(target, FramebufferBinding::Full);
    state.device().viewport(0, 0, width, height);
    state.device().clear(ClearMask::COLOR | ClearMask::DEPTH);

    state.enable_clip_distance(0, true);
    object_renderer.set_clip_plane(clip_plane);
    skybox_renderer.render(state, ctx, skybox);
    state.enable_depth_mask(true);
    object_renderer.render(state, ctx, objects, skybox);
    state.enable_clip_distance(0, false);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::{Capability, UniformValue};
    use crate::render::backends::recording::GpuCall;
    use crate::render::material::Material;
    use crate::render::mesh::MeshData;
    use crate::render::renderers::test_support::fixture;

    struct Passes {
        water: WaterRenderer,
        objects: ObjectRenderer,
        skybox: SkyboxRenderer,
    }

    fn passes(state: &mut StateCache) -> Passes {
        Passes {
            water: WaterRenderer::new(state, &ShaderLibrary::Embedded, &WaterConfig::default()).unwrap(),
            objects: ObjectRenderer::new(state, &ShaderLibrary::Embedded).unwrap(),
            skybox: SkyboxRenderer::new(state, &ShaderLibrary::Embedded).unwrap(),
        }
    }

    fn outlined_triangle(state: &mut StateCache) -> Object3D {
        let data = MeshData::positions(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0], 3);
        let mut object = Object3D::with_material(state, "tri", &data, Some(Rc::new(Material::new("plain"))));
        object.add_outline().enable(true);
        object
    }

    #[test]
    fn test_no_tile_skips_offscreen_passes() {
        let (mut state, log, settings) = fixture();
        let mut p = passes(&mut state);
        log.clear();
        p.water
            .render_to_framebuffers(&mut state, &settings.context(), &mut p.objects, &mut p.skybox, None, &[], None)
            .unwrap();
        assert!(log.calls().is_empty());
        assert!(p.water.reflection_framebuffer().is_none());
    }

    #[test]
    fn test_offscreen_passes_mirror_and_restore_camera() {
        let (mut state, log, settings) = fixture();
        let mut p = passes(&mut state);
        let mut tile = WaterTile::new(&mut state, "lake");
        tile.transform_mut().set_position(Vec3::new(0.0, 1.0, 0.0));
        let objects = [outlined_triangle(&mut state)];
        let skybox = Skybox::new(&mut state, "sky");
        {
            let mut camera = settings.camera.borrow_mut();
            camera.set_position(Vec3::new(0.0, 5.0, 0.0));
            camera.set_rotation(0.0, -0.3);
        }
        log.clear();

        p.water
            .render_to_framebuffers(
                &mut state,
                &settings.context(),
                &mut p.objects,
                &mut p.skybox,
                Some(&tile),
                &objects,
                Some(&skybox),
            )
            .unwrap();

        assert_eq!(log.count(|c| matches!(c, GpuCall::CreateFramebuffer(_))), 2);
        // Skybox and object once per pass, no outline
        assert_eq!(log.draw_count(), 4);
        assert!(log.last_uniform("outline_color").is_none());

        let planes = log.uniform_values("clip_plane");
        assert_eq!(planes.len(), 2);
        assert_eq!(planes[0], UniformValue::Vec4(Vec4::new(0.0, 1.0, 0.0, -1.0 + REFLECTION_CLIP_OFFSET)));
        assert_eq!(planes[1], UniformValue::Vec4(Vec4::new(0.0, -1.0, 0.0, 1.0)));

        let toggles = log.count(|c| matches!(c, GpuCall::SetCapability(Capability::ClipDistance(0), _)));
        assert_eq!(toggles, 4);

        let camera = settings.camera.borrow();
        approx::assert_relative_eq!(camera.position(), Vec3::new(0.0, 5.0, 0.0), epsilon = 1e-6);
        approx::assert_relative_eq!(camera.pitch(), -0.3, epsilon = 1e-6);
        assert!(camera.updates_frustum_box());
        assert!(p.objects.is_full_render());
    }

    #[test]
    fn test_reflection_uses_mirrored_camera() {
        let (mut state, log, settings) = fixture();
        let mut p = passes(&mut state);
        let tile = WaterTile::new(&mut state, "lake");
        let objects = [outlined_triangle(&mut state)];
        settings.camera.borrow_mut().set_position(Vec3::new(0.0, 3.0, 0.0));
        log.clear();

        p.water
            .render_to_framebuffers(&mut state, &settings.context(), &mut p.objects, &mut p.skybox, Some(&tile), &objects, None)
            .unwrap();

        // The reflection view puts the eye at y = -3, so the origin sits at +3 in view space
        match log.uniform_values("matrices.view_matrix").first() {
            Some(UniformValue::Mat4(view)) => approx::assert_relative_eq!(view[(1, 3)], 3.0, epsilon = 1e-5),
            other => panic!("Unexpected uniform: {:?}", other),
        }
    }

    #[test]
    fn test_resolution_locked_after_targets_exist() {
        let (mut state, _log, settings) = fixture();
        let mut p = passes(&mut state);
        assert!(p.water.set_reflection_resolution(0, 10).is_err());
        p.water.set_reflection_resolution(320, 160).unwrap();
        p.water.set_refraction_resolution(640, 360).unwrap();

        let tile = WaterTile::new(&mut state, "lake");
        p.water
            .render_to_framebuffers(&mut state, &settings.context(), &mut p.objects, &mut p.skybox, Some(&tile), &[], None)
            .unwrap();
        assert_eq!(p.water.reflection_framebuffer().unwrap().size(), (320, 160));

        p.water.set_reflection_resolution(64, 64).unwrap();
        p.water.set_refraction_resolution(64, 64).unwrap();
        assert_eq!(p.water.reflection_resolution(), (320, 160));
        assert_eq!(p.water.refraction_resolution(), (640, 360));
    }

    #[test]
    fn test_render_binds_targets_and_advances_waves() {
        let (mut state, log, settings) = fixture();
        let mut p = passes(&mut state);
        let mut tiles = vec![WaterTile::new(&mut state, "lake")];
        tiles[0].set_wave_speed(0.5).unwrap();
        p.water
            .render_to_framebuffers(&mut state, &settings.context(), &mut p.objects, &mut p.skybox, tiles.first(), &[], None)
            .unwrap();
        log.clear();

        p.water.render(&mut state, &settings.context(), &mut tiles);

        assert_eq!(log.count(|c| matches!(c, GpuCall::DrawArrays { first: 0, count: 6 })), 1);
        approx::assert_relative_eq!(tiles[0].move_factor(), 0.5 * 0.016, epsilon = 1e-6);
        assert_eq!(log.last_uniform("move_factor"), Some(UniformValue::Float(0.0)));
        assert_eq!(log.last_uniform("depth_map"), Some(UniformValue::Int(4)));
        let bound = log.count(|c| matches!(c, GpuCall::BindTexture(TextureKind::Texture2D, Some(_))));
        assert_eq!(bound, 3);
    }
}
