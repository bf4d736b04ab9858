//! # Object Renderer
//!
//! Draws [`Object3D`]s in one of three modes:
//! - **full**: lit shader with materials, fog, directional and point lights,
//!   shadow sampling, environment mapping from the active skybox and the
//!   water clip plane, followed by the stencil outline when the object has an
//!   enabled [`Outline`](crate::render::mesh::Outline)
//! - **flat wireframe**: single-colour polygon shader, no lighting
//! - **depth only**: model matrix and draw, with a shader supplied by the
//!   shadow pass
//!
//! ## Outline
//! The base draw writes stencil value 1 over the object. The outline pass
//! redraws the object scaled by the outline factor where the stencil differs
//! from 1, so only the rim beyond the base silhouette is coloured. Outlines
//! are drawn only in full-render context (not during water sub-passes) and
//! never in wireframe mode.
//!
//! ## Texture slots
//! | slot | content |
//! |------|---------|
//! | 0 | diffuse |
//! | 1 | normal map |
//! | 2 | environment cube map |
//! | 3 | directional shadow map |
//! | 4.. | point light shadow cube maps |

use std::rc::Rc;

use super::{set_camera_matrices, set_fog_uniforms, set_light_uniforms, FrameContext};
use crate::error::EngineResult;
use crate::foundation::math::{Mat4, Vec4};
use crate::render::api::TextureKind;
use crate::render::camera::Camera;
use crate::render::lighting::MAX_POINT_LIGHTS;
use crate::render::material::Material;
use crate::render::mesh::{Object3D, Skybox};
use crate::render::resources::{BuiltinShader, ShaderLibrary, ShaderProgram, Texture};
use crate::render::settings::ShadowMapConfig;
use crate::render::state::{BlendFunction, StateCache, StencilAction};

const DIFFUSE_SLOT: u32 = 0;
const NORMALMAP_SLOT: u32 = 1;
const ENV_MAP_SLOT: u32 = 2;
const SHADOW_MAP_SLOT: u32 = 3;
const POINT_SHADOW_MAP_FIRST_SLOT: u32 = 4;

/// Draws 3D objects in full, wireframe or depth-only mode
pub struct ObjectRenderer {
    basic_shader: ShaderProgram,
    outline_shader: ShaderProgram,
    polygon_shader: ShaderProgram,
    clip_plane: Vec4,
    full_render: bool,
    directional_shadow_map: Option<Rc<Texture>>,
    point_shadow_maps: [Option<Rc<Texture>>; MAX_POINT_LIGHTS],
}

impl ObjectRenderer {
    /// Build the basic, outline and polygon shaders
    pub fn new(state: &mut StateCache, library: &ShaderLibrary) -> EngineResult<Self> {
        let renderer = Self {
            basic_shader: library.load(state, BuiltinShader::Basic)?,
            outline_shader: library.load(state, BuiltinShader::Outline)?,
            polygon_shader: library.load(state, BuiltinShader::Polygon)?,
            clip_plane: Vec4::zeros(),
            full_render: true,
            directional_shadow_map: None,
            point_shadow_maps: Default::default(),
        };
        log::debug!(target: "object_renderer", "Object renderer created.");
        Ok(renderer)
    }

    /// World-space plane `(a, b, c, d)`; fragments with `dot(p, plane) < 0` are clipped
    pub fn set_clip_plane(&mut self, plane: Vec4) {
        self.clip_plane = plane;
    }

    /// Current clip plane
    pub fn clip_plane(&self) -> Vec4 {
        self.clip_plane
    }

    /// Enable the work that only the visible pass needs (outlines)
    pub fn set_full_render(&mut self, full_render: bool) {
        self.full_render = full_render;
    }

    /// Whether outlines are drawn
    pub fn is_full_render(&self) -> bool {
        self.full_render
    }

    /// Depth texture sampled for directional light shadows
    pub fn set_directional_shadow_map(&mut self, texture: Option<Rc<Texture>>) {
        self.directional_shadow_map = texture;
    }

    /// Depth texture currently sampled for directional shadows
    pub fn directional_shadow_map(&self) -> Option<&Rc<Texture>> {
        self.directional_shadow_map.as_ref()
    }

    /// Depth cube texture sampled for point light `index`'s shadows
    pub fn set_point_shadow_map(&mut self, index: usize, texture: Option<Rc<Texture>>) {
        match self.point_shadow_maps.get_mut(index) {
            Some(slot) => *slot = texture,
            None => log::warn!(target: "object_renderer", "Point light shadow map index {} out of range.", index),
        }
    }

    /// Depth cube texture currently sampled for point light `index`
    pub fn point_shadow_map(&self, index: usize) -> Option<&Rc<Texture>> {
        self.point_shadow_maps.get(index).and_then(Option::as_ref)
    }

    fn prepare_rendering(state: &mut StateCache) {
        state.enable_depth_test(true);
        state.enable_depth_mask(true);
        state.enable_blend(true);
        state.set_blend_function(BlendFunction::Normal);
        state.enable_face_cull(true);
        state.enable_stencil_test(true);
        state.unbind_all_textures();
    }

    /// Draw `objects` lit, or as flat wireframe when that debug mode is on
    pub fn render(&mut self, state: &mut StateCache, ctx: &FrameContext<'_>, objects: &[Object3D], skybox: Option<&Skybox>) {
        if objects.is_empty() {
            return;
        }
        let camera = ctx.camera.borrow();
        for object in objects {
            self.render_object(state, ctx, &camera, object, skybox);
        }
    }

    /// Depth-only draw with a shader activated by the caller
    ///
    /// Only `matrices.model_matrix` is written per object.
    pub fn render_depth(&mut self, state: &mut StateCache, shader: &mut ShaderProgram, objects: &[Object3D]) {
        if objects.is_empty() {
            return;
        }
        Self::prepare_rendering(state);
        for object in objects {
            state.bind_mesh(object.buffers());
            shader.set_uniform(state, "matrices.model_matrix", object.transform().model_matrix());
            for index in 0..object.entities().len() {
                object.draw_entity(state, index);
            }
        }
    }

    fn render_object(
        &mut self,
        state: &mut StateCache,
        ctx: &FrameContext<'_>,
        camera: &Camera,
        object: &Object3D,
        skybox: Option<&Skybox>,
    ) {
        Self::prepare_rendering(state);
        state.bind_mesh(object.buffers());

        let wireframe = ctx.polygon_mode.wireframe;
        let outline = object.active_outline().filter(|_| self.full_render && !wireframe);
        if outline.is_some() {
            state.enable_stencil_drawing(true);
            state.set_stencil_action(StencilAction::Replace);
            state.stencil_passes_always(1);
        }

        let model = object.transform().model_matrix();
        if ctx.polygon_mode.is_flat_wireframe() {
            let shader = &mut self.polygon_shader;
            state.activate_shader_program(shader);
            set_camera_matrices(shader, state, camera, model);
            shader.set_uniform(state, "lines_color", ctx.polygon_mode.lines_color);
            draw_entities(state, shader, object, false);
        } else {
            let shader = &mut self.basic_shader;
            state.activate_shader_program(shader);
            shader.set_uniform(state, "clip_plane", self.clip_plane);
            set_fog_uniforms(shader, state, ctx.fog);
            set_light_uniforms(shader, state, ctx.lights);
            if ctx.shadows.enabled && ctx.lights.directional_light().is_enabled() {
                shader.set_uniform(state, "matrices.dir_light_pv_matrix", ctx.lights.directional_light().projection_view_matrix());
            }
            set_camera_matrices(shader, state, camera, model);
            set_environment_map(shader, state, skybox);
            if ctx.shadows.enabled {
                set_shadow_uniforms(shader, state, ctx.shadows);
            }
            self.bind_shadow_maps(state, ctx);
            draw_entities(state, &mut self.basic_shader, object, true);
        }

        if let Some(outline) = outline {
            state.stencil_passes_not_equal(1);
            state.enable_stencil_drawing(false);
            let always_visible = outline.is_always_visible();
            if always_visible {
                state.enable_depth_test(false);
            }

            let shader = &mut self.outline_shader;
            state.activate_shader_program(shader);
            set_camera_matrices(shader, state, camera, object.transform().scaled_model_matrix(outline.scale()));
            shader.set_uniform(state, "outline_color", outline.color());
            draw_entities(state, shader, object, false);

            state.enable_stencil_drawing(true);
            state.set_stencil_action(StencilAction::Keep);
            state.stencil_passes_always(1);
            if always_visible {
                state.enable_depth_test(true);
            }
        }
    }

    fn bind_shadow_maps(&mut self, state: &mut StateCache, ctx: &FrameContext<'_>) {
        let shader = &mut self.basic_shader;
        let lights = ctx.lights;
        let sampling = lights.is_lighting_enabled() && ctx.shadows.enabled && !ctx.polygon_mode.wireframe;

        state.set_texture_slot(SHADOW_MAP_SLOT);
        shader.set_uniform(state, "shadow_map_texture", SHADOW_MAP_SLOT);
        match &self.directional_shadow_map {
            Some(texture) if sampling && lights.directional_light().is_enabled() => state.bind_texture(texture),
            _ => state.unbind_texture(TextureKind::Texture2D),
        }

        for (i, light) in lights.point_lights().iter().enumerate() {
            let slot = POINT_SHADOW_MAP_FIRST_SLOT + u32::try_from(i).unwrap_or(0);
            state.set_texture_slot(slot);
            shader.set_uniform(state, &format!("point_shadow_map_{}", i + 1), slot);
            match &self.point_shadow_maps[i] {
                Some(texture) if sampling && light.is_enabled() => state.bind_texture(texture),
                _ => state.unbind_texture(TextureKind::TextureCube),
            }
        }
    }
}

fn draw_entities(state: &mut StateCache, shader: &mut ShaderProgram, object: &Object3D, use_materials: bool) {
    for (index, entity) in object.entities().iter().enumerate() {
        if use_materials {
            if let Some(material) = &entity.material {
                set_material(shader, state, material);
            }
        }
        object.draw_entity(state, index);
    }
}

fn set_material(shader: &mut ShaderProgram, state: &mut StateCache, material: &Material) {
    shader.set_uniform(state, "object_material.ka", material.ka());
    shader.set_uniform(state, "object_material.kd", material.kd());
    shader.set_uniform(state, "object_material.ks", material.ks());
    shader.set_uniform(state, "object_material.shininess", material.shininess());
    shader.set_uniform(state, "object_material.reflectivity", material.reflectivity());

    // A missing texture must clear its slot, or the previous object's leaks in
    state.set_texture_slot(DIFFUSE_SLOT);
    shader.set_uniform(state, "object_material.has_diffuse_texture", material.diffuse_texture().is_some());
    match material.diffuse_texture() {
        Some(texture) => {
            shader.set_uniform(state, "object_material.diffuse_texture", DIFFUSE_SLOT);
            state.bind_texture(texture);
        }
        None => state.unbind_texture(TextureKind::Texture2D),
    }

    state.set_texture_slot(NORMALMAP_SLOT);
    shader.set_uniform(state, "object_material.has_normalmap_texture", material.normalmap_texture().is_some());
    match material.normalmap_texture() {
        Some(texture) => {
            shader.set_uniform(state, "object_material.normalmap_texture", NORMALMAP_SLOT);
            state.bind_texture(texture);
        }
        None => state.unbind_texture(TextureKind::Texture2D),
    }
}

fn set_environment_map(shader: &mut ShaderProgram, state: &mut StateCache, skybox: Option<&Skybox>) {
    state.set_texture_slot(ENV_MAP_SLOT);
    shader.set_uniform(state, "env_map_texture", ENV_MAP_SLOT);
    match skybox.and_then(|s| s.texture().map(|t| (s, t))) {
        Some((skybox, texture)) => {
            state.bind_texture(texture);
            shader.set_uniform(state, "matrices.env_map_model_matrix", skybox.transform().model_matrix());
        }
        None => {
            state.unbind_texture(TextureKind::TextureCube);
            shader.set_uniform(state, "matrices.env_map_model_matrix", Mat4::identity());
        }
    }
}

fn set_shadow_uniforms(shader: &mut ShaderProgram, state: &mut StateCache, shadows: &ShadowMapConfig) {
    shader.set_uniform(state, "shadow.distance", shadows.distance);
    shader.set_uniform(state, "shadow.transition_distance", shadows.transition_distance);
    shader.set_uniform(state, "shadow.enabled", shadows.enabled);
    shader.set_uniform(state, "shadow.map_size", shadows.directional_map_size);
    shader.set_uniform(state, "shadow.pcf_filter_count", shadows.pcf_samples);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::render::api::{Capability, TextureDesc, TextureFormat, TextureId, UniformValue};
    use crate::render::backends::recording::{CallLog, GpuCall};
    use crate::render::mesh::MeshData;
    use crate::render::renderers::test_support::fixture;

    fn cube_map(state: &mut StateCache, name: &str) -> Rc<Texture> {
        let desc = TextureDesc { kind: TextureKind::TextureCube, width: 64, height: 64, format: TextureFormat::Depth, samples: 1 };
        Rc::new(Texture::create(state, name, desc))
    }

    /// Texture slot that was active when `texture` was bound as a cube map
    fn cube_bind_slot(log: &CallLog, texture: TextureId) -> Option<u32> {
        let mut slot = None;
        for call in log.calls().iter() {
            match call {
                GpuCall::ActiveTexture(active) => slot = Some(*active),
                GpuCall::BindTexture(TextureKind::TextureCube, Some(bound)) if *bound == texture => return slot,
                _ => {}
            }
        }
        None
    }

    fn triangle(state: &mut StateCache, name: &str) -> Object3D {
        let data = MeshData::positions(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0], 3);
        Object3D::with_material(state, name, &data, Some(Rc::new(Material::new("plain"))))
    }

    #[test]
    fn test_outline_issues_second_scaled_draw() {
        let (mut state, log, settings) = fixture();
        let mut renderer = ObjectRenderer::new(&mut state, &ShaderLibrary::Embedded).unwrap();
        let mut object = triangle(&mut state, "outlined");
        let outline = object.add_outline();
        outline.enable(true);
        outline.set_scale(1.1).unwrap();
        log.clear();

        renderer.render(&mut state, &settings.context(), std::slice::from_ref(&object), None);

        assert_eq!(log.draw_count(), 2);
        let models = log.uniform_values("matrices.model_matrix");
        assert_eq!(models.len(), 2);
        match models[1] {
            UniformValue::Mat4(m) => approx::assert_relative_eq!(m[(0, 0)], 1.1, epsilon = 1e-6),
            other => panic!("Unexpected uniform: {:?}", other),
        }
        assert!(log.last_uniform("outline_color").is_some());
        let calls = log.calls();
        let first_draw = calls.iter().position(GpuCall::is_draw).unwrap();
        let not_equal = calls.iter().position(|c| matches!(c, GpuCall::StencilFunc(crate::render::api::StencilFunc::NotEqual, 1, _))).unwrap();
        assert!(first_draw < not_equal);
    }

    #[test]
    fn test_outline_skipped_outside_full_render() {
        let (mut state, log, settings) = fixture();
        let mut renderer = ObjectRenderer::new(&mut state, &ShaderLibrary::Embedded).unwrap();
        let mut object = triangle(&mut state, "outlined");
        object.add_outline().enable(true);
        renderer.set_full_render(false);
        log.clear();

        renderer.render(&mut state, &settings.context(), std::slice::from_ref(&object), None);
        assert_eq!(log.draw_count(), 1);
        assert!(log.last_uniform("outline_color").is_none());
    }

    #[test]
    fn test_always_visible_outline_restores_depth_test() {
        let (mut state, log, settings) = fixture();
        let mut renderer = ObjectRenderer::new(&mut state, &ShaderLibrary::Embedded).unwrap();
        let mut outlined = triangle(&mut state, "outlined");
        let outline = outlined.add_outline();
        outline.enable(true);
        outline.set_always_visible(true);
        let plain = triangle(&mut state, "plain");
        log.clear();

        renderer.render(&mut state, &settings.context(), &[outlined, plain], None);

        assert!(state.is_depth_test_enabled());
        let toggles: Vec<bool> = log
            .calls()
            .iter()
            .filter_map(|c| match c {
                GpuCall::SetCapability(Capability::DepthTest, enabled) => Some(*enabled),
                _ => None,
            })
            .collect();
        assert_eq!(toggles, vec![true, false, true]);
        assert_eq!(log.draw_count(), 3);
    }

    #[test]
    fn test_missing_material_textures_clear_their_slots() {
        let (mut state, log, settings) = fixture();
        let mut renderer = ObjectRenderer::new(&mut state, &ShaderLibrary::Embedded).unwrap();
        let object = triangle(&mut state, "bare");
        log.clear();

        renderer.render(&mut state, &settings.context(), std::slice::from_ref(&object), None);
        assert_eq!(log.last_uniform("object_material.has_diffuse_texture"), Some(UniformValue::Int(0)));
        assert_eq!(log.last_uniform("object_material.has_normalmap_texture"), Some(UniformValue::Int(0)));
        assert!(log.last_uniform("object_material.diffuse_texture").is_none());
    }

    #[test]
    fn test_flat_wireframe_uses_polygon_shader() {
        let (mut state, log, mut settings) = fixture();
        let mut renderer = ObjectRenderer::new(&mut state, &ShaderLibrary::Embedded).unwrap();
        let mut object = triangle(&mut state, "wire");
        object.add_outline().enable(true);
        settings.polygon_mode.wireframe = true;
        settings.polygon_mode.lines_color = Vec3::new(0.0, 1.0, 0.0);
        log.clear();

        renderer.render(&mut state, &settings.context(), std::slice::from_ref(&object), None);
        assert_eq!(log.draw_count(), 1);
        assert_eq!(log.last_uniform("lines_color"), Some(UniformValue::Vec3(Vec3::new(0.0, 1.0, 0.0))));
        assert!(log.last_uniform("object_material.ka").is_none());
    }

    #[test]
    fn test_depth_only_writes_model_matrix_only() {
        let (mut state, log, _settings) = fixture();
        let mut renderer = ObjectRenderer::new(&mut state, &ShaderLibrary::Embedded).unwrap();
        let mut depth_shader = ShaderLibrary::Embedded.load(&mut state, BuiltinShader::DirectionalDepth).unwrap();
        let objects = [triangle(&mut state, "a"), triangle(&mut state, "b")];
        state.activate_shader_program(&depth_shader);
        log.clear();

        renderer.render_depth(&mut state, &mut depth_shader, &objects);
        assert_eq!(log.draw_count(), 2);
        let uniforms = log.count(|c| matches!(c, GpuCall::SetUniform { .. }));
        assert_eq!(uniforms, 2);
        assert_eq!(log.uniform_values("matrices.model_matrix").len(), 2);
    }

    #[test]
    fn test_point_shadow_cube_map_bound_on_its_slot() {
        let (mut state, log, mut settings) = fixture();
        let mut renderer = ObjectRenderer::new(&mut state, &ShaderLibrary::Embedded).unwrap();
        let object = triangle(&mut state, "lit");
        settings.lights.enable_lighting(true);
        settings.shadows.enabled = true;
        let index = settings.lights.create_point_light().unwrap();
        settings.lights.point_light_mut(index).unwrap().enable(true);
        let depth_cube = cube_map(&mut state, "depth_map_point_lights_0");
        renderer.set_point_shadow_map(index, Some(Rc::clone(&depth_cube)));
        log.clear();

        renderer.render(&mut state, &settings.context(), std::slice::from_ref(&object), None);

        assert_eq!(cube_bind_slot(&log, depth_cube.id()), Some(POINT_SHADOW_MAP_FIRST_SLOT));
        assert_eq!(log.last_uniform("point_shadow_map_1"), Some(UniformValue::Int(4)));
    }

    #[test]
    fn test_reflective_material_samples_skybox_cube_map() {
        let (mut state, log, settings) = fixture();
        let mut renderer = ObjectRenderer::new(&mut state, &ShaderLibrary::Embedded).unwrap();
        let data = MeshData::positions(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0], 3);
        let mut chrome = Material::new("chrome");
        chrome.set_reflectivity(0.8).unwrap();
        let object = Object3D::with_material(&mut state, "mirror", &data, Some(Rc::new(chrome)));

        let mut skybox = Skybox::new(&mut state, "sky");
        let sky = cube_map(&mut state, "sky");
        skybox.set_texture(Some(Rc::clone(&sky))).unwrap();
        log.clear();

        renderer.render(&mut state, &settings.context(), std::slice::from_ref(&object), Some(&skybox));

        assert_eq!(cube_bind_slot(&log, sky.id()), Some(ENV_MAP_SLOT));
        assert_eq!(log.last_uniform("env_map_texture"), Some(UniformValue::Int(2)));
        assert_eq!(log.last_uniform("object_material.reflectivity"), Some(UniformValue::Float(0.8)));
        assert_eq!(log.draw_count(), 1);
    }
}
