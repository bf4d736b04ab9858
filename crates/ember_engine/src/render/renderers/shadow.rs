//! # Shadow Renderer
//!
//! Fills the depth targets sampled by the lit object shader:
//! - one 2D depth map for the directional light, rendered with an
//!   orthographic projection fitted around the camera frustum slice that
//!   receives shadows
//! - one depth cube map per enabled point light, rendered in a single pass
//!   through the six face matrices
//!
//! Targets are created on first use and recreated when the configured map
//! size changes; a replaced target is released once the object renderer lets
//! go of its depth texture. The resulting textures are handed to the
//! [`ObjectRenderer`] for the visible pass.

use std::cell::RefCell;
use std::rc::Rc;

use super::ObjectRenderer;
use crate::error::EngineResult;
use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
use crate::render::api::{ClearMask, FramebufferBinding};
use crate::render::camera::Camera;
use crate::render::lighting::{LightManager, MAX_POINT_LIGHTS};
use crate::render::mesh::Object3D;
use crate::render::resources::{BuiltinShader, FrameBuffer, ShaderLibrary, ShaderProgram, Texture};
use crate::render::settings::ShadowMapConfig;
use crate::render::state::StateCache;

const POINT_SHADOW_NEAR: f32 = 0.1;

/// Renders shadow depth maps for the directional light and point lights
pub struct ShadowRenderer {
    directional_shader: ShaderProgram,
    point_shader: ShaderProgram,
    directional_framebuffer: Option<FrameBuffer>,
    point_framebuffers: [Option<FrameBuffer>; MAX_POINT_LIGHTS],
}

impl ShadowRenderer {
    /// Build the directional and point depth shaders
    pub fn new(state: &mut StateCache, library: &ShaderLibrary) -> EngineResult<Self> {
        let renderer = Self {
            directional_shader: library.load(state, BuiltinShader::DirectionalDepth)?,
            point_shader: library.load(state, BuiltinShader::PointDepth)?,
            directional_framebuffer: None,
            point_framebuffers: Default::default(),
        };
        log::debug!(target: "shadow_renderer", "Shadow renderer created.");
        Ok(renderer)
    }

    /// Directional shadow target, once created
    pub fn directional_framebuffer(&self) -> Option<&FrameBuffer> {
        self.directional_framebuffer.as_ref()
    }

    /// Shadow target of point light `index`, once created
    pub fn point_framebuffer(&self, index: usize) -> Option<&FrameBuffer> {
        self.point_framebuffers.get(index).and_then(Option::as_ref)
    }

    /// Render all shadow maps for `objects` and hand them to `object_renderer`
    ///
    /// Updates the directional light's view and projection. Leaves a shadow
    /// framebuffer bound; the caller restores its own target and viewport.
    pub fn render(
        &mut self,
        state: &mut StateCache,
        object_renderer: &mut ObjectRenderer,
        camera: &RefCell<Camera>,
        lights: &mut LightManager,
        shadows: &ShadowMapConfig,
        objects: &[Object3D],
    ) -> EngineResult<()> {
        if !shadows.enabled || objects.is_empty() {
            return Ok(());
        }

        state.unbind_all_textures();
        state.enable_depth_test(true);
        state.enable_depth_mask(true);
        state.enable_blend(false);
        state.enable_face_cull(true);

        if lights.directional_light().is_enabled() {
            self.render_directional(state, object_renderer, camera, lights, shadows, objects)?;
        } else {
            object_renderer.set_directional_shadow_map(None);
        }
        self.render_point_lights(state, object_renderer, lights, shadows, objects)
    }

    fn render_directional(
        &mut self,
        state: &mut StateCache,
        object_renderer: &mut ObjectRenderer,
        camera: &RefCell<Camera>,
        lights: &mut LightManager,
        shadows: &ShadowMapConfig,
        objects: &[Object3D],
    ) -> EngineResult<()> {
        {
            let mut camera = camera.borrow_mut();
            let mirrors_box = camera.updates_frustum_box();
            camera.set_updates_frustum_box(false);

            let light = lights.directional_light_mut();
            let fitted = camera.frustum_box_mut().update(shadows.distance);
            if fitted.is_ok() {
                let frustum = camera.frustum_box_mut();
                light.look_from(frustum.center());
                frustum.recalculate_space(&light.view_matrix());
                light.fit_projection(Vec3::new(frustum.width(), frustum.height(), frustum.length()));
                light.look_from(camera.position());
            }
            camera.set_updates_frustum_box(mirrors_box);
            fitted?;
        }

        let size = shadows.directional_map_size;
        let framebuffer = match self.directional_framebuffer.take() {
            Some(framebuffer) if framebuffer.size() == (size, size) => framebuffer,
            _ => {
                log::debug!(target: "shadow_renderer", "Creating directional shadow map ({}x{}).", size, size);
                FrameBuffer::builder("depth_map_dir_light")
                    .with_size(size, size)
                    .with_depth_texture()
                    .without_color_buffers()
                    .build(state)?
            }
        };

        let shader = &mut self.directional_shader;
        state.activate_shader_program(shader);
        shader.set_uniform(state, "matrices.light_space_matrix", lights.directional_light().projection_view_matrix());
        state.bind_framebuffer(&framebuffer, FramebufferBinding::Full);
        state.device().viewport(0, 0, size, size);
        state.device().clear(ClearMask::DEPTH);
        object_renderer.render_depth(state, shader, objects);

        object_renderer.set_directional_shadow_map(framebuffer.depth_texture().cloned());
        self.directional_framebuffer = Some(framebuffer);
        Ok(())
    }

    fn render_point_lights(
        &mut self,
        state: &mut StateCache,
        object_renderer: &mut ObjectRenderer,
        lights: &LightManager,
        shadows: &ShadowMapConfig,
        objects: &[Object3D],
    ) -> EngineResult<()> {
        let lit: Vec<usize> = (0..MAX_POINT_LIGHTS)
            .filter(|&i| lights.point_light(i).is_some_and(|light| light.is_enabled()))
            .collect();
        for i in (0..MAX_POINT_LIGHTS).filter(|i| !lit.contains(i)) {
            object_renderer.set_point_shadow_map(i, None);
        }
        if lit.is_empty() {
            return Ok(());
        }

        let shader = &mut self.point_shader;
        state.activate_shader_program(shader);
        shader.set_uniform(state, "shadow_distance", shadows.distance);

        let size = shadows.point_map_size;
        for i in lit {
            let Some(light) = lights.point_light(i) else { continue };
            let position = light.position();
            shader.set_uniform(state, "light_position", position);
            for (face, matrix) in cube_face_matrices(position, shadows.distance).into_iter().enumerate() {
                shader.set_uniform(state, &format!("shadow_matrices[{face}].mat"), matrix);
            }

            let framebuffer = match self.point_framebuffers[i].take() {
                Some(framebuffer) if framebuffer.size() == (size, size) => framebuffer,
                _ => {
                    log::debug!(target: "shadow_renderer", "Creating point light {} shadow map ({}x{}).", i, size, size);
                    FrameBuffer::builder(format!("depth_map_point_lights_{i}"))
                        .with_size(size, size)
                        .with_depth_cube_texture()
                        .without_color_buffers()
                        .build(state)?
                }
            };

            state.bind_framebuffer(&framebuffer, FramebufferBinding::Full);
            state.device().viewport(0, 0, size, size);
            state.device().clear(ClearMask::DEPTH);
            object_renderer.render_depth(state, shader, objects);

            let texture: Option<Rc<Texture>> = framebuffer.depth_cube_texture().cloned();
            object_renderer.set_point_shadow_map(i, texture);
            self.point_framebuffers[i] = Some(framebuffer);
        }
        Ok(())
    }
}

/// Projection * view for the six cube faces around `position`, in
/// +X, -X, +Y, -Y, +Z, -Z order
fn cube_face_matrices(position: Vec3, distance: f32) -> [Mat4; 6] {
    let projection = Mat4::perspective(std::f32::consts::FRAC_PI_2, 1.0, POINT_SHADOW_NEAR, distance);
    let faces = [
        (Vec3::x(), -Vec3::y()),
        (-Vec3::x(), -Vec3::y()),
        (Vec3::y(), Vec3::z()),
        (-Vec3::y(), -Vec3::z()),
        (Vec3::z(), -Vec3::y()),
        (-Vec3::z(), -Vec3::y()),
    ];
    faces.map(|(axis, up)| projection * Mat4::look_at(position, position + axis, up))
}
