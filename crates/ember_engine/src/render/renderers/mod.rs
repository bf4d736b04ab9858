//! Render passes
//!
//! Each pass owns its shaders and offscreen targets and borrows everything
//! else for the duration of a call: the [`StateCache`](crate::render::state::StateCache)
//! mutably, the scene content and a [`FrameContext`] read-only.
//! [`MasterRenderer`] runs them in a fixed order every frame.

pub mod font;
pub mod master;
pub mod object;
pub mod particle;
pub mod postprocess;
pub mod shadow;
pub mod skybox;
pub mod water;

pub use font::FontRenderer;
pub use master::{FrameCallback, MasterRenderer};
pub use object::ObjectRenderer;
pub use particle::ParticleRenderer;
pub use postprocess::PostprocessRenderer;
pub use shadow::ShadowRenderer;
pub use skybox::SkyboxRenderer;
pub use water::WaterRenderer;

use std::cell::RefCell;

use crate::foundation::math::{Mat4, Vec3, Vec4};
use crate::render::api::ClearMask;
use crate::render::camera::Camera;
use crate::render::lighting::LightManager;
use crate::render::resources::ShaderProgram;
use crate::render::settings::{Fog, PolygonMode, ShadowMapConfig};
use crate::render::state::StateCache;

/// Read-only view of the per-frame settings shared by the passes
///
/// The camera stays behind its `RefCell` because the water pass mirrors it
/// between sub-passes.
#[derive(Clone, Copy)]
pub struct FrameContext<'a> {
    /// Active camera
    pub camera: &'a RefCell<Camera>,
    /// Lights of the frame
    pub lights: &'a LightManager,
    /// Distance fog
    pub fog: &'a Fog,
    /// Shadow parameters
    pub shadows: &'a ShadowMapConfig,
    /// Wireframe debug mode
    pub polygon_mode: &'a PolygonMode,
    /// Default framebuffer size in pixels
    pub display_size: (u32, u32),
    /// Duration of the previous frame in seconds
    pub delta: f32,
}

/// Clear colour, depth and stencil of the bound target to `background` and
/// reset the viewport to `size`
fn clear_target(state: &mut StateCache, background: Vec3, size: (u32, u32)) {
    state.enable_depth_mask(true);
    state.enable_stencil_drawing(true);
    state.device().clear_color(Vec4::new(background.x, background.y, background.z, 1.0));
    state.device().clear(ClearMask::COLOR | ClearMask::DEPTH | ClearMask::STENCIL);
    state.device().viewport(0, 0, size.0, size.1);
}

/// Write `matrices.{model,view,projection}_matrix` from `camera`
fn set_camera_matrices(shader: &mut ShaderProgram, state: &mut StateCache, camera: &Camera, model: Mat4) {
    shader.set_uniform(state, "matrices.view_matrix", camera.view_matrix());
    shader.set_uniform(state, "matrices.projection_matrix", camera.projection_matrix());
    shader.set_uniform(state, "matrices.model_matrix", model);
}

/// Write the `fog.*` uniforms shared by the lit shaders
fn set_fog_uniforms(shader: &mut ShaderProgram, state: &mut StateCache, fog: &Fog) {
    shader.set_uniform(state, "fog.enabled", fog.enabled);
    if fog.enabled {
        shader.set_uniform(state, "fog.color", fog.color);
        shader.set_uniform(state, "fog.density", fog.density);
    }
}

/// Write the directional and point light uniforms shared by the lit shaders
fn set_light_uniforms(shader: &mut ShaderProgram, state: &mut StateCache, lights: &LightManager) {
    shader.set_uniform(state, "lighting_enabled", lights.is_lighting_enabled());
    set_light_sources(shader, state, lights, true);
}

/// Write light sources; the directional light is reported disabled unless `gate` holds
fn set_light_sources(shader: &mut ShaderProgram, state: &mut StateCache, lights: &LightManager, gate: bool) {
    let directional = lights.directional_light();
    shader.set_uniform(state, "directional_light.enabled", gate && directional.is_enabled());
    if directional.is_enabled() {
        shader.set_uniform(state, "directional_light.direction", directional.direction());
        shader.set_uniform(state, "directional_light.color", directional.color());
    }

    let count = i32::try_from(lights.point_lights_count()).unwrap_or(i32::MAX);
    shader.set_uniform(state, "used_point_lights_count", count);
    for (i, light) in lights.point_lights().iter().enumerate() {
        let prefix = format!("point_lights[{i}]");
        shader.set_uniform(state, &format!("{prefix}.enabled"), light.is_enabled());
        shader.set_uniform(state, &format!("{prefix}.linear_factor"), light.linear_factor());
        shader.set_uniform(state, &format!("{prefix}.quadratic_factor"), light.quadratic_factor());
        shader.set_uniform(state, &format!("{prefix}.position"), light.position());
        shader.set_uniform(state, &format!("{prefix}.color"), light.color());
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::cell::RefCell;

    use super::FrameContext;
    use crate::render::backends::recording::{CallLog, RecordingDevice};
    use crate::render::camera::Camera;
    use crate::render::lighting::LightManager;
    use crate::render::settings::{Fog, PolygonMode, ShadowMapConfig};
    use crate::render::state::StateCache;

    /// Settings a test frame is rendered with
    pub struct Settings {
        pub camera: RefCell<Camera>,
        pub lights: LightManager,
        pub fog: Fog,
        pub shadows: ShadowMapConfig,
        pub polygon_mode: PolygonMode,
    }

    impl Settings {
        pub fn context(&self) -> FrameContext<'_> {
            FrameContext {
                camera: &self.camera,
                lights: &self.lights,
                fog: &self.fog,
                shadows: &self.shadows,
                polygon_mode: &self.polygon_mode,
                display_size: (320, 180),
                delta: 0.016,
            }
        }
    }

    pub fn fixture() -> (StateCache, CallLog, Settings) {
        let device = RecordingDevice::new();
        let log = device.log();
        let settings = Settings {
            camera: RefCell::new(Camera::new("test_camera")),
            lights: LightManager::new(),
            fog: Fog::default(),
            shadows: ShadowMapConfig::default(),
            polygon_mode: PolygonMode::default(),
        };
        (StateCache::new(Box::new(device)), log, settings)
    }
}
