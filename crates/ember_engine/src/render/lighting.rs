//! Lighting system
//!
//! One directional light and up to [`MAX_POINT_LIGHTS`] point lights, owned by
//! the [`LightManager`]. The directional light also carries the light-space
//! matrices computed by the shadow pass.

use crate::error::{ensure, EngineError, EngineResult};
use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3};

/// Point lights supported by the lit shader
pub const MAX_POINT_LIGHTS: usize = 4;

// Above this |direction.y| the +Y up vector is too close to parallel
const VERTICAL_LIGHT_THRESHOLD: f32 = 0.999;

/// Sun-like light shining along one direction
#[derive(Debug, Clone)]
pub struct DirectionalLight {
    enabled: bool,
    color: Vec3,
    direction: Vec3,
    view_matrix: Mat4,
    projection_matrix: Mat4,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            enabled: false,
            color: Vec3::new(1.0, 1.0, 1.0),
            direction: Vec3::new(-1.0, -1.0, -1.0).normalize(),
            view_matrix: Mat4::identity(),
            projection_matrix: Mat4::identity(),
        }
    }
}

impl DirectionalLight {
    /// Enable or disable the light
    pub fn enable(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether the light is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Light color
    pub fn color(&self) -> Vec3 {
        self.color
    }

    /// Set the light color (clamped to [0, 1])
    pub fn set_color(&mut self, color: Vec3) {
        self.color = utils::clamp_color(color);
    }

    /// Normalized light direction
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Set the light direction; zero vectors are ignored
    pub fn set_direction(&mut self, direction: Vec3) {
        match direction.try_normalize(f32::EPSILON) {
            Some(direction) => self.direction = direction,
            None => log::warn!(target: "directional_light", "Zero light direction ignored."),
        }
    }

    /// Look along the light direction from `center`
    ///
    /// Vertical lights use +Z as the up vector.
    pub fn look_from(&mut self, center: Vec3) {
        let up = if self.direction.y.abs() > VERTICAL_LIGHT_THRESHOLD { Vec3::z() } else { Vec3::y() };
        self.view_matrix = Mat4::look_at(center, center + self.direction, up);
    }

    /// Orthographic projection spanning `extent` (width, height, length) around the eye
    pub fn fit_projection(&mut self, extent: Vec3) {
        self.projection_matrix = Mat4::orthographic(-extent.x, extent.x, -extent.y, extent.y, -extent.z, extent.z);
    }

    /// Light view matrix
    pub fn view_matrix(&self) -> Mat4 {
        self.view_matrix
    }

    /// Light projection matrix
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection_matrix
    }

    /// Projection * view, used for shadow lookups
    pub fn projection_view_matrix(&self) -> Mat4 {
        self.projection_matrix * self.view_matrix
    }
}

/// Attenuated omnidirectional light
#[derive(Debug, Clone)]
pub struct PointLight {
    enabled: bool,
    position: Vec3,
    color: Vec3,
    linear_factor: f32,
    quadratic_factor: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            enabled: false,
            position: Vec3::zeros(),
            color: Vec3::new(1.0, 1.0, 1.0),
            linear_factor: 0.14,
            quadratic_factor: 0.07,
        }
    }
}

impl PointLight {
    /// Enable or disable the light
    pub fn enable(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether the light is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// World position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Move the light
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Light color
    pub fn color(&self) -> Vec3 {
        self.color
    }

    /// Set the light color (clamped to [0, 1])
    pub fn set_color(&mut self, color: Vec3) {
        self.color = utils::clamp_color(color);
    }

    /// Linear attenuation factor
    pub fn linear_factor(&self) -> f32 {
        self.linear_factor
    }

    /// Quadratic attenuation factor
    pub fn quadratic_factor(&self) -> f32 {
        self.quadratic_factor
    }

    /// Set both attenuation factors (each > 0)
    pub fn set_attenuation(&mut self, linear: f32, quadratic: f32) -> EngineResult<()> {
        ensure(linear > 0.0, "point_light", "PointLight::set_attenuation", "Linear factor value out of range: {0 < VALUE}.")?;
        ensure(quadratic > 0.0, "point_light", "PointLight::set_attenuation", "Quadratic factor value out of range: {0 < VALUE}.")?;
        self.linear_factor = linear;
        self.quadratic_factor = quadratic;
        Ok(())
    }
}

/// Owner of every light in the scene
#[derive(Debug, Clone, Default)]
pub struct LightManager {
    lighting_enabled: bool,
    directional: DirectionalLight,
    point_lights: Vec<PointLight>,
}

impl LightManager {
    /// Lighting disabled, default directional light, no point lights
    pub fn new() -> Self {
        Self::default()
    }

    /// Master lighting switch
    pub fn enable_lighting(&mut self, enabled: bool) {
        self.lighting_enabled = enabled;
    }

    /// Whether lighting is enabled
    pub fn is_lighting_enabled(&self) -> bool {
        self.lighting_enabled
    }

    /// The directional light
    pub fn directional_light(&self) -> &DirectionalLight {
        &self.directional
    }

    /// The directional light, mutably
    pub fn directional_light_mut(&mut self) -> &mut DirectionalLight {
        &mut self.directional
    }

    /// Add a point light and return its index
    pub fn create_point_light(&mut self) -> EngineResult<usize> {
        if self.point_lights.len() >= MAX_POINT_LIGHTS {
            return Err(EngineError::usage(
                "light_manager",
                "LightManager::create_point_light",
                format!("Point lights count limit ({MAX_POINT_LIGHTS}) reached."),
            ));
        }
        self.point_lights.push(PointLight::default());
        log::debug!(target: "light_manager", "Point light {} created.", self.point_lights.len() - 1);
        Ok(self.point_lights.len() - 1)
    }

    /// Point light by index
    pub fn point_light(&self, index: usize) -> Option<&PointLight> {
        self.point_lights.get(index)
    }

    /// Point light by index, mutably
    pub fn point_light_mut(&mut self, index: usize) -> Option<&mut PointLight> {
        self.point_lights.get_mut(index)
    }

    /// All point lights in slot order
    pub fn point_lights(&self) -> &[PointLight] {
        &self.point_lights
    }

    /// Number of point lights
    pub fn point_lights_count(&self) -> usize {
        self.point_lights.len()
    }

    /// Remove a point light; later lights shift down one slot
    pub fn remove_point_light(&mut self, index: usize) -> Option<PointLight> {
        (index < self.point_lights.len()).then(|| self.point_lights.remove(index))
    }

    /// Remove every point light
    pub fn remove_all_point_lights(&mut self) {
        self.point_lights.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_point_light_limit() {
        let mut lights = LightManager::new();
        for expected in 0..MAX_POINT_LIGHTS {
            assert_eq!(lights.create_point_light().unwrap(), expected);
        }
        assert!(lights.create_point_light().is_err());

        lights.remove_point_light(1);
        assert_eq!(lights.point_lights_count(), 3);
        assert!(lights.remove_point_light(10).is_none());
    }

    #[test]
    fn test_directional_defaults() {
        let light = DirectionalLight::default();
        assert!(!light.is_enabled());
        assert_relative_eq!(light.direction().norm(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(light.direction().x, -1.0 / 3.0_f32.sqrt(), epsilon = 1e-6);
    }

    #[test]
    fn test_projection_view_combines_matrices() {
        let mut light = DirectionalLight::default();
        light.set_direction(Vec3::new(0.0, -1.0, -0.001));
        light.look_from(Vec3::new(0.0, 5.0, 0.0));
        light.fit_projection(Vec3::new(2.0, 2.0, 10.0));
        assert_relative_eq!(light.projection_view_matrix(), light.projection_matrix() * light.view_matrix());
    }

    #[test]
    fn test_attenuation_must_be_positive() {
        let mut light = PointLight::default();
        assert!(light.set_attenuation(0.0, 0.1).is_err());
        assert!(light.set_attenuation(0.2, 0.1).is_ok());
        assert_eq!(light.linear_factor(), 0.2);
    }

    #[test]
    fn test_vertical_light_view_is_finite() {
        for direction in [Vec3::new(0.0, -1.0, 0.0), Vec3::new(0.0, 1.0, 0.0)] {
            let mut light = DirectionalLight::default();
            light.set_direction(direction);
            light.look_from(Vec3::new(1.0, 5.0, -2.0));

            let view = light.view_matrix();
            assert!(view.iter().all(|v| v.is_finite()), "{direction:?}");
            // The view looks down its own -Z axis
            let forward = view.transform_vector(&direction);
            assert_relative_eq!(forward, Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-5);
        }
    }
}
