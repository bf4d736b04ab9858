//! # Render Settings
//!
//! Runtime-mutable configuration of the render passes. Every struct
//! deserializes with defaults for missing fields and offers `validate()` for
//! values read from files; the `with_*` helpers clamp colours.

use serde::{Deserialize, Serialize};

use crate::foundation::math::{utils, Vec3};

fn check_color(name: &str, color: &Vec3) -> Result<(), String> {
    if color.iter().all(|c| (0.0..=1.0).contains(c)) {
        Ok(())
    } else {
        Err(format!("{name} channels must be within [0, 1]"))
    }
}

/// Height fog blended into the skybox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkyboxFog {
    /// Overall fog density over the sky, [0, 1]
    pub density: f32,
    /// Exponent of the horizon-to-sky transition, >= 0
    pub transition_power: f32,
    /// Sky height where the fog fades out, [0, 1]
    pub height: f32,
}

impl Default for SkyboxFog {
    fn default() -> Self {
        Self { density: 0.0, transition_power: 1.0, height: 0.6 }
    }
}

impl SkyboxFog {
    /// Check ranges
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.density) {
            return Err("Skybox fog density must be within [0, 1]".to_string());
        }
        if self.transition_power < 0.0 {
            return Err("Skybox fog transition power must not be negative".to_string());
        }
        if !(0.0..=1.0).contains(&self.height) {
            return Err("Skybox fog height must be within [0, 1]".to_string());
        }
        Ok(())
    }
}

/// Exponential distance fog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fog {
    /// Whether fog is applied
    pub enabled: bool,
    /// Fog density, [0, 1]
    pub density: f32,
    /// Fog colour
    pub color: Vec3,
    /// Fog over the skybox
    pub skybox: SkyboxFog,
}

impl Default for Fog {
    fn default() -> Self {
        Self { enabled: false, density: 0.05, color: Vec3::new(0.5, 0.5, 0.5), skybox: SkyboxFog::default() }
    }
}

impl Fog {
    /// Set the fog colour, clamped to [0, 1]
    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = utils::clamp_color(color);
        self
    }

    /// Check ranges
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.density) {
            return Err("Fog density must be within [0, 1]".to_string());
        }
        check_color("Fog colour", &self.color)?;
        self.skybox.validate()
    }
}

/// Shadow mapping parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowMapConfig {
    /// Whether shadow maps are rendered and sampled
    pub enabled: bool,
    /// Directional shadow map resolution
    pub directional_map_size: u32,
    /// Point light shadow cube face resolution
    pub point_map_size: u32,
    /// Distance covered by shadows
    pub distance: f32,
    /// Distance over which shadows fade out before `distance`
    pub transition_distance: f32,
    /// Percentage-closer filtering samples per side
    pub pcf_samples: u32,
}

impl Default for ShadowMapConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directional_map_size: 1024,
            point_map_size: 1024,
            distance: 10.0,
            transition_distance: 5.0,
            pcf_samples: 1,
        }
    }
}

impl ShadowMapConfig {
    /// Check ranges
    pub fn validate(&self) -> Result<(), String> {
        if self.directional_map_size == 0 || self.point_map_size == 0 {
            return Err("Shadow map size must be greater than 0".to_string());
        }
        if self.distance <= 0.0 {
            return Err("Shadow distance must be greater than 0".to_string());
        }
        if self.transition_distance <= 0.0 {
            return Err("Shadow transition distance must be greater than 0".to_string());
        }
        if self.pcf_samples == 0 {
            return Err("PCF sample count must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Wireframe debug view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolygonMode {
    /// Rasterize as lines
    pub wireframe: bool,
    /// Line colour of the flat wireframe shader
    pub lines_color: Vec3,
    /// Run the full pipeline in wireframe instead of the flat shader
    pub use_pipeline: bool,
}

impl Default for PolygonMode {
    fn default() -> Self {
        Self { wireframe: false, lines_color: Vec3::new(1.0, 0.0, 0.0), use_pipeline: false }
    }
}

impl PolygonMode {
    /// Set the line colour, clamped to [0, 1]
    pub fn with_lines_color(mut self, color: Vec3) -> Self {
        self.lines_color = utils::clamp_color(color);
        self
    }

    /// Whether the flat wireframe shader replaces the normal pipeline
    pub fn is_flat_wireframe(&self) -> bool {
        self.wireframe && !self.use_pipeline
    }

    /// Check ranges
    pub fn validate(&self) -> Result<(), String> {
        check_color("Lines colour", &self.lines_color)
    }
}

/// Full-screen effect applied after the scene is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PostprocessEffect {
    /// Pass-through
    #[default]
    None,
    /// Inverted colours
    Negative,
    /// Luminance only
    Grayscale,
    /// 3x3 sharpen kernel
    Sharpen,
    /// 3x3 blur kernel
    Blur,
    /// 3x3 edge kernel
    Edge,
    /// Multiplied by the tint colour
    Tint,
}

impl PostprocessEffect {
    /// Value of the `color.effect` uniform
    pub const fn shader_id(self) -> i32 {
        match self {
            Self::None => 0,
            Self::Negative => 1,
            Self::Grayscale => 2,
            Self::Sharpen => 3,
            Self::Blur => 4,
            Self::Edge => 5,
            Self::Tint => 6,
        }
    }
}

/// Postprocess pass parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostprocessConfig {
    /// Selected effect
    pub effect: PostprocessEffect,
    /// Kernel sampling divisor, > 0
    pub kernel_size: f32,
    /// Tint colour for [`PostprocessEffect::Tint`]
    pub tint_color: Vec3,
}

impl Default for PostprocessConfig {
    fn default() -> Self {
        Self { effect: PostprocessEffect::None, kernel_size: 300.0, tint_color: Vec3::new(1.0, 1.0, 1.0) }
    }
}

impl PostprocessConfig {
    /// Set the tint colour, clamped to [0, 1]
    pub fn with_tint_color(mut self, color: Vec3) -> Self {
        self.tint_color = utils::clamp_color(color);
        self
    }

    /// Check ranges
    pub fn validate(&self) -> Result<(), String> {
        if self.kernel_size <= 0.0 {
            return Err("Kernel size must be greater than 0".to_string());
        }
        check_color("Tint colour", &self.tint_color)
    }
}

/// Offscreen resolutions of the water passes
///
/// Frozen once the water framebuffers exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterConfig {
    /// Reflection target width
    pub reflection_width: u32,
    /// Reflection target height
    pub reflection_height: u32,
    /// Refraction target width
    pub refraction_width: u32,
    /// Refraction target height
    pub refraction_height: u32,
}

impl Default for WaterConfig {
    fn default() -> Self {
        Self { reflection_width: 640, reflection_height: 320, refraction_width: 1280, refraction_height: 720 }
    }
}

impl WaterConfig {
    /// Check ranges
    pub fn validate(&self) -> Result<(), String> {
        let sizes = [self.reflection_width, self.reflection_height, self.refraction_width, self.refraction_height];
        if sizes.contains(&0) {
            return Err("Water framebuffer sizes must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Fog::default().validate().is_ok());
        assert!(ShadowMapConfig::default().validate().is_ok());
        assert!(PolygonMode::default().validate().is_ok());
        assert!(PostprocessConfig::default().validate().is_ok());
        assert!(WaterConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_values() {
        let fog = Fog { density: 1.5, ..Fog::default() };
        assert!(fog.validate().is_err());

        let shadows = ShadowMapConfig { pcf_samples: 0, ..ShadowMapConfig::default() };
        assert!(shadows.validate().is_err());

        let water = WaterConfig { refraction_height: 0, ..WaterConfig::default() };
        assert!(water.validate().is_err());

        let postprocess = PostprocessConfig { tint_color: Vec3::new(2.0, 0.0, 0.0), ..PostprocessConfig::default() };
        assert!(postprocess.validate().is_err());
        assert!(postprocess.with_tint_color(Vec3::new(2.0, 0.0, 0.0)).validate().is_ok());
    }

    #[test]
    fn test_effect_ids() {
        assert_eq!(PostprocessEffect::None.shader_id(), 0);
        assert_eq!(PostprocessEffect::Tint.shader_id(), 6);
    }

    #[test]
    fn test_flat_wireframe() {
        let mut mode = PolygonMode { wireframe: true, ..PolygonMode::default() };
        assert!(mode.is_flat_wireframe());
        mode.use_pipeline = true;
        assert!(!mode.is_flat_wireframe());
    }
}
