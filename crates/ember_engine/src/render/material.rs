//! Surface materials

use std::rc::Rc;

use crate::error::{ensure, EngineResult};
use crate::foundation::math::{utils, Vec3};
use crate::render::resources::Texture;

/// Phong material with optional diffuse and normal-map textures
///
/// Textures are shared: one texture may back several materials.
#[derive(Debug, Clone)]
pub struct Material {
    name: String,
    ka: Vec3,
    kd: Vec3,
    ks: Vec3,
    shininess: u32,
    reflectivity: f32,
    diffuse_texture: Option<Rc<Texture>>,
    normalmap_texture: Option<Rc<Texture>>,
}

impl Material {
    /// Black, non-reflective material without textures
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ka: Vec3::zeros(),
            kd: Vec3::zeros(),
            ks: Vec3::zeros(),
            shininess: 0,
            reflectivity: 0.0,
            diffuse_texture: None,
            normalmap_texture: None,
        }
    }

    /// Material name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ambient coefficient
    pub fn ka(&self) -> Vec3 {
        self.ka
    }

    /// Set the ambient coefficient (clamped to [0, 1])
    pub fn set_ka(&mut self, ka: Vec3) {
        self.ka = utils::clamp_color(ka);
    }

    /// Diffuse coefficient
    pub fn kd(&self) -> Vec3 {
        self.kd
    }

    /// Set the diffuse coefficient (clamped to [0, 1])
    pub fn set_kd(&mut self, kd: Vec3) {
        self.kd = utils::clamp_color(kd);
    }

    /// Specular coefficient
    pub fn ks(&self) -> Vec3 {
        self.ks
    }

    /// Set the specular coefficient (clamped to [0, 1])
    pub fn set_ks(&mut self, ks: Vec3) {
        self.ks = utils::clamp_color(ks);
    }

    /// Specular exponent
    pub fn shininess(&self) -> u32 {
        self.shininess
    }

    /// Set the specular exponent
    pub fn set_shininess(&mut self, shininess: u32) {
        self.shininess = shininess;
    }

    /// Environment map mix factor
    pub fn reflectivity(&self) -> f32 {
        self.reflectivity
    }

    /// Set the environment map mix factor (>= 0)
    pub fn set_reflectivity(&mut self, reflectivity: f32) -> EngineResult<()> {
        ensure(
            reflectivity >= 0.0,
            &self.name,
            "Material::set_reflectivity",
            "Reflectivity value out of range: {0.0 <= VALUE}.",
        )?;
        self.reflectivity = reflectivity;
        Ok(())
    }

    /// Diffuse texture, if any
    pub fn diffuse_texture(&self) -> Option<&Rc<Texture>> {
        self.diffuse_texture.as_ref()
    }

    /// Set or clear the diffuse texture
    pub fn set_diffuse_texture(&mut self, texture: Option<Rc<Texture>>) {
        self.diffuse_texture = texture;
    }

    /// Normal-map texture, if any
    pub fn normalmap_texture(&self) -> Option<&Rc<Texture>> {
        self.normalmap_texture.as_ref()
    }

    /// Set or clear the normal-map texture
    pub fn set_normalmap_texture(&mut self, texture: Option<Rc<Texture>>) {
        self.normalmap_texture = texture;
    }
}
