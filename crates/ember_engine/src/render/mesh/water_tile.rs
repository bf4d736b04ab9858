//! Water surface tiles

use std::rc::Rc;

use crate::error::{ensure, EngineResult};
use crate::foundation::math::{utils, Vec3};
use crate::render::mesh::{MeshBuffers, MeshData, ModelTransform};
use crate::render::resources::Texture;
use crate::render::state::StateCache;

#[rustfmt::skip]
const PLANE_POSITIONS: [f32; 18] = [
    -1.0, 0.0, -1.0,  -1.0, 0.0,  1.0,   1.0, 0.0, -1.0,
     1.0, 0.0, -1.0,  -1.0, 0.0,  1.0,   1.0, 0.0,  1.0,
];

/// Horizontal water plane rendered with reflection and refraction
#[derive(Debug)]
pub struct WaterTile {
    name: String,
    buffers: MeshBuffers,
    transform: ModelTransform,
    water_color: Vec3,
    wave_strength: f32,
    wave_speed: f32,
    shininess: f32,
    texture_tiling: f32,
    move_factor: f32,
    dudv_texture: Option<Rc<Texture>>,
    normal_texture: Option<Rc<Texture>>,
}

impl WaterTile {
    /// Upload a 2x2 plane centred on the origin
    pub fn new(state: &mut StateCache, name: impl Into<String>) -> Self {
        let buffers = MeshBuffers::upload(state, &MeshData::positions(PLANE_POSITIONS.to_vec(), 3));
        Self {
            name: name.into(),
            buffers,
            transform: ModelTransform::new(),
            water_color: Vec3::new(0.0, 0.3, 0.5),
            wave_strength: 0.04,
            wave_speed: 0.01,
            shininess: 10.0,
            texture_tiling: 1.0,
            move_factor: 0.0,
            dudv_texture: None,
            normal_texture: None,
        }
    }

    /// Tile name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// GPU buffers
    pub fn buffers(&self) -> &MeshBuffers {
        &self.buffers
    }

    /// Model transform
    pub fn transform(&self) -> &ModelTransform {
        &self.transform
    }

    /// Model transform, mutably
    pub fn transform_mut(&mut self) -> &mut ModelTransform {
        &mut self.transform
    }

    /// World height of the surface
    pub fn level(&self) -> f32 {
        self.transform.position().y
    }

    /// Base water color
    pub fn water_color(&self) -> Vec3 {
        self.water_color
    }

    /// Set the base water color (clamped to [0, 1])
    pub fn set_water_color(&mut self, color: Vec3) {
        self.water_color = utils::clamp_color(color);
    }

    /// DuDv distortion strength
    pub fn wave_strength(&self) -> f32 {
        self.wave_strength
    }

    /// Set the distortion strength (>= 0)
    pub fn set_wave_strength(&mut self, strength: f32) -> EngineResult<()> {
        ensure(strength >= 0.0, &self.name, "WaterTile::set_wave_strength", "Wave strength value out of range: {0.0 <= VALUE}.")?;
        self.wave_strength = strength;
        Ok(())
    }

    /// Move factor advance per second
    pub fn wave_speed(&self) -> f32 {
        self.wave_speed
    }

    /// Set the wave speed (>= 0)
    pub fn set_wave_speed(&mut self, speed: f32) -> EngineResult<()> {
        ensure(speed >= 0.0, &self.name, "WaterTile::set_wave_speed", "Wave speed value out of range: {0.0 <= VALUE}.")?;
        self.wave_speed = speed;
        Ok(())
    }

    /// Specular exponent of the surface
    pub fn shininess(&self) -> f32 {
        self.shininess
    }

    /// Set the specular exponent (>= 0)
    pub fn set_shininess(&mut self, shininess: f32) -> EngineResult<()> {
        ensure(shininess >= 0.0, &self.name, "WaterTile::set_shininess", "Shininess value out of range: {0.0 <= VALUE}.")?;
        self.shininess = shininess;
        Ok(())
    }

    /// Texture repetitions across the tile
    pub fn texture_tiling(&self) -> f32 {
        self.texture_tiling
    }

    /// Set the texture repetitions (>= 1)
    pub fn set_texture_tiling(&mut self, tiling: f32) -> EngineResult<()> {
        ensure(tiling >= 1.0, &self.name, "WaterTile::set_texture_tiling", "Texture tiling value out of range: {1.0 <= VALUE}.")?;
        self.texture_tiling = tiling;
        Ok(())
    }

    /// Current scroll offset in [0, 1)
    pub fn move_factor(&self) -> f32 {
        self.move_factor
    }

    /// Advance the scroll offset by `wave_speed * delta`, wrapping to 0 at 1
    pub fn advance_move_factor(&mut self, delta: f32) {
        self.move_factor += self.wave_speed * delta;
        if self.move_factor >= 1.0 {
            self.move_factor = 0.0;
        }
    }

    /// DuDv distortion map
    pub fn dudv_texture(&self) -> Option<&Rc<Texture>> {
        self.dudv_texture.as_ref()
    }

    /// Set or clear the DuDv distortion map
    pub fn set_dudv_texture(&mut self, texture: Option<Rc<Texture>>) {
        self.dudv_texture = texture;
    }

    /// Normal map
    pub fn normal_texture(&self) -> Option<&Rc<Texture>> {
        self.normal_texture.as_ref()
    }

    /// Set or clear the normal map
    pub fn set_normal_texture(&mut self, texture: Option<Rc<Texture>>) {
        self.normal_texture = texture;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::recording::RecordingDevice;
    use approx::assert_relative_eq;

    fn tile() -> WaterTile {
        let mut state = StateCache::new(Box::new(RecordingDevice::new()));
        WaterTile::new(&mut state, "lake")
    }

    #[test]
    fn test_level_follows_position() {
        let mut water = tile();
        water.transform_mut().set_position(Vec3::new(3.0, -0.5, 1.0));
        assert_eq!(water.level(), -0.5);
    }

    #[test]
    fn test_move_factor_wraps() {
        let mut water = tile();
        water.set_wave_speed(0.4).unwrap();
        water.advance_move_factor(1.0);
        water.advance_move_factor(1.0);
        assert_relative_eq!(water.move_factor(), 0.8, epsilon = 1e-6);
        water.advance_move_factor(1.0);
        assert_eq!(water.move_factor(), 0.0);
    }

    #[test]
    fn test_setters_validate() {
        let mut water = tile();
        assert!(water.set_texture_tiling(0.5).is_err());
        assert!(water.set_wave_strength(-1.0).is_err());
        assert!(water.set_shininess(20.0).is_ok());
        water.set_water_color(Vec3::new(2.0, 0.1, 0.1));
        assert_eq!(water.water_color(), Vec3::new(1.0, 0.1, 0.1));
    }
}
