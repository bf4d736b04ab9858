//! Particles and particle systems
//!
//! A [`ParticleSystem`] spawns particles from a generator closure at a fixed
//! rate, integrates them every frame and keeps them sorted back to front for
//! alpha blending.

use std::fmt;
use std::rc::Rc;

use crate::error::{ensure, EngineResult};
use crate::foundation::math::Vec3;
use crate::render::resources::Texture;
use crate::render::state::BlendFunction;

/// Default downward acceleration
pub const DEFAULT_GRAVITY: f32 = -15.0;

/// One simulated billboard
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    position: Vec3,
    velocity: Vec3,
    gravity: f32,
    gravity_effect: f32,
    life_length: f32,
    rotation: f32,
    scale: f32,
    elapsed_time: f32,
    texture_index: u32,
    distance: f32,
    alive: bool,
}

impl Particle {
    /// Create a particle
    ///
    /// `life_length` and `scale` must be positive, `gravity_effect` must not be
    /// negative.
    pub fn new(
        position: Vec3,
        velocity: Vec3,
        life_length: f32,
        gravity: f32,
        gravity_effect: f32,
        rotation: f32,
        scale: f32,
    ) -> EngineResult<Self> {
        ensure(life_length > 0.0, "particle", "Particle::new", "Life length value out of range: {0.0 < VALUE}.")?;
        ensure(gravity_effect >= 0.0, "particle", "Particle::new", "Gravity effect value out of range: {0.0 <= VALUE}.")?;
        ensure(scale > 0.0, "particle", "Particle::new", "Scale value out of range: {0.0 < VALUE}.")?;
        Ok(Self {
            position,
            velocity,
            gravity,
            gravity_effect,
            life_length,
            rotation,
            scale,
            elapsed_time: 0.0,
            texture_index: 0,
            distance: 0.0,
            alive: true,
        })
    }

    /// Particle with default gravity and full gravity effect
    pub fn simple(position: Vec3, velocity: Vec3, life_length: f32, scale: f32) -> EngineResult<Self> {
        Self::new(position, velocity, life_length, DEFAULT_GRAVITY, 1.0, 0.0, scale)
    }

    /// Integrate one step and age the particle
    pub fn update(&mut self, delta: f32) {
        self.velocity.y += self.gravity * self.gravity_effect * delta;
        self.position += self.velocity * delta;
        self.elapsed_time += delta;
        self.alive = self.elapsed_time < self.life_length;
    }

    /// Whether the particle is still alive
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// World position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Velocity
    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    /// Rotation about the view axis
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    /// Billboard scale
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Total lifetime in seconds
    pub fn life_length(&self) -> f32 {
        self.life_length
    }

    /// Age in seconds
    pub fn elapsed_time(&self) -> f32 {
        self.elapsed_time
    }

    /// Current atlas cell
    pub fn texture_index(&self) -> u32 {
        self.texture_index
    }

    /// Move to the next atlas cell if the age passed the current cell's share of the lifetime
    pub fn advance_texture_index(&mut self, atlas_size: u32) {
        let cells = atlas_size as f32 * atlas_size as f32;
        let cell_time = self.life_length / cells;
        if self.elapsed_time > (self.texture_index + 1) as f32 * cell_time {
            self.texture_index += 1;
        }
    }

    /// Distance to the camera computed during the last update
    pub fn distance(&self) -> f32 {
        self.distance
    }

    fn refresh_distance(&mut self, camera_position: Vec3) {
        self.distance = (camera_position - self.position).norm();
    }
}

/// Generator invoked for every spawned particle
pub type ParticleGenerator = Box<dyn FnMut(Vec3) -> EngineResult<Particle>>;

/// Emitter with its live particles
pub struct ParticleSystem {
    name: String,
    position: Vec3,
    particles_per_second: f32,
    elapsed_time: f32,
    atlas_size: u32,
    texture: Option<Rc<Texture>>,
    animated: bool,
    sorting: bool,
    blend_function: BlendFunction,
    generator: Option<ParticleGenerator>,
    particles: Vec<Particle>,
}

impl fmt::Debug for ParticleSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParticleSystem")
            .field("name", &self.name)
            .field("position", &self.position)
            .field("particles_per_second", &self.particles_per_second)
            .field("atlas_size", &self.atlas_size)
            .field("particles", &self.particles.len())
            .finish_non_exhaustive()
    }
}

impl ParticleSystem {
    /// Emitter spawning `particles_per_second` particles (> 0)
    pub fn new(name: impl Into<String>, particles_per_second: f32) -> EngineResult<Self> {
        let name = name.into();
        ensure(
            particles_per_second > 0.0,
            &name,
            "ParticleSystem::new",
            "Particles per second value out of range: {0.0 < VALUE}.",
        )?;
        Ok(Self {
            name,
            position: Vec3::zeros(),
            particles_per_second,
            elapsed_time: 0.0,
            atlas_size: 1,
            texture: None,
            animated: true,
            sorting: true,
            blend_function: BlendFunction::Normal,
            generator: None,
            particles: Vec::new(),
        })
    }

    /// System name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Emission point
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Move the emission point
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Spawn rate
    pub fn particles_per_second(&self) -> f32 {
        self.particles_per_second
    }

    /// Set the spawn rate (> 0)
    pub fn set_particles_per_second(&mut self, particles_per_second: f32) -> EngineResult<()> {
        ensure(
            particles_per_second > 0.0,
            &self.name,
            "ParticleSystem::set_particles_per_second",
            "Particles per second value out of range: {0.0 < VALUE}.",
        )?;
        self.particles_per_second = particles_per_second;
        Ok(())
    }

    /// Cells per atlas side
    pub fn atlas_size(&self) -> u32 {
        self.atlas_size
    }

    /// Set the cells per atlas side (> 0)
    pub fn set_atlas_size(&mut self, atlas_size: u32) -> EngineResult<()> {
        ensure(atlas_size > 0, &self.name, "ParticleSystem::set_atlas_size", "Atlas size value out of range: {0 < VALUE}.")?;
        self.atlas_size = atlas_size;
        Ok(())
    }

    /// Particle texture
    pub fn texture(&self) -> Option<&Rc<Texture>> {
        self.texture.as_ref()
    }

    /// Set or clear the particle texture
    pub fn set_texture(&mut self, texture: Option<Rc<Texture>>) {
        self.texture = texture;
    }

    /// Whether the atlas animation runs
    pub fn is_animated(&self) -> bool {
        self.animated
    }

    /// Enable or disable atlas animation
    pub fn set_animated(&mut self, animated: bool) {
        self.animated = animated;
    }

    /// Whether particles are sorted back to front
    pub fn is_sorting(&self) -> bool {
        self.sorting
    }

    /// Enable or disable sorting
    pub fn set_sorting(&mut self, sorting: bool) {
        self.sorting = sorting;
    }

    /// Blending used while drawing the system
    pub fn blend_function(&self) -> BlendFunction {
        self.blend_function
    }

    /// Select the blending used while drawing the system
    pub fn set_blend_function(&mut self, blend_function: BlendFunction) {
        self.blend_function = blend_function;
    }

    /// Install the closure that builds new particles from the emission point
    pub fn set_generator(&mut self, generator: impl FnMut(Vec3) -> EngineResult<Particle> + 'static) {
        self.generator = Some(Box::new(generator));
    }

    /// Add a particle directly
    pub fn emit(&mut self, particle: Particle) {
        self.particles.push(particle);
    }

    /// Live particles, farthest first when sorting is enabled
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Live particles, mutably
    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    /// Spawn due particles, integrate all of them, drop the dead ones and sort
    pub fn update(&mut self, delta: f32, camera_position: Vec3) -> EngineResult<()> {
        self.generate(delta)?;

        for particle in &mut self.particles {
            particle.update(delta);
        }
        self.particles.retain(Particle::is_alive);
        for particle in &mut self.particles {
            particle.refresh_distance(camera_position);
        }
        if self.sorting {
            self.particles.sort_by(|a, b| b.distance.total_cmp(&a.distance));
        }
        Ok(())
    }

    fn generate(&mut self, delta: f32) -> EngineResult<()> {
        let Some(generator) = self.generator.as_mut() else {
            return Ok(());
        };
        let rate = 1.0 / self.particles_per_second;
        self.elapsed_time += delta;
        if self.elapsed_time >= rate {
            let count = (self.elapsed_time / rate).floor() as usize;
            for _ in 0..count {
                self.particles.push(generator(self.position)?);
            }
            self.elapsed_time = 0.0;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resting(z: f32) -> Particle {
        Particle::new(Vec3::new(0.0, 0.0, z), Vec3::zeros(), 10.0, 0.0, 0.0, 0.0, 1.0).unwrap()
    }

    #[test]
    fn test_particle_dies_at_life_length() {
        let mut particle = Particle::new(Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0), 1.0, 0.0, 0.0, 0.0, 1.0).unwrap();
        for _ in 0..3 {
            particle.update(0.25);
            assert!(particle.is_alive());
        }
        particle.update(0.25);
        assert!(!particle.is_alive());
        assert_eq!(particle.position(), Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_dead_particles_leave_the_system() {
        let mut system = ParticleSystem::new("sparks", 1.0).unwrap();
        system.emit(Particle::new(Vec3::zeros(), Vec3::zeros(), 1.0, 0.0, 0.0, 0.0, 1.0).unwrap());
        for _ in 0..3 {
            system.update(0.25, Vec3::zeros()).unwrap();
            assert_eq!(system.particles().len(), 1);
        }
        system.update(0.25, Vec3::zeros()).unwrap();
        assert!(system.particles().is_empty());

        system.update(0.25, Vec3::zeros()).unwrap();
        assert!(system.particles().is_empty());
    }

    #[test]
    fn test_sorted_back_to_front() {
        let mut system = ParticleSystem::new("smoke", 1.0).unwrap();
        for z in [-5.0, -1.0, -3.0] {
            system.emit(resting(z));
        }
        system.update(0.001, Vec3::zeros()).unwrap();
        let distances: Vec<f32> = system.particles().iter().map(Particle::distance).collect();
        assert_eq!(distances, vec![5.0, 3.0, 1.0]);
    }

    #[test]
    fn test_generation_rate() {
        let mut system = ParticleSystem::new("fountain", 10.0).unwrap();
        system.set_generator(|origin| Particle::simple(origin, Vec3::new(0.0, 5.0, 0.0), 5.0, 0.5));

        system.update(0.05, Vec3::zeros()).unwrap();
        assert!(system.particles().is_empty());

        system.update(0.3, Vec3::zeros()).unwrap();
        assert_eq!(system.particles().len(), 3);
    }

    #[test]
    fn test_validation() {
        assert!(Particle::new(Vec3::zeros(), Vec3::zeros(), 0.0, 0.0, 0.0, 0.0, 1.0).is_err());
        assert!(Particle::new(Vec3::zeros(), Vec3::zeros(), 1.0, 0.0, -1.0, 0.0, 1.0).is_err());
        assert!(Particle::new(Vec3::zeros(), Vec3::zeros(), 1.0, 0.0, 0.0, 0.0, 0.0).is_err());
        assert!(ParticleSystem::new("bad", 0.0).is_err());
    }

    #[test]
    fn test_atlas_index_advances() {
        let mut particle = Particle::new(Vec3::zeros(), Vec3::zeros(), 4.0, 0.0, 0.0, 0.0, 1.0).unwrap();
        particle.update(1.5);
        particle.advance_texture_index(2);
        assert_eq!(particle.texture_index(), 1);
        particle.advance_texture_index(2);
        assert_eq!(particle.texture_index(), 1);

        particle.update(1.0);
        particle.advance_texture_index(2);
        assert_eq!(particle.texture_index(), 2);
    }

    #[test]
    fn test_huge_atlas_does_not_overflow() {
        let mut particle = Particle::new(Vec3::zeros(), Vec3::zeros(), 4.0, 0.0, 0.0, 0.0, 1.0).unwrap();
        particle.update(1.0);
        particle.advance_texture_index(70_000);
        assert_eq!(particle.texture_index(), 1);

        let mut system = ParticleSystem::new("smoke", 1.0).unwrap();
        system.set_atlas_size(u32::MAX).unwrap();
        assert_eq!(system.atlas_size(), u32::MAX);
    }
}
