//! Renderable meshes
//!
//! All mesh kinds share [`MeshBuffers`] for their GPU data and
//! [`ModelTransform`] for placement. Drawing goes through [`MeshKind::draw`].

pub mod base;
pub mod object3d;
pub mod particle;
pub mod skybox;
pub mod water_tile;

pub use base::{MeshBuffers, MeshData, MeshKind, ModelTransform};
pub use object3d::{Object3D, Object3DEntity, Outline};
pub use particle::{Particle, ParticleGenerator, ParticleSystem};
pub use skybox::Skybox;
pub use water_tile::WaterTile;
