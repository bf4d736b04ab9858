//! # Ember Engine
//!
//! A multi-pass OpenGL rendering engine: shadow-mapped lighting, outlined
//! objects, planar water with reflection and refraction, particles, a
//! postprocess stage and a text overlay, driven by a single-threaded frame
//! loop.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ember_engine::prelude::*;
//!
//! fn main() -> Result<(), EngineError> {
//!     logging::init();
//!     let mut renderer = MasterRenderer::open(&EngineConfig::default())?;
//!     let mut scene = Scene::new("main");
//!     renderer.set_callback(move |renderer| renderer.draw_scene(&mut scene));
//!     renderer.start()
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod error;
pub mod foundation;
pub mod input;
pub mod render;

pub use config::{Config, ConfigError, DisplayConfig, EngineConfig};
pub use error::{EngineError, EngineResult};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, DisplayConfig, EngineConfig},
        error::{EngineError, EngineResult},
        foundation::{
            logging::{self, LoggerConfig},
            math::{Mat4, Mat4Ext, Vec2, Vec3, Vec4},
            time::{FpsCounter, PeriodicTimer},
        },
        input::{Input, Key, MouseButton},
        render::{
            BlendFunction, Camera, Display, Fog, Glyph, GlyphRasterizer, LightManager, Material, MasterRenderer,
            MeshData, MoveDirection, Object3D, Particle, ParticleSystem, PolygonMode, PostprocessConfig,
            PostprocessEffect, Scene, ShadowMapConfig, SharedCamera, Skybox, StateCache, Text, Texture, TextureLoader,
            WaterTile,
        },
    };
}
