//! # Rendering System
//!
//! Multi-pass forward renderer on top of a narrow GPU command interface.
//!
//! ## Architecture
//!
//! - **api**: backend-agnostic command trait and resource handles
//! - **backends**: OpenGL and recording implementations of the command trait
//! - **state**: deduplicating cache every bind goes through
//! - **resources**: shaders, textures and framebuffers
//! - **mesh / scene**: renderable content owned by the application
//! - **renderers**: the passes and the [`MasterRenderer`] frame loop
//! - **window**: the display collaborator feeding input and presenting frames

pub mod api;
pub mod backends;
pub mod camera;
pub mod lighting;
pub mod material;
pub mod mesh;
pub mod renderers;
pub mod resources;
pub mod scene;
pub mod settings;
pub mod state;
pub mod text;
pub mod window;

pub use camera::{Camera, FrustumBox, MoveDirection, SharedCamera};
pub use lighting::{DirectionalLight, LightManager, PointLight, MAX_POINT_LIGHTS};
pub use material::Material;
pub use mesh::{MeshData, Object3D, Outline, Particle, ParticleSystem, Skybox, WaterTile};
pub use renderers::{FrameCallback, MasterRenderer};
pub use resources::{FrameBuffer, ShaderLibrary, Texture, TextureLoader};
pub use scene::Scene;
pub use settings::{Fog, PolygonMode, PostprocessConfig, PostprocessEffect, ShadowMapConfig, SkyboxFog, WaterConfig};
pub use state::{BlendFunction, StateCache, StencilAction};
pub use text::{Glyph, GlyphRasterizer, Text};
pub use window::{Display, GlfwDisplay, HeadlessDisplay};
