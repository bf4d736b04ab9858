//! # Configuration System
//!
//! Every configuration struct can be loaded from and saved to TOML or RON
//! files through the [`Config`] trait; the format is picked from the file
//! extension. [`EngineConfig`] aggregates the display, logger and render pass
//! settings of one application.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::foundation::logging::LoggerConfig;
use crate::foundation::math::{utils, Vec3};
use crate::render::settings::{Fog, PolygonMode, PostprocessConfig, ShadowMapConfig, WaterConfig};

/// Load/save support for serde configuration structs
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from a `.toml` or `.ron` file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        match Format::of(path)? {
            Format::Toml => toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            Format::Ron => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
        }
    }

    /// Save configuration to a `.toml` or `.ron` file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match Format::of(path)? {
            Format::Toml => toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?,
            Format::Ron => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
        };
        std::fs::write(path, contents)?;
        Ok(())
    }
}

enum Format {
    Toml,
    Ron,
}

impl Format {
    fn of(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("ron") => Ok(Self::Ron),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Window and swap chain settings
///
/// Read once when the window is created; later edits have no effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Window width in pixels
    pub width: u32,
    /// Window height in pixels
    pub height: u32,
    /// Window caption
    pub title: String,
    /// Open fullscreen on the primary monitor
    pub fullscreen: bool,
    /// Samples of the multisampled scene target
    pub msaa_samples: u32,
    /// Wait for vertical sync on swap
    pub vsync: bool,
    /// Clear colour of the default framebuffer
    pub background_color: Vec3,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "Ember Engine".to_string(),
            fullscreen: false,
            msaa_samples: 4,
            vsync: true,
            background_color: Vec3::zeros(),
        }
    }
}

impl DisplayConfig {
    /// Set the window size
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the window caption
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the background colour, clamped to [0, 1]
    pub fn with_background_color(mut self, color: Vec3) -> Self {
        self.background_color = utils::clamp_color(color);
        self
    }

    /// Width / height
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// Check ranges
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err("Display size must be greater than 0".to_string());
        }
        if self.msaa_samples == 0 {
            return Err("MSAA samples must be at least 1".to_string());
        }
        if !self.background_color.iter().all(|c| (0.0..=1.0).contains(c)) {
            return Err("Background colour channels must be within [0, 1]".to_string());
        }
        Ok(())
    }
}

impl Config for DisplayConfig {}

/// Everything an application configures before the first frame
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Read shader sources from this directory instead of the embedded copies
    pub shader_dir: Option<PathBuf>,
    /// Window settings
    pub display: DisplayConfig,
    /// Logger settings
    pub logger: LoggerConfig,
    /// Distance fog
    pub fog: Fog,
    /// Shadow mapping
    pub shadows: ShadowMapConfig,
    /// Wireframe debug view
    pub polygon_mode: PolygonMode,
    /// Postprocess effect
    pub postprocess: PostprocessConfig,
    /// Water offscreen resolutions
    pub water: WaterConfig,
}

impl EngineConfig {
    /// Check every member, failing on the first invalid one
    pub fn validate(&self) -> Result<(), String> {
        self.display.validate()?;
        self.fog.validate()?;
        self.shadows.validate()?;
        self.polygon_mode.validate()?;
        self.postprocess.validate()?;
        self.water.validate()?;
        Ok(())
    }
}

impl Config for EngineConfig {}
