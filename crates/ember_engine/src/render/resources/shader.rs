//! Shader programs and their sources
//!
//! [`ShaderLibrary`] resolves the GLSL sources of the built-in passes, either
//! from the copies embedded in the crate or from a directory on disk (useful
//! while editing shaders). [`ShaderProgram`] caches uniform locations by name;
//! writing an unknown uniform is logged once and otherwise ignored.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, EngineResult};
use crate::render::api::{ProgramId, ProgramSources, UniformLocation, UniformValue};
use crate::render::state::{ReleaseQueue, Released, StateCache};

/// GLSL sources of one program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    /// Vertex stage
    pub vertex: String,
    /// Fragment stage
    pub fragment: String,
    /// Optional geometry stage
    pub geometry: Option<String>,
}

impl ShaderSource {
    /// Vertex and fragment sources
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self { vertex: vertex.into(), fragment: fragment.into(), geometry: None }
    }

    /// Add a geometry stage
    pub fn with_geometry(mut self, geometry: impl Into<String>) -> Self {
        self.geometry = Some(geometry.into());
        self
    }
}

/// Linked program with a uniform location cache
#[derive(Debug)]
pub struct ShaderProgram {
    id: ProgramId,
    name: String,
    locations: HashMap<String, Option<UniformLocation>>,
    releases: ReleaseQueue,
}

impl ShaderProgram {
    /// Compile and link `source`
    ///
    /// Compile or link failures are returned as resource errors carrying the
    /// driver log.
    pub fn create(state: &mut StateCache, name: impl Into<String>, source: &ShaderSource) -> EngineResult<Self> {
        let name = name.into();
        let sources = ProgramSources {
            vertex: &source.vertex,
            fragment: &source.fragment,
            geometry: source.geometry.as_deref(),
        };
        let id = state
            .device()
            .create_program(&sources)
            .map_err(|log| EngineError::resource(&name, "ShaderProgram::create", format!("Shader program build failed:\n{log}")))?;
        log::debug!(target: "shader_program", "Shader program [{}] created.", name);
        Ok(Self { id, name, locations: HashMap::new(), releases: state.release_queue() })
    }

    /// Device handle
    pub fn id(&self) -> ProgramId {
        self.id
    }

    /// Program name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write a uniform of this program
    ///
    /// The program should be active. Unknown names are skipped with a warning
    /// the first time they are seen.
    pub fn set_uniform(&mut self, state: &mut StateCache, name: &str, value: impl Into<UniformValue>) {
        let location = match self.locations.get(name) {
            Some(location) => *location,
            None => {
                let location = state.device().uniform_location(self.id, name);
                if location.is_none() {
                    log::warn!(target: "shader_program", "Shader program [{}] has no uniform [{}].", self.name, name);
                }
                self.locations.insert(name.to_string(), location);
                location
            }
        };
        if let Some(location) = location {
            state.device().set_uniform(location, &value.into());
        }
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        self.releases.push(Released::Program(self.id));
    }
}

/// Programs used by the built-in render passes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinShader {
    /// Lit, textured, shadowed 3D objects
    Basic,
    /// Flat-colored stencil outline
    Outline,
    /// Flat-colored wireframe overview
    Polygon,
    /// Directional light depth map
    DirectionalDepth,
    /// Point light depth cube map
    PointDepth,
    /// Water surface
    Water,
    /// Skybox cube
    Skybox,
    /// Full-screen postprocess
    Postprocess,
    /// Billboard particles
    Particle,
    /// Text glyphs
    Font,
}

impl BuiltinShader {
    /// (vertex, fragment, geometry) file names
    pub const fn files(self) -> (&'static str, &'static str, Option<&'static str>) {
        match self {
            Self::Basic => ("basic.vert", "basic.frag", None),
            Self::Outline => ("flat.vert", "outline.frag", None),
            Self::Polygon => ("flat.vert", "polygon.frag", None),
            Self::DirectionalDepth => ("depth_directional.vert", "depth_directional.frag", None),
            Self::PointDepth => ("depth_point.vert", "depth_point.frag", Some("depth_point.geom")),
            Self::Water => ("water.vert", "water.frag", None),
            Self::Skybox => ("skybox.vert", "skybox.frag", None),
            Self::Postprocess => ("postprocess.vert", "postprocess.frag", None),
            Self::Particle => ("particle.vert", "particle.frag", None),
            Self::Font => ("font.vert", "font.frag", None),
        }
    }

    /// Program name used in logs
    pub const fn program_name(self) -> &'static str {
        match self {
            Self::Basic => "basic_shader_program",
            Self::Outline => "outline_shader_program",
            Self::Polygon => "polygon_shader_program",
            Self::DirectionalDepth => "depth_map_dir_light_shader_program",
            Self::PointDepth => "depth_map_point_light_shader_program",
            Self::Water => "water_shader_program",
            Self::Skybox => "skybox_shader_program",
            Self::Postprocess => "postprocess_shader_program",
            Self::Particle => "particle_shader_program",
            Self::Font => "font_shader_program",
        }
    }
}

fn embedded_source(file: &str) -> Option<&'static str> {
    let source = match file {
        "basic.vert" => include_str!("../../../shaders/basic.vert"),
        "basic.frag" => include_str!("../../../shaders/basic.frag"),
        "flat.vert" => include_str!("../../../shaders/flat.vert"),
        "outline.frag" => include_str!("../../../shaders/outline.frag"),
        "polygon.frag" => include_str!("../../../shaders/polygon.frag"),
        "depth_directional.vert" => include_str!("../../../shaders/depth_directional.vert"),
        "depth_directional.frag" => include_str!("../../../shaders/depth_directional.frag"),
        "depth_point.vert" => include_str!("../../../shaders/depth_point.vert"),
        "depth_point.geom" => include_str!("../../../shaders/depth_point.geom"),
        "depth_point.frag" => include_str!("../../../shaders/depth_point.frag"),
        "water.vert" => include_str!("../../../shaders/water.vert"),
        "water.frag" => include_str!("../../../shaders/water.frag"),
        "skybox.vert" => include_str!("../../../shaders/skybox.vert"),
        "skybox.frag" => include_str!("../../../shaders/skybox.frag"),
        "postprocess.vert" => include_str!("../../../shaders/postprocess.vert"),
        "postprocess.frag" => include_str!("../../../shaders/postprocess.frag"),
        "particle.vert" => include_str!("../../../shaders/particle.vert"),
        "particle.frag" => include_str!("../../../shaders/particle.frag"),
        "font.vert" => include_str!("../../../shaders/font.vert"),
        "font.frag" => include_str!("../../../shaders/font.frag"),
        _ => return None,
    };
    Some(source)
}

/// Where built-in shader sources come from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ShaderLibrary {
    /// Sources compiled into the crate
    #[default]
    Embedded,
    /// Sources read from files in a directory
    Directory(PathBuf),
}

impl ShaderLibrary {
    /// Library reading from `dir`
    pub fn from_directory(dir: impl AsRef<Path>) -> Self {
        Self::Directory(dir.as_ref().to_path_buf())
    }

    /// Resolve the sources of a built-in program
    pub fn source(&self, shader: BuiltinShader) -> EngineResult<ShaderSource> {
        let (vertex, fragment, geometry) = shader.files();
        let mut source = ShaderSource::new(self.read(vertex)?, self.read(fragment)?);
        if let Some(geometry) = geometry {
            source = source.with_geometry(self.read(geometry)?);
        }
        Ok(source)
    }

    /// Resolve and build a built-in program
    pub fn load(&self, state: &mut StateCache, shader: BuiltinShader) -> EngineResult<ShaderProgram> {
        let source = self.source(shader)?;
        ShaderProgram::create(state, shader.program_name(), &source)
    }

    fn read(&self, file: &str) -> EngineResult<String> {
        match self {
            Self::Embedded => embedded_source(file)
                .map(str::to_string)
                .ok_or_else(|| EngineError::resource("shader_library", "ShaderLibrary::read", format!("Unknown shader file [{file}]."))),
            Self::Directory(dir) => {
                let path = dir.join(file);
                std::fs::read_to_string(&path).map_err(|e| {
                    EngineError::resource(
                        "shader_library",
                        "ShaderLibrary::read",
                        format!("Shader file [{}] open error: {e}", path.display()),
                    )
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::recording::{GpuCall, RecordingDevice};

    const ALL: [BuiltinShader; 10] = [
        BuiltinShader::Basic,
        BuiltinShader::Outline,
        BuiltinShader::Polygon,
        BuiltinShader::DirectionalDepth,
        BuiltinShader::PointDepth,
        BuiltinShader::Water,
        BuiltinShader::Skybox,
        BuiltinShader::Postprocess,
        BuiltinShader::Particle,
        BuiltinShader::Font,
    ];

    #[test]
    fn test_every_builtin_is_embedded() {
        for shader in ALL {
            let source = ShaderLibrary::Embedded.source(shader).unwrap();
            assert!(source.vertex.starts_with("#version 330"), "{:?} vertex stage", shader);
            assert!(source.fragment.starts_with("#version 330"), "{:?} fragment stage", shader);
        }
        assert!(ShaderLibrary::Embedded.source(BuiltinShader::PointDepth).unwrap().geometry.is_some());
    }

    #[test]
    fn test_missing_directory_file_is_resource_error() {
        let library = ShaderLibrary::from_directory("/nonexistent/shader/dir");
        assert!(matches!(library.source(BuiltinShader::Basic), Err(EngineError::ResourceLoad { .. })));
    }

    #[test]
    fn test_compile_failure_carries_driver_log() {
        let mut state = StateCache::new(Box::new(RecordingDevice::new().with_compile_error("0:1: syntax error")));
        match ShaderLibrary::Embedded.load(&mut state, BuiltinShader::Basic) {
            Err(EngineError::ResourceLoad { message, .. }) => assert!(message.contains("syntax error")),
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_uniform_lookup_is_cached() {
        let device = RecordingDevice::new();
        let log = device.log();
        let mut state = StateCache::new(Box::new(device));
        let mut program = ShaderProgram::create(&mut state, "p", &ShaderSource::new("v", "f")).unwrap();
        state.activate_shader_program(&program);
        program.set_uniform(&mut state, "fog.enabled", true);
        program.set_uniform(&mut state, "fog.enabled", false);

        assert_eq!(program.locations.len(), 1);
        assert_eq!(log.count(|c| matches!(c, GpuCall::SetUniform { .. })), 2);
        assert_eq!(log.last_uniform("fog.enabled"), Some(UniformValue::Int(0)));
    }
}
