//! Cube-mapped skybox

use std::rc::Rc;

use crate::error::{EngineError, EngineResult};
use crate::foundation::math::{utils, Vec3};
use crate::render::api::TextureKind;
use crate::render::mesh::{MeshBuffers, MeshData, ModelTransform};
use crate::render::resources::Texture;
use crate::render::state::StateCache;

#[rustfmt::skip]
const CUBE_POSITIONS: [f32; 108] = [
    -1.0,  1.0, -1.0,  -1.0, -1.0, -1.0,   1.0, -1.0, -1.0,
     1.0, -1.0, -1.0,   1.0,  1.0, -1.0,  -1.0,  1.0, -1.0,

    -1.0, -1.0,  1.0,  -1.0, -1.0, -1.0,  -1.0,  1.0, -1.0,
    -1.0,  1.0, -1.0,  -1.0,  1.0,  1.0,  -1.0, -1.0,  1.0,

     1.0, -1.0, -1.0,   1.0, -1.0,  1.0,   1.0,  1.0,  1.0,
     1.0,  1.0,  1.0,   1.0,  1.0, -1.0,   1.0, -1.0, -1.0,

    -1.0, -1.0,  1.0,  -1.0,  1.0,  1.0,   1.0,  1.0,  1.0,
     1.0,  1.0,  1.0,   1.0, -1.0,  1.0,  -1.0, -1.0,  1.0,

    -1.0,  1.0, -1.0,   1.0,  1.0, -1.0,   1.0,  1.0,  1.0,
     1.0,  1.0,  1.0,  -1.0,  1.0,  1.0,  -1.0,  1.0, -1.0,

    -1.0, -1.0, -1.0,  -1.0, -1.0,  1.0,   1.0, -1.0, -1.0,
     1.0, -1.0, -1.0,  -1.0, -1.0,  1.0,   1.0, -1.0,  1.0,
];

/// Sky cube sampled from a cube map
#[derive(Debug)]
pub struct Skybox {
    name: String,
    buffers: MeshBuffers,
    transform: ModelTransform,
    texture: Option<Rc<Texture>>,
    filter_color: Vec3,
}

impl Skybox {
    /// Upload the 36-vertex cube
    pub fn new(state: &mut StateCache, name: impl Into<String>) -> Self {
        let buffers = MeshBuffers::upload(state, &MeshData::positions(CUBE_POSITIONS.to_vec(), 3));
        Self {
            name: name.into(),
            buffers,
            transform: ModelTransform::new(),
            texture: None,
            filter_color: Vec3::new(1.0, 1.0, 1.0),
        }
    }

    /// Skybox name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// GPU buffers
    pub fn buffers(&self) -> &MeshBuffers {
        &self.buffers
    }

    /// Model transform (rotation only)
    pub fn transform(&self) -> &ModelTransform {
        &self.transform
    }

    /// Rotate the sky about the vertical axis
    pub fn rotate(&mut self, angle: f32) {
        self.transform.rotate(angle, Vec3::y());
    }

    /// Set the absolute rotation about the vertical axis
    pub fn set_rotation_angle(&mut self, angle: f32) {
        self.transform.set_rotation_angle(angle, Vec3::y());
    }

    /// Cube map, if any
    pub fn texture(&self) -> Option<&Rc<Texture>> {
        self.texture.as_ref()
    }

    /// Set or clear the cube map; other texture kinds are rejected
    pub fn set_texture(&mut self, texture: Option<Rc<Texture>>) -> EngineResult<()> {
        if let Some(texture) = &texture {
            if texture.kind() != TextureKind::TextureCube {
                return Err(EngineError::usage(
                    &self.name,
                    "Skybox::set_texture",
                    format!("Texture [{}] is not a cube map.", texture.name()),
                ));
            }
        }
        self.texture = texture;
        Ok(())
    }

    /// Color multiplied into the sampled sky
    pub fn filter_color(&self) -> Vec3 {
        self.filter_color
    }

    /// Set the filter color (clamped to [0, 1])
    pub fn set_filter_color(&mut self, color: Vec3) {
        self.filter_color = utils::clamp_color(color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::{TextureDesc, TextureFormat};
    use crate::render::backends::recording::RecordingDevice;

    #[test]
    fn test_rejects_flat_texture() {
        let mut state = StateCache::new(Box::new(RecordingDevice::new()));
        let mut skybox = Skybox::new(&mut state, "sky");
        assert_eq!(skybox.buffers().vertex_count(), 36);

        let desc = TextureDesc { kind: TextureKind::Texture2D, width: 2, height: 2, format: TextureFormat::Rgb, samples: 1 };
        let flat = Rc::new(Texture::create(&mut state, "flat", desc));
        assert!(skybox.set_texture(Some(flat)).is_err());

        let cube = Rc::new(Texture::create(&mut state, "cube", TextureDesc { kind: TextureKind::TextureCube, ..desc }));
        assert!(skybox.set_texture(Some(cube)).is_ok());
        assert!(skybox.texture().is_some());
    }
}
