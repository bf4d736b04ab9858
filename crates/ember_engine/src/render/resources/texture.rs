//! GPU textures

use crate::render::api::{TextureDesc, TextureFilter, TextureFormat, TextureId, TextureKind};
use crate::render::state::{ReleaseQueue, Released, StateCache};

/// A texture living on the GPU
///
/// Shared between materials, framebuffers and renderers through `Rc`; the
/// storage is released once the last owner drops it.
#[derive(Debug)]
pub struct Texture {
    id: TextureId,
    name: String,
    desc: TextureDesc,
    releases: ReleaseQueue,
}

impl Texture {
    /// Allocate storage for a texture described by `desc`
    pub fn create(state: &mut StateCache, name: impl Into<String>, desc: TextureDesc) -> Self {
        let name = name.into();
        let id = state.create_texture(&desc);
        log::debug!(target: "texture", "Texture [{}] created ({}x{}, {:?}).", name, desc.width, desc.height, desc.kind);
        Self { id, name, desc, releases: state.release_queue() }
    }

    /// Device handle
    pub fn id(&self) -> TextureId {
        self.id
    }

    /// Texture name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target kind
    pub fn kind(&self) -> TextureKind {
        self.desc.kind
    }

    /// Storage description
    pub fn desc(&self) -> TextureDesc {
        self.desc
    }

    /// Channels per texel
    pub fn channels(&self) -> u32 {
        self.desc.format.channels()
    }

    /// Width in texels; cube maps have no single width and report 0
    pub fn width(&self) -> u32 {
        if self.desc.kind == TextureKind::TextureCube {
            log::warn!(target: "texture", "Texture [{}] is a cube map, it has no width.", self.name);
            return 0;
        }
        self.desc.width
    }

    /// Height in texels; cube maps have no single height and report 0
    pub fn height(&self) -> u32 {
        if self.desc.kind == TextureKind::TextureCube {
            log::warn!(target: "texture", "Texture [{}] is a cube map, it has no height.", self.name);
            return 0;
        }
        self.desc.height
    }

    /// Per-face size, valid for every kind
    pub fn face_size(&self) -> (u32, u32) {
        (self.desc.width, self.desc.height)
    }

    /// Replace a 2D texture's storage and texels
    pub fn set_data_2d(&mut self, state: &mut StateCache, width: u32, height: u32, format: TextureFormat, data: &[u8]) {
        self.desc.width = width;
        self.desc.height = height;
        self.desc.format = format;
        state.upload_texture(self, 0, data);
    }

    /// Change the sampling filter
    pub fn set_filter(&self, state: &mut StateCache, filter: TextureFilter) {
        state.bind_texture(self);
        state.device().set_texture_filter(self.desc.kind, filter);
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        log::trace!(target: "texture", "Texture [{}] released.", self.name);
        self.releases.push(Released::Texture(self.id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use crate::render::backends::recording::{GpuCall, RecordingDevice};

    #[test]
    fn test_cube_texture_has_no_width() {
        let mut state = StateCache::new(Box::new(RecordingDevice::new()));
        let desc = TextureDesc { kind: TextureKind::TextureCube, width: 512, height: 512, format: TextureFormat::Rgb, samples: 1 };
        let cube = Texture::create(&mut state, "sky", desc);
        assert_eq!(cube.width(), 0);
        assert_eq!(cube.height(), 0);
        assert_eq!(cube.face_size(), (512, 512));
        assert_eq!(cube.channels(), 3);
    }

    #[test]
    fn test_set_data_updates_size() {
        let mut state = StateCache::new(Box::new(RecordingDevice::new()));
        let desc = TextureDesc { kind: TextureKind::Texture2D, width: 1, height: 1, format: TextureFormat::Red, samples: 1 };
        let mut glyph = Texture::create(&mut state, "glyph", desc);
        glyph.set_data_2d(&mut state, 8, 12, TextureFormat::Red, &[0; 96]);
        assert_eq!((glyph.width(), glyph.height()), (8, 12));
    }

    #[test]
    fn test_last_shared_owner_releases_storage() {
        let device = RecordingDevice::new();
        let log = device.log();
        let mut state = StateCache::new(Box::new(device));
        let desc = TextureDesc { kind: TextureKind::Texture2D, width: 2, height: 2, format: TextureFormat::Rgb, samples: 1 };
        let texture = Rc::new(Texture::create(&mut state, "shared", desc));
        let id = texture.id();
        let material_copy = Rc::clone(&texture);

        drop(texture);
        state.collect_released();
        assert_eq!(log.count(GpuCall::is_delete), 0);

        drop(material_copy);
        state.collect_released();
        assert_eq!(log.count(|c| *c == GpuCall::DeleteTexture(id)), 1);
    }
}
