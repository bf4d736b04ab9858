//! Image decoding into GPU textures
//!
//! Decoded textures are cached by path, so loading the same file twice
//! returns the same shared texture.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::{EngineError, EngineResult};
use crate::render::api::{TextureDesc, TextureFilter, TextureFormat, TextureKind};
use crate::render::resources::Texture;
use crate::render::state::StateCache;

/// Cube-map face order expected by [`TextureLoader::load_cube`]
pub const CUBE_FACES: [&str; 6] = ["right", "left", "top", "bottom", "back", "front"];

/// Loads PNG (and other `image`-supported) files into textures
#[derive(Debug, Default)]
pub struct TextureLoader {
    cache: HashMap<PathBuf, Rc<Texture>>,
}

impl TextureLoader {
    /// Create an empty loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a 2D RGBA texture with trilinear filtering
    ///
    /// Rows are flipped so the first row of the file maps to `v = 1`.
    pub fn load_2d(&mut self, state: &mut StateCache, path: impl AsRef<Path>) -> EngineResult<Rc<Texture>> {
        let path = path.as_ref();
        if let Some(texture) = self.cache.get(path) {
            return Ok(Rc::clone(texture));
        }
        let bytes = std::fs::read(path).map_err(|e| {
            EngineError::resource("texture_loader", "TextureLoader::load_2d", format!("Texture file [{}] open error: {e}", path.display()))
        })?;
        let texture = Rc::new(Self::decode_2d(state, &path.display().to_string(), &bytes)?);
        self.cache.insert(path.to_path_buf(), Rc::clone(&texture));
        Ok(texture)
    }

    /// Decode an in-memory image into a 2D RGBA texture
    pub fn decode_2d(state: &mut StateCache, name: &str, bytes: &[u8]) -> EngineResult<Texture> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| EngineError::resource(name, "TextureLoader::decode_2d", format!("Image decode error: {e}")))?
            .flipv()
            .to_rgba8();
        let (width, height) = image.dimensions();
        let desc = TextureDesc { kind: TextureKind::Texture2D, width, height, format: TextureFormat::Rgba, samples: 1 };
        let texture = Texture::create(state, name, desc);
        state.upload_texture(&texture, 0, image.as_raw());
        texture.set_filter(state, TextureFilter::Trilinear);
        log::info!(target: "texture_loader", "Texture [{}] loaded ({}x{}).", name, width, height);
        Ok(texture)
    }

    /// Load a cube map from six face images in [`CUBE_FACES`] order
    ///
    /// Every face must have the size of the first one.
    pub fn load_cube(&mut self, state: &mut StateCache, faces: [&Path; 6]) -> EngineResult<Rc<Texture>> {
        let key = faces[0].to_path_buf();
        if let Some(texture) = self.cache.get(&key) {
            return Ok(Rc::clone(texture));
        }

        let mut decoded = Vec::with_capacity(faces.len());
        for path in faces {
            let image = image::open(path)
                .map_err(|e| {
                    EngineError::resource(
                        "texture_loader",
                        "TextureLoader::load_cube",
                        format!("Cube face [{}] load error: {e}", path.display()),
                    )
                })?
                .to_rgba8();
            decoded.push(image);
        }

        let (width, height) = decoded[0].dimensions();
        if decoded.iter().any(|face| face.dimensions() != (width, height)) {
            return Err(EngineError::resource(
                "texture_loader",
                "TextureLoader::load_cube",
                "Cube map faces must share one size.",
            ));
        }

        let desc = TextureDesc { kind: TextureKind::TextureCube, width, height, format: TextureFormat::Rgba, samples: 1 };
        let texture = Texture::create(state, key.display().to_string(), desc);
        for (face, image) in (0u32..).zip(decoded.iter()) {
            state.upload_texture(&texture, face, image.as_raw());
        }
        texture.set_filter(state, TextureFilter::Bilinear);
        log::info!(target: "texture_loader", "Cube texture [{}] loaded ({}x{}).", key.display(), width, height);

        let texture = Rc::new(texture);
        self.cache.insert(key, Rc::clone(&texture));
        Ok(texture)
    }

    /// Number of cached textures
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::recording::{GpuCall, RecordingDevice};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut bytes = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(image).write_to(&mut bytes, image::ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn test_decode_uploads_rgba_texels() {
        let device = RecordingDevice::new();
        let log = device.log();
        let mut state = StateCache::new(Box::new(device));

        let texture = TextureLoader::decode_2d(&mut state, "dudv", &png(4, 2)).unwrap();
        assert_eq!((texture.width(), texture.height()), (4, 2));
        assert_eq!(texture.channels(), 4);
        assert_eq!(log.count(|c| *c == GpuCall::UploadTexture { face: 0, bytes: 32 }), 1);
        assert_eq!(log.count(|c| *c == GpuCall::SetTextureFilter(TextureKind::Texture2D, TextureFilter::Trilinear)), 1);
    }

    #[test]
    fn test_garbage_is_resource_error() {
        let mut state = StateCache::new(Box::new(RecordingDevice::new()));
        let result = TextureLoader::decode_2d(&mut state, "broken", b"not an image");
        assert!(matches!(result, Err(EngineError::ResourceLoad { .. })));
    }

    #[test]
    fn test_missing_file_is_resource_error() {
        let mut state = StateCache::new(Box::new(RecordingDevice::new()));
        let mut loader = TextureLoader::new();
        assert!(loader.load_2d(&mut state, "/nonexistent/water_dudv.png").is_err());
        assert_eq!(loader.cached(), 0);
    }
}
