//! # Font Renderer
//!
//! Draws [`Text`] labels over the finished frame, one glyph quad at a time.
//! Glyph bitmaps come from the application's [`GlyphRasterizer`] and are
//! cached per font, size, character and outline width. Each glyph is
//! uploaded into a single reusable red-channel texture before its draw.
//!
//! Text positions are in window pixels with the origin in the top-left
//! corner and `y` growing downwards, measured to the baseline. Labels with an
//! outline draw the stroked glyph in the outline colour first and the plain
//! glyph over it.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::EngineResult;
use crate::foundation::math::Vec3;
use crate::render::api::{TextureDesc, TextureFilter, TextureFormat, TextureKind, VertexAttribute};
use crate::render::mesh::{MeshBuffers, MeshData, MeshKind};
use crate::render::resources::{BuiltinShader, ShaderLibrary, ShaderProgram, Texture};
use crate::render::state::{BlendFunction, StateCache};
use crate::render::text::{Glyph, GlyphRasterizer, Text};

const FONT_TEXTURE_SLOT: u32 = 0;

/// Quad corners in top-left, bottom-left, top-right, bottom-right order
/// expanded into two triangles
const QUAD_CORNERS: [usize; 6] = [0, 1, 2, 2, 1, 3];

#[rustfmt::skip]
const QUAD_TEX_COORDS: [f32; 12] = [
    0.0, 0.0,  0.0, 1.0,  1.0, 0.0,
    1.0, 0.0,  0.0, 1.0,  1.0, 1.0,
];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GlyphKey {
    font: String,
    size: u32,
    character: char,
    outline: u32,
}

/// Draws text labels through a [`GlyphRasterizer`]
pub struct FontRenderer {
    shader: ShaderProgram,
    glyph_texture: Texture,
    quad: MeshBuffers,
    rasterizer: Box<dyn GlyphRasterizer>,
    glyphs: HashMap<GlyphKey, Rc<Glyph>>,
}

impl FontRenderer {
    /// Build the font shader, the glyph texture and the glyph quad
    pub fn new(state: &mut StateCache, library: &ShaderLibrary, rasterizer: Box<dyn GlyphRasterizer>) -> EngineResult<Self> {
        let shader = library.load(state, BuiltinShader::Font)?;
        let desc = TextureDesc { kind: TextureKind::Texture2D, width: 1, height: 1, format: TextureFormat::Red, samples: 1 };
        let glyph_texture = Texture::create(state, "single_character_texture", desc);
        glyph_texture.set_filter(state, TextureFilter::Bilinear);

        let data = MeshData::positions(vec![0.0; 18], 3)
            .with_tex_coords(QUAD_TEX_COORDS.to_vec())
            .with_dynamic_positions();
        let quad = MeshBuffers::upload(state, &data);

        log::debug!(target: "font_renderer", "Font renderer created.");
        Ok(Self { shader, glyph_texture, quad, rasterizer, glyphs: HashMap::new() })
    }

    /// Number of distinct glyphs rasterized so far
    pub fn cached_glyphs(&self) -> usize {
        self.glyphs.len()
    }

    /// Draw `texts` onto the bound framebuffer of `display_size` pixels
    pub fn render(&mut self, state: &mut StateCache, texts: &[Text], display_size: (u32, u32)) -> EngineResult<()> {
        if texts.is_empty() {
            return Ok(());
        }

        state.activate_shader_program(&self.shader);
        state.device().set_unpack_alignment(1);
        state.set_texture_slot(FONT_TEXTURE_SLOT);
        state.unbind_all_textures();
        state.bind_texture(&self.glyph_texture);
        state.bind_mesh(&self.quad);

        state.enable_blend(true);
        state.enable_depth_test(false);
        state.set_blend_function(BlendFunction::Normal);

        let result = texts.iter().try_for_each(|text| self.render_text(state, text, display_size));
        state.device().set_unpack_alignment(4);
        result
    }

    fn render_text(&mut self, state: &mut StateCache, text: &Text, display_size: (u32, u32)) -> EngineResult<()> {
        let (origin_x, _) = text.position();
        let (mut x, mut y) = text.position();
        let line_height = i32::try_from(text.font_size()).unwrap_or(i32::MAX) + text.vertical_spacing();

        for character in text.text().chars() {
            match character {
                '\n' => {
                    x = origin_x;
                    y += line_height;
                }
                ' ' => {
                    let space = self.glyph(text, ' ', 0)?;
                    x += space.advance + text.horizontal_spacing();
                }
                _ => {
                    let advance = if text.outline_size() > 0 {
                        let outline = self.glyph(text, character, text.outline_size())?;
                        self.draw_glyph(state, &outline, text.outline_color(), (x, y), display_size);
                        let glyph = self.glyph(text, character, 0)?;
                        self.draw_glyph(state, &glyph, text.font_color(), (x, y), display_size);
                        outline.advance
                    } else {
                        let glyph = self.glyph(text, character, 0)?;
                        self.draw_glyph(state, &glyph, text.font_color(), (x, y), display_size);
                        glyph.advance
                    };
                    x += advance + text.horizontal_spacing();
                }
            }
        }
        Ok(())
    }

    fn glyph(&mut self, text: &Text, character: char, outline: u32) -> EngineResult<Rc<Glyph>> {
        let key = GlyphKey { font: text.font().to_string(), size: text.font_size(), character, outline };
        if let Some(glyph) = self.glyphs.get(&key) {
            return Ok(Rc::clone(glyph));
        }
        let glyph = Rc::new(self.rasterizer.rasterize(text.font(), text.font_size(), character, outline)?);
        log::trace!(target: "font_renderer", "Glyph [{}] of [{}] rasterized.", character, key.font);
        self.glyphs.insert(key, Rc::clone(&glyph));
        Ok(glyph)
    }

    fn draw_glyph(
        &mut self,
        state: &mut StateCache,
        glyph: &Glyph,
        color: Vec3,
        cursor: (i32, i32),
        display_size: (u32, u32),
    ) {
        if glyph.width == 0 || glyph.rows == 0 {
            return;
        }
        self.glyph_texture.set_data_2d(state, glyph.width, glyph.rows, TextureFormat::Red, &glyph.bitmap);

        let positions: Vec<f32> = QUAD_CORNERS
            .iter()
            .flat_map(|&corner| {
                let (x, y) = glyph_corner(glyph, cursor, corner);
                let (x, y) = to_screen(x, y, display_size);
                [x, y, 0.0]
            })
            .collect();
        self.quad.update_attribute(state, VertexAttribute::Position, &positions);

        self.shader.set_uniform(state, "color.font_texture", FONT_TEXTURE_SLOT);
        self.shader.set_uniform(state, "color.font_color", color);
        MeshKind::Billboard.draw(state);
    }
}

/// Pixel position of quad corner `corner` for `glyph` drawn at `cursor`
fn glyph_corner(glyph: &Glyph, cursor: (i32, i32), corner: usize) -> (f32, f32) {
    let left = (cursor.0 + glyph.left) as f32;
    let top = (cursor.1 - glyph.top) as f32;
    let right = left + glyph.width as f32;
    let bottom = top + glyph.rows as f32;
    match corner {
        0 => (left, top),
        1 => (left, bottom),
        2 => (right, top),
        _ => (right, bottom),
    }
}

/// Window pixels (origin top-left) to normalized device coordinates
fn to_screen(x: f32, y: f32, display_size: (u32, u32)) -> (f32, f32) {
    let width = display_size.0.max(1) as f32;
    let height = display_size.1.max(1) as f32;
    (x / width * 2.0 - 1.0, 1.0 - y / height * 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::{Capability, UniformValue};
    use crate::render::backends::recording::GpuCall;
    use crate::render::renderers::test_support::fixture;

    /// Square glyphs of `size / 2` pixels, widened by the outline
    struct BlockRasterizer {
        calls: Rc<std::cell::Cell<usize>>,
    }

    impl GlyphRasterizer for BlockRasterizer {
        fn rasterize(&mut self, _font: &str, size: u32, _character: char, outline: u32) -> EngineResult<Glyph> {
            self.calls.set(self.calls.get() + 1);
            let side = size / 2 + 2 * outline;
            let offset = i32::try_from(outline).unwrap();
            Ok(Glyph {
                width: side,
                rows: side,
                left: -offset,
                top: i32::try_from(side).unwrap() - offset,
                advance: i32::try_from(size / 2).unwrap() + 2 * offset,
                bitmap: vec![255; (side * side) as usize],
            })
        }
    }

    fn renderer(state: &mut StateCache) -> (FontRenderer, Rc<std::cell::Cell<usize>>) {
        let calls = Rc::new(std::cell::Cell::new(0));
        let rasterizer = BlockRasterizer { calls: Rc::clone(&calls) };
        (FontRenderer::new(state, &ShaderLibrary::Embedded, Box::new(rasterizer)).unwrap(), calls)
    }

    #[test]
    fn test_to_screen_corners() {
        assert_eq!(to_screen(0.0, 0.0, (200, 100)), (-1.0, 1.0));
        assert_eq!(to_screen(200.0, 100.0, (200, 100)), (1.0, -1.0));
        assert_eq!(to_screen(100.0, 50.0, (200, 100)), (0.0, 0.0));
    }

    #[test]
    fn test_one_draw_per_visible_glyph() {
        let (mut state, log, _settings) = fixture();
        let (mut renderer, _calls) = renderer(&mut state);
        let texts = [Text::new("ab c\nd", "mono.ttf")];
        log.clear();

        renderer.render(&mut state, &texts, (320, 180)).unwrap();

        assert_eq!(log.draw_count(), 4);
        assert_eq!(log.count(|c| matches!(c, GpuCall::UploadTexture { .. })), 4);
        assert_eq!(log.count(|c| matches!(c, GpuCall::UpdateAttribute(_, 18))), 4);
        assert!(log.calls().iter().any(|c| matches!(c, GpuCall::SetCapability(Capability::DepthTest, false))));
        let alignments: Vec<i32> = log
            .calls()
            .iter()
            .filter_map(|c| match c {
                GpuCall::UnpackAlignment(a) => Some(*a),
                _ => None,
            })
            .collect();
        assert_eq!(alignments, vec![1, 4]);
    }

    #[test]
    fn test_outline_drawn_before_glyph() {
        let (mut state, log, _settings) = fixture();
        let (mut renderer, _calls) = renderer(&mut state);
        let mut text = Text::new("a", "mono.ttf");
        text.set_outline_size(2);
        text.set_outline_color(Vec3::new(0.0, 0.0, 1.0));
        text.set_font_color(Vec3::new(1.0, 0.0, 0.0));
        log.clear();

        renderer.render(&mut state, &[text], (320, 180)).unwrap();

        assert_eq!(log.draw_count(), 2);
        let colors = log.uniform_values("color.font_color");
        assert_eq!(colors[0], UniformValue::Vec3(Vec3::new(0.0, 0.0, 1.0)));
        assert_eq!(colors[1], UniformValue::Vec3(Vec3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_glyphs_rasterized_once() {
        let (mut state, _log, _settings) = fixture();
        let (mut renderer, calls) = renderer(&mut state);
        let texts = [Text::new("aaa", "mono.ttf")];
        renderer.render(&mut state, &texts, (320, 180)).unwrap();
        renderer.render(&mut state, &texts, (320, 180)).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(renderer.cached_glyphs(), 1);
    }

    #[test]
    fn test_glyph_corners_follow_bearing() {
        let mut text = Text::new("", "mono.ttf");
        text.set_position(10, 40);
        let glyph = Glyph { width: 8, rows: 8, left: 1, top: 8, advance: 9, bitmap: vec![0; 64] };
        assert_eq!(glyph_corner(&glyph, text.position(), 0), (11.0, 32.0));
        assert_eq!(glyph_corner(&glyph, text.position(), 3), (19.0, 40.0));
    }
}
