//! Built-in blocky glyphs for the on-screen labels
//!
//! Every printable character is a filled box with a hollow centre, which is
//! enough to show the text overlay without shipping a font file.

use ember_engine::prelude::*;

/// Rasterizes every character as a hollow box
pub struct BlockFont;

impl GlyphRasterizer for BlockFont {
    fn rasterize(&mut self, _font: &str, size: u32, character: char, outline: u32) -> EngineResult<Glyph> {
        let advance = i32::try_from(size * 3 / 5).unwrap_or(i32::MAX);
        if character.is_whitespace() {
            return Ok(Glyph { advance, ..Glyph::default() });
        }

        let inner_width = (size / 2).max(2);
        let inner_rows = (size * 3 / 4).max(2);
        let width = inner_width + 2 * outline;
        let rows = inner_rows + 2 * outline;
        let stroke = (size / 8).max(1) + outline;

        let bitmap = (0..rows)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| {
                let edge = x < stroke || y < stroke || x + stroke >= width || y + stroke >= rows;
                if edge { u8::MAX } else { 0 }
            })
            .collect();

        let offset = i32::try_from(outline).unwrap_or(0);
        Ok(Glyph {
            width,
            rows,
            left: -offset,
            top: i32::try_from(rows).unwrap_or(i32::MAX) - offset,
            advance: advance + 2 * offset,
            bitmap,
        })
    }
}
