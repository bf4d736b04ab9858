//! On-screen text labels and the glyph rasterization seam

use crate::error::{ensure, EngineResult};
use crate::foundation::math::{utils, Vec3};

/// One rasterized glyph, 8-bit coverage rows top to bottom
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Glyph {
    /// Bitmap width in pixels
    pub width: u32,
    /// Bitmap height in pixels
    pub rows: u32,
    /// Horizontal offset from the cursor to the bitmap's left edge
    pub left: i32,
    /// Vertical offset from the baseline up to the bitmap's top edge
    pub top: i32,
    /// Cursor advance in pixels
    pub advance: i32,
    /// `width * rows` coverage bytes
    pub bitmap: Vec<u8>,
}

/// Source of glyph bitmaps, supplied by the application
///
/// `outline` is the stroke radius in pixels; 0 requests the plain glyph.
pub trait GlyphRasterizer {
    /// Rasterize `character` of `font` at `size` pixels
    fn rasterize(&mut self, font: &str, size: u32, character: char, outline: u32) -> EngineResult<Glyph>;
}

/// A UTF-8 label drawn over the finished frame
#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    text: String,
    font: String,
    font_size: u32,
    font_color: Vec3,
    outline_size: u32,
    outline_color: Vec3,
    horizontal_spacing: i32,
    vertical_spacing: i32,
    position: (i32, i32),
}

impl Text {
    /// Label with default size 16, white, no outline, at the top-left corner
    pub fn new(text: impl Into<String>, font: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font: font.into(),
            font_size: 16,
            font_color: Vec3::new(1.0, 1.0, 1.0),
            outline_size: 0,
            outline_color: Vec3::zeros(),
            horizontal_spacing: 0,
            vertical_spacing: 0,
            position: (0, 0),
        }
    }

    /// Displayed string
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the displayed string
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Font identifier passed to the rasterizer
    pub fn font(&self) -> &str {
        &self.font
    }

    /// Change the font
    pub fn set_font(&mut self, font: impl Into<String>) {
        self.font = font.into();
    }

    /// Pixel height
    pub fn font_size(&self) -> u32 {
        self.font_size
    }

    /// Set the pixel height (> 0)
    pub fn set_font_size(&mut self, size: u32) -> EngineResult<()> {
        ensure(size > 0, &self.text, "Text::set_font_size", "Font size value out of range: {0 < VALUE}.")?;
        self.font_size = size;
        Ok(())
    }

    /// Glyph colour
    pub fn font_color(&self) -> Vec3 {
        self.font_color
    }

    /// Set the glyph colour, clamped to [0, 1]
    pub fn set_font_color(&mut self, color: Vec3) {
        self.font_color = utils::clamp_color(color);
    }

    /// Outline stroke radius, 0 when disabled
    pub fn outline_size(&self) -> u32 {
        self.outline_size
    }

    /// Set the outline stroke radius
    pub fn set_outline_size(&mut self, size: u32) {
        self.outline_size = size;
    }

    /// Outline colour
    pub fn outline_color(&self) -> Vec3 {
        self.outline_color
    }

    /// Set the outline colour, clamped to [0, 1]
    pub fn set_outline_color(&mut self, color: Vec3) {
        self.outline_color = utils::clamp_color(color);
    }

    /// Extra pixels after each glyph
    pub fn horizontal_spacing(&self) -> i32 {
        self.horizontal_spacing
    }

    /// Set the extra pixels after each glyph
    pub fn set_horizontal_spacing(&mut self, spacing: i32) {
        self.horizontal_spacing = spacing;
    }

    /// Extra pixels between lines
    pub fn vertical_spacing(&self) -> i32 {
        self.vertical_spacing
    }

    /// Set the extra pixels between lines
    pub fn set_vertical_spacing(&mut self, spacing: i32) {
        self.vertical_spacing = spacing;
    }

    /// Baseline origin of the first line, in pixels from the top-left corner
    pub fn position(&self) -> (i32, i32) {
        self.position
    }

    /// Move the label
    pub fn set_position(&mut self, x: i32, y: i32) {
        self.position = (x, y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let text = Text::new("fps", "fonts/mono.ttf");
        assert_eq!(text.font_size(), 16);
        assert_eq!(text.font_color(), Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(text.outline_size(), 0);
        assert_eq!(text.outline_color(), Vec3::zeros());
        assert_eq!(text.position(), (0, 0));
    }

    #[test]
    fn test_setters_validate_and_clamp() {
        let mut text = Text::new("fps", "fonts/mono.ttf");
        assert!(text.set_font_size(0).is_err());
        assert_eq!(text.font_size(), 16);
        text.set_outline_color(Vec3::new(2.0, -1.0, 0.5));
        assert_eq!(text.outline_color(), Vec3::new(1.0, 0.0, 0.5));
    }
}
