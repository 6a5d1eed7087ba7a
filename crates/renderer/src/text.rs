//! Text measurement and drawing.
//!
//! Layout code only sees the [`TextFace`] trait so cursor arithmetic can be
//! exercised with a synthetic face; production uses [`RustTypeFace`].

use std::path::Path;

use dashboard_common::{DashError, DashResult};
use image::{GrayImage, Luma};
use imageproc::drawing::draw_text_mut;
use rusttype::{point, Font, Scale};

/// Point size used for every dashboard label
pub const DEFAULT_FONT_SIZE: f32 = 16.0;

/// A font at a fixed size.
pub trait TextFace {
    /// Horizontal advance of `text` in whole pixels (fractional part dropped).
    fn advance_width(&self, text: &str) -> u32;

    /// Distance from the ascender line to the descender line.
    fn line_height(&self) -> u32;

    /// Draw `text` in black with the ascender line at `y` and the pen
    /// starting at `x`.
    fn draw(&self, canvas: &mut GrayImage, x: i32, y: i32, text: &str);
}

/// TrueType face rendered through rusttype.
pub struct RustTypeFace {
    font: Font<'static>,
    scale: Scale,
}

impl RustTypeFace {
    pub fn from_bytes(data: Vec<u8>, size: f32) -> DashResult<Self> {
        let font = Font::try_from_vec(data)
            .ok_or_else(|| DashError::Font("not a TrueType/OpenType font".to_string()))?;
        Ok(Self {
            font,
            scale: Scale::uniform(size),
        })
    }

    pub fn from_file(path: impl AsRef<Path>, size: f32) -> DashResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| DashError::Font(format!("{}: {}", path.display(), e)))?;
        Self::from_bytes(data, size)
    }
}

impl TextFace for RustTypeFace {
    fn advance_width(&self, text: &str) -> u32 {
        self.font
            .layout(text, self.scale, point(0.0, 0.0))
            .last()
            .map(|glyph| glyph.position().x + glyph.unpositioned().h_metrics().advance_width)
            .unwrap_or(0.0)
            .max(0.0) as u32
    }

    fn line_height(&self) -> u32 {
        let v_metrics = self.font.v_metrics(self.scale);
        (v_metrics.ascent - v_metrics.descent).ceil() as u32
    }

    fn draw(&self, canvas: &mut GrayImage, x: i32, y: i32, text: &str) {
        draw_text_mut(canvas, Luma([0u8]), x, y, self.scale, &self.font, text);
    }
}

impl std::fmt::Debug for RustTypeFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RustTypeFace")
            .field("scale", &self.scale.y)
            .finish()
    }
}
