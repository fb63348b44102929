//! Label text drawn with a TrueType font.

use std::path::{Path, PathBuf};

use log::debug;
use rusttype::{point, Font, Scale};
use tiny_skia::{Color, Pixmap, PremultipliedColorU8};

use crate::error::{Result, TopoError};

/// Places searched for a font when none is given explicitly.
pub const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Loads a font from `path`.
pub fn load_font(path: &Path) -> Result<Font<'static>> {
    let bytes = std::fs::read(path).map_err(|e| TopoError::io(path, e))?;
    Font::try_from_vec(bytes)
        .ok_or_else(|| TopoError::Font(format!("{} is not a usable font", path.display())))
}

/// Loads the font at `explicit` or, when absent, the first usable entry of
/// [`FONT_CANDIDATES`]. Returns `Ok(None)` when nothing was found.
pub fn find_font(explicit: Option<&Path>) -> Result<Option<Font<'static>>> {
    if let Some(path) = explicit {
        return load_font(path).map(Some);
    }
    for candidate in FONT_CANDIDATES.iter().map(PathBuf::from) {
        if candidate.is_file() {
            if let Ok(font) = load_font(&candidate) {
                debug!("using font {}", candidate.display());
                return Ok(Some(font));
            }
        }
    }
    Ok(None)
}

/// Horizontal placement of text relative to its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HAlign {
    Left,
    Center,
    Right,
}

/// Vertical placement of text relative to its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VAlign {
    Top,
    Center,
    Bottom,
}

/// Width and height of `text` in pixels at `size` pixels per em.
pub fn measure_text(font: &Font<'_>, text: &str, size: f32) -> (f32, f32) {
    let scale = Scale::uniform(size);
    let v = font.v_metrics(scale);
    let width = font
        .layout(text, scale, point(0.0, 0.0))
        .last()
        .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
        .unwrap_or(0.0);
    (width, v.ascent - v.descent)
}

fn blend(dst: PremultipliedColorU8, color: Color, coverage: f32) -> PremultipliedColorU8 {
    let a = (color.alpha() * coverage).clamp(0.0, 1.0);
    let mix = |src: f32, dst: u8| -> u8 {
        (src * a * 255.0 + f32::from(dst) * (1.0 - a)).round().clamp(0.0, 255.0) as u8
    };
    let alpha = (a * 255.0 + f32::from(dst.alpha()) * (1.0 - a))
        .round()
        .clamp(0.0, 255.0) as u8;
    let r = mix(color.red(), dst.red()).min(alpha);
    let g = mix(color.green(), dst.green()).min(alpha);
    let b = mix(color.blue(), dst.blue()).min(alpha);
    PremultipliedColorU8::from_rgba(r, g, b, alpha).unwrap_or(dst)
}

/// Draws `text` anchored at pixel (`x`, `y`).
pub fn draw_text(
    pixmap: &mut Pixmap,
    font: &Font<'_>,
    text: &str,
    (x, y): (f32, f32),
    size: f32,
    color: Color,
    (halign, valign): (HAlign, VAlign),
) {
    let scale = Scale::uniform(size);
    let v_metrics = font.v_metrics(scale);
    let (width, height) = measure_text(font, text, size);
    let left = match halign {
        HAlign::Left => x,
        HAlign::Center => x - width / 2.0,
        HAlign::Right => x - width,
    };
    let top = match valign {
        VAlign::Top => y,
        VAlign::Center => y - height / 2.0,
        VAlign::Bottom => y - height,
    };
    let (pw, ph) = (pixmap.width() as i32, pixmap.height() as i32);
    let stride = pixmap.width() as usize;
    let pixels = pixmap.pixels_mut();
    for glyph in font.layout(text, scale, point(left, top + v_metrics.ascent)) {
        let Some(bb) = glyph.pixel_bounding_box() else {
            continue;
        };
        glyph.draw(|gx, gy, coverage| {
            let px = gx as i32 + bb.min.x;
            let py = gy as i32 + bb.min.y;
            if px >= 0 && py >= 0 && px < pw && py < ph {
                let idx = py as usize * stride + px as usize;
                pixels[idx] = blend(pixels[idx], color, coverage);
            }
        });
    }
}
