//! Physical layout of a drawn map.
//!
//! Every box is derived from the figure size through fixed fractions, so
//! resizing the figure scales the axes box by the same ratio. The scale
//! fitter relies on this.

use crate::error::{Result, TopoError};
use crate::geometry::{Extent, Point};

/// Default figure size in inches.
pub const DEFAULT_FIGURE_SIZE: (f64, f64) = (6.4, 4.8);

/// Fractions of the figure reserved around the plotting area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubplotParams {
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
    pub top: f64,
}

impl Default for SubplotParams {
    fn default() -> Self {
        Self {
            left: 0.125,
            right: 0.9,
            bottom: 0.11,
            top: 0.88,
        }
    }
}

// Share of the plotting area taken by the colorbar slot and its gap.
const COLORBAR_FRACTION: f64 = 0.15;
const COLORBAR_PAD: f64 = 0.05;
// Height to width ratio of the colorbar itself.
const COLORBAR_ASPECT: f64 = 20.0;

/// Rectangle in inches, origin at the bottom left of the figure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Size and layout of one map figure.
#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub width_in: f64,
    pub height_in: f64,
    /// Ground coordinates shown by the axes.
    pub limits: Extent,
    pub subplot: SubplotParams,
    pub colorbar: bool,
}

impl Figure {
    /// Creates a figure at the default size showing `limits`.
    pub fn new(limits: Extent) -> Result<Self> {
        if !(limits.width() > 0.0 && limits.height() > 0.0) {
            return Err(TopoError::invalid(
                "map extent",
                format!("{} x {}", limits.width(), limits.height()),
                "width and height must be positive; increase the border margin",
            ));
        }
        Ok(Self {
            width_in: DEFAULT_FIGURE_SIZE.0,
            height_in: DEFAULT_FIGURE_SIZE.1,
            limits,
            subplot: SubplotParams::default(),
            colorbar: true,
        })
    }

    /// Current figure size in inches.
    pub fn size_inches(&self) -> (f64, f64) {
        (self.width_in, self.height_in)
    }

    pub fn set_size_inches(&mut self, width: f64, height: f64) -> Result<()> {
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(TopoError::invalid(
                "figure size",
                format!("{width} x {height}"),
                "must be positive",
            ));
        }
        self.width_in = width;
        self.height_in = height;
        Ok(())
    }

    fn plotting_area(&self) -> Rect {
        let s = &self.subplot;
        Rect {
            x: s.left * self.width_in,
            y: s.bottom * self.height_in,
            width: (s.right - s.left) * self.width_in,
            height: (s.top - s.bottom) * self.height_in,
        }
    }

    // Area left for the axes once the colorbar slot is taken.
    fn axes_slot(&self) -> Rect {
        let mut area = self.plotting_area();
        if self.colorbar {
            area.width *= 1.0 - COLORBAR_FRACTION - COLORBAR_PAD;
        }
        area
    }

    /// Axes box in inches. The box keeps the aspect ratio of the limits
    /// (one ground metre is as long on x as on y) and is centred in its slot.
    pub fn axes_box(&self) -> Rect {
        let slot = self.axes_slot();
        let data_aspect = self.limits.height() / self.limits.width();
        if slot.height / slot.width > data_aspect {
            let height = slot.width * data_aspect;
            Rect {
                x: slot.x,
                y: slot.y + (slot.height - height) / 2.0,
                width: slot.width,
                height,
            }
        } else {
            let width = slot.height / data_aspect;
            Rect {
                x: slot.x + (slot.width - width) / 2.0,
                y: slot.y,
                width,
                height: slot.height,
            }
        }
    }

    /// Colorbar box in inches, if the figure shows one.
    pub fn colorbar_box(&self) -> Option<Rect> {
        if !self.colorbar {
            return None;
        }
        let area = self.plotting_area();
        let slot_x = area.x + area.width * (1.0 - COLORBAR_FRACTION);
        let width = (area.height / COLORBAR_ASPECT).min(area.width * COLORBAR_FRACTION);
        Some(Rect {
            x: slot_x,
            y: area.y,
            width,
            height: area.height,
        })
    }

    /// Raster size at `dpi`.
    pub fn pixel_size(&self, dpi: u32) -> (u32, u32) {
        let d = f64::from(dpi);
        (
            (self.width_in * d).round().max(1.0) as u32,
            (self.height_in * d).round().max(1.0) as u32,
        )
    }

    /// Maps a figure position in inches to raster pixels (y pointing down).
    pub fn inches_to_pixels(&self, x: f64, y: f64, dpi: u32) -> (f32, f32) {
        let d = f64::from(dpi);
        ((x * d) as f32, ((self.height_in - y) * d) as f32)
    }

    /// Maps a ground point to raster pixels.
    pub fn ground_to_pixels(&self, p: Point, dpi: u32) -> (f32, f32) {
        let b = self.axes_box();
        let fx = (p.x - self.limits.min_x) / self.limits.width();
        let fy = (p.y - self.limits.min_y) / self.limits.height();
        self.inches_to_pixels(b.x + fx * b.width, b.y + fy * b.height, dpi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(w: f64, h: f64) -> Extent {
        Extent {
            min_x: 0.0,
            min_y: 0.0,
            max_x: w,
            max_y: h,
        }
    }

    #[test]
    fn axes_box_keeps_data_aspect() {
        let fig = Figure::new(limits(40.0, 10.0)).unwrap();
        let b = fig.axes_box();
        assert!((b.height / b.width - 0.25).abs() < 1e-12);
        let tall = Figure::new(limits(10.0, 40.0)).unwrap();
        let b = tall.axes_box();
        assert!((b.height / b.width - 4.0).abs() < 1e-12);
    }

    #[test]
    fn axes_box_scales_with_figure() {
        let mut fig = Figure::new(limits(30.0, 20.0)).unwrap();
        let before = fig.axes_box();
        fig.set_size_inches(6.4 * 2.5, 4.8 * 2.5).unwrap();
        let after = fig.axes_box();
        assert!((after.width / before.width - 2.5).abs() < 1e-12);
        assert!((after.height / before.height - 2.5).abs() < 1e-12);
    }

    #[test]
    fn colorbar_right_of_axes() {
        let fig = Figure::new(limits(10.0, 10.0)).unwrap();
        let axes = fig.axes_box();
        let cbar = fig.colorbar_box().unwrap();
        assert!(cbar.x >= axes.x + axes.width);
        assert!(cbar.x + cbar.width <= fig.width_in);
    }

    #[test]
    fn ground_corners_map_to_axes_corners() {
        let fig = Figure::new(limits(30.0, 20.0)).unwrap();
        let b = fig.axes_box();
        let (x, y) = fig.ground_to_pixels(Point::new(0.0, 0.0), 100);
        assert!((f64::from(x) - b.x * 100.0).abs() < 1e-3);
        assert!((f64::from(y) - (fig.height_in - b.y) * 100.0).abs() < 1e-3);
        assert_eq!(fig.pixel_size(150), (960, 720));
    }

    #[test]
    fn empty_limits_rejected() {
        assert!(Figure::new(limits(0.0, 10.0)).is_err());
    }
}
