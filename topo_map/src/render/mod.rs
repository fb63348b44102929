//! Raster rendering of contour maps.
//!
//! Layers are painted onto a `tiny_skia` pixmap sized from the figure and
//! the output resolution, then written as PNG with the resolution recorded
//! so that printing at that resolution reproduces the map scale.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use log::{info, warn};
use rusttype::Font;
use tiny_skia::{
    Color, FillRule, Mask, Paint, Path as SkPath, PathBuilder, Pixmap, PixmapPaint,
    Rect as SkRect, Stroke, Transform,
};

pub mod colormap;
pub mod text;

use crate::buildings::BuildingOutline;
use crate::contour::ContourLine;
use crate::dtm::Grid;
use crate::error::{Result, TopoError};
use crate::figure::{Figure, Rect};
use crate::geometry::Point;
use crate::survey::SurveyPoint;
use colormap::Normalize;
use text::{draw_text, measure_text, HAlign, VAlign};

const POINTS_PER_INCH: f64 = 72.0;
const CONTOUR_WIDTH_PT: f64 = 0.5;
const FRAME_WIDTH_PT: f64 = 0.8;
const OUTLINE_WIDTH_PT: f64 = 0.8;
const HATCH_SPACING_PT: f64 = 4.0;
const HATCH_WIDTH_PT: f64 = 0.4;
// Scatter marker area in square points.
const MARKER_AREA_PT2: f64 = 5.0;
const TICK_LENGTH_PT: f64 = 3.5;
const TICK_LABEL_PT: f64 = 8.0;
const LABEL_OFFSET_PT: f64 = 1.0;
/// Largest image rendered, in pixels (1 GB of RGBA).
pub const MAX_PIXELS: u64 = 250_000_000;

/// Everything a draw produces, independent of the output size.
#[derive(Debug, Clone)]
pub struct MapLayers {
    pub grid: Grid,
    /// Planned contour levels, ascending.
    pub levels: Vec<f64>,
    pub contours: Vec<ContourLine>,
    pub buildings: Vec<BuildingOutline>,
    pub points: Vec<SurveyPoint>,
    pub show_ids: bool,
    /// Label font size in points.
    pub font_size: f64,
}

/// Label text for a contour level: integers without decimals, other values
/// with up to two.
pub fn format_level(level: f64) -> String {
    let rounded = (level * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{rounded:.0}")
    } else {
        let s = format!("{rounded:.2}");
        s.trim_end_matches('0').to_string()
    }
}

/// Evenly spaced round values covering `[min, max]`, about `target` of them.
pub fn nice_ticks(min: f64, max: f64, target: usize) -> Vec<f64> {
    let span = max - min;
    if !(span.is_finite() && span > 0.0) || target == 0 {
        return Vec::new();
    }
    let raw = span / target as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let step = [1.0, 2.0, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|s| *s >= raw)
        .unwrap_or(10.0 * magnitude);
    let first = (min / step).ceil() as i64;
    let last = (max / step).floor() as i64;
    (first..=last).map(|k| k as f64 * step).collect()
}

fn rect_to_pixels(figure: &Figure, r: &Rect, dpi: u32) -> Option<SkRect> {
    let (left, bottom) = figure.inches_to_pixels(r.x, r.y, dpi);
    let (right, top) = figure.inches_to_pixels(r.x + r.width, r.y + r.height, dpi);
    SkRect::from_ltrb(left, top, right, bottom)
}

struct Canvas<'f> {
    pixmap: Pixmap,
    figure: &'f Figure,
    dpi: u32,
    axes_mask: Mask,
}

impl Canvas<'_> {
    fn pt(&self, points: f64) -> f32 {
        (points * f64::from(self.dpi) / POINTS_PER_INCH) as f32
    }

    fn to_px(&self, p: Point) -> (f32, f32) {
        self.figure.ground_to_pixels(p, self.dpi)
    }

    fn rect_px(&self, r: &Rect) -> Option<SkRect> {
        rect_to_pixels(self.figure, r, self.dpi)
    }

    fn polyline(&self, pts: &[Point], close: bool) -> Option<SkPath> {
        let mut pb = PathBuilder::new();
        let mut iter = pts.iter().map(|p| self.to_px(*p));
        let (x, y) = iter.next()?;
        pb.move_to(x, y);
        for (x, y) in iter {
            pb.line_to(x, y);
        }
        if close {
            pb.close();
        }
        pb.finish()
    }

    fn stroke(&mut self, path: &SkPath, color: Color, width: f32, clip: bool) {
        let mut paint = Paint::default();
        paint.set_color(color);
        paint.anti_alias = true;
        let stroke = Stroke {
            width,
            ..Stroke::default()
        };
        let mask = clip.then_some(&self.axes_mask);
        self.pixmap
            .stroke_path(path, &paint, &stroke, Transform::identity(), mask);
    }

    fn line(&mut self, from: (f32, f32), to: (f32, f32), color: Color, width: f32) {
        let mut pb = PathBuilder::new();
        pb.move_to(from.0, from.1);
        pb.line_to(to.0, to.1);
        if let Some(path) = pb.finish() {
            self.stroke(&path, color, width, false);
        }
    }

    fn fill_rect(&mut self, rect: SkRect, color: Color, clip: bool) {
        let mut paint = Paint::default();
        paint.set_color(color);
        paint.anti_alias = false;
        let mask = clip.then_some(&self.axes_mask);
        self.pixmap
            .fill_rect(rect, &paint, Transform::identity(), mask);
    }
}

fn z_normalize(layers: &MapLayers) -> Normalize {
    let (lo, hi) = layers
        .grid
        .z_range()
        .or_else(|| {
            let mut zs = layers.points.iter().map(|p| p.point.z);
            let first = zs.next()?;
            Some(zs.fold((first, first), |(a, b), z| (a.min(z), b.max(z))))
        })
        .unwrap_or((0.0, 1.0));
    Normalize::new(lo, hi)
}

fn paint_grid(canvas: &mut Canvas, grid: &Grid, norm: &Normalize) {
    if grid.nx() < 2 || grid.ny() < 2 {
        return;
    }
    for j in 0..grid.ny() - 1 {
        for i in 0..grid.nx() - 1 {
            let (Some(a), Some(b), Some(c), Some(d)) = (
                grid.get(i, j),
                grid.get(i + 1, j),
                grid.get(i + 1, j + 1),
                grid.get(i, j + 1),
            ) else {
                continue;
            };
            let z = (a + b + c + d) / 4.0;
            let (x0, y0) = canvas.to_px(Point::new(grid.xs[i], grid.ys[j]));
            let (x1, y1) = canvas.to_px(Point::new(grid.xs[i + 1], grid.ys[j + 1]));
            // Round outwards so neighbouring cells leave no seams.
            let rect = SkRect::from_ltrb(
                x0.min(x1).floor(),
                y0.min(y1).floor(),
                x0.max(x1).ceil(),
                y0.max(y1).ceil(),
            );
            if let Some(rect) = rect {
                canvas.fill_rect(rect, norm.color(z), true);
            }
        }
    }
}

fn paint_contours(canvas: &mut Canvas, contours: &[ContourLine]) {
    let width = canvas.pt(CONTOUR_WIDTH_PT);
    for line in contours {
        if let Some(path) = canvas.polyline(&line.vertices, line.closed) {
            canvas.stroke(&path, Color::BLACK, width, true);
        }
    }
}

fn paint_contour_labels(
    canvas: &mut Canvas,
    contours: &[ContourLine],
    font: &Font,
    size_pt: f64,
) {
    let size = canvas.pt(size_pt);
    for line in contours {
        if line.vertices.len() < 2 {
            continue;
        }
        let label = format_level(line.level);
        let (w, h) = measure_text(font, &label, size);
        let pixel_len: f32 = line
            .vertices
            .windows(2)
            .map(|s| {
                let (ax, ay) = canvas.to_px(s[0]);
                let (bx, by) = canvas.to_px(s[1]);
                (bx - ax).hypot(by - ay)
            })
            .sum();
        if pixel_len < 3.0 * w {
            continue;
        }
        let (x, y) = canvas.to_px(line.vertices[line.vertices.len() / 2]);
        if let Some(rect) = SkRect::from_xywh(x - w / 2.0 - 1.0, y - h / 2.0, w + 2.0, h) {
            canvas.fill_rect(rect, Color::WHITE, true);
        }
        draw_text(
            &mut canvas.pixmap,
            font,
            &label,
            (x, y),
            size,
            Color::BLACK,
            (HAlign::Center, VAlign::Center),
        );
    }
}

// Hatching is drawn on a tile covering the hull's bounds, clipped to the
// hull there, then composited onto the map.
fn hatch_hull(canvas: &mut Canvas, hull: &SkPath, spacing: f32, width: f32) -> Result<()> {
    let bounds = hull.bounds();
    let (left, top) = (bounds.left().floor(), bounds.top().floor());
    let tile_w = (bounds.right().ceil() - left).max(1.0) as u32 + 1;
    let tile_h = (bounds.bottom().ceil() - top).max(1.0) as u32 + 1;
    let (Some(mut tile), Some(mut clip)) =
        (Pixmap::new(tile_w, tile_h), Mask::new(tile_w, tile_h))
    else {
        return Err(TopoError::Render(format!(
            "cannot allocate a {tile_w}x{tile_h} hatch tile"
        )));
    };
    clip.fill_path(hull, FillRule::Winding, true, Transform::from_translate(-left, -top));

    let (tw, th) = (tile_w as f32, tile_h as f32);
    let mut pb = PathBuilder::new();
    let mut offset = -th;
    while offset < tw {
        pb.move_to(offset, th);
        pb.line_to(offset + th, 0.0);
        offset += spacing;
    }
    if let Some(hatch) = pb.finish() {
        let mut paint = Paint::default();
        paint.set_color(Color::BLACK);
        paint.anti_alias = true;
        let stroke = Stroke {
            width,
            ..Stroke::default()
        };
        tile.stroke_path(&hatch, &paint, &stroke, Transform::identity(), Some(&clip));
    }
    canvas.pixmap.draw_pixmap(
        left as i32,
        top as i32,
        tile.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        Some(&canvas.axes_mask),
    );
    Ok(())
}

fn paint_buildings(canvas: &mut Canvas, buildings: &[BuildingOutline]) -> Result<()> {
    let spacing = canvas.pt(HATCH_SPACING_PT).max(2.0);
    let hatch_width = canvas.pt(HATCH_WIDTH_PT);
    let outline_width = canvas.pt(OUTLINE_WIDTH_PT);
    for building in buildings {
        let Some(path) = canvas.polyline(&building.hull, true) else {
            continue;
        };
        let mut fill = Paint::default();
        fill.set_color_rgba8(225, 225, 225, 255);
        fill.anti_alias = true;
        canvas.pixmap.fill_path(
            &path,
            &fill,
            FillRule::Winding,
            Transform::identity(),
            Some(&canvas.axes_mask),
        );

        hatch_hull(canvas, &path, spacing, hatch_width)?;
        canvas.stroke(&path, Color::BLACK, outline_width, true);
    }
    Ok(())
}

fn paint_points(canvas: &mut Canvas, points: &[SurveyPoint]) {
    let radius = canvas.pt(MARKER_AREA_PT2.sqrt() / 2.0);
    let mut paint = Paint::default();
    paint.set_color_rgba8(0, 0, 255, 255);
    paint.anti_alias = true;
    for p in points {
        let (x, y) = canvas.to_px(p.point.xy());
        if let Some(circle) = PathBuilder::from_circle(x, y, radius) {
            canvas.pixmap.fill_path(
                &circle,
                &paint,
                FillRule::Winding,
                Transform::identity(),
                Some(&canvas.axes_mask),
            );
        }
    }
}

fn paint_point_labels(canvas: &mut Canvas, points: &[SurveyPoint], font: &Font, size_pt: f64) {
    let size = canvas.pt(size_pt);
    let offset = canvas.pt(LABEL_OFFSET_PT);
    for p in points {
        let (x, y) = canvas.to_px(p.point.xy());
        draw_text(
            &mut canvas.pixmap,
            font,
            &format!("PN {}", p.id),
            (x - offset, y - offset),
            size,
            Color::BLACK,
            (HAlign::Right, VAlign::Bottom),
        );
    }
}

fn paint_axes(canvas: &mut Canvas, font: Option<&Font>) {
    let axes = canvas.figure.axes_box();
    let frame = canvas.pt(FRAME_WIDTH_PT);
    if let Some(rect) = canvas.rect_px(&axes) {
        let path = PathBuilder::from_rect(rect);
        canvas.stroke(&path, Color::BLACK, frame, false);
    }
    let tick = canvas.pt(TICK_LENGTH_PT);
    let label_size = canvas.pt(TICK_LABEL_PT);
    let limits = canvas.figure.limits;
    for x in nice_ticks(limits.min_x, limits.max_x, 5) {
        let (px, py) = canvas.to_px(Point::new(x, limits.min_y));
        canvas.line((px, py), (px, py + tick), Color::BLACK, frame);
        if let Some(font) = font {
            draw_text(
                &mut canvas.pixmap,
                font,
                &format_level(x),
                (px, py + tick + 1.0),
                label_size,
                Color::BLACK,
                (HAlign::Center, VAlign::Top),
            );
        }
    }
    for y in nice_ticks(limits.min_y, limits.max_y, 5) {
        let (px, py) = canvas.to_px(Point::new(limits.min_x, y));
        canvas.line((px - tick, py), (px, py), Color::BLACK, frame);
        if let Some(font) = font {
            draw_text(
                &mut canvas.pixmap,
                font,
                &format_level(y),
                (px - tick - 2.0, py),
                label_size,
                Color::BLACK,
                (HAlign::Right, VAlign::Center),
            );
        }
    }
}

fn paint_colorbar(canvas: &mut Canvas, norm: &Normalize, levels: &[f64], font: Option<&Font>) {
    let Some(bar) = canvas.figure.colorbar_box() else {
        return;
    };
    let Some(rect) = canvas.rect_px(&bar) else {
        return;
    };
    let rows = rect.height().ceil().max(1.0) as usize;
    for row in 0..rows {
        let t = 1.0 - (row as f64 + 0.5) / rows as f64;
        let z = norm.min + t * (norm.max - norm.min);
        let strip = SkRect::from_xywh(rect.left(), rect.top() + row as f32, rect.width(), 1.0);
        if let Some(strip) = strip {
            canvas.fill_rect(strip, norm.color(z), false);
        }
    }
    let frame = canvas.pt(FRAME_WIDTH_PT);
    canvas.stroke(&PathBuilder::from_rect(rect), Color::BLACK, frame, false);

    let tick = canvas.pt(TICK_LENGTH_PT);
    let label_size = canvas.pt(TICK_LABEL_PT);
    for &level in levels {
        let t = norm.fraction(level);
        if !(0.0..=1.0).contains(&t) {
            continue;
        }
        let y = rect.bottom() - (t as f32) * rect.height();
        canvas.line((rect.right(), y), (rect.right() + tick, y), Color::BLACK, frame);
        if let Some(font) = font {
            draw_text(
                &mut canvas.pixmap,
                font,
                &format_level(level),
                (rect.right() + tick + 2.0, y),
                label_size,
                Color::BLACK,
                (HAlign::Left, VAlign::Center),
            );
        }
    }
}

/// Renders `layers` into a pixmap laid out by `figure` at `dpi`.
///
/// Point labels need a font; requesting them without one is an error. Other
/// text is skipped when no font is available.
pub fn render_map(
    layers: &MapLayers,
    figure: &Figure,
    dpi: u32,
    font: Option<&Font>,
) -> Result<Pixmap> {
    if layers.show_ids && font.is_none() {
        return Err(TopoError::Font(
            "point labels were requested but no font is available".to_string(),
        ));
    }
    if font.is_none() {
        warn!("no font available, map text is skipped");
    }
    let (w, h) = figure.pixel_size(dpi);
    if u64::from(w) * u64::from(h) > MAX_PIXELS {
        return Err(TopoError::Render(format!(
            "a {w}x{h} image at {dpi} dpi is too large; use a smaller scale or resolution"
        )));
    }
    let mut pixmap = Pixmap::new(w, h)
        .ok_or_else(|| TopoError::Render(format!("cannot allocate a {w}x{h} image")))?;
    pixmap.fill(Color::WHITE);
    let mut axes_mask = Mask::new(w, h)
        .ok_or_else(|| TopoError::Render(format!("cannot allocate {w}x{h} mask")))?;
    if let Some(rect) = rect_to_pixels(figure, &figure.axes_box(), dpi) {
        axes_mask.fill_path(
            &PathBuilder::from_rect(rect),
            FillRule::Winding,
            false,
            Transform::identity(),
        );
    }
    let mut canvas = Canvas {
        pixmap,
        figure,
        dpi,
        axes_mask,
    };

    let norm = z_normalize(layers);
    paint_grid(&mut canvas, &layers.grid, &norm);
    paint_contours(&mut canvas, &layers.contours);
    if let Some(font) = font {
        paint_contour_labels(&mut canvas, &layers.contours, font, layers.font_size);
    }
    paint_buildings(&mut canvas, &layers.buildings)?;
    paint_points(&mut canvas, &layers.points);
    if let (true, Some(font)) = (layers.show_ids, font) {
        paint_point_labels(&mut canvas, &layers.points, font, layers.font_size);
    }
    paint_axes(&mut canvas, font);
    paint_colorbar(&mut canvas, &norm, &layers.levels, font);
    Ok(canvas.pixmap)
}

fn encode_png(
    pixmap: &Pixmap,
    dpi: u32,
    path: &Path,
) -> std::result::Result<(), png::EncodingError> {
    let file = File::create(path)?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), pixmap.width(), pixmap.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let ppm = (f64::from(dpi) / 0.0254).round() as u32;
    encoder.set_pixel_dims(Some(png::PixelDimensions {
        xppu: ppm,
        yppu: ppm,
        unit: png::Unit::Meter,
    }));
    let data: Vec<u8> = pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&data)?;
    writer.finish()
}

/// Writes `pixmap` as PNG recording `dpi` as its physical resolution. A
/// partially written file is removed on failure.
pub fn write_png(pixmap: &Pixmap, dpi: u32, path: &Path) -> Result<()> {
    if let Err(e) = encode_png(pixmap, dpi, path) {
        let _ = std::fs::remove_file(path);
        return Err(match e {
            png::EncodingError::IoError(source) => TopoError::io(path, source),
            other => TopoError::Render(other.to_string()),
        });
    }
    info!(
        "wrote {}x{} map at {dpi} dpi to {}",
        pixmap.width(),
        pixmap.height(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Extent;

    #[test]
    fn level_labels() {
        assert_eq!(format_level(120.0), "120");
        assert_eq!(format_level(-20.0), "-20");
        assert_eq!(format_level(12.5), "12.5");
        assert_eq!(format_level(0.125), "0.13");
    }

    #[test]
    fn ticks_are_round() {
        assert_eq!(nice_ticks(0.0, 100.0, 5), vec![0.0, 20.0, 40.0, 60.0, 80.0, 100.0]);
        assert_eq!(nice_ticks(3.0, 9.0, 5), vec![4.0, 6.0, 8.0]);
        assert!(nice_ticks(1.0, 1.0, 5).is_empty());
    }

    fn layers() -> MapLayers {
        let grid = Grid::from_values(
            vec![0.0, 10.0],
            vec![0.0, 10.0],
            vec![Some(0.0), Some(10.0), Some(10.0), Some(20.0)],
        )
        .unwrap();
        MapLayers {
            grid,
            levels: vec![10.0],
            contours: Vec::new(),
            buildings: Vec::new(),
            points: vec![SurveyPoint::new("1", 5.0, 5.0, 10.0)],
            show_ids: false,
            font_size: 10.0,
        }
    }

    fn figure() -> Figure {
        Figure::new(Extent {
            min_x: -2.0,
            min_y: -2.0,
            max_x: 12.0,
            max_y: 12.0,
        })
        .unwrap()
    }

    #[test]
    fn render_size_follows_dpi() {
        let pixmap = render_map(&layers(), &figure(), 100, None).unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (640, 480));
        // Top left corner lies outside the axes and stays white.
        let c = pixmap.pixel(0, 0).unwrap().demultiply();
        assert_eq!((c.red(), c.green(), c.blue()), (255, 255, 255));
    }

    #[test]
    fn labels_without_font_rejected() {
        let mut l = layers();
        l.show_ids = true;
        assert!(matches!(
            render_map(&l, &figure(), 100, None),
            Err(TopoError::Font(_))
        ));
    }

    #[test]
    fn oversized_image_is_an_error() {
        let site = Figure::new(Extent {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 100.0,
            max_y: 100.0,
        })
        .unwrap();
        let (huge, _) = crate::scale::fit_to_scale(&site, 1.0).unwrap();
        assert!(matches!(
            render_map(&layers(), &huge, 300, None),
            Err(TopoError::Render(_))
        ));
    }

    #[test]
    fn building_is_hatched_inside_its_hull() {
        let mut l = layers();
        l.points.clear();
        l.buildings = vec![BuildingOutline {
            name: "HOUSE".to_string(),
            hull: vec![
                Point::new(2.0, 2.0),
                Point::new(8.0, 2.0),
                Point::new(8.0, 8.0),
                Point::new(2.0, 8.0),
            ],
        }];
        let fig = figure();
        let pixmap = render_map(&l, &fig, 100, None).unwrap();
        let grey = |p: Point| {
            let (x, y) = fig.ground_to_pixels(p, 100);
            let c = pixmap.pixel(x as u32, y as u32).unwrap().demultiply();
            c.red() == c.green() && c.green() == c.blue()
        };
        assert!(grey(Point::new(5.0, 5.0)));
        assert!(grey(Point::new(3.0, 7.0)));
        // Grid colour outside the hull.
        assert!(!grey(Point::new(9.0, 9.0)));
    }

    #[test]
    fn png_records_resolution() {
        let dir = assert_fs::TempDir::new().unwrap();
        let path = dir.path().join("map.png");
        let pixmap = render_map(&layers(), &figure(), 150, None).unwrap();
        write_png(&pixmap, 150, &path).unwrap();
        let decoder = png::Decoder::new(File::open(&path).unwrap());
        let reader = decoder.read_info().unwrap();
        let info = reader.info();
        assert_eq!((info.width, info.height), (960, 720));
        let dims = info.pixel_dims.unwrap();
        assert_eq!(dims.xppu, 5906);
        assert_eq!(dims.unit, png::Unit::Meter);
    }
}
