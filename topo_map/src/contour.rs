//! Contour level planning and isoline tracing over an interpolated grid.

use std::collections::HashMap;

use log::debug;

use crate::dtm::Grid;
use crate::error::{Result, TopoError};
use crate::geometry::Point;

/// Upper bound on the number of levels inside the elevation range; a tiny
/// step over a tall range is almost certainly a typo.
pub const MAX_LEVELS: usize = 10_000;

/// Upper bound on all planned levels, including those between a distant
/// base and the elevation range.
pub const MAX_PLANNED_LEVELS: usize = 1_000_000;

/// Elevations at which contour lines are drawn.
///
/// `below` starts at the base level and descends; `above` starts one step
/// above the base and ascends.
#[derive(Debug, Clone, PartialEq)]
pub struct ContourLevels {
    pub below: Vec<f64>,
    pub above: Vec<f64>,
}

impl ContourLevels {
    /// All levels in ascending order.
    pub fn ascending(&self) -> Vec<f64> {
        self.below
            .iter()
            .rev()
            .chain(self.above.iter())
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.below.len() + self.above.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn check_finite(name: &'static str, v: f64) -> Result<()> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(TopoError::invalid(name, v, "must be a finite number"))
    }
}

/// Plans contour levels stepping from `base` by `step` in both directions.
///
/// Levels are produced by repeated subtraction (down to, but excluding,
/// `z_min`) and repeated addition (up to, but excluding, `z_max`). The base
/// is part of the lower branch.
pub fn plan_levels(base: f64, step: f64, z_min: f64, z_max: f64) -> Result<ContourLevels> {
    check_finite("base level", base)?;
    check_finite("contour step", step)?;
    check_finite("minimum elevation", z_min)?;
    check_finite("maximum elevation", z_max)?;
    if step <= 0.0 {
        return Err(TopoError::invalid(
            "contour step",
            step,
            "must be greater than zero",
        ));
    }
    let in_range = (z_max - z_min).max(0.0) / step;
    if in_range > MAX_LEVELS as f64 {
        return Err(TopoError::invalid(
            "contour step",
            step,
            format!(
                "would produce more than {MAX_LEVELS} levels between {z_min} and {z_max}"
            ),
        ));
    }
    let planned = ((base - z_min).max(0.0) + (z_max - base).max(0.0)) / step;
    if planned > MAX_PLANNED_LEVELS as f64 {
        return Err(TopoError::invalid(
            "base level",
            base,
            format!("is more than {MAX_PLANNED_LEVELS} steps away from the data"),
        ));
    }

    let mut below = Vec::new();
    let mut level = base;
    while level > z_min {
        below.push(level);
        level -= step;
    }
    let mut above = Vec::new();
    let mut level = base + step;
    while level < z_max {
        above.push(level);
        level += step;
    }
    debug!(
        "planned {} levels below and {} above base {base}",
        below.len(),
        above.len()
    );
    Ok(ContourLevels { below, above })
}

/// A traced isoline in ground coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct ContourLine {
    pub level: f64,
    pub vertices: Vec<Point>,
    pub closed: bool,
}

impl ContourLine {
    /// Total length of the line in ground units.
    pub fn length(&self) -> f64 {
        self.vertices
            .windows(2)
            .map(|w| crate::geometry::distance(w[0], w[1]))
            .sum()
    }
}

// Identity of a cell edge crossed by an isoline. Horizontal edges join
// (i, j)-(i+1, j); vertical edges join (i, j)-(i, j+1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum EdgeId {
    Horizontal(usize, usize),
    Vertical(usize, usize),
}

struct Crossing {
    edge: EdgeId,
    point: Point,
}

fn interpolate_edge(p1: Point, p2: Point, v1: f64, v2: f64, level: f64) -> Point {
    if (v2 - v1).abs() < f64::EPSILON {
        return Point::new((p1.x + p2.x) / 2.0, (p1.y + p2.y) / 2.0);
    }
    let t = ((level - v1) / (v2 - v1)).clamp(0.0, 1.0);
    Point::new(p1.x + t * (p2.x - p1.x), p1.y + t * (p2.y - p1.y))
}

/// Marching squares for one level. Returns unordered segments whose ends are
/// identified by the cell edge they lie on.
fn march_squares(grid: &Grid, level: f64) -> Vec<(Crossing, Crossing)> {
    let mut segments = Vec::new();
    if grid.nx() < 2 || grid.ny() < 2 {
        return segments;
    }
    for j in 0..grid.ny() - 1 {
        for i in 0..grid.nx() - 1 {
            let (Some(bl), Some(br), Some(tr), Some(tl)) = (
                grid.get(i, j),
                grid.get(i + 1, j),
                grid.get(i + 1, j + 1),
                grid.get(i, j + 1),
            ) else {
                continue;
            };
            let mut case = 0u8;
            if tl >= level {
                case |= 1;
            }
            if tr >= level {
                case |= 2;
            }
            if br >= level {
                case |= 4;
            }
            if bl >= level {
                case |= 8;
            }
            if case == 0 || case == 15 {
                continue;
            }

            let p_bl = Point::new(grid.xs[i], grid.ys[j]);
            let p_br = Point::new(grid.xs[i + 1], grid.ys[j]);
            let p_tr = Point::new(grid.xs[i + 1], grid.ys[j + 1]);
            let p_tl = Point::new(grid.xs[i], grid.ys[j + 1]);
            let top = || Crossing {
                edge: EdgeId::Horizontal(i, j + 1),
                point: interpolate_edge(p_tl, p_tr, tl, tr, level),
            };
            let bottom = || Crossing {
                edge: EdgeId::Horizontal(i, j),
                point: interpolate_edge(p_bl, p_br, bl, br, level),
            };
            let left = || Crossing {
                edge: EdgeId::Vertical(i, j),
                point: interpolate_edge(p_bl, p_tl, bl, tl, level),
            };
            let right = || Crossing {
                edge: EdgeId::Vertical(i + 1, j),
                point: interpolate_edge(p_br, p_tr, br, tr, level),
            };

            match case {
                1 | 14 => segments.push((left(), top())),
                2 | 13 => segments.push((top(), right())),
                3 | 12 => segments.push((left(), right())),
                4 | 11 => segments.push((right(), bottom())),
                6 | 9 => segments.push((top(), bottom())),
                7 | 8 => segments.push((left(), bottom())),
                5 => {
                    segments.push((left(), top()));
                    segments.push((right(), bottom()));
                }
                10 => {
                    segments.push((top(), right()));
                    segments.push((left(), bottom()));
                }
                _ => {}
            }
        }
    }
    segments
}

/// Joins segments sharing a cell edge into polylines.
fn chain_segments(segments: Vec<(Crossing, Crossing)>, level: f64) -> Vec<ContourLine> {
    let mut points: HashMap<EdgeId, Point> = HashMap::new();
    let mut links: HashMap<EdgeId, Vec<usize>> = HashMap::new();
    let mut ends: Vec<(EdgeId, EdgeId)> = Vec::with_capacity(segments.len());
    for (idx, (a, b)) in segments.into_iter().enumerate() {
        points.insert(a.edge, a.point);
        points.insert(b.edge, b.point);
        links.entry(a.edge).or_default().push(idx);
        links.entry(b.edge).or_default().push(idx);
        ends.push((a.edge, b.edge));
    }

    let mut used = vec![false; ends.len()];
    let next_segment = |edge: EdgeId, used: &[bool]| -> Option<usize> {
        links
            .get(&edge)
            .and_then(|segs| segs.iter().copied().find(|&s| !used[s]))
    };

    let mut lines = Vec::new();
    for start in 0..ends.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let (head, tail) = ends[start];
        let mut chain = std::collections::VecDeque::from([head, tail]);

        // Extend forward from the tail, then backward from the head.
        let mut cursor = tail;
        while let Some(s) = next_segment(cursor, &used) {
            used[s] = true;
            let (a, b) = ends[s];
            cursor = if a == cursor { b } else { a };
            chain.push_back(cursor);
        }
        let closed = chain.len() > 2 && chain.front() == chain.back();
        if !closed {
            let mut cursor = head;
            while let Some(s) = next_segment(cursor, &used) {
                used[s] = true;
                let (a, b) = ends[s];
                cursor = if a == cursor { b } else { a };
                chain.push_front(cursor);
            }
        }

        let vertices = chain.iter().filter_map(|e| points.get(e).copied()).collect();
        lines.push(ContourLine {
            level,
            vertices,
            closed,
        });
    }
    lines
}

/// Traces isolines of `grid` at every level in `levels`. Levels outside the
/// grid's elevation range are skipped.
pub fn trace_contours(grid: &Grid, levels: &[f64]) -> Vec<ContourLine> {
    let mut lines = Vec::new();
    let Some((z_min, z_max)) = grid.z_range() else {
        return lines;
    };
    for &level in levels.iter().filter(|l| (z_min..=z_max).contains(*l)) {
        let segments = march_squares(grid, level);
        let traced = chain_segments(segments, level);
        debug!("level {level}: {} contour lines", traced.len());
        lines.extend(traced);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::linspace;

    #[test]
    fn plan_levels_half_open() {
        let levels = plan_levels(100.0, 20.0, 42.0, 167.0).unwrap();
        assert_eq!(levels.below, vec![100.0, 80.0, 60.0]);
        assert_eq!(levels.above, vec![120.0, 140.0, 160.0]);
        assert_eq!(
            levels.ascending(),
            vec![60.0, 80.0, 100.0, 120.0, 140.0, 160.0]
        );
    }

    #[test]
    fn plan_levels_bounds_excluded() {
        let levels = plan_levels(100.0, 20.0, 60.0, 140.0).unwrap();
        assert_eq!(levels.below, vec![100.0, 80.0]);
        assert_eq!(levels.above, vec![120.0]);
    }

    #[test]
    fn plan_levels_base_outside_range() {
        let low = plan_levels(0.0, 20.0, 42.0, 167.0).unwrap();
        assert!(low.below.is_empty());
        assert_eq!(low.above.last(), Some(&160.0));

        let high = plan_levels(500.0, 20.0, 42.0, 167.0).unwrap();
        assert!(high.above.is_empty());
        assert_eq!(high.below.last(), Some(&60.0));
    }

    #[test]
    fn plan_levels_rejects_bad_step() {
        assert!(plan_levels(100.0, 0.0, 0.0, 200.0).is_err());
        assert!(plan_levels(100.0, -5.0, 0.0, 200.0).is_err());
        assert!(plan_levels(100.0, f64::NAN, 0.0, 200.0).is_err());
        assert!(plan_levels(0.0, 1e-6, 0.0, 1000.0).is_err());
    }

    #[test]
    fn plan_levels_caps_only_the_data_range() {
        let levels = plan_levels(0.0, 0.25, 2480.0, 2520.0).unwrap();
        let inside = levels
            .ascending()
            .into_iter()
            .filter(|l| (2480.0..=2520.0).contains(l))
            .count();
        assert_eq!(inside, 160);
        assert_eq!(levels.above.last(), Some(&2519.75));
        assert!(plan_levels(1e9, 1.0, 0.0, 10.0).is_err());
    }

    #[test]
    fn levels_outside_grid_are_skipped() {
        let levels: Vec<f64> = (-400..400).map(|k| f64::from(k) * 0.5).collect();
        let lines = trace_contours(&cone(21), &levels);
        assert!(lines.iter().all(|l| (-4.2..=10.0).contains(&l.level)));
        assert!(lines.iter().any(|l| l.level == 5.0));
    }

    fn cone(n: usize) -> Grid {
        let xs = linspace(-10.0, 10.0, n);
        let ys = linspace(-10.0, 10.0, n);
        let mut values = Vec::with_capacity(n * n);
        for &y in &ys {
            for &x in &xs {
                values.push(Some(10.0 - (x * x + y * y).sqrt()));
            }
        }
        Grid::from_values(xs, ys, values).unwrap()
    }

    #[test]
    fn cone_gives_closed_circle() {
        let lines = trace_contours(&cone(41), &[5.0]);
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert!(line.closed);
        assert_eq!(line.level, 5.0);
        for p in &line.vertices {
            let r = (p.x * p.x + p.y * p.y).sqrt();
            assert!((r - 5.0).abs() < 0.1, "radius {r}");
        }
        let circumference = 2.0 * std::f64::consts::PI * 5.0;
        assert!((line.length() - circumference).abs() / circumference < 0.02);
    }

    #[test]
    fn masked_cells_break_lines() {
        let xs = linspace(0.0, 4.0, 5);
        let ys = linspace(0.0, 1.0, 2);
        // Ramp along y, with one masked node in the middle of the bottom row.
        #[rustfmt::skip]
        let values = vec![
            Some(0.0), Some(0.0), None, Some(0.0), Some(0.0),
            Some(1.0), Some(1.0), Some(1.0), Some(1.0), Some(1.0),
        ];
        let grid = Grid::from_values(xs, ys, values).unwrap();
        let lines = trace_contours(&grid, &[0.5]);
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| !l.closed));
        let total: usize = lines.iter().map(|l| l.vertices.len()).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn level_outside_grid_has_no_lines() {
        assert!(trace_contours(&cone(11), &[50.0]).is_empty());
    }
}
