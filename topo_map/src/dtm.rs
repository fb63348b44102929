//! Terrain surfaces built from scattered survey points.
//!
//! A [`Tin`] triangulates the points on the XY plane; [`interpolate_grid`]
//! resamples the scattered elevations onto the regular grid that the
//! renderer and contour tracer work on.

use std::fmt;
use std::str::FromStr;

use log::debug;

use crate::error::{Result, TopoError};
use crate::geometry::{linspace, Extent, Point, Point3};

fn barycentric(p: Point, a: Point3, b: Point3, c: Point3) -> Option<(f64, f64, f64)> {
    let det = (b.y - c.y) * (a.x - c.x) + (c.x - b.x) * (a.y - c.y);
    if det.abs() < f64::EPSILON {
        return None;
    }
    let u = ((b.y - c.y) * (p.x - c.x) + (c.x - b.x) * (p.y - c.y)) / det;
    let v = ((c.y - a.y) * (p.x - c.x) + (a.x - c.x) * (p.y - c.y)) / det;
    let w = 1.0 - u - v;
    Some((u, v, w))
}

// Small negative barycentric weights are accepted so that grid nodes lying
// exactly on a hull edge are not masked by rounding.
const INSIDE_TOLERANCE: f64 = -1e-9;

// Planar elevation at `p` inside triangle `abc`, `None` outside it.
fn elevation_in(p: Point, a: Point3, b: Point3, c: Point3) -> Option<f64> {
    let (u, v, w) = barycentric(p, a, b, c)?;
    (u >= INSIDE_TOLERANCE && v >= INSIDE_TOLERANCE && w >= INSIDE_TOLERANCE)
        .then(|| u * a.z + v * b.z + w * c.z)
}

/// Triangulated Irregular Network constructed from 3D points.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Tin {
    /// Vertices of the TIN.
    pub vertices: Vec<Point3>,
    /// Indices into `vertices` forming triangles.
    pub triangles: Vec<[usize; 3]>,
}

impl Tin {
    /// Builds a TIN from the provided vertices using Delaunay triangulation on the XY plane.
    pub fn from_points(points: Vec<Point3>) -> Self {
        let coords: Vec<delaunator::Point> = points
            .iter()
            .map(|p| delaunator::Point { x: p.x, y: p.y })
            .collect();
        let triangulation = delaunator::triangulate(&coords);
        let triangles = triangulation
            .triangles
            .chunks(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();
        Self {
            vertices: points,
            triangles,
        }
    }

    fn corners(&self, tri: &[usize; 3]) -> (Point3, Point3, Point3) {
        (
            self.vertices[tri[0]],
            self.vertices[tri[1]],
            self.vertices[tri[2]],
        )
    }

    /// Returns the linearly interpolated elevation at (x, y), or `None` when
    /// the location is outside the triangulated area.
    pub fn elevation_at(&self, x: f64, y: f64) -> Option<f64> {
        let p = Point::new(x, y);
        self.triangles.iter().find_map(|tri| {
            let (a, b, c) = self.corners(tri);
            elevation_in(p, a, b, c)
        })
    }
}

/// Method used to fill the regular grid from scattered points.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    /// Barycentric interpolation inside the Delaunay triangulation. Nodes
    /// outside the convex hull of the points are left empty.
    #[default]
    Linear,
    /// Elevation of the closest survey point. Every node is filled.
    Nearest,
}

impl fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear => f.write_str("linear"),
            Self::Nearest => f.write_str("nearest"),
        }
    }
}

impl FromStr for InterpolationMethod {
    type Err = TopoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(Self::Linear),
            "nearest" | "nn" => Ok(Self::Nearest),
            _ => Err(TopoError::invalid(
                "interpolation method",
                s,
                "expected `linear` or `nearest`",
            )),
        }
    }
}

/// Elevations sampled on a regular grid. Empty nodes are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    values: Vec<Option<f64>>,
}

impl Grid {
    fn empty(xs: Vec<f64>, ys: Vec<f64>) -> Self {
        let n = xs.len() * ys.len();
        Self {
            xs,
            ys,
            values: vec![None; n],
        }
    }

    /// Builds a grid from row-major values (`ys` rows of `xs` columns).
    pub fn from_values(xs: Vec<f64>, ys: Vec<f64>, values: Vec<Option<f64>>) -> Result<Self> {
        if values.len() != xs.len() * ys.len() {
            return Err(TopoError::invalid(
                "grid",
                values.len(),
                format!("expected {} values", xs.len() * ys.len()),
            ));
        }
        Ok(Self { xs, ys, values })
    }

    pub fn nx(&self) -> usize {
        self.xs.len()
    }

    pub fn ny(&self) -> usize {
        self.ys.len()
    }

    /// Value at column `i`, row `j`.
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.values.get(j * self.nx() + i).copied().flatten()
    }

    fn set(&mut self, i: usize, j: usize, z: f64) {
        let nx = self.nx();
        self.values[j * nx + i] = Some(z);
    }

    /// Number of filled nodes.
    pub fn filled(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// Minimum and maximum of the filled nodes.
    pub fn z_range(&self) -> Option<(f64, f64)> {
        let mut iter = self.values.iter().flatten().copied();
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), z| (lo.min(z), hi.max(z))))
    }
}

fn check_dimension(name: &'static str, n: usize) -> Result<()> {
    if n < 2 {
        return Err(TopoError::invalid(name, n, "grid needs at least 2 nodes per axis"));
    }
    Ok(())
}

/// Resamples `points` onto an `nx` by `ny` grid spanning their bounding box.
pub fn interpolate_grid(
    points: &[Point3],
    nx: usize,
    ny: usize,
    method: InterpolationMethod,
) -> Result<Grid> {
    check_dimension("grid columns", nx)?;
    check_dimension("grid rows", ny)?;
    let extent = Extent::from_points(points.iter().map(Point3::xy)).ok_or(TopoError::NoData)?;
    let xs = linspace(extent.min_x, extent.max_x, nx);
    let ys = linspace(extent.min_y, extent.max_y, ny);
    let grid = match method {
        InterpolationMethod::Linear => linear_grid(points, xs, ys)?,
        InterpolationMethod::Nearest => nearest_grid(points, xs, ys),
    };
    debug!(
        "interpolated {}x{} grid ({method}), {} nodes filled",
        nx,
        ny,
        grid.filled()
    );
    Ok(grid)
}

// Index range of `axis` samples inside [lo, hi]; `axis` is ascending.
fn index_span(axis: &[f64], lo: f64, hi: f64) -> std::ops::Range<usize> {
    let start = axis.partition_point(|&v| v < lo - 1e-9);
    let end = axis.partition_point(|&v| v <= hi + 1e-9);
    start..end.max(start)
}

fn linear_grid(points: &[Point3], xs: Vec<f64>, ys: Vec<f64>) -> Result<Grid> {
    let tin = Tin::from_points(points.to_vec());
    if tin.triangles.is_empty() {
        return Err(TopoError::invalid(
            "survey points",
            points.len(),
            "linear interpolation needs at least 3 points that are not collinear",
        ));
    }
    let mut grid = Grid::empty(xs, ys);
    // Walk each triangle's bounding box instead of searching every triangle
    // for every node.
    for tri in &tin.triangles {
        let (a, b, c) = tin.corners(tri);
        let cols = index_span(&grid.xs, a.x.min(b.x).min(c.x), a.x.max(b.x).max(c.x));
        let rows = index_span(&grid.ys, a.y.min(b.y).min(c.y), a.y.max(b.y).max(c.y));
        for j in rows {
            for i in cols.clone() {
                if grid.get(i, j).is_some() {
                    continue;
                }
                let p = Point::new(grid.xs[i], grid.ys[j]);
                if let Some(z) = elevation_in(p, a, b, c) {
                    grid.set(i, j, z);
                }
            }
        }
    }
    Ok(grid)
}

fn nearest_grid(points: &[Point3], xs: Vec<f64>, ys: Vec<f64>) -> Grid {
    let mut grid = Grid::empty(xs, ys);
    for j in 0..grid.ny() {
        for i in 0..grid.nx() {
            let (x, y) = (grid.xs[i], grid.ys[j]);
            let nearest = points.iter().min_by(|p, q| {
                let dp = (p.x - x).powi(2) + (p.y - y).powi(2);
                let dq = (q.x - x).powi(2) + (q.y - y).powi(2);
                dp.total_cmp(&dq)
            });
            if let Some(p) = nearest {
                grid.set(i, j, p.z);
            }
        }
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plane_points() -> Vec<Point3> {
        // z = x + 2y
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 10.0),
            Point3::new(10.0, 10.0, 30.0),
            Point3::new(0.0, 10.0, 20.0),
            Point3::new(4.0, 6.0, 16.0),
        ]
    }

    #[test]
    fn tin_elevation_on_plane() {
        let tin = Tin::from_points(plane_points());
        let z = tin.elevation_at(2.5, 7.5).unwrap();
        assert!((z - 17.5).abs() < 1e-9);
        assert!(tin.elevation_at(11.0, 5.0).is_none());
    }

    #[test]
    fn linear_grid_reproduces_plane() {
        let grid = interpolate_grid(&plane_points(), 11, 6, InterpolationMethod::Linear).unwrap();
        assert_eq!(grid.nx(), 11);
        assert_eq!(grid.ny(), 6);
        assert_eq!(grid.filled(), 66);
        for j in 0..grid.ny() {
            for i in 0..grid.nx() {
                let expect = grid.xs[i] + 2.0 * grid.ys[j];
                assert!((grid.get(i, j).unwrap() - expect).abs() < 1e-9);
            }
        }
        assert_eq!(grid.z_range(), Some((0.0, 30.0)));
    }

    #[test]
    fn linear_grid_masks_outside_hull() {
        let pts = vec![
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(10.0, 0.0, 1.0),
            Point3::new(0.0, 10.0, 1.0),
        ];
        let grid = interpolate_grid(&pts, 3, 3, InterpolationMethod::Linear).unwrap();
        assert!(grid.get(0, 0).is_some());
        assert!(grid.get(1, 1).is_some());
        assert!(grid.get(2, 2).is_none());
    }

    #[test]
    fn collinear_points_rejected_for_linear() {
        let pts = vec![
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 1.0, 2.0),
            Point3::new(2.0, 2.0, 3.0),
        ];
        assert!(interpolate_grid(&pts, 4, 4, InterpolationMethod::Linear).is_err());
        let grid = interpolate_grid(&pts, 4, 4, InterpolationMethod::Nearest).unwrap();
        assert_eq!(grid.filled(), 16);
        assert_eq!(grid.get(0, 0), Some(1.0));
        assert_eq!(grid.get(3, 3), Some(3.0));
    }

    #[test]
    fn grid_dimension_checked() {
        assert!(interpolate_grid(&plane_points(), 1, 10, InterpolationMethod::Linear).is_err());
    }

    #[test]
    fn method_from_str() {
        assert_eq!("Linear".parse::<InterpolationMethod>().unwrap(), InterpolationMethod::Linear);
        assert_eq!("nn".parse::<InterpolationMethod>().unwrap(), InterpolationMethod::Nearest);
        assert!("cubic".parse::<InterpolationMethod>().is_err());
    }
}
