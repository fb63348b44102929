//! Building footprints drawn as the convex hull of their surveyed corners.

use geo::ConvexHull;
use geo_types::{Coord, MultiPoint};
use log::debug;

use crate::geometry::{polygon_area, Point};
use crate::survey::BuildingGroup;

/// Hull of one building group, ready to be drawn as a hatched polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildingOutline {
    pub name: String,
    /// Hull vertices without the repeated closing vertex.
    pub hull: Vec<Point>,
}

impl BuildingOutline {
    pub fn area(&self) -> f64 {
        polygon_area(&self.hull)
    }
}

/// Computes the convex hull of every group. Groups that do not enclose an
/// area (fewer than three distinct corners, or all corners on a line) are
/// skipped.
pub fn building_outlines(groups: &[BuildingGroup]) -> Vec<BuildingOutline> {
    groups
        .iter()
        .filter_map(|group| {
            let outline = outline(group);
            if outline.is_none() {
                debug!("building {} has no area, skipped", group.name);
            }
            outline
        })
        .collect()
}

fn outline(group: &BuildingGroup) -> Option<BuildingOutline> {
    let corners: MultiPoint<f64> = group
        .vertices
        .iter()
        .map(|v| Coord {
            x: v.point.x,
            y: v.point.y,
        })
        .collect::<Vec<_>>()
        .into();
    let hull = corners.convex_hull();
    let mut ring: Vec<Point> = hull
        .exterior()
        .coords()
        .map(|c| Point::new(c.x, c.y))
        .collect();
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    let outline = BuildingOutline {
        name: group.name.clone(),
        hull: ring,
    };
    (outline.hull.len() >= 3 && outline.area() > f64::EPSILON).then_some(outline)
}
