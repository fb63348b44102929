//! Survey points and building outlines loaded from a field file.

use std::collections::HashMap;

use crate::geometry::{Extent, Point, Point3};

pub mod loader;

pub use loader::{classify_row, parse_survey, read_survey_file, write_survey_file, Row};

/// A surveyed ground point.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SurveyPoint {
    pub id: String,
    pub point: Point3,
}

impl SurveyPoint {
    pub fn new(id: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            id: id.into(),
            point: Point3::new(x, y, z),
        }
    }
}

/// One corner of a building, keeping the row id it was read from.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BuildingVertex {
    pub id: String,
    pub point: Point,
}

/// Vertices sharing the same building tag, in file order.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BuildingGroup {
    pub name: String,
    pub vertices: Vec<BuildingVertex>,
}

impl BuildingGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vertices: Vec::new(),
        }
    }

    /// Vertex coordinates without their ids.
    pub fn points(&self) -> Vec<Point> {
        self.vertices.iter().map(|v| v.point).collect()
    }
}

/// In-memory store of one loaded survey file.
///
/// Points keep file order and are unique by id. Building groups keep the
/// order in which their tag first appeared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointStore {
    points: Vec<SurveyPoint>,
    buildings: Vec<BuildingGroup>,
    point_index: HashMap<String, usize>,
    building_index: HashMap<String, usize>,
}

impl PointStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a survey point. Returns `false` and leaves the store unchanged
    /// when a point with the same id already exists.
    pub fn add_point(&mut self, point: SurveyPoint) -> bool {
        if self.point_index.contains_key(&point.id) {
            return false;
        }
        self.point_index.insert(point.id.clone(), self.points.len());
        self.points.push(point);
        true
    }

    /// Appends a vertex to the building group named `tag`, creating the group
    /// on first use.
    pub fn add_building_vertex(&mut self, tag: &str, vertex: BuildingVertex) {
        let idx = match self.building_index.get(tag) {
            Some(&idx) => idx,
            None => {
                self.buildings.push(BuildingGroup::new(tag));
                self.building_index
                    .insert(tag.to_string(), self.buildings.len() - 1);
                self.buildings.len() - 1
            }
        };
        self.buildings[idx].vertices.push(vertex);
    }

    pub fn points(&self) -> &[SurveyPoint] {
        &self.points
    }

    pub fn buildings(&self) -> &[BuildingGroup] {
        &self.buildings
    }

    pub fn point(&self, id: &str) -> Option<&SurveyPoint> {
        self.point_index.get(id).map(|&i| &self.points[i])
    }

    pub fn building(&self, name: &str) -> Option<&BuildingGroup> {
        self.building_index.get(name).map(|&i| &self.buildings[i])
    }

    /// Number of survey points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// A store without survey points cannot be drawn, even if it holds
    /// building outlines.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.buildings.clear();
        self.point_index.clear();
        self.building_index.clear();
    }

    /// Minimum and maximum elevation of the survey points.
    pub fn z_range(&self) -> Option<(f64, f64)> {
        let mut iter = self.points.iter().map(|p| p.point.z);
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), z| (lo.min(z), hi.max(z))))
    }

    /// Bounding box of the survey points only.
    pub fn point_extent(&self) -> Option<Extent> {
        Extent::from_points(self.points.iter().map(|p| p.point.xy()))
    }

    /// Bounding box of the survey points and every building vertex.
    pub fn extent(&self) -> Option<Extent> {
        let mut ext = self.point_extent()?;
        for group in &self.buildings {
            for v in &group.vertices {
                ext.include(v.point);
            }
        }
        Some(ext)
    }
}
