//! The map document: loaded data, parameters and the last drawn map.

use std::path::Path;

use log::{debug, info};
use rusttype::Font;

use crate::buildings::building_outlines;
use crate::contour::{plan_levels, trace_contours};
use crate::dtm::interpolate_grid;
use crate::error::{Result, TopoError};
use crate::figure::Figure;
use crate::params::MapParams;
use crate::render::{render_map, write_png, MapLayers};
use crate::scale::{fit_to_scale, ScaleFit};
use crate::survey::{read_survey_file, PointStore};

/// Result of a draw, kept until the next load or draw.
#[derive(Debug, Clone)]
pub struct DrawnMap {
    pub layers: MapLayers,
    /// Figure at its on-screen size. Saving fits a copy of it.
    pub figure: Figure,
}

/// Owns everything one map goes through from loading to saving.
#[derive(Default)]
pub struct Session {
    store: PointStore,
    map: Option<DrawnMap>,
    pub params: MapParams,
    font: Option<Font<'static>>,
}

impl Session {
    pub fn new(params: MapParams) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    pub fn with_font(mut self, font: Option<Font<'static>>) -> Self {
        self.font = font;
        self
    }

    pub fn store(&self) -> &PointStore {
        &self.store
    }

    pub fn map(&self) -> Option<&DrawnMap> {
        self.map.as_ref()
    }

    /// Replaces the loaded data with the contents of `path`. Any drawn map is
    /// dropped; on failure the store is left empty.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        self.store.clear();
        self.map = None;
        self.store = read_survey_file(path)?;
        Ok(())
    }

    /// Interpolates, contours and lays out the loaded data.
    pub fn draw(&mut self) -> Result<&DrawnMap> {
        if self.store.is_empty() {
            return Err(TopoError::NoData);
        }
        let params = &self.params;
        params.validate_draw()?;
        if params.show_ids && self.font.is_none() {
            return Err(TopoError::Font(
                "point labels were requested but no font is available".to_string(),
            ));
        }

        let samples: Vec<_> = self.store.points().iter().map(|p| p.point).collect();
        let grid = interpolate_grid(&samples, params.nx, params.ny, params.method)?;
        let (z_min, z_max) = self.store.z_range().ok_or(TopoError::NoData)?;
        let levels = plan_levels(params.base_level, params.step, z_min, z_max)?.ascending();
        info!("{} contour levels between {z_min} and {z_max}", levels.len());
        let contours = trace_contours(&grid, &levels);
        let buildings = building_outlines(self.store.buildings());
        debug!(
            "{} contour lines, {} building outlines",
            contours.len(),
            buildings.len()
        );

        let limits = self
            .store
            .extent()
            .ok_or(TopoError::NoData)?
            .expanded(params.extension);
        let figure = Figure::new(limits)?;
        let layers = MapLayers {
            grid,
            levels,
            contours,
            buildings,
            points: self.store.points().to_vec(),
            show_ids: params.show_ids,
            font_size: params.font_size,
        };
        Ok(&*self.map.insert(DrawnMap { layers, figure }))
    }

    /// Saves the drawn map to `path` at the current scale and resolution.
    /// The file is only created once rendering has succeeded.
    pub fn save(&self, path: &Path) -> Result<ScaleFit> {
        let map = self.map.as_ref().ok_or(TopoError::NoMap)?;
        self.params.validate_save()?;
        let (figure, fit) = fit_to_scale(&map.figure, self.params.scale)?;
        let pixmap = render_map(&map.layers, &figure, self.params.dpi, self.font.as_ref())?;
        write_png(&pixmap, self.params.dpi, path)?;
        Ok(fit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    const DATA: &str = "1\t0\t0\t100\n\
        2\t20\t0\t110\n\
        3\t20\t20\t140\n\
        4\t0\t20\t120\n\
        5\t10\t10\t125\n\
        b1\t5\t5\tHOUSE\n\
        b2\t8\t5\tHOUSE\n\
        b3\t8\t8\tHOUSE\n\
        b4\t5\t8\tHOUSE\n";

    fn small_params() -> MapParams {
        MapParams {
            nx: 20,
            ny: 20,
            base_level: 100.0,
            step: 10.0,
            dpi: 100,
            ..MapParams::default()
        }
    }

    fn loaded(dir: &assert_fs::TempDir) -> Session {
        let input = dir.child("points.txt");
        input.write_str(DATA).unwrap();
        let mut session = Session::new(small_params());
        session.load(input.path()).unwrap();
        session
    }

    #[test]
    fn draw_before_load_is_no_data() {
        let mut session = Session::default();
        assert!(matches!(session.draw(), Err(TopoError::NoData)));
    }

    #[test]
    fn save_before_draw_is_no_map() {
        let dir = assert_fs::TempDir::new().unwrap();
        let session = loaded(&dir);
        let out = dir.child("map.png");
        assert!(matches!(session.save(out.path()), Err(TopoError::NoMap)));
        out.assert(predicates::path::missing());
    }

    #[test]
    fn draw_builds_layers() {
        let dir = assert_fs::TempDir::new().unwrap();
        let mut session = loaded(&dir);
        let map = session.draw().unwrap();
        assert_eq!(map.layers.levels, vec![110.0, 120.0, 130.0]);
        assert!(!map.layers.contours.is_empty());
        assert_eq!(map.layers.buildings.len(), 1);
        assert_eq!(map.figure.limits.min_x, -2.0);
        assert_eq!(map.figure.limits.max_y, 22.0);
    }

    #[test]
    fn save_keeps_drawn_figure() {
        let dir = assert_fs::TempDir::new().unwrap();
        let mut session = loaded(&dir);
        let before = session.draw().unwrap().figure.clone();
        let out = dir.child("map.png");
        let fit = session.save(out.path()).unwrap();
        out.assert(predicates::path::is_file());
        assert_eq!(session.map().unwrap().figure, before);
        // 24 m at 1:200 is 12 cm on paper.
        assert!((fit.target_cm.0 - 12.0).abs() < 1e-9);
    }

    #[test]
    fn failed_load_empties_store() {
        let dir = assert_fs::TempDir::new().unwrap();
        let mut session = loaded(&dir);
        session.draw().unwrap();
        let bad = dir.child("bad.txt");
        bad.write_str("1\t0\t0\t5\n2\tx\t0\t5\n").unwrap();
        assert!(matches!(session.load(bad.path()), Err(TopoError::Parse { line: 2, .. })));
        assert!(session.store().is_empty());
        assert!(session.map().is_none());
    }

    #[test]
    fn labels_need_a_font() {
        let dir = assert_fs::TempDir::new().unwrap();
        let mut session = loaded(&dir);
        session.params.show_ids = true;
        assert!(matches!(session.draw(), Err(TopoError::Font(_))));
    }
}
