//! User editable map parameters.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dtm::InterpolationMethod;
use crate::error::{Result, TopoError};

/// Output resolutions offered for saved maps, in dots per inch.
pub const RESOLUTION_PRESETS: [u32; 3] = [100, 150, 300];

/// Parameters collected from the user before drawing and saving a map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapParams {
    /// Denominator of the map scale (200 means 1:200).
    pub scale: f64,
    /// Output resolution, one of [`RESOLUTION_PRESETS`].
    pub dpi: u32,
    /// Draw `PN <id>` next to every survey point.
    pub show_ids: bool,
    /// Font size of point and contour labels, in points.
    pub font_size: f64,
    /// Interpolation grid columns.
    pub nx: usize,
    /// Interpolation grid rows.
    pub ny: usize,
    /// Level the contour lines are counted from.
    pub base_level: f64,
    /// Elevation difference between two contour lines, in metres.
    pub step: f64,
    /// Blank border between the outermost points and the axes, in metres.
    pub extension: f64,
    pub method: InterpolationMethod,
}

impl Default for MapParams {
    fn default() -> Self {
        Self {
            scale: 200.0,
            dpi: 150,
            show_ids: false,
            font_size: 10.0,
            nx: 500,
            ny: 500,
            base_level: 0.0,
            step: 20.0,
            extension: 2.0,
            method: InterpolationMethod::Linear,
        }
    }
}

/// Names accepted by [`MapParams::set`].
pub const PARAM_KEYS: [&str; 10] = [
    "scale",
    "dpi",
    "show_ids",
    "font_size",
    "nx",
    "ny",
    "base_level",
    "step",
    "extension",
    "method",
];

fn parse_number<T: FromStr>(name: &'static str, value: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| TopoError::invalid(name, value, e.to_string()))
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Ok(true),
        "0" | "no" | "false" | "off" => Ok(false),
        _ => Err(TopoError::invalid(name, value, "expected yes or no")),
    }
}

impl MapParams {
    /// Sets one parameter from its text form. The value is checked with the
    /// same rules as [`MapParams::validate`]; on error the parameters are
    /// left unchanged.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut next = self.clone();
        match key {
            "scale" => next.scale = parse_number("scale", value)?,
            "dpi" => next.dpi = parse_number("dpi", value)?,
            "show_ids" => next.show_ids = parse_bool("show_ids", value)?,
            "font_size" => next.font_size = parse_number("font size", value)?,
            "nx" => next.nx = parse_number("grid columns", value)?,
            "ny" => next.ny = parse_number("grid rows", value)?,
            "base_level" => next.base_level = parse_number("base level", value)?,
            "step" => next.step = parse_number("contour step", value)?,
            "extension" => next.extension = parse_number("border margin", value)?,
            "method" => next.method = value.parse()?,
            _ => {
                return Err(TopoError::invalid(
                    "parameter",
                    key,
                    format!("expected one of {}", PARAM_KEYS.join(", ")),
                ))
            }
        }
        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Checks the parameters needed to draw a map.
    pub fn validate_draw(&self) -> Result<()> {
        if !(self.font_size.is_finite() && self.font_size > 0.0) {
            return Err(TopoError::invalid(
                "font size",
                self.font_size,
                "must be a positive number",
            ));
        }
        if self.nx < 2 {
            return Err(TopoError::invalid("grid columns", self.nx, "must be at least 2"));
        }
        if self.ny < 2 {
            return Err(TopoError::invalid("grid rows", self.ny, "must be at least 2"));
        }
        if !self.base_level.is_finite() {
            return Err(TopoError::invalid(
                "base level",
                self.base_level,
                "must be a finite number",
            ));
        }
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(TopoError::invalid(
                "contour step",
                self.step,
                "must be greater than zero",
            ));
        }
        if !(self.extension.is_finite() && self.extension >= 0.0) {
            return Err(TopoError::invalid(
                "border margin",
                self.extension,
                "must be zero or positive",
            ));
        }
        Ok(())
    }

    /// Checks the parameters needed to save a map.
    pub fn validate_save(&self) -> Result<()> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(TopoError::invalid(
                "scale",
                self.scale,
                "must be a positive number",
            ));
        }
        if !RESOLUTION_PRESETS.contains(&self.dpi) {
            return Err(TopoError::invalid(
                "dpi",
                self.dpi,
                format!("expected one of {RESOLUTION_PRESETS:?}"),
            ));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.validate_draw()?;
        self.validate_save()
    }

    /// Text form of one parameter, as accepted by [`MapParams::set`].
    pub fn get(&self, key: &str) -> Option<String> {
        let v = match key {
            "scale" => self.scale.to_string(),
            "dpi" => self.dpi.to_string(),
            "show_ids" => (if self.show_ids { "yes" } else { "no" }).to_string(),
            "font_size" => self.font_size.to_string(),
            "nx" => self.nx.to_string(),
            "ny" => self.ny.to_string(),
            "base_level" => self.base_level.to_string(),
            "step" => self.step.to_string(),
            "extension" => self.extension.to_string(),
            "method" => self.method.to_string(),
            _ => return None,
        };
        Some(v)
    }
}

/// Reads parameters stored as JSON. Missing fields take their defaults.
pub fn read_params_json(path: &Path) -> Result<MapParams> {
    let contents = crate::io::read_to_string(path)?;
    let params: MapParams = serde_json::from_str(&contents).map_err(|e| TopoError::Parse {
        line: e.line(),
        message: e.to_string(),
    })?;
    params.validate()?;
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let p = MapParams::default();
        p.validate().unwrap();
        assert_eq!(p.scale, 200.0);
        assert_eq!(p.dpi, 150);
        assert_eq!((p.nx, p.ny), (500, 500));
    }

    #[test]
    fn set_parses_text() {
        let mut p = MapParams::default();
        p.set("scale", "500").unwrap();
        p.set("show_ids", "yes").unwrap();
        p.set("method", "nearest").unwrap();
        p.set("step", " 2.5 ").unwrap();
        assert_eq!(p.scale, 500.0);
        assert!(p.show_ids);
        assert_eq!(p.method, InterpolationMethod::Nearest);
        assert_eq!(p.step, 2.5);
        assert_eq!(p.get("step").as_deref(), Some("2.5"));
    }

    #[test]
    fn set_rejects_bad_values_without_change() {
        let mut p = MapParams::default();
        assert!(p.set("scale", "abc").is_err());
        assert!(p.set("scale", "-1").is_err());
        assert!(p.set("step", "0").is_err());
        assert!(p.set("dpi", "200").is_err());
        assert!(p.set("nx", "1").is_err());
        assert!(p.set("colour", "red").is_err());
        assert_eq!(p, MapParams::default());
    }

    #[test]
    fn json_fills_missing_fields() {
        let json = r#"{"scale": 1000, "method": "nearest"}"#;
        let p: MapParams = serde_json::from_str(json).unwrap();
        assert_eq!(p.scale, 1000.0);
        assert_eq!(p.method, InterpolationMethod::Nearest);
        assert_eq!(p.dpi, 150);
    }
}
