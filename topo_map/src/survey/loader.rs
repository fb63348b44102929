//! Reader and writer for tab separated survey files.
//!
//! Each row holds `id`, `x`, `y` and a fourth field. A numeric fourth field
//! is the elevation of a survey point; any other text names the building the
//! row is a corner of. Spaces act as the quote character, so whitespace
//! padding around fields is ignored.

use std::io::Write;
use std::path::Path;

use log::{debug, info};

use super::{BuildingVertex, PointStore, SurveyPoint};
use crate::error::{Result, TopoError};
use crate::geometry::Point;

/// A classified input row.
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Point(SurveyPoint),
    BuildingVertex { tag: String, vertex: BuildingVertex },
}

fn split_fields(line: &str) -> Vec<&str> {
    line.split('\t').map(|f| f.trim_matches(' ')).collect()
}

fn parse_coordinate(name: &str, value: &str) -> std::result::Result<f64, String> {
    let v: f64 = value
        .parse()
        .map_err(|e| format!("{name} `{value}` is not a number ({e})"))?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(format!("{name} `{value}` is not finite"))
    }
}

/// Decides whether `fields` describe a survey point or a building vertex.
///
/// The fourth field is tried as a number exactly once; the outcome selects
/// the variant. `x` and `y` must be finite numbers in both cases.
pub fn classify_row(fields: &[&str]) -> std::result::Result<Row, String> {
    if fields.len() < 4 {
        return Err(format!(
            "expected 4 tab-separated fields, found {}",
            fields.len()
        ));
    }
    let id = fields[0].to_string();
    let x = parse_coordinate("x", fields[1])?;
    let y = parse_coordinate("y", fields[2])?;
    let tail = fields[3];
    if tail.is_empty() {
        return Err("missing elevation or building tag".to_string());
    }
    match tail.parse::<f64>() {
        Ok(z) if z.is_finite() => Ok(Row::Point(SurveyPoint::new(id, x, y, z))),
        Ok(_) => Err(format!("elevation `{tail}` is not finite")),
        Err(_) => Ok(Row::BuildingVertex {
            tag: tail.to_string(),
            vertex: BuildingVertex {
                id,
                point: Point::new(x, y),
            },
        }),
    }
}

/// Parses the contents of a survey file. Blank lines are skipped; any other
/// malformed row fails the whole parse.
pub fn parse_survey(contents: &str) -> Result<PointStore> {
    let mut store = PointStore::new();
    for (idx, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_fields(line);
        let row = classify_row(&fields).map_err(|message| TopoError::Parse {
            line: idx + 1,
            message,
        })?;
        match row {
            Row::Point(p) => {
                let id = p.id.clone();
                if !store.add_point(p) {
                    return Err(TopoError::Parse {
                        line: idx + 1,
                        message: format!("duplicate point id `{id}`"),
                    });
                }
            }
            Row::BuildingVertex { tag, vertex } => {
                debug!("line {}: vertex {} of building {tag}", idx + 1, vertex.id);
                store.add_building_vertex(&tag, vertex);
            }
        }
    }
    Ok(store)
}

/// Reads a survey file from disk.
pub fn read_survey_file(path: &Path) -> Result<PointStore> {
    let contents = crate::io::read_to_string(path)?;
    let store = parse_survey(&contents)?;
    info!(
        "loaded {} points and {} buildings from {}",
        store.len(),
        store.buildings().len(),
        path.display()
    );
    Ok(store)
}

/// Writes `store` in the format accepted by [`read_survey_file`]: survey
/// points first, then building vertices grouped by tag.
pub fn write_survey_file(path: &Path, store: &PointStore) -> Result<()> {
    crate::io::write_with(path, |w| {
        for p in store.points() {
            writeln!(w, "{}\t{}\t{}\t{}", p.id, p.point.x, p.point.y, p.point.z)?;
        }
        for group in store.buildings() {
            for v in &group.vertices {
                writeln!(w, "{}\t{}\t{}\t{}", v.id, v.point.x, v.point.y, group.name)?;
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_tail_is_point() {
        let row = classify_row(&["7", "1.5", "2.5", "101.25"]).unwrap();
        assert_eq!(row, Row::Point(SurveyPoint::new("7", 1.5, 2.5, 101.25)));
    }

    #[test]
    fn text_tail_is_building_vertex() {
        let row = classify_row(&["B1", "3", "4", "garage"]).unwrap();
        match row {
            Row::BuildingVertex { tag, vertex } => {
                assert_eq!(tag, "garage");
                assert_eq!(vertex.id, "B1");
                assert_eq!(vertex.point, Point::new(3.0, 4.0));
            }
            other => panic!("unexpected row {other:?}"),
        }
    }

    #[test]
    fn bad_coordinates_rejected() {
        assert!(classify_row(&["1", "abc", "2", "3"]).is_err());
        assert!(classify_row(&["1", "1", "inf", "3"]).is_err());
        assert!(classify_row(&["1", "1", "2"]).is_err());
        assert!(classify_row(&["1", "1", "2", ""]).is_err());
        assert!(classify_row(&["1", "1", "2", "NaN"]).is_err());
    }

    #[test]
    fn padded_fields_and_blank_lines() {
        let store = parse_survey(" 1 \t 10.0\t20.0 \t 5.5\n\n2\t11\t21\t6\r\n").unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.points()[0], SurveyPoint::new("1", 10.0, 20.0, 5.5));
        assert_eq!(store.points()[1].point.z, 6.0);
    }

    #[test]
    fn extra_fields_ignored() {
        let store = parse_survey("1\t0\t0\t3\tcomment\n").unwrap();
        assert_eq!(store.points()[0].point.z, 3.0);
    }

    #[test]
    fn error_reports_line_number() {
        let err = parse_survey("1\t0\t0\t1\n2\t0\tx\t1\n").unwrap_err();
        match err {
            TopoError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn duplicate_ids_rejected() {
        let err = parse_survey("1\t0\t0\t1\n1\t5\t5\t2\n").unwrap_err();
        assert!(err.to_string().contains("duplicate point id"));
    }
}
