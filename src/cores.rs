//! Core records and the JSON form they are exchanged in.
//!
//! The on-disk shape is a plain array of `{x, y, row, col, isImaginary,
//! annotations?}` objects, the same file the browser tool saves as
//! `updated_cores.json`. Fields other than `x`/`y` are optional on input.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// Errors raised while reading or writing core lists.
#[derive(Debug, thiserror::Error)]
pub enum CoreIoError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A detected (or synthesised) tissue core.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Core {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub radius: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub col: Option<usize>,
    #[serde(default)]
    pub is_imaginary: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub annotations: String,
}

impl Core {
    pub fn new(x: f64, y: f64, radius: f64) -> Self {
        Self {
            x,
            y,
            radius,
            ..Default::default()
        }
    }

    pub fn imaginary(x: f64, y: f64, radius: f64) -> Self {
        Self {
            is_imaginary: true,
            ..Self::new(x, y, radius)
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Offsets removed from raw coordinates before graph building.
///
/// The graph stages expect the minimum x and y of the point set to be 0; the
/// offsets are added back when the indexed cores are exported.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Normalization {
    pub min_x: f64,
    pub min_y: f64,
}

impl Normalization {
    pub fn from_cores(cores: &[Core]) -> Self {
        if cores.is_empty() {
            return Self::default();
        }
        let min_x = cores.iter().map(|c| c.x).fold(f64::INFINITY, f64::min);
        let min_y = cores.iter().map(|c| c.y).fold(f64::INFINITY, f64::min);
        Self { min_x, min_y }
    }

    pub fn apply(&self, cores: &[Core]) -> Vec<Point> {
        cores
            .iter()
            .map(|c| Point::new(c.x - self.min_x, c.y - self.min_y))
            .collect()
    }

    pub fn restore(&self, point: Point) -> Point {
        Point::new(point.x + self.min_x, point.y + self.min_y)
    }
}

pub fn cores_from_json_str(json: &str) -> Result<Vec<Core>, CoreIoError> {
    Ok(serde_json::from_str(json)?)
}

pub fn read_cores(path: &Path) -> Result<Vec<Core>, CoreIoError> {
    let text = fs::read_to_string(path)?;
    cores_from_json_str(&text)
}

pub fn cores_to_json_string(cores: &[Core]) -> Result<String, CoreIoError> {
    Ok(serde_json::to_string_pretty(cores)?)
}

pub fn write_cores(path: &Path, cores: &[Core]) -> Result<(), CoreIoError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, cores_to_json_string(cores)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_minimal_records() {
        let cores = cores_from_json_str(r#"[{"x": 10.5, "y": 3}, {"x": 1, "y": 2, "isImaginary": true}]"#)
            .expect("parse");
        assert_eq!(cores.len(), 2);
        assert_eq!(cores[0].row, None);
        assert!(!cores[0].is_imaginary);
        assert!(cores[1].is_imaginary);
    }

    #[test]
    fn export_uses_camel_case_and_skips_empty_annotations() {
        let mut core = Core::imaginary(1.0, 2.0, 3.0);
        core.row = Some(4);
        core.col = Some(0);
        let json = cores_to_json_string(&[core]).expect("serialize");
        assert!(json.contains("\"isImaginary\": true"));
        assert!(json.contains("\"row\": 4"));
        assert!(!json.contains("annotations"));
    }

    #[test]
    fn normalization_moves_minimum_to_origin() {
        let cores = vec![Core::new(50.0, 80.0, 1.0), Core::new(150.0, 20.0, 1.0)];
        let norm = Normalization::from_cores(&cores);
        let pts = norm.apply(&cores);
        assert_eq!(pts[0], Point::new(0.0, 60.0));
        assert_eq!(pts[1], Point::new(100.0, 0.0));
        assert_eq!(norm.restore(pts[1]), Point::new(150.0, 20.0));
    }
}
