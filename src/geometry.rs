//! Small planar helpers shared by the graph, traveling and normalisation stages.

use serde::{Deserialize, Serialize};

/// A point in the plane. Coordinates are relative to whatever origin the caller
/// works in (raw image pixels, or grid-normalised with min-x/min-y removed).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Angle of the vector `self -> other` with the positive x axis, in degrees,
    /// as returned by `atan2` (range `(-180, 180]`).
    pub fn angle_to(self, other: Point) -> f64 {
        (other.y - self.y).atan2(other.x - self.x).to_degrees()
    }

    /// Rotates the point about the origin by `degrees` (counter-clockwise in a
    /// y-up frame).
    pub fn rotated(self, degrees: f64) -> Point {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Point {
            x: self.x * cos - self.y * sin,
            y: self.x * sin + self.y * cos,
        }
    }

    /// Moves `distance` along the direction given by `degrees`.
    pub fn step(self, degrees: f64, distance: f64) -> Point {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Point {
            x: self.x + distance * cos,
            y: self.y + distance * sin,
        }
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Wraps an angle in degrees into `[0, 360)`.
pub fn wrap_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Smallest signed difference `to - from`, in `[-180, 180)`.
pub fn angle_difference(from: f64, to: f64) -> f64 {
    let diff = wrap_degrees(to - from);
    if diff >= 180.0 { diff - 360.0 } else { diff }
}

/// Median with the usual even-length convention (mean of the two middle values).
/// Returns `None` for an empty slice. NaNs sort last.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) * 0.5)
    } else {
        Some(sorted[mid])
    }
}

/// Median absolute deviation of `values` around `center`.
pub fn median_absolute_deviation(values: &[f64], center: f64) -> Option<f64> {
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    median(&deviations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn mad_ignores_outliers() {
        let lengths = [100.0, 100.0, 101.0, 99.0, 400.0];
        let m = median(&lengths).unwrap();
        assert_eq!(m, 100.0);
        assert_eq!(median_absolute_deviation(&lengths, m), Some(1.0));
    }

    #[test]
    fn angle_wrapping() {
        assert_abs_diff_eq!(wrap_degrees(-90.0), 270.0);
        assert_abs_diff_eq!(wrap_degrees(720.0), 0.0);
        assert_abs_diff_eq!(angle_difference(350.0, 5.0), 15.0);
        assert_abs_diff_eq!(angle_difference(15.0, -75.0), -90.0);
        assert_abs_diff_eq!(angle_difference(0.0, 180.0), -180.0);
    }

    #[test]
    fn rotation_round_trips() {
        let p = Point::new(10.0, 5.0);
        let back = p.rotated(33.0).rotated(-33.0);
        assert_abs_diff_eq!(back.x, p.x, epsilon = 1e-9);
        assert_abs_diff_eq!(back.y, p.y, epsilon = 1e-9);
        assert_abs_diff_eq!(Point::new(0.0, 0.0).angle_to(Point::new(0.0, 1.0)), 90.0);
        let s = Point::new(1.0, 1.0).step(90.0, 2.0);
        assert_abs_diff_eq!(s.x, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s.y, 3.0, epsilon = 1e-12);
    }
}
