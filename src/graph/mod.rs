//! Proximity graph over core centroids and the orientation sweep that tunes it.

pub mod filters;
pub mod orientation;
pub mod triangulation;

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

pub use filters::{
    ProximityGraph, add_isolated_points, build_proximity_graph, filter_by_angle, filter_by_length,
    limit_connections, prune_at_angle,
};
pub use orientation::{Calibration, OrientationResult, calibrate, chain_score, search_orientation};
pub use triangulation::delaunay_edges;

/// Index pair into a point list. After the length filter `start` is always the
/// endpoint with the smaller x; `start == end` marks an isolated point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub start: usize,
    pub end: usize,
}

impl Edge {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub const fn self_loop(index: usize) -> Self {
        Self {
            start: index,
            end: index,
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.start == self.end
    }

    pub fn touches(&self, index: usize) -> bool {
        self.start == index || self.end == index
    }

    pub fn length(&self, points: &[Point]) -> f64 {
        points[self.start].distance(points[self.end])
    }

    pub fn angle(&self, points: &[Point]) -> f64 {
        points[self.start].angle_to(points[self.end])
    }

    /// Orders the endpoints so the one with the smaller x comes first.
    pub fn pointing_right(self, points: &[Point]) -> Self {
        if points[self.start].x > points[self.end].x {
            Self::new(self.end, self.start)
        } else {
            self
        }
    }
}
