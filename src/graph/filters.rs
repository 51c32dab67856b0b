//! The four-stage edge filter: length, angle, mutual nearest neighbour, and
//! isolated points.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{Edge, delaunay_edges};
use crate::geometry::{Point, angle_difference, median, median_absolute_deviation};

/// Relative slack on the length cut so that equal-length edges on a rotated grid
/// are not split by rounding noise.
const LENGTH_TOLERANCE: f64 = 1e-6;

/// Keeps edges no longer than `median + multiplier * MAD` and turns each one to
/// point right.
///
/// Only the upper bound is applied. Short edges are legitimate on dense arrays.
pub fn filter_by_length(edges: &[Edge], points: &[Point], multiplier: f64) -> Vec<Edge> {
    let lengths: Vec<f64> = edges.iter().map(|e| e.length(points)).collect();
    let Some(center) = median(&lengths) else {
        return Vec::new();
    };
    let mad = median_absolute_deviation(&lengths, center).unwrap_or(0.0);
    let upper = center + multiplier * mad + center.abs() * LENGTH_TOLERANCE;

    edges
        .iter()
        .zip(&lengths)
        .filter(|&(_, &len)| len <= upper)
        .map(|(e, _)| e.pointing_right(points))
        .collect()
}

/// Keeps edges whose direction lies within `threshold` degrees of `origin`,
/// comparing on the circle so that 359 and 1 are 2 degrees apart.
pub fn filter_by_angle(edges: &[Edge], points: &[Point], threshold: f64, origin: f64) -> Vec<Edge> {
    edges
        .iter()
        .copied()
        .filter(|e| angle_difference(origin, e.angle(points)).abs() <= threshold)
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct Neighbour {
    index: usize,
    distance: f64,
}

fn closer(current: Option<Neighbour>, candidate: Neighbour) -> Option<Neighbour> {
    match current {
        Some(best) if best.distance <= candidate.distance => Some(best),
        _ => Some(candidate),
    }
}

/// Keeps each point's single closest left and right neighbour, and only the
/// edges both of whose endpoints chose each other. Output edges point right and
/// are sorted.
pub fn limit_connections(edges: &[Edge], points: &[Point]) -> Vec<Edge> {
    let mut left: Vec<Option<Neighbour>> = vec![None; points.len()];
    let mut right: Vec<Option<Neighbour>> = vec![None; points.len()];

    for e in edges.iter().filter(|e| !e.is_self_loop()) {
        let distance = e.length(points);
        for (from, to) in [(e.start, e.end), (e.end, e.start)] {
            let n = Neighbour { index: to, distance };
            if points[to].x < points[from].x {
                left[from] = closer(left[from], n);
            } else if points[to].x > points[from].x {
                right[from] = closer(right[from], n);
            }
        }
    }

    let mut kept = BTreeSet::new();
    for (a, choice) in right.iter().enumerate() {
        let Some(b) = choice.map(|n| n.index) else {
            continue;
        };
        if left[b].map(|n| n.index) == Some(a) {
            kept.insert(Edge::new(a, b));
        }
    }
    kept.into_iter().collect()
}

/// Sorts `edges` and appends a self-loop for every point no edge touches.
pub fn add_isolated_points(edges: &[Edge], point_count: usize) -> Vec<Edge> {
    let mut touched = vec![false; point_count];
    for e in edges {
        touched[e.start] = true;
        touched[e.end] = true;
    }
    let mut out: Vec<Edge> = edges.to_vec();
    out.sort_unstable();
    out.extend(
        touched
            .iter()
            .enumerate()
            .filter(|&(_, &t)| !t)
            .map(|(i, _)| Edge::self_loop(i)),
    );
    out
}

/// Angle filter, mutual pruning and isolated-point handling at one candidate
/// orientation.
pub fn prune_at_angle(length_filtered: &[Edge], points: &[Point], threshold: f64, angle: f64) -> Vec<Edge> {
    let by_angle = filter_by_angle(length_filtered, points, threshold, angle);
    let mutual = limit_connections(&by_angle, points);
    add_isolated_points(&mutual, points.len())
}

/// Every stage of the graph build, kept for inspection and plotting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProximityGraph {
    pub triangulation: Vec<Edge>,
    pub length_filtered: Vec<Edge>,
    pub angle_filtered: Vec<Edge>,
    pub mutual: Vec<Edge>,
    /// Final edges: mutual edges followed by self-loops for isolated points.
    pub edges: Vec<Edge>,
}

impl ProximityGraph {
    pub fn real_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(|e| !e.is_self_loop())
    }
}

/// Builds the filtered proximity graph of `points` at orientation `origin_angle`.
///
/// `points` are expected to be normalised so the minimum x and y are 0.
pub fn build_proximity_graph(
    points: &[Point],
    threshold_multiplier: f64,
    threshold_angle: f64,
    origin_angle: f64,
) -> ProximityGraph {
    let triangulation = delaunay_edges(points);
    let length_filtered = filter_by_length(&triangulation, points, threshold_multiplier);
    let angle_filtered = filter_by_angle(&length_filtered, points, threshold_angle, origin_angle);
    let mutual = limit_connections(&angle_filtered, points);
    let edges = add_isolated_points(&mutual, points.len());

    log::debug!(
        "graph at {origin_angle:.1} deg: {} delaunay, {} length, {} angle, {} mutual, {} final",
        triangulation.len(),
        length_filtered.len(),
        angle_filtered.len(),
        mutual.len(),
        edges.len()
    );

    ProximityGraph {
        triangulation,
        length_filtered,
        angle_filtered,
        mutual,
        edges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(coords: &[(f64, f64)]) -> Vec<Point> {
        coords.iter().copied().map(Point::from).collect()
    }

    #[test]
    fn length_filter_drops_long_outlier_and_points_right() {
        let p = pts(&[(100.0, 0.0), (0.0, 0.0), (200.0, 0.0), (0.0, 100.0), (500.0, 400.0)]);
        let edges = [Edge::new(0, 1), Edge::new(0, 2), Edge::new(1, 3), Edge::new(2, 4)];
        let kept = filter_by_length(&edges, &p, 1.5);
        assert_eq!(kept, vec![Edge::new(1, 0), Edge::new(0, 2), Edge::new(1, 3)]);
    }

    #[test]
    fn angle_filter_wraps_around_zero() {
        let p = pts(&[(0.0, 0.0), (100.0, -3.0), (100.0, 3.0), (50.0, 50.0)]);
        let edges = [Edge::new(0, 1), Edge::new(0, 2), Edge::new(0, 3)];
        let kept = filter_by_angle(&edges, &p, 5.0, 358.0);
        assert_eq!(kept, vec![Edge::new(0, 1), Edge::new(0, 2)]);
    }

    #[test]
    fn mutual_pruning_keeps_closest_pairs_only() {
        // d sits between b and c, so the long b-c link loses on both sides.
        let p = pts(&[(0.0, 0.0), (10.0, 0.0), (25.0, 0.0), (13.0, 1.0)]);
        let edges = [Edge::new(0, 1), Edge::new(1, 2), Edge::new(0, 3), Edge::new(3, 2), Edge::new(1, 3)];
        let kept = limit_connections(&edges, &p);
        assert_eq!(kept, vec![Edge::new(0, 1), Edge::new(1, 3), Edge::new(3, 2)]);
    }

    #[test]
    fn isolated_points_get_self_loops_after_real_edges() {
        let edges = [Edge::new(3, 1), Edge::new(0, 1)];
        let out = add_isolated_points(&edges, 5);
        assert_eq!(
            out,
            vec![Edge::new(0, 1), Edge::new(3, 1), Edge::self_loop(2), Edge::self_loop(4)]
        );
    }
}
