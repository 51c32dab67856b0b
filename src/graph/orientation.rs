//! Orientation sweep and grid calibration.

use serde::{Deserialize, Serialize};

use super::{Edge, prune_at_angle};
use crate::geometry::{Point, median};
use crate::params::GAMMA_FRACTION;

/// Best orientation found by [`search_orientation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrientationResult {
    pub edges: Vec<Edge>,
    pub score: f64,
    pub angle: f64,
}

/// Mean vertex count of the connected chains formed by `edges`.
///
/// Self-loops count as one-vertex chains. Returns 0 when there are no edges.
pub fn chain_score(edges: &[Edge]) -> f64 {
    let Some(max_index) = edges.iter().map(|e| e.start.max(e.end)).max() else {
        return 0.0;
    };
    let mut parent: Vec<usize> = (0..=max_index).collect();
    let mut used = vec![false; max_index + 1];

    fn root(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for e in edges {
        used[e.start] = true;
        used[e.end] = true;
        let a = root(&mut parent, e.start);
        let b = root(&mut parent, e.end);
        if a != b {
            parent[a.max(b)] = a.min(b);
        }
    }

    let mut sizes = vec![0usize; max_index + 1];
    for i in (0..=max_index).filter(|&i| used[i]) {
        let r = root(&mut parent, i);
        sizes[r] += 1;
    }
    let chains: Vec<usize> = sizes.into_iter().filter(|&s| s > 0).collect();
    chains.iter().sum::<usize>() as f64 / chains.len() as f64
}

/// Candidate angles `min, min + step, ...` up to and including `max`.
fn candidate_angles(min: f64, max: f64, step: f64) -> Vec<f64> {
    if step.is_nan() || step <= 0.0 || !min.is_finite() || !max.is_finite() {
        log::warn!("angle sweep step {step} unusable, evaluating {min} only");
        return vec![min];
    }
    let count = ((max - min) / step).floor();
    if count < 0.0 {
        return vec![min];
    }
    (0..=count as usize).map(|k| min + k as f64 * step).collect()
}

/// Sweeps candidate orientations and returns the one whose pruned graph has the
/// longest chains on average. Ties keep the lowest angle.
pub fn search_orientation(
    points: &[Point],
    length_filtered: &[Edge],
    min_angle: f64,
    max_angle: f64,
    step: f64,
    angle_threshold: f64,
) -> OrientationResult {
    let mut best: Option<OrientationResult> = None;

    for angle in candidate_angles(min_angle, max_angle, step) {
        let edges = prune_at_angle(length_filtered, points, angle_threshold, angle);
        let score = chain_score(&edges);
        log::trace!("orientation {angle:.1}: score {score:.3}");
        if best.as_ref().is_none_or(|b| score > b.score) {
            best = Some(OrientationResult { edges, score, angle });
        }
    }

    let best = best.unwrap_or(OrientationResult {
        edges: Vec::new(),
        score: 0.0,
        angle: min_angle,
    });
    log::debug!("best orientation {:.1} deg, score {:.3}", best.angle, best.score);
    best
}

/// Grid constants derived from the chosen orientation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calibration {
    pub origin_angle: f64,
    pub grid_width: f64,
    pub image_width: f64,
    pub gamma: f64,
}

/// Grid width is the median length of the best edge set's real edges; the
/// traveling target sits `multiplier` grid widths past the rightmost point.
/// Returns `None` when the edge set holds no real edge.
pub fn calibrate(points: &[Point], best: &OrientationResult, multiplier: f64) -> Option<Calibration> {
    let lengths: Vec<f64> = best
        .edges
        .iter()
        .filter(|e| !e.is_self_loop())
        .map(|e| e.length(points))
        .collect();
    let grid_width = median(&lengths)?;
    if grid_width <= 0.0 {
        return None;
    }
    let max_x = points.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);

    Some(Calibration {
        origin_angle: best.angle,
        grid_width,
        image_width: max_x + multiplier * grid_width,
        gamma: GAMMA_FRACTION * grid_width,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_averages_chain_sizes() {
        // chains {0,1,2}, {3,4} and the isolated 5
        let edges = [Edge::new(0, 1), Edge::new(1, 2), Edge::new(3, 4), Edge::self_loop(5)];
        assert!((chain_score(&edges) - 2.0).abs() < 1e-12);
        assert_eq!(chain_score(&[]), 0.0);
    }

    #[test]
    fn candidate_angles_include_the_maximum() {
        assert_eq!(candidate_angles(0.0, 20.0, 5.0), vec![0.0, 5.0, 10.0, 15.0, 20.0]);
        assert_eq!(candidate_angles(10.0, 12.0, 5.0), vec![10.0]);
        assert_eq!(candidate_angles(0.0, 10.0, 0.0), vec![0.0]);
    }

    #[test]
    fn calibration_uses_real_edges_only() {
        let points = [Point::new(0.0, 0.0), Point::new(90.0, 0.0), Point::new(200.0, 0.0), Point::new(0.0, 80.0)];
        let best = OrientationResult {
            edges: vec![Edge::new(0, 1), Edge::new(1, 2), Edge::self_loop(3)],
            score: 2.0,
            angle: 0.0,
        };
        let cal = calibrate(&points, &best, 1.5).expect("calibration");
        assert!((cal.grid_width - 100.0).abs() < 1e-12);
        assert!((cal.image_width - 350.0).abs() < 1e-12);
        assert!((cal.gamma - 90.0).abs() < 1e-12);
    }
}
