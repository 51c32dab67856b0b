//! Row assembly: walk the points-right edge set from left to right, one row at
//! a time, filling gaps with imaginary points.

use serde::{Deserialize, Serialize};

use crate::geometry::Point;
use crate::graph::Edge;
use crate::params::Hyperparameters;

#[derive(Debug, thiserror::Error)]
pub enum TravelError {
    #[error(
        "row {row}: more than {limit} consecutive imaginary points after ({x:.1}, {y:.1}); \
         check gridWidth, gamma, originAngle and radiusMultiplier"
    )]
    ImaginaryRunExceeded { row: usize, limit: usize, x: f64, y: f64 },
}

/// One entry of an assembled row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowPoint {
    pub point: Point,
    /// Index into the point list for real points.
    pub index: Option<usize>,
    pub is_imaginary: bool,
}

impl RowPoint {
    pub fn real(point: Point, index: usize) -> Self {
        Self {
            point,
            index: Some(index),
            is_imaginary: false,
        }
    }

    pub fn imaginary(point: Point) -> Self {
        Self {
            point,
            index: None,
            is_imaginary: true,
        }
    }
}

pub type Row = Vec<RowPoint>;

#[derive(Debug, Clone, Copy)]
struct Vector {
    start: Point,
    end: Point,
    start_index: usize,
    end_index: usize,
}

/// Where the walk currently stands. Either a real point (end of the last
/// consumed vector) or a synthesised one.
#[derive(Debug, Clone, Copy)]
struct Frontier(RowPoint);

impl Frontier {
    fn point(&self) -> Point {
        self.0.point
    }
}

struct Walker<'a> {
    vectors: Vec<Vector>,
    visited: Vec<bool>,
    params: &'a Hyperparameters,
}

impl Walker<'_> {
    fn seed(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, v) in self.vectors.iter().enumerate() {
            if self.visited[i] {
                continue;
            }
            if best.is_none_or(|b| v.start.x < self.vectors[b].start.x) {
                best = Some(i);
            }
        }
        best
    }

    fn exact_match(&self, at: Point) -> Option<usize> {
        (0..self.vectors.len())
            .find(|&i| !self.visited[i] && self.vectors[i].start.distance(at) < self.params.match_epsilon)
    }

    /// Unvisited vector starting within the search radius of `at` whose end is
    /// closest to `at`.
    fn nearby(&self, at: Point) -> Option<usize> {
        let radius = self.params.search_radius();
        let mut best: Option<(usize, f64)> = None;
        for (i, v) in self.vectors.iter().enumerate() {
            if self.visited[i] || v.start.distance(at) > radius {
                continue;
            }
            let d = v.end.distance(at);
            if best.is_none_or(|(_, bd)| d < bd) {
                best = Some((i, d));
            }
        }
        best.map(|(i, _)| i)
    }

    fn reached_edge(&self, at: Point) -> bool {
        (at.x - self.params.image_width).abs() < self.params.gamma
    }

    fn consume(&mut self, i: usize, row: &mut Row) -> Frontier {
        self.visited[i] = true;
        let v = self.vectors[i];
        row.push(RowPoint::real(v.start, v.start_index));
        Frontier(RowPoint::real(v.end, v.end_index))
    }

    fn walk_row(&mut self, seed: usize, row_number: usize) -> Result<Row, TravelError> {
        let mut row = Row::new();
        let mut frontier = self.consume(seed, &mut row);
        let mut imaginary_run = 0usize;

        loop {
            let at = frontier.point();
            if let Some(i) = self.exact_match(at) {
                frontier = self.consume(i, &mut row);
                imaginary_run = 0;
                continue;
            }
            if self.reached_edge(at) {
                if !frontier.0.is_imaginary {
                    row.push(frontier.0);
                }
                break;
            }
            if let Some(i) = self.nearby(at) {
                log::trace!("row {row_number}: jumping to vector {i} near ({:.1}, {:.1})", at.x, at.y);
                // a chain end is not the start of any vector, so keep it here
                if !frontier.0.is_imaginary {
                    row.push(frontier.0);
                }
                frontier = self.consume(i, &mut row);
                imaginary_run = 0;
                continue;
            }

            imaginary_run += 1;
            if imaginary_run > self.params.max_imaginary_run {
                return Err(TravelError::ImaginaryRunExceeded {
                    row: row_number,
                    limit: self.params.max_imaginary_run,
                    x: at.x,
                    y: at.y,
                });
            }
            row.push(frontier.0);
            let next = at.step(self.params.origin_angle, self.params.grid_width);
            log::trace!("row {row_number}: imaginary step to ({:.1}, {:.1})", next.x, next.y);
            frontier = Frontier(RowPoint::imaginary(next));
        }

        Ok(dedup_by_position(row))
    }
}

fn dedup_by_position(row: Row) -> Row {
    let mut out: Row = Vec::with_capacity(row.len());
    for entry in row {
        if !out.iter().any(|e| e.point == entry.point) {
            out.push(entry);
        }
    }
    out
}

/// Assembles rows from `edges` (points-right, self-loops for isolated points).
///
/// Each row starts at the unvisited vector with the smallest start x and is
/// extended until its frontier comes within `gamma` of `image_width`. Rows are
/// returned in the order they were walked.
pub fn travel(points: &[Point], edges: &[Edge], params: &Hyperparameters) -> Result<Vec<Row>, TravelError> {
    let vectors: Vec<Vector> = edges
        .iter()
        .map(|e| Vector {
            start: points[e.start],
            end: points[e.end],
            start_index: e.start,
            end_index: e.end,
        })
        .collect();
    let mut walker = Walker {
        visited: vec![false; vectors.len()],
        vectors,
        params,
    };

    let mut rows = Vec::new();
    while let Some(seed) = walker.seed() {
        let row = walker.walk_row(seed, rows.len())?;
        log::trace!(
            "row {}: {} points, {} imaginary",
            rows.len(),
            row.len(),
            row.iter().filter(|p| p.is_imaginary).count()
        );
        rows.push(row);
    }
    log::debug!("traveling assembled {} rows", rows.len());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(grid_width: f64, image_width: f64) -> Hyperparameters {
        Hyperparameters::default().with_grid(grid_width, image_width, 0.9 * grid_width)
    }

    #[test]
    fn straight_row_keeps_all_real_points() {
        let points = [Point::new(0.0, 0.0), Point::new(100.0, 0.0), Point::new(200.0, 0.0)];
        let edges = [Edge::new(0, 1), Edge::new(1, 2)];
        let rows = travel(&points, &edges, &params(100.0, 350.0)).expect("travel");
        assert_eq!(rows.len(), 1);
        let indices: Vec<_> = rows[0].iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![Some(0), Some(1), Some(2)]);
        assert!(rows[0].iter().all(|p| !p.is_imaginary));
    }

    #[test]
    fn gap_is_filled_with_one_imaginary_point() {
        let points = [Point::new(0.0, 0.0), Point::new(200.0, 0.0)];
        let edges = [Edge::self_loop(0), Edge::self_loop(1)];
        let rows = travel(&points, &edges, &params(100.0, 350.0)).expect("travel");
        assert_eq!(rows.len(), 1);
        let flags: Vec<_> = rows[0].iter().map(|p| p.is_imaginary).collect();
        assert_eq!(flags, vec![false, true, false]);
        assert_eq!(rows[0][1].point, Point::new(100.0, 0.0));
    }

    #[test]
    fn chain_end_survives_a_jump() {
        // 0 -> 1 ends at (100, 0); the walk jumps from there to the lone point 2
        let points = [Point::new(0.0, 0.0), Point::new(100.0, 0.0), Point::new(160.0, 30.0)];
        let edges = [Edge::new(0, 1), Edge::self_loop(2)];
        let rows = travel(&points, &edges, &params(100.0, 350.0)).expect("travel");
        assert_eq!(rows.len(), 1);
        let indices: Vec<_> = rows[0].iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![Some(0), Some(1), Some(2), None]);
        assert!(rows[0][3].is_imaginary);
        assert_eq!(rows[0][3].point, Point::new(260.0, 30.0));
    }

    #[test]
    fn jump_prefers_the_closest_end() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            // nearer start, farther end
            Point::new(130.0, 0.0),
            Point::new(230.0, 0.0),
            // farther start, nearer end
            Point::new(150.0, 20.0),
            Point::new(170.0, 20.0),
        ];
        let edges = [Edge::new(0, 1), Edge::new(2, 3), Edge::new(4, 5)];
        let rows = travel(&points, &edges, &params(100.0, 350.0)).expect("travel");
        assert_eq!(rows.len(), 1);
        let indices: Vec<_> = rows[0].iter().filter_map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 1, 4, 5, 2, 3]);
    }

    #[test]
    fn runaway_imaginary_walk_is_an_error() {
        let points = [Point::new(0.0, 0.0)];
        let edges = [Edge::self_loop(0)];
        let p = params(1.0, 1000.0).with_max_imaginary_run(50);
        match travel(&points, &edges, &p) {
            Err(TravelError::ImaginaryRunExceeded { row, limit, .. }) => {
                assert_eq!(row, 0);
                assert_eq!(limit, 50);
            }
            other => panic!("expected run-length error, got {other:?}"),
        }
    }
}
