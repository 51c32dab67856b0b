use std::collections::BTreeSet;

use spade::{DelaunayTriangulation, Point2, Triangulation};

use super::Edge;
use crate::geometry::Point;

/// Undirected Delaunay edges over `points`, each as `(min index, max index)`,
/// sorted and de-duplicated.
///
/// Coincident points collapse onto one triangulation vertex; the edges attach to
/// the first of them and the others stay unconnected.
pub fn delaunay_edges(points: &[Point]) -> Vec<Edge> {
    let mut triangulation = DelaunayTriangulation::<Point2<f64>>::new();
    // triangulation vertex index -> index into `points`
    let mut vertex_to_point: Vec<usize> = Vec::with_capacity(points.len());

    for (i, p) in points.iter().enumerate() {
        match triangulation.insert(Point2::new(p.x, p.y)) {
            Ok(handle) => {
                if handle.index() == vertex_to_point.len() {
                    vertex_to_point.push(i);
                }
            }
            Err(err) => log::warn!("skipping point {i} ({}, {}): {err:?}", p.x, p.y),
        }
    }

    let mut edges = BTreeSet::new();
    for edge in triangulation.undirected_edges() {
        let [a, b] = edge.vertices();
        let (Some(&i), Some(&j)) = (
            vertex_to_point.get(a.fix().index()),
            vertex_to_point.get(b.fix().index()),
        ) else {
            continue;
        };
        if i != j {
            edges.insert(Edge::new(i.min(j), i.max(j)));
        }
    }

    log::debug!("triangulation: {} points, {} edges", points.len(), edges.len());
    edges.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_has_five_edges() {
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 11.0),
        ];
        let edges = delaunay_edges(&pts);
        assert_eq!(edges.len(), 5);
        assert!(edges.iter().all(|e| e.start < e.end));
    }

    #[test]
    fn fewer_than_two_points_have_no_edges() {
        assert!(delaunay_edges(&[]).is_empty());
        assert!(delaunay_edges(&[Point::new(1.0, 1.0)]).is_empty());
    }

    #[test]
    fn duplicates_are_left_unconnected() {
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 0.0),
            Point::new(5.0, 8.0),
        ];
        let edges = delaunay_edges(&pts);
        assert!(edges.iter().all(|e| e.start != 2 && e.end != 2));
        assert_eq!(edges.len(), 3);
    }
}
