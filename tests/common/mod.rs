#![allow(dead_code)]

use tma_dearray::Core;
use tma_dearray::geometry::Point;

/// `cols` x `rows` grid at `spacing`, rotated by `angle` degrees about the first
/// core and shifted by `origin`. Row-major order.
pub fn grid(cols: usize, rows: usize, spacing: f64, angle: f64, origin: (f64, f64)) -> Vec<Core> {
    let mut cores = Vec::new();
    for r in 0..rows {
        for c in 0..cols {
            let p = Point::new(c as f64 * spacing, r as f64 * spacing).rotated(angle);
            cores.push(Core::new(p.x + origin.0, p.y + origin.1, 20.0));
        }
    }
    cores
}

/// Grid with a small deterministic wobble on every centre.
pub fn jittered_grid(cols: usize, rows: usize, spacing: f64) -> Vec<Core> {
    let mut cores = grid(cols, rows, spacing, 0.0, (40.0, 60.0));
    for (k, core) in cores.iter_mut().enumerate() {
        let t = k as f64;
        core.x += 4.0 * (t * 1.3).sin();
        core.y += 3.0 * (t * 0.7).cos();
    }
    cores
}

pub fn points(cores: &[Core]) -> Vec<Point> {
    let min_x = cores.iter().map(|c| c.x).fold(f64::INFINITY, f64::min);
    let min_y = cores.iter().map(|c| c.y).fold(f64::INFINITY, f64::min);
    cores.iter().map(|c| Point::new(c.x - min_x, c.y - min_y)).collect()
}
