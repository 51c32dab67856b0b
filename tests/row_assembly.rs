mod common;

use std::collections::BTreeSet;

use approx::assert_abs_diff_eq;
use tma_dearray::graph::{Edge, delaunay_edges, filter_by_length, search_orientation};
use tma_dearray::travel::{TravelError, travel};
use tma_dearray::{Core, Hyperparameters, PipelineError, Session};

fn cell(cores: &[Core], row: usize, col: usize) -> &Core {
    cores
        .iter()
        .find(|c| c.row == Some(row) && c.col == Some(col))
        .unwrap_or_else(|| panic!("no core at ({row}, {col})"))
}

#[test]
fn perfect_grid_yields_three_full_rows() {
    let cores = common::grid(3, 3, 100.0, 0.0, (50.0, 80.0));
    let mut session = Session::new(cores.clone(), Hyperparameters::default());
    let indexed = session.run().expect("run").to_vec();

    let calibration = session.calibration().copied().expect("calibrated");
    assert_abs_diff_eq!(calibration.origin_angle, 0.0);
    assert_abs_diff_eq!(calibration.grid_width, 100.0, epsilon = 1e-9);
    assert_abs_diff_eq!(calibration.image_width, 350.0, epsilon = 1e-9);
    assert_abs_diff_eq!(calibration.gamma, 90.0, epsilon = 1e-9);

    assert_eq!(session.rows().len(), 3);
    assert!(session.rows().iter().all(|r| r.len() == 3));
    assert_eq!(indexed.len(), 9);
    assert!(indexed.iter().all(|c| !c.is_imaginary));

    for r in 0..3 {
        for c in 0..3 {
            let core = cell(&indexed, r, c);
            assert_abs_diff_eq!(core.x, 50.0 + 100.0 * c as f64, epsilon = 1e-9);
            assert_abs_diff_eq!(core.y, 80.0 + 100.0 * r as f64, epsilon = 1e-9);
        }
    }
}

#[test]
fn missing_centre_becomes_one_imaginary_point() {
    let mut cores = common::grid(3, 3, 100.0, 0.0, (0.0, 0.0));
    cores.remove(4);
    let mut session = Session::new(cores, Hyperparameters::default());
    let indexed = session.run().expect("run").to_vec();

    assert_eq!(indexed.len(), 9);
    let imaginary: Vec<&Core> = indexed.iter().filter(|c| c.is_imaginary).collect();
    assert_eq!(imaginary.len(), 1);
    assert_eq!((imaginary[0].row, imaginary[0].col), (Some(1), Some(1)));
    assert_abs_diff_eq!(imaginary[0].x, 100.0, epsilon = 1e-9);
    assert_abs_diff_eq!(imaginary[0].y, 100.0, epsilon = 1e-9);
    assert_eq!(imaginary[0].radius, 20.0);

    let left = cell(&indexed, 1, 0);
    let right = cell(&indexed, 1, 2);
    assert!(!left.is_imaginary && !right.is_imaginary);
    assert_abs_diff_eq!(left.x, 0.0);
    assert_abs_diff_eq!(right.x, 200.0);
}

#[test]
fn rotated_grid_orientation_is_found() {
    let cores = common::grid(3, 3, 100.0, 15.0, (300.0, 100.0));
    let points = common::points(&cores);
    let length_filtered = filter_by_length(&delaunay_edges(&points), &points, 1.5);
    assert_eq!(length_filtered.len(), 12);

    let best = search_orientation(&points, &length_filtered, 0.0, 360.0, 5.0, 5.0);
    assert!((best.angle - 15.0).abs() <= 5.0, "best angle {}", best.angle);
    assert_abs_diff_eq!(best.score, 3.0);
}

#[test]
fn rotated_grid_places_every_real_core() {
    let cores = common::grid(3, 3, 100.0, 15.0, (300.0, 100.0));
    let params = Hyperparameters::default().with_angle_threshold(5.0);
    let mut session = Session::new(cores, params);
    let indexed = session.run().expect("run").to_vec();

    assert_eq!(session.rows().len(), 3);
    let real: BTreeSet<(usize, usize)> = indexed
        .iter()
        .filter(|c| !c.is_imaginary)
        .map(|c| (c.row.unwrap_or(usize::MAX), c.col.unwrap_or(usize::MAX)))
        .collect();
    assert_eq!(real.len(), 9);
    for r in 0..3 {
        for c in 0..3 {
            assert!(real.contains(&(r, c)), "({r}, {c}) not real");
        }
    }
}

#[test]
fn rows_are_complete_after_alignment() {
    let mut cores = common::jittered_grid(7, 5, 80.0);
    // knock out a leading core, a trailing one and an interior one
    for idx in [28, 13, 7] {
        cores.remove(idx);
    }
    let mut session = Session::new(cores, Hyperparameters::default());
    let indexed = session.run().expect("run").to_vec();

    let columns = indexed.iter().filter_map(|c| c.col).max().expect("cols") + 1;
    let rows = indexed.iter().filter_map(|c| c.row).max().expect("rows") + 1;
    assert_eq!(indexed.len(), rows * columns);
    for r in 0..rows {
        let cols: BTreeSet<usize> = indexed
            .iter()
            .filter(|c| c.row == Some(r))
            .filter_map(|c| c.col)
            .collect();
        assert_eq!(cols, (0..columns).collect::<BTreeSet<_>>(), "row {r}");
    }
}

#[test]
fn runaway_walk_is_reported() {
    let cores = common::grid(3, 1, 100.0, 0.0, (0.0, 0.0));
    let params = Hyperparameters::default()
        .with_grid(1.0, 10_000.0, 0.5)
        .with_radius_multiplier(0.1);
    let mut session = Session::new(cores, params);
    match session.assemble() {
        Err(PipelineError::Travel(TravelError::ImaginaryRunExceeded { limit, .. })) => assert_eq!(limit, 50),
        other => panic!("expected run-length failure, got {other:?}"),
    }
}

#[test]
fn imaginary_runs_stay_within_the_limit() {
    let mut cores = common::grid(12, 1, 50.0, 0.0, (0.0, 0.0));
    cores.drain(1..11);
    let points = common::points(&cores);
    let edges = [Edge::self_loop(0), Edge::self_loop(1)];
    let params = Hyperparameters::default().with_grid(50.0, 625.0, 45.0);

    let rows = travel(&points, &edges, &params).expect("travel");
    assert_eq!(rows.len(), 1);
    let mut run = 0;
    let mut longest = 0;
    for p in &rows[0] {
        run = if p.is_imaginary { run + 1 } else { 0 };
        longest = longest.max(run);
    }
    assert_eq!(longest, 10);
    assert!(longest <= params.max_imaginary_run);
}

#[test]
fn empty_session_is_an_error() {
    let mut session = Session::new(Vec::new(), Hyperparameters::default());
    assert!(matches!(session.run(), Err(PipelineError::EmptyCores)));
}
