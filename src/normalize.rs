//! Row ordering and column alignment.

use crate::cores::{Core, Normalization};
use crate::geometry::{Point, median};
use crate::travel::{Row, RowPoint};

/// Sorts rows top to bottom by the y of their first point once the grid
/// rotation is undone. Empty rows are dropped.
pub fn sort_rows(rows: Vec<Row>, origin_angle: f64) -> Vec<Row> {
    let mut keyed: Vec<(f64, Row)> = rows
        .into_iter()
        .filter_map(|row| {
            let first = row.first()?.point.rotated(-origin_angle);
            Some((first.y, row))
        })
        .collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
    keyed.into_iter().map(|(_, row)| row).collect()
}

/// Number of leading columns each row is missing relative to the others.
///
/// The rotated x of every row's first point is compared with the median of
/// them; `floor(offset / grid_width + threshold)` is that row's column shift,
/// and shifts are made relative to the leftmost row. A shift is capped at
/// `max_shift`; a non-finite one counts as 0.
pub fn leading_offsets(
    rows: &[Row],
    grid_width: f64,
    origin_angle: f64,
    threshold: f64,
    max_shift: usize,
) -> Vec<usize> {
    let starts: Vec<f64> = rows
        .iter()
        .map(|row| row.first().map_or(0.0, |p| p.point.rotated(-origin_angle).x))
        .collect();
    let Some(baseline) = median(&starts) else {
        return Vec::new();
    };
    if grid_width.is_nan() || grid_width <= 0.0 {
        return vec![0; rows.len()];
    }

    let shifts: Vec<f64> = starts
        .iter()
        .map(|x| {
            let shift = ((x - baseline) / grid_width + threshold).floor();
            if shift.is_finite() { shift } else { 0.0 }
        })
        .collect();
    let min_shift = shifts.iter().copied().fold(f64::INFINITY, f64::min);
    shifts
        .iter()
        .map(|s| {
            let lead = s - min_shift;
            if lead > max_shift as f64 {
                log::warn!("row needs {lead} leading columns, capping at {max_shift}");
                max_shift
            } else {
                lead as usize
            }
        })
        .collect()
}

fn synthesize(anchor: Point, columns: f64, grid_width: f64, origin_angle: f64) -> RowPoint {
    let rotated = anchor.rotated(-origin_angle);
    let shifted = Point::new(rotated.x + columns * grid_width, rotated.y);
    RowPoint::imaginary(shifted.rotated(origin_angle))
}

/// Pads every row with imaginary points so all rows share column 0 and have
/// the same length.
///
/// Leading points are placed `grid_width` apart to the left of each row's first
/// point, trailing points to the right of its last, both in the unrotated
/// frame. No row receives more than `max_shift` leading points.
pub fn align_columns(
    rows: Vec<Row>,
    grid_width: f64,
    origin_angle: f64,
    threshold: f64,
    max_shift: usize,
) -> Vec<Row> {
    let offsets = leading_offsets(&rows, grid_width, origin_angle, threshold, max_shift);

    let mut padded: Vec<Row> = rows
        .into_iter()
        .zip(offsets)
        .map(|(row, lead)| {
            let Some(first) = row.first().map(|p| p.point) else {
                return row;
            };
            let mut out: Row = (1..=lead)
                .rev()
                .map(|k| synthesize(first, -(k as f64), grid_width, origin_angle))
                .collect();
            out.extend(row);
            out
        })
        .collect();

    let columns = padded.iter().map(Vec::len).max().unwrap_or(0);
    for row in &mut padded {
        let Some(last) = row.last().map(|p| p.point) else {
            continue;
        };
        let missing = columns - row.len();
        row.extend((1..=missing).map(|k| synthesize(last, k as f64, grid_width, origin_angle)));
    }
    padded
}

/// Flattens aligned rows into row/col-indexed cores in the original image frame.
///
/// Real entries keep the source core's radius and annotations. Imaginary ones
/// get the median radius of the real cores.
pub fn index_cores(rows: &[Row], cores: &[Core], normalization: &Normalization) -> Vec<Core> {
    let radii: Vec<f64> = cores.iter().filter(|c| !c.is_imaginary).map(|c| c.radius).collect();
    let fill_radius = median(&radii).unwrap_or(0.0);

    let mut out = Vec::with_capacity(rows.iter().map(Vec::len).sum());
    for (r, row) in rows.iter().enumerate() {
        for (c, entry) in row.iter().enumerate() {
            let position = normalization.restore(entry.point);
            let mut core = match entry.index.and_then(|i| cores.get(i)) {
                Some(source) if !entry.is_imaginary => source.clone(),
                _ => Core::imaginary(position.x, position.y, fill_radius),
            };
            core.x = position.x;
            core.y = position.y;
            core.row = Some(r);
            core.col = Some(c);
            out.push(core);
        }
    }
    out
}
