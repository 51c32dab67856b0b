//! Per-label centroids and areas, filtered to the accepted area range.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::markers::{BACKGROUND_LABEL, LabelImage, UNASSIGNED};

/// A labelled region reduced to its centroid and an equivalent-disc radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub area: usize,
}

#[derive(Default)]
struct Accumulator {
    x_sum: f64,
    y_sum: f64,
    count: usize,
}

/// Accumulates centroid and area for every region label and keeps those with
/// `min_area <= area <= max_area`.
///
/// Unassigned pixels and the background label are skipped. Keys are the marker
/// labels, so they need not be contiguous.
pub fn collect_regions(labels: &LabelImage, min_area: usize, max_area: usize) -> BTreeMap<u32, Region> {
    let mut sums: BTreeMap<u32, Accumulator> = BTreeMap::new();
    for (x, y, pixel) in labels.enumerate_pixels() {
        let label = pixel.0[0];
        if label == UNASSIGNED || label == BACKGROUND_LABEL {
            continue;
        }
        let acc = sums.entry(label).or_default();
        acc.x_sum += x as f64;
        acc.y_sum += y as f64;
        acc.count += 1;
    }

    sums.into_iter()
        .filter(|(_, acc)| acc.count >= min_area && acc.count <= max_area)
        .map(|(label, acc)| {
            let area = acc.count as f64;
            (
                label,
                Region {
                    x: acc.x_sum / area,
                    y: acc.y_sum / area,
                    radius: (area / PI).sqrt(),
                    area: acc.count,
                },
            )
        })
        .collect()
}
