//! Marker construction and marker-controlled flooding over a binary mask.
//!
//! The stages mirror the classic distance-transform watershed recipe:
//!
//! 1. open the mask to drop speckle,
//! 2. dilate it to get the sure background,
//! 3. threshold the distance transform to get sure foreground,
//! 4. label sure-foreground components as markers (background = 1, unknown = 0),
//! 5. split markers that still hold more than one prominent distance peak,
//! 6. flood unassigned foreground pixels from the markers, highest distance first.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::distance_transform::{Norm, euclidean_squared_distance_transform};
use imageproc::morphology;
use imageproc::region_labelling::{Connectivity, connected_components};

use super::mask::FOREGROUND;

/// Per-pixel integer labels.
pub type LabelImage = ImageBuffer<Luma<u32>, Vec<u32>>;

/// Pixels not yet claimed by any marker.
pub const UNASSIGNED: u32 = 0;
/// Everything outside the sure-background dilation.
pub const BACKGROUND_LABEL: u32 = 1;

const OPEN_RADIUS: u8 = 2;
const SURE_BACKGROUND_RADIUS: u8 = 3;

/// Intermediate images kept for inspection and tests.
#[derive(Debug, Clone)]
pub struct MarkerStages {
    pub opened: GrayImage,
    pub sure_background: GrayImage,
    /// Euclidean distance of every opened-foreground pixel to the nearest
    /// background pixel, row-major.
    pub distance: Vec<f64>,
    pub max_distance: f64,
    pub sure_foreground: GrayImage,
    pub unknown: GrayImage,
    pub markers: LabelImage,
}

impl MarkerStages {
    /// Runs stages 1 to 4 on a binary mask. Returns `None` when the mask has no
    /// usable foreground (blank, or foreground everywhere).
    pub fn build(mask: &GrayImage, distance_multiplier: f64) -> Option<Self> {
        let (width, height) = mask.dimensions();
        if width == 0 || height == 0 {
            return None;
        }

        let opened = morphology::open(mask, Norm::LInf, OPEN_RADIUS);
        let sure_background = morphology::dilate(&opened, Norm::LInf, SURE_BACKGROUND_RADIUS);

        if opened.pixels().all(|p| p.0[0] != 0) {
            log::warn!("mask is foreground everywhere, nothing to separate");
            return None;
        }
        let distance = distance_to_background(&opened);
        let max_distance = distance.iter().copied().fold(0.0, f64::max);
        if max_distance <= 0.0 || !max_distance.is_finite() {
            return None;
        }

        let cutoff = distance_multiplier * max_distance;
        let sure_foreground = GrayImage::from_fn(width, height, |x, y| {
            let idx = (y * width + x) as usize;
            Luma([if distance[idx] > cutoff { FOREGROUND } else { 0 }])
        });
        let unknown = GrayImage::from_fn(width, height, |x, y| {
            let bg = sure_background.get_pixel(x, y).0[0] != 0;
            let fg = sure_foreground.get_pixel(x, y).0[0] != 0;
            Luma([if bg && !fg { FOREGROUND } else { 0 }])
        });

        let components = connected_components(&sure_foreground, Connectivity::Eight, Luma([0u8]));
        let markers = LabelImage::from_fn(width, height, |x, y| {
            if unknown.get_pixel(x, y).0[0] != 0 {
                Luma([UNASSIGNED])
            } else {
                Luma([components.get_pixel(x, y).0[0] + 1])
            }
        });

        log::debug!(
            "markers: max distance {max_distance:.2}, cutoff {cutoff:.2}, {} sure-foreground components",
            markers.pixels().map(|p| p.0[0]).max().unwrap_or(0).saturating_sub(1)
        );

        Some(Self {
            opened,
            sure_background,
            distance,
            max_distance,
            sure_foreground,
            unknown,
            markers,
        })
    }

    /// Stage 5: every sure-foreground component with two or more prominent
    /// distance peaks is cleared back to [`UNASSIGNED`], and each peak pixel gets
    /// a fresh label. Returns the pixels that were cleared.
    pub fn split_touching(&mut self, prominence: f64) -> Vec<usize> {
        let peaks = prominent_peaks(&self.sure_foreground, &self.distance, prominence);

        let mut next_label = self.markers.pixels().map(|p| p.0[0]).max().unwrap_or(0) + 1;
        let mut by_label: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for peak in peaks {
            let label = self.markers.as_raw()[peak];
            by_label.entry(label).or_default().push(peak);
        }

        let mut cleared = Vec::new();
        for (label, seeds) in by_label {
            if seeds.len() < 2 {
                continue;
            }
            log::debug!("splitting marker {label} into {} seeds", seeds.len());
            let labels: &mut [u32] = &mut self.markers;
            for (idx, value) in labels.iter_mut().enumerate() {
                if *value == label {
                    *value = UNASSIGNED;
                    cleared.push(idx);
                }
            }
            for seed in seeds {
                labels[seed] = next_label;
                next_label += 1;
            }
        }
        cleared.sort_unstable();
        cleared
    }

    /// Stage 6. With `watershed` set the flood covers every unassigned pixel of
    /// the opened foreground. Otherwise only `cleared` pixels are reassigned and
    /// the unknown band stays unlabelled.
    pub fn flood(&mut self, cleared: &[usize], watershed: bool) {
        let len = self.distance.len();
        let mut domain = vec![false; len];
        if watershed {
            for (idx, value) in self.markers.as_raw().iter().enumerate() {
                if *value == UNASSIGNED && self.opened.as_raw()[idx] != 0 {
                    domain[idx] = true;
                }
            }
        } else {
            for &idx in cleared {
                if self.markers.as_raw()[idx] == UNASSIGNED {
                    domain[idx] = true;
                }
            }
        }
        flood_from_markers(&mut self.markers, &self.distance, &domain);
    }
}

/// Splits, floods and returns the final label image for `mask`.
pub fn label_regions(
    mask: &GrayImage,
    distance_multiplier: f64,
    prominence: f64,
    watershed: bool,
) -> Option<LabelImage> {
    let mut stages = MarkerStages::build(mask, distance_multiplier)?;
    let cleared = stages.split_touching(prominence);
    stages.flood(&cleared, watershed);
    Some(stages.markers)
}

fn distance_to_background(opened: &GrayImage) -> Vec<f64> {
    let background = GrayImage::from_fn(opened.width(), opened.height(), |x, y| {
        Luma([if opened.get_pixel(x, y).0[0] == 0 { FOREGROUND } else { 0 }])
    });
    euclidean_squared_distance_transform(&background)
        .pixels()
        .map(|p| p.0[0].sqrt())
        .collect()
}

fn neighbours(idx: usize, width: usize, height: usize) -> impl Iterator<Item = usize> {
    let x = (idx % width) as isize;
    let y = (idx / width) as isize;
    (-1isize..=1)
        .flat_map(move |dy| (-1isize..=1).map(move |dx| (dx, dy)))
        .filter(|&(dx, dy)| dx != 0 || dy != 0)
        .filter_map(move |(dx, dy)| {
            let nx = x + dx;
            let ny = y + dy;
            if nx < 0 || ny < 0 || nx >= width as isize || ny >= height as isize {
                None
            } else {
                Some(ny as usize * width + nx as usize)
            }
        })
}

/// Finds distance-transform peaks inside `region` whose height above the saddle
/// connecting them to a taller peak is at least `prominence`. The tallest peak
/// of every connected piece is always included.
///
/// Pixels are swept from the highest distance down, merging 8-connected pieces
/// with a union-find; when two pieces meet, the one with the lower peak dies and
/// its persistence is the drop from that peak to the meeting level.
pub fn prominent_peaks(region: &GrayImage, distance: &[f64], prominence: f64) -> Vec<usize> {
    let width = region.width() as usize;
    let height = region.height() as usize;
    let raw = region.as_raw();

    let mut order: Vec<usize> = (0..raw.len()).filter(|&i| raw[i] != 0).collect();
    order.sort_by(|&a, &b| distance[b].total_cmp(&distance[a]).then(a.cmp(&b)));

    let mut rank = vec![usize::MAX; raw.len()];
    for (r, &idx) in order.iter().enumerate() {
        rank[idx] = r;
    }

    let mut parent = vec![usize::MAX; raw.len()];
    let mut peak = vec![usize::MAX; raw.len()];
    let mut found = Vec::new();

    for &p in &order {
        parent[p] = p;
        peak[p] = p;
        for q in neighbours(p, width, height) {
            if parent[q] == usize::MAX {
                continue;
            }
            let rp = find_root(&mut parent, p);
            let rq = find_root(&mut parent, q);
            if rp == rq {
                continue;
            }
            let (keep, absorb) = if rank[peak[rp]] < rank[peak[rq]] {
                (rp, rq)
            } else {
                (rq, rp)
            };
            let dying_peak = peak[absorb];
            if distance[dying_peak] - distance[p] >= prominence {
                found.push(dying_peak);
            }
            parent[absorb] = keep;
        }
    }

    for &p in &order {
        if parent[p] == p {
            found.push(peak[p]);
        }
    }
    found.sort_unstable();
    found
}

fn find_root(parent: &mut [usize], mut idx: usize) -> usize {
    let mut root = idx;
    while parent[root] != root {
        root = parent[root];
    }
    while parent[idx] != root {
        let next = parent[idx];
        parent[idx] = root;
        idx = next;
    }
    root
}

#[derive(Debug, Clone, Copy)]
struct FloodEntry {
    priority: f64,
    seq: u64,
    pixel: usize,
    label: u32,
}

impl PartialEq for FloodEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FloodEntry {}

impl PartialOrd for FloodEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloodEntry {
    // max-heap: deepest pixel first, then first-queued
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Grows labels >= 2 into `domain` pixels, always extending at the pixel with
/// the largest distance value among those queued.
fn flood_from_markers(markers: &mut LabelImage, distance: &[f64], domain: &[bool]) {
    let width = markers.width() as usize;
    let height = markers.height() as usize;
    let labels: &mut [u32] = markers;

    let mut heap = BinaryHeap::new();
    let mut seq = 0u64;
    let mut push = |heap: &mut BinaryHeap<FloodEntry>, pixel: usize, label: u32| {
        heap.push(FloodEntry {
            priority: distance[pixel],
            seq,
            pixel,
            label,
        });
        seq += 1;
    };

    for idx in 0..labels.len() {
        let label = labels[idx];
        if label <= BACKGROUND_LABEL {
            continue;
        }
        for n in neighbours(idx, width, height) {
            if domain[n] && labels[n] == UNASSIGNED {
                push(&mut heap, n, label);
            }
        }
    }

    while let Some(entry) = heap.pop() {
        if labels[entry.pixel] != UNASSIGNED {
            continue;
        }
        labels[entry.pixel] = entry.label;
        for n in neighbours(entry.pixel, width, height) {
            if domain[n] && labels[n] == UNASSIGNED {
                push(&mut heap, n, entry.label);
            }
        }
    }
}
