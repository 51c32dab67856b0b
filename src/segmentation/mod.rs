//! Turning a predicted (or supplied) mask into core centroids.

pub mod markers;
pub mod mask;
pub mod predictor;
pub mod regions;

use std::collections::BTreeMap;

use image::{DynamicImage, GrayImage};
use kornia::image::ImageError;

use crate::cores::Core;
use crate::params::SegmentationConfig;

pub use markers::{LabelImage, MarkerStages, label_regions};
pub use predictor::{MaskPredictor, ModelInput, PrecomputedMask, PredictError, ProbabilityMap};
pub use regions::{Region, collect_regions};

/// Errors that can occur while segmenting a mask.
#[derive(Debug, thiserror::Error)]
pub enum SegmentationError {
    #[error("kornia image error: {0}")]
    Kornia(#[from] ImageError),

    #[error("could not wrap a {width}x{height} pixel buffer")]
    Buffer { width: u32, height: u32 },

    #[error(transparent)]
    Predict(#[from] PredictError),
}

/// Labels an already binary mask and returns the regions inside the area range.
/// A blank mask yields an empty map.
pub fn segment_mask(mask: &GrayImage, config: &SegmentationConfig) -> BTreeMap<u32, Region> {
    let Some(labels) = label_regions(
        mask,
        config.distance_transform_multiplier,
        config.peak_prominence,
        config.watershed,
    ) else {
        log::warn!("segmentation found no foreground");
        return BTreeMap::new();
    };
    let regions = collect_regions(&labels, config.min_area, config.max_area);
    log::debug!(
        "segmentation kept {} regions in [{}, {}]",
        regions.len(),
        config.min_area,
        config.max_area
    );
    regions
}

/// Binarises an arbitrary mask image (Otsu) and segments it.
pub fn segment_image(
    source: &DynamicImage,
    config: &SegmentationConfig,
) -> Result<BTreeMap<u32, Region>, SegmentationError> {
    let binary = mask::binarize(source)?;
    Ok(segment_mask(&binary, config))
}

/// Runs `predictor` on `image`, thresholds its output and returns the detected
/// cores in the coordinate frame of `image`.
pub fn detect_cores(
    image: &DynamicImage,
    predictor: &mut dyn MaskPredictor,
    config: &SegmentationConfig,
) -> Result<Vec<Core>, SegmentationError> {
    let input = ModelInput::from_image(image, config.input_size);
    let probabilities = predictor.predict(&input)?;
    predictor::check_shape(&input, &probabilities)?;

    let mask = probabilities.to_mask(config.mask_threshold);
    let regions = segment_mask(&mask, config);

    let sx = f64::from(image.width()) / f64::from(probabilities.width);
    let sy = f64::from(image.height()) / f64::from(probabilities.height);
    let radius_scale = (sx + sy) * 0.5;

    Ok(regions_to_cores(&regions, sx, sy, radius_scale))
}

/// Converts regions to cores, scaling coordinates by `sx`/`sy`.
pub fn regions_to_cores(regions: &BTreeMap<u32, Region>, sx: f64, sy: f64, radius_scale: f64) -> Vec<Core> {
    regions
        .values()
        .map(|r| Core::new(r.x * sx, r.y * sy, r.radius * radius_scale))
        .collect()
}
