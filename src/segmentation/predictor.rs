//! Boundary to the mask-prediction model.
//!
//! The model itself lives outside this crate. It receives a fixed-size RGB
//! tensor in `[0, 1]` and hands back a same-size probability map.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma};

use super::mask::FOREGROUND;

#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error("prediction backend failed: {0}")]
    Backend(String),

    #[error("probability map is {got_width}x{got_height}, expected {width}x{height}")]
    ShapeMismatch {
        width: u32,
        height: u32,
        got_width: u32,
        got_height: u32,
    },
}

/// Row-major HWC tensor, RGB scaled to `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl ModelInput {
    /// Stretches `image` to `size`x`size` and normalises it.
    pub fn from_image(image: &DynamicImage, size: u32) -> Self {
        let resized = image.resize_exact(size, size, FilterType::Triangle).to_rgb8();
        let data = resized
            .as_raw()
            .iter()
            .map(|&v| f32::from(v) / 255.0)
            .collect();
        Self {
            width: size,
            height: size,
            data,
        }
    }
}

/// Single-channel foreground probabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityMap {
    pub width: u32,
    pub height: u32,
    pub values: Vec<f32>,
}

impl ProbabilityMap {
    pub fn new(width: u32, height: u32, values: Vec<f32>) -> Result<Self, PredictError> {
        if values.len() != (width as usize) * (height as usize) {
            return Err(PredictError::Backend(format!(
                "{} probabilities for a {width}x{height} map",
                values.len()
            )));
        }
        Ok(Self {
            width,
            height,
            values,
        })
    }

    /// Interprets a grayscale image as probabilities (`value / 255`).
    pub fn from_gray(image: &GrayImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            values: image.as_raw().iter().map(|&v| f32::from(v) / 255.0).collect(),
        }
    }

    /// Binary mask of `p >= threshold`, after clamping to `[0, 1]`.
    pub fn to_mask(&self, threshold: f32) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            let p = self.values[(y * self.width + x) as usize].clamp(0.0, 1.0);
            Luma([if p >= threshold { FOREGROUND } else { 0 }])
        })
    }
}

/// Anything that turns a model input into a probability map.
pub trait MaskPredictor {
    fn predict(&mut self, input: &ModelInput) -> Result<ProbabilityMap, PredictError>;
}

/// Replays a mask computed ahead of time, resized to the requested input size.
#[derive(Debug, Clone)]
pub struct PrecomputedMask {
    mask: GrayImage,
}

impl PrecomputedMask {
    pub fn new(mask: GrayImage) -> Self {
        Self { mask }
    }
}

impl MaskPredictor for PrecomputedMask {
    fn predict(&mut self, input: &ModelInput) -> Result<ProbabilityMap, PredictError> {
        let resized = if self.mask.dimensions() == (input.width, input.height) {
            self.mask.clone()
        } else {
            image::imageops::resize(&self.mask, input.width, input.height, FilterType::Nearest)
        };
        Ok(ProbabilityMap::from_gray(&resized))
    }
}

/// Checks a predictor's output against the input it was given, size and
/// buffer length both.
pub(crate) fn check_shape(input: &ModelInput, map: &ProbabilityMap) -> Result<(), PredictError> {
    if (map.width, map.height) != (input.width, input.height) {
        return Err(PredictError::ShapeMismatch {
            width: input.width,
            height: input.height,
            got_width: map.width,
            got_height: map.height,
        });
    }
    let expected = (map.width as usize) * (map.height as usize);
    if map.values.len() != expected {
        return Err(PredictError::Backend(format!(
            "{} probabilities for a {}x{} map",
            map.values.len(),
            map.width,
            map.height
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn model_input_is_normalised() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 20, image::Rgb([255, 0, 51])));
        let input = ModelInput::from_image(&img, 8);
        assert_eq!(input.data.len(), 8 * 8 * 3);
        assert!((input.data[0] - 1.0).abs() < 1e-6);
        assert!(input.data[1].abs() < 1e-6);
        assert!((input.data[2] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn threshold_is_inclusive() {
        let map = ProbabilityMap::new(3, 1, vec![0.49, 0.5, 1.3]).expect("map");
        let mask = map.to_mask(0.5);
        assert_eq!(mask.as_raw(), &vec![0, 255, 255]);
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!(ProbabilityMap::new(2, 2, vec![0.0; 3]).is_err());
    }

    #[test]
    fn short_buffer_fails_the_shape_check() {
        let input = ModelInput {
            width: 4,
            height: 4,
            data: vec![0.0; 48],
        };
        let map = ProbabilityMap {
            width: 4,
            height: 4,
            values: vec![0.0; 10],
        };
        assert!(matches!(check_shape(&input, &map), Err(PredictError::Backend(_))));
    }
}
