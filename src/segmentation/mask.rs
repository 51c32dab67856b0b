//! Binarisation of mask images.

use image::{DynamicImage, GrayImage};
use kornia::{
    image::{Image, ImageSize, allocator::CpuAllocator},
    imgproc,
};

use super::SegmentationError;

type CpuImage<T, const C: usize> = Image<T, C, CpuAllocator>;

pub const FOREGROUND: u8 = 255;

/// Collapses `source` to grayscale and splits it with an Otsu threshold.
///
/// Pixels strictly above the threshold become [`FOREGROUND`], the rest 0. An
/// already binary 0/255 mask comes back unchanged.
pub fn binarize(source: &DynamicImage) -> Result<GrayImage, SegmentationError> {
    let rgb = source.to_rgb8();
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        return Ok(GrayImage::new(width, height));
    }

    let image = CpuImage::<u8, 3>::new(
        ImageSize {
            width: width as usize,
            height: height as usize,
        },
        rgb.into_raw(),
        CpuAllocator,
    )?;

    let mut gray = CpuImage::<u8, 1>::from_size_val(image.size(), 0u8, CpuAllocator)?;
    imgproc::color::gray_from_rgb_u8(&image, &mut gray)?;

    let threshold = otsu_threshold(gray.as_slice());
    let mut binary = CpuImage::<u8, 1>::from_size_val(gray.size(), 0u8, CpuAllocator)?;
    imgproc::threshold::threshold_binary(&gray, &mut binary, threshold, FOREGROUND)?;

    GrayImage::from_raw(width, height, binary.as_slice().to_vec())
        .ok_or(SegmentationError::Buffer { width, height })
}

/// Otsu's between-class variance maximiser over an 8-bit histogram.
///
/// The returned value belongs to the background class: [`binarize`] keeps only
/// pixels strictly above it, so a 0/255 mask splits at some value below 255.
pub fn otsu_threshold(pixels: &[u8]) -> u8 {
    let mut histogram = [0u64; 256];
    for &value in pixels {
        histogram[usize::from(value)] += 1;
    }
    let total = pixels.len() as f64;
    let grand_sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(level, &n)| level as f64 * n as f64)
        .sum();

    let (mut count_bg, mut sum_bg) = (0.0, 0.0);
    let mut best = (0u8, f64::MIN);
    for (level, &n) in histogram.iter().enumerate() {
        count_bg += n as f64;
        sum_bg += level as f64 * n as f64;
        let count_fg = total - count_bg;
        if count_bg == 0.0 || count_fg == 0.0 {
            continue;
        }
        let gap = sum_bg / count_bg - (grand_sum - sum_bg) / count_fg;
        let spread = count_bg * count_fg * gap * gap;
        if spread > best.1 {
            best = (level as u8, spread);
        }
    }
    best.0
}

pub fn foreground_count(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p.0[0] != 0).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn otsu_splits_bimodal_histogram() {
        let mut pixels = vec![20u8; 100];
        pixels.extend(std::iter::repeat_n(200u8, 100));
        let t = otsu_threshold(&pixels);
        assert!((20..200).contains(&t), "threshold {t}");
    }

    #[test]
    fn binary_mask_survives_binarisation() {
        let mut mask = GrayImage::new(8, 6);
        for y in 2..4 {
            for x in 3..6 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let out = binarize(&DynamicImage::ImageLuma8(mask.clone())).expect("binarize");
        assert_eq!(out, mask);
    }

    #[test]
    fn blank_mask_has_no_foreground() {
        let out = binarize(&DynamicImage::ImageLuma8(GrayImage::new(5, 5))).expect("binarize");
        assert_eq!(foreground_count(&out), 0);
    }
}
