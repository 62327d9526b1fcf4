//! Grayscale conversion and inverse binary thresholding.
//!
//! Source material is treated as dark ink on light paper: every pixel
//! whose luminance is strictly below the threshold becomes ink
//! ([`BinaryMask::INK`]), everything else becomes paper.

use image::Luma;

use crate::source::ensure_nonzero;
use crate::types::{BinaryMask, GrayImage, PipelineError, RgbaImage, Threshold};

/// Fixed-point ITU-R BT.601 luma weights, scaled by `2^14`.
///
/// The weights sum to exactly `2^14`, so white stays 255 and the
/// conversion is reproducible bit-for-bit across platforms.
const LUMA_R: u32 = 4899;
const LUMA_G: u32 = 9617;
const LUMA_B: u32 = 1868;
const LUMA_SHIFT: u32 = 14;
const LUMA_ROUND: u32 = 1 << (LUMA_SHIFT - 1);

/// Luminance of a single RGB sample.
#[must_use]
#[allow(clippy::cast_lossless)]
pub const fn luma(r: u8, g: u8, b: u8) -> u8 {
    let weighted = LUMA_R * r as u32 + LUMA_G * g as u32 + LUMA_B * b as u32 + LUMA_ROUND;
    #[expect(clippy::cast_possible_truncation)]
    let value = (weighted >> LUMA_SHIFT) as u8;
    value
}

/// Convert an RGBA image to single-channel luminance. Alpha is ignored.
#[must_use = "returns the grayscale image"]
pub fn luminance(image: &RgbaImage) -> GrayImage {
    let mut gray = GrayImage::new(image.width(), image.height());
    for (dst, src) in gray.pixels_mut().zip(image.pixels()) {
        let [r, g, b, _] = src.0;
        *dst = Luma([luma(r, g, b)]);
    }
    gray
}

/// Inverse-threshold a luminance image into a binary ink mask.
///
/// A threshold of zero yields an all-paper mask; 255 marks every pixel
/// darker than pure white as ink.
#[must_use = "returns the ink mask"]
pub fn threshold_luminance(gray: &GrayImage, threshold: Threshold) -> BinaryMask {
    let cutoff = threshold.get();
    let mut mask = GrayImage::new(gray.width(), gray.height());
    for (dst, src) in mask.pixels_mut().zip(gray.pixels()) {
        *dst = Luma([if src.0[0] < cutoff {
            BinaryMask::INK
        } else {
            BinaryMask::PAPER
        }]);
    }
    BinaryMask::from_binary(mask)
}

/// Convert an image to an ink mask: luminance, then inverse threshold.
///
/// # Errors
///
/// Returns [`PipelineError::ZeroDimensions`] if the image has zero width
/// or height.
pub fn transform(image: &RgbaImage, threshold: Threshold) -> Result<BinaryMask, PipelineError> {
    ensure_nonzero(image)?;
    Ok(threshold_luminance(&luminance(image), threshold))
}
