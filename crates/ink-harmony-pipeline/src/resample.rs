//! Resampling: realtime downscale, background drawing, mask upscale.
//!
//! Realtime previews threshold a reduced copy of the source so the
//! longest axis matches `realtime_max_dimension`. The resulting mask is
//! brought back to native resolution with nearest-neighbor sampling so
//! stroke edges stay hard. Backgrounds (the original image or a texture)
//! are drawn at output size with a smoothing filter.

use std::fmt;

use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};

use crate::types::{BinaryMask, Dimensions, RgbaImage};

/// Resampling filter used for downscaling and background drawing.
///
/// Ordered from fastest/lowest-quality to slowest/highest-quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResampleFilter {
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation: fast, decent quality. Closest to a
    /// browser canvas `drawImage`.
    #[default]
    Triangle,
    /// Bicubic (Catmull-Rom): moderate speed, good quality.
    CatmullRom,
    /// Gaussian: moderate speed, smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: slowest, sharpest.
    Lanczos3,
}

impl ResampleFilter {
    /// Convert to the `image` crate's `FilterType`.
    const fn to_image_filter(self) -> FilterType {
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Triangle => FilterType::Triangle,
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Gaussian => FilterType::Gaussian,
            Self::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl fmt::Display for ResampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => f.write_str("Nearest"),
            Self::Triangle => f.write_str("Triangle"),
            Self::CatmullRom => f.write_str("CatmullRom"),
            Self::Gaussian => f.write_str("Gaussian"),
            Self::Lanczos3 => f.write_str("Lanczos3"),
        }
    }
}

/// Downsample an image so the longest axis is at most `max_dimension`
/// pixels, preserving aspect ratio.
///
/// Returns the (possibly unchanged) image and whether downsampling was
/// actually applied. A `max_dimension` of zero is treated as "no limit".
#[must_use]
pub fn downsample(
    image: &RgbaImage,
    max_dimension: u32,
    filter: ResampleFilter,
) -> (RgbaImage, bool) {
    let dims = Dimensions::of(image);
    let long_axis = dims.long_side();

    if max_dimension == 0 || long_axis <= max_dimension {
        return (image.clone(), false);
    }

    let target = Dimensions::new(
        scale_axis(dims.width, max_dimension, long_axis),
        scale_axis(dims.height, max_dimension, long_axis),
    );
    let resized = imageops::resize(image, target.width, target.height, filter.to_image_filter());
    (resized, true)
}

/// `value * numerator / denominator`, rounded, never below one pixel.
fn scale_axis(value: u32, numerator: u32, denominator: u32) -> u32 {
    let scaled = (u64::from(value) * u64::from(numerator) + u64::from(denominator) / 2)
        / u64::from(denominator);
    u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
}

/// Draw `image` at exactly `target` size.
///
/// Returns an unmodified copy when the size already matches, so a
/// same-size draw is byte-identical to the input.
#[must_use]
pub fn resize_to(image: &RgbaImage, target: Dimensions, filter: ResampleFilter) -> RgbaImage {
    if Dimensions::of(image) == target {
        return image.clone();
    }
    imageops::resize(image, target.width, target.height, filter.to_image_filter())
}

/// Nearest-neighbor upscale of a mask to `target` size.
///
/// Nearest sampling only ever copies existing samples, so the result is
/// still binary.
#[must_use]
pub fn upscale_mask(mask: &BinaryMask, target: Dimensions) -> BinaryMask {
    if mask.dimensions() == target {
        return mask.clone();
    }
    let resized = imageops::resize(
        mask.as_image(),
        target.width,
        target.height,
        FilterType::Nearest,
    );
    BinaryMask::from_binary(resized)
}
