//! Noise suppression: morphological opening of the ink mask.
//!
//! Thresholding leaves isolated specks wherever paper grain or sensor
//! noise dips below the cutoff. An opening (erosion then dilation)
//! removes any ink region that cannot contain the structuring element
//! while leaving larger strokes in place.
//!
//! # Strategy pattern
//!
//! [`DenoiseKind`] selects the structuring element and implements
//! [`SpeckFilter`], the same trait/enum split used elsewhere in the
//! pipeline for pluggable steps.

use image::Luma;
use imageproc::distance_transform::Norm;
use imageproc::morphology::{Mask, grayscale_dilate, grayscale_erode};
use serde::{Deserialize, Serialize};

use crate::types::{BinaryMask, GrayImage};

/// Selects the structuring element used for the opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DenoiseKind {
    /// 2x2 square, one iteration, anchored at its bottom-right pixel.
    ///
    /// Removes single pixels and one-pixel-wide hairlines.
    #[default]
    Block2x2,
    /// `(2r+1)x(2r+1)` square centered on the pixel, via
    /// [`imageproc::morphology::open`] with the Chebyshev norm.
    Square {
        /// Half-width of the square. Zero leaves the mask unchanged.
        radius: u8,
    },
}

/// Trait for noise suppression strategies.
///
/// Input and output are both binary ink masks of the same size. The
/// output never contains ink where the input had none.
pub trait SpeckFilter {
    /// Open the mask, removing ink regions smaller than the element.
    fn open(&self, mask: &BinaryMask) -> BinaryMask;
}

impl SpeckFilter for DenoiseKind {
    fn open(&self, mask: &BinaryMask) -> BinaryMask {
        match *self {
            Self::Block2x2 => open_block_2x2(mask),
            Self::Square { radius } => open_square(mask, radius),
        }
    }
}

/// Remove small noise specks with the default 2x2 opening.
#[must_use = "returns the cleaned mask"]
pub fn suppress(mask: &BinaryMask) -> BinaryMask {
    DenoiseKind::Block2x2.open(mask)
}

/// Opening with a 2x2 element.
///
/// `imageproc::morphology::open` only offers odd, centered squares, so
/// the even element is built as a [`Mask`] with a different anchor per
/// pass. Erosion keeps a pixel only if the 2x2 block ending at it (up
/// and left) is all ink; dilation then paints every 2x2 block whose
/// top-left corner survived. Mask samples outside the image are skipped,
/// so strokes touching the border are not eaten away.
fn open_block_2x2(mask: &BinaryMask) -> BinaryMask {
    let src = mask.as_image();
    if src.width() == 0 || src.height() == 0 {
        return mask.clone();
    }
    let block = GrayImage::from_pixel(2, 2, Luma([BinaryMask::INK]));
    let up_left = Mask::from_image(&block, 1, 1);
    let down_right = Mask::from_image(&block, 0, 0);
    let eroded = grayscale_erode(src, &up_left);
    BinaryMask::from_binary(grayscale_dilate(&eroded, &down_right))
}

/// Opening with a centered odd square via `imageproc`.
fn open_square(mask: &BinaryMask, radius: u8) -> BinaryMask {
    if radius == 0 {
        return mask.clone();
    }
    BinaryMask::from_binary(imageproc::morphology::open(
        mask.as_image(),
        Norm::LInf,
        radius,
    ))
}
