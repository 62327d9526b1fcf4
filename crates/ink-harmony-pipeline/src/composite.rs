//! Compositing the ink mask over a background.

use crate::types::{BinaryMask, Dimensions, PipelineError, RgbaImage};

/// Paint every ink pixel of `mask` black on a copy of `background`.
///
/// Color channels of ink pixels become zero; alpha is left as it was.
/// Paper pixels pass through unchanged.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if the mask and
/// background sizes differ. Callers upscale the mask beforehand.
pub fn composite(mask: &BinaryMask, background: &RgbaImage) -> Result<RgbaImage, PipelineError> {
    let mut out = background.clone();
    composite_in_place(mask, &mut out)?;
    Ok(out)
}

/// In-place form of [`composite`].
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if the sizes differ; the
/// buffer is left untouched in that case.
pub fn composite_in_place(
    mask: &BinaryMask,
    background: &mut RgbaImage,
) -> Result<(), PipelineError> {
    let bg = Dimensions::of(background);
    if mask.dimensions() != bg {
        return Err(PipelineError::DimensionMismatch {
            mask: mask.dimensions(),
            background: bg,
        });
    }
    for (pixel, m) in background.pixels_mut().zip(mask.as_image().pixels()) {
        if m.0[0] == BinaryMask::INK {
            pixel.0[..3].fill(0);
        }
    }
    Ok(())
}
