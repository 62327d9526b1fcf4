//! JPEG encoding.

use image::ImageEncoder;
use image::codecs::jpeg::JpegEncoder;
use ink_harmony_pipeline::RgbaImage;

use crate::ExportError;

/// Quality used for downloads.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Encode an image as baseline JPEG.
///
/// JPEG has no alpha channel; alpha is dropped and the color channels
/// are written as they are.
///
/// # Errors
///
/// Returns [`ExportError::InvalidQuality`] if `quality` is not in
/// `1..=100`, [`ExportError::EmptyImage`] for a zero-sized image, and
/// [`ExportError::JpegEncode`] if the encoder fails.
pub fn encode_jpeg(image: &RgbaImage, quality: u8) -> Result<Vec<u8>, ExportError> {
    if !(1..=100).contains(&quality) {
        return Err(ExportError::InvalidQuality(quality));
    }
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(ExportError::EmptyImage { width, height });
    }

    let rgb: Vec<u8> = image
        .pixels()
        .flat_map(|p| [p.0[0], p.0[1], p.0[2]])
        .collect();

    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
    encoder.write_image(&rgb, width, height, image::ExtendedColorType::Rgb8)?;
    Ok(bytes)
}
