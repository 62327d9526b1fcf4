//! Source image decoding and validation.
//!
//! Accepts raw upload bytes and produces the RGBA raster every later
//! step reads from. Only PNG and JPEG uploads are accepted; the format
//! is sniffed from the content, not from a file name.

use image::ImageFormat;

use crate::types::{PipelineError, RgbaImage};

/// Decode raw upload bytes into an RGBA image.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::UnsupportedFormat`] if the content is not
/// recognizably PNG or JPEG.
/// Returns [`PipelineError::ImageDecode`] if the data is corrupt.
/// Returns [`PipelineError::ZeroDimensions`] if the image has no pixels.
pub fn decode_source(bytes: &[u8]) -> Result<RgbaImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let format = image::guess_format(bytes)
        .map_err(|_| PipelineError::UnsupportedFormat("unrecognized".to_owned()))?;
    if !matches!(format, ImageFormat::Png | ImageFormat::Jpeg) {
        return Err(PipelineError::UnsupportedFormat(format!("{format:?}")));
    }

    let image = image::load_from_memory_with_format(bytes, format)?.to_rgba8();
    ensure_nonzero(&image)?;
    Ok(image)
}

/// Reject images with zero width or height.
///
/// # Errors
///
/// Returns [`PipelineError::ZeroDimensions`] if either axis is zero.
pub fn ensure_nonzero(image: &RgbaImage) -> Result<(), PipelineError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(PipelineError::ZeroDimensions { width, height });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn encode(img: &RgbaImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        match format {
            ImageFormat::Jpeg => {
                image::DynamicImage::ImageRgba8(img.clone())
                    .to_rgb8()
                    .write_to(&mut buf, format)
                    .unwrap();
            }
            _ => img.write_to(&mut buf, format).unwrap(),
        }
        buf.into_inner()
    }

    #[test]
    fn empty_input_returns_error() {
        let result = decode_source(&[]);
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn garbage_bytes_are_unsupported() {
        let result = decode_source(&[0xDE, 0xAD, 0xBE, 0xEF]);
        assert!(matches!(result, Err(PipelineError::UnsupportedFormat(_))));
    }

    #[test]
    fn truncated_png_is_a_decode_error() {
        let img = RgbaImage::from_pixel(8, 8, image::Rgba([1, 2, 3, 255]));
        let png = encode(&img, ImageFormat::Png);
        let result = decode_source(&png[..png.len() / 2]);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn png_decodes_with_pixels_intact() {
        let img = RgbaImage::from_fn(3, 2, |x, y| {
            let r = u8::try_from(x * 40).unwrap();
            let g = u8::try_from(y * 90).unwrap();
            image::Rgba([r, g, 7, 200])
        });
        let decoded = decode_source(&encode(&img, ImageFormat::Png)).unwrap();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.as_raw(), img.as_raw());
    }

    #[test]
    fn jpeg_is_accepted() {
        let img = RgbaImage::from_pixel(16, 9, image::Rgba([200, 200, 200, 255]));
        let decoded = decode_source(&encode(&img, ImageFormat::Jpeg)).unwrap();
        assert_eq!(decoded.dimensions(), (16, 9));
    }

    #[test]
    fn webp_is_rejected() {
        let img = RgbaImage::from_pixel(4, 4, image::Rgba([0, 0, 0, 255]));
        let webp = encode(&img, ImageFormat::WebP);
        assert!(matches!(
            decode_source(&webp),
            Err(PipelineError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn ensure_nonzero_rejects_empty_raster() {
        let img = RgbaImage::new(0, 4);
        assert!(matches!(
            ensure_nonzero(&img),
            Err(PipelineError::ZeroDimensions {
                width: 0,
                height: 4
            })
        ));
    }
}
