//! ink-harmony-export: Pure download encoders (sans-IO).
//!
//! Turns a final render into the bytes and file name of a download.
//! Writing the file (or handing it to a browser) is the caller's job.

pub mod filename;
pub mod jpeg;

pub use filename::{ExportKind, export_filename};
pub use jpeg::{DEFAULT_JPEG_QUALITY, encode_jpeg};

use ink_harmony_pipeline::Rendered;

/// Errors that can occur while preparing a download.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// JPEG encoding failed.
    #[error("JPEG encoding failed: {0}")]
    JpegEncode(#[from] image::ImageError),

    /// The image has zero width or height.
    #[error("cannot export an empty {width}x{height} image")]
    EmptyImage {
        /// Image width.
        width: u32,
        /// Image height.
        height: u32,
    },

    /// Quality outside `1..=100`.
    #[error("JPEG quality {0} is outside 1..=100")]
    InvalidQuality(u8),

    /// Realtime previews are never exported.
    #[error("only final renders can be exported")]
    NotFinal,
}

/// A ready-to-save download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    /// Suggested file name, e.g. `ink_harmony_1700000000000.jpg`.
    pub filename: String,
    /// Encoded JPEG bytes.
    pub bytes: Vec<u8>,
}

/// Encode a final render for download.
///
/// `unix_millis` is the timestamp embedded in the file name. The prefix
/// follows [`Rendered::passthrough`].
///
/// # Errors
///
/// Returns [`ExportError::NotFinal`] for realtime renders, or any
/// encoding error from [`encode_jpeg`].
pub fn export(
    rendered: &Rendered,
    quality: u8,
    unix_millis: u128,
) -> Result<ExportedFile, ExportError> {
    if !rendered.is_exportable() {
        return Err(ExportError::NotFinal);
    }
    let kind = ExportKind::for_render(rendered);
    Ok(ExportedFile {
        filename: export_filename(kind, unix_millis),
        bytes: encode_jpeg(&rendered.image, quality)?,
    })
}
