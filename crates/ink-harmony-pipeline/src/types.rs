//! Shared types for the ink-harmony pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::denoise::DenoiseKind;
use crate::resample::ResampleFilter;

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` so downstream crates can reference source and
/// composited images without depending on `image` directly.
pub use image::RgbaImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create new dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Dimensions of an existing raster.
    #[must_use]
    pub fn of<P: image::Pixel>(image: &image::ImageBuffer<P, Vec<P::Subpixel>>) -> Self {
        Self::new(image.width(), image.height())
    }

    /// Returns `true` if either axis is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Length of the longer axis.
    #[must_use]
    pub const fn long_side(self) -> u32 {
        if self.width >= self.height {
            self.width
        } else {
            self.height
        }
    }

    /// Aspect class of an image with these dimensions.
    #[must_use]
    pub fn aspect_class(self) -> AspectClass {
        AspectClass::from_dimensions(self.width, self.height)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Coarse orientation bucket used to filter the background catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectClass {
    /// Width/height ratio above [`AspectClass::LANDSCAPE_MIN_RATIO`].
    Landscape,
    /// Width/height ratio below [`AspectClass::PORTRAIT_MAX_RATIO`].
    Portrait,
    /// Everything in between.
    Square,
}

impl AspectClass {
    /// Ratios strictly above this are landscape.
    pub const LANDSCAPE_MIN_RATIO: f64 = 1.3;

    /// Ratios strictly below this are portrait.
    pub const PORTRAIT_MAX_RATIO: f64 = 0.75;

    /// All classes, in declaration order.
    pub const ALL: [Self; 3] = [Self::Landscape, Self::Portrait, Self::Square];

    /// Classify an image by its width/height ratio.
    ///
    /// Zero-sized images are rejected before classification elsewhere in
    /// the pipeline; here a zero height counts as landscape and `0x0`
    /// falls through to square.
    #[must_use]
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        let ratio = f64::from(width) / f64::from(height);
        if ratio > Self::LANDSCAPE_MIN_RATIO {
            Self::Landscape
        } else if ratio < Self::PORTRAIT_MAX_RATIO {
            Self::Portrait
        } else {
            Self::Square
        }
    }
}

impl fmt::Display for AspectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Landscape => f.write_str("landscape"),
            Self::Portrait => f.write_str("portrait"),
            Self::Square => f.write_str("square"),
        }
    }
}

/// Luminance cutoff for ink detection.
///
/// Pixels whose luminance is strictly below the threshold become ink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Threshold(u8);

impl Threshold {
    /// Slider default.
    pub const DEFAULT: Self = Self(128);

    /// Create a threshold from a byte value.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// The raw byte value.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u8> for Threshold {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl TryFrom<u32> for Threshold {
    type Error = PipelineError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map(Self)
            .map_err(|_| PipelineError::InvalidThreshold(value))
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Single-channel mask where every sample is either [`BinaryMask::INK`]
/// or [`BinaryMask::PAPER`].
///
/// Construction goes through [`BinaryMask::from_image`] (validated) or
/// the pipeline functions, so the two-valued invariant always holds.
#[derive(Debug, Clone)]
pub struct BinaryMask(GrayImage);

impl BinaryMask {
    /// Sample value marking an ink (stroke) pixel.
    pub const INK: u8 = 255;

    /// Sample value marking a background pixel.
    pub const PAPER: u8 = 0;

    /// A mask with no ink.
    #[must_use]
    pub fn blank(width: u32, height: u32) -> Self {
        Self(GrayImage::new(width, height))
    }

    /// Wrap a grayscale image, checking that it only holds 0 and 255.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if any sample is neither
    /// [`Self::INK`] nor [`Self::PAPER`].
    pub fn from_image(image: GrayImage) -> Result<Self, PipelineError> {
        if let Some(value) = image
            .as_raw()
            .iter()
            .find(|&&v| v != Self::INK && v != Self::PAPER)
        {
            return Err(PipelineError::InvalidConfig(format!(
                "mask sample {value} is not binary"
            )));
        }
        Ok(Self(image))
    }

    /// Wrap an image already known to be binary.
    pub(crate) const fn from_binary(image: GrayImage) -> Self {
        Self(image)
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// Mask dimensions.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::of(&self.0)
    }

    /// Whether the pixel at `(x, y)` is ink.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds, like [`GrayImage::get_pixel`].
    #[must_use]
    pub fn is_ink(&self, x: u32, y: u32) -> bool {
        self.0.get_pixel(x, y).0[0] == Self::INK
    }

    /// Number of ink pixels.
    #[must_use]
    pub fn ink_count(&self) -> usize {
        self.0.as_raw().iter().filter(|&&v| v == Self::INK).count()
    }

    /// Borrow the underlying grayscale buffer.
    #[must_use]
    pub const fn as_image(&self) -> &GrayImage {
        &self.0
    }

    /// Unwrap into the underlying grayscale buffer.
    #[must_use]
    pub fn into_image(self) -> GrayImage {
        self.0
    }
}

impl PartialEq for BinaryMask {
    fn eq(&self, other: &Self) -> bool {
        self.0.dimensions() == other.0.dimensions() && self.0.as_raw() == other.0.as_raw()
    }
}

impl Eq for BinaryMask {}

/// Which variant of the pipeline to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Native resolution, noise suppression always on. The only mode
    /// whose output is exported.
    Final,
    /// Live preview while the threshold control is moving: optional
    /// downscale before thresholding, optional noise suppression, mask
    /// upscaled back to native resolution.
    Realtime,
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Final => f.write_str("final"),
            Self::Realtime => f.write_str("realtime"),
        }
    }
}

/// Configuration for the image processing pipeline.
///
/// All parameters have defaults matching the browser tool's behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Longest side (pixels) the source is downscaled to before
    /// thresholding in [`RenderMode::Realtime`]. `None` disables
    /// realtime downscaling.
    pub realtime_max_dimension: Option<u32>,

    /// Filter used for the realtime downscale.
    pub realtime_filter: ResampleFilter,

    /// Whether realtime runs perform noise suppression. Final runs
    /// always do.
    pub realtime_denoise: bool,

    /// Structuring element used for noise suppression.
    pub denoise: DenoiseKind,

    /// Filter used when drawing the original or an image background at
    /// output size.
    pub background_filter: ResampleFilter,
}

impl PipelineConfig {
    /// Default realtime working resolution.
    pub const DEFAULT_REALTIME_MAX_DIMENSION: u32 = 800;
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            realtime_max_dimension: Some(Self::DEFAULT_REALTIME_MAX_DIMENSION),
            realtime_filter: ResampleFilter::default(),
            realtime_denoise: true,
            denoise: DenoiseKind::default(),
            background_filter: ResampleFilter::default(),
        }
    }
}

/// Category an error falls into for user notification purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed, unsupported or zero-sized input. Aborts the current run.
    InvalidInput,
    /// No image loaded, or the processing backend is gone.
    NotReady,
}

/// Why the pipeline cannot run yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotReadyReason {
    /// No source image has been loaded into the session.
    NoImage,
    /// The processing backend (e.g. the preview worker) is unavailable.
    BackendUnavailable,
}

impl fmt::Display for NotReadyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoImage => f.write_str("no image loaded"),
            Self::BackendUnavailable => f.write_str("processing backend unavailable"),
        }
    }
}

/// Errors that can occur during pipeline processing.
///
/// Missing background resources and exhausted discovery are recovered
/// locally and never show up here.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The input is an image, but not PNG or JPEG.
    #[error("unsupported image format: {0} (expected PNG or JPEG)")]
    UnsupportedFormat(String),

    /// The image decoded to zero width or height.
    #[error("image has zero dimensions ({width}x{height})")]
    ZeroDimensions {
        /// Decoded width.
        width: u32,
        /// Decoded height.
        height: u32,
    },

    /// Mask and background sizes differ at composite time.
    #[error("mask is {mask} but background is {background}")]
    DimensionMismatch {
        /// Mask dimensions.
        mask: Dimensions,
        /// Background dimensions.
        background: Dimensions,
    },

    /// A threshold outside `0..=255` was supplied.
    #[error("threshold {0} is outside 0..=255")]
    InvalidThreshold(u32),

    /// The selected background key is not in the resolved option list.
    #[error("unknown background: {0}")]
    UnknownBackground(String),

    /// The pipeline cannot run yet.
    #[error("pipeline not ready: {0}")]
    NotReady(NotReadyReason),

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    /// Notification category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotReady(_) => ErrorKind::NotReady,
            Self::ImageDecode(_)
            | Self::EmptyInput
            | Self::UnsupportedFormat(_)
            | Self::ZeroDimensions { .. }
            | Self::DimensionMismatch { .. }
            | Self::InvalidThreshold(_)
            | Self::UnknownBackground(_)
            | Self::InvalidConfig(_) => ErrorKind::InvalidInput,
        }
    }

    /// Whether a failure in a run of the given mode should reach the
    /// user's notification area.
    ///
    /// Realtime failures are never surfaced so a moving slider is not
    /// interrupted; final runs surface both categories.
    #[must_use]
    pub const fn is_user_visible(&self, mode: RenderMode) -> bool {
        match (self.kind(), mode) {
            (ErrorKind::InvalidInput | ErrorKind::NotReady, RenderMode::Final) => true,
            (_, RenderMode::Realtime) => false,
        }
    }
}
