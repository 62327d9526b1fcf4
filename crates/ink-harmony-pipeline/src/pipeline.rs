//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! [`crate::run`] executes everything in one call. [`Pipeline`] lets the
//! caller drive execution one step at a time:
//!
//! ```rust
//! # use std::sync::Arc;
//! # use ink_harmony_pipeline::{
//! #     BackgroundDescriptor, NoBackgroundImages, Pipeline, PipelineConfig, PipelineError,
//! #     RenderMode, RgbaImage, Threshold,
//! # };
//! # fn run(source: Arc<RgbaImage>) -> Result<(), PipelineError> {
//! let background = BackgroundDescriptor::original();
//! let rendered = Pipeline::new(source, PipelineConfig::default(), RenderMode::Final)
//!     .prepare()?
//!     .threshold(Threshold::DEFAULT)
//!     .denoise()
//!     .upscale()
//!     .composite(&background, &NoBackgroundImages)?
//!     .into_result();
//! # let _ = rendered;
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state (or a
//! `Result` for fallible stages), carrying forward what later stages
//! need. Every state also implements [`PipelineStage`] for uniform
//! inspection.

use std::sync::Arc;

use crate::background::BackgroundDescriptor;
use crate::materialize::{BackgroundImages, materialize};
use crate::types::{
    BinaryMask, Dimensions, PipelineConfig, PipelineError, RenderMode, RgbaImage, Threshold,
};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
#[must_use = "pipeline stages are consumed by advancing, call .prepare() to continue"]
pub struct Pending {
    config: PipelineConfig,
    mode: RenderMode,
    source: Arc<RgbaImage>,
}

impl Pending {
    /// The source image.
    #[must_use]
    pub fn source(&self) -> &RgbaImage {
        &self.source
    }

    /// Validate the source and pick the working resolution.
    ///
    /// Realtime runs with a configured `realtime_max_dimension` work on
    /// a downscaled copy; final runs always work at native resolution.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ZeroDimensions`] if the source is empty.
    pub fn prepare(self) -> Result<Prepared, PipelineError> {
        crate::source::ensure_nonzero(&self.source)?;
        let native = Dimensions::of(&*self.source);

        let working = match (self.mode, self.config.realtime_max_dimension) {
            (RenderMode::Realtime, Some(max)) => {
                let (small, applied) =
                    crate::resample::downsample(&self.source, max, self.config.realtime_filter);
                applied.then_some(small)
            }
            _ => None,
        };

        if let Some(small) = &working {
            tracing::trace!(%native, working = %Dimensions::of(small), "downscaled for realtime");
        }

        Ok(Prepared {
            config: self.config,
            mode: self.mode,
            source: self.source,
            working,
            native,
        })
    }
}

// ───────────────────────── Stage 1: Prepared ─────────────────────────

/// Source validated; working image chosen.
#[must_use = "pipeline stages are consumed by advancing, call .threshold() to continue"]
pub struct Prepared {
    config: PipelineConfig,
    mode: RenderMode,
    source: Arc<RgbaImage>,
    /// Downscaled copy, or `None` when working at native resolution.
    working: Option<RgbaImage>,
    native: Dimensions,
}

impl Prepared {
    /// The image the threshold will be applied to.
    #[must_use]
    pub fn working(&self) -> &RgbaImage {
        self.working.as_ref().unwrap_or_else(|| &*self.source)
    }

    /// Whether a realtime downscale was applied.
    #[must_use]
    pub const fn downscaled(&self) -> bool {
        self.working.is_some()
    }

    /// Native source dimensions.
    #[must_use]
    pub const fn native(&self) -> Dimensions {
        self.native
    }

    /// Convert to luminance and inverse-threshold into an ink mask.
    pub fn threshold(self, threshold: Threshold) -> Thresholded {
        let gray = crate::threshold::luminance(self.working());
        let mask = crate::threshold::threshold_luminance(&gray, threshold);
        Thresholded {
            config: self.config,
            mode: self.mode,
            source: self.source,
            native: self.native,
            threshold,
            mask,
        }
    }
}

// ───────────────────────── Stage 2: Thresholded ──────────────────────

/// Raw ink mask at working resolution.
#[must_use = "pipeline stages are consumed by advancing, call .denoise() to continue"]
pub struct Thresholded {
    config: PipelineConfig,
    mode: RenderMode,
    source: Arc<RgbaImage>,
    native: Dimensions,
    threshold: Threshold,
    mask: BinaryMask,
}

impl Thresholded {
    /// The thresholded mask.
    #[must_use]
    pub const fn mask(&self) -> &BinaryMask {
        &self.mask
    }

    /// The threshold that produced the mask.
    #[must_use]
    pub const fn threshold_value(&self) -> Threshold {
        self.threshold
    }

    /// Apply noise suppression.
    ///
    /// Always runs in [`RenderMode::Final`]. In [`RenderMode::Realtime`]
    /// it runs only if `realtime_denoise` is set; skipping leaves the
    /// mask as thresholded.
    pub fn denoise(self) -> Denoised {
        use crate::denoise::SpeckFilter as _;

        let applied = match self.mode {
            RenderMode::Final => true,
            RenderMode::Realtime => self.config.realtime_denoise,
        };
        let mask = if applied {
            self.config.denoise.open(&self.mask)
        } else {
            self.mask
        };
        Denoised {
            config: self.config,
            mode: self.mode,
            source: self.source,
            native: self.native,
            mask,
            applied,
        }
    }
}

// ───────────────────────── Stage 3: Denoised ─────────────────────────

/// Mask after optional noise suppression, still at working resolution.
#[must_use = "pipeline stages are consumed by advancing, call .upscale() to continue"]
pub struct Denoised {
    config: PipelineConfig,
    mode: RenderMode,
    source: Arc<RgbaImage>,
    native: Dimensions,
    mask: BinaryMask,
    applied: bool,
}

impl Denoised {
    /// The cleaned mask.
    #[must_use]
    pub const fn mask(&self) -> &BinaryMask {
        &self.mask
    }

    /// Whether noise suppression actually ran.
    #[must_use]
    pub const fn applied(&self) -> bool {
        self.applied
    }

    /// Bring the mask back to native resolution (nearest-neighbor).
    pub fn upscale(self) -> MaskReady {
        let upscaled = self.mask.dimensions() != self.native;
        let mask = crate::resample::upscale_mask(&self.mask, self.native);
        MaskReady {
            config: self.config,
            mode: self.mode,
            source: self.source,
            mask,
            upscaled,
        }
    }
}

// ───────────────────────── Stage 4: MaskReady ────────────────────────

/// Mask at native resolution, ready to composite.
#[must_use = "pipeline stages are consumed by advancing, call .composite() to continue"]
pub struct MaskReady {
    config: PipelineConfig,
    mode: RenderMode,
    source: Arc<RgbaImage>,
    mask: BinaryMask,
    upscaled: bool,
}

impl MaskReady {
    /// The native-resolution mask.
    #[must_use]
    pub const fn mask(&self) -> &BinaryMask {
        &self.mask
    }

    /// Whether the mask had to be upscaled.
    #[must_use]
    pub const fn upscaled(&self) -> bool {
        self.upscaled
    }

    /// Draw the background and paint the ink over it.
    ///
    /// The passthrough background returns the source unchanged instead
    /// of compositing.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DimensionMismatch`] if the materialized
    /// background does not match the mask.
    pub fn composite(
        self,
        background: &BackgroundDescriptor,
        images: &dyn BackgroundImages,
    ) -> Result<Composited, PipelineError> {
        let native = self.mask.dimensions();
        let passthrough = background.is_original();
        let image = if passthrough {
            crate::resample::resize_to(&self.source, native, self.config.background_filter)
        } else {
            let mut canvas = materialize(
                background,
                native,
                &self.source,
                images,
                self.config.background_filter,
            );
            crate::composite::composite_in_place(&self.mask, &mut canvas)?;
            canvas
        };
        Ok(Composited {
            mode: self.mode,
            mask: self.mask,
            image,
            background_key: background.key.clone(),
            passthrough,
        })
    }
}

// ───────────────────────── Stage 5: Composited ───────────────────────

/// Final image produced.
#[must_use = "call .into_result() to take the rendered image"]
pub struct Composited {
    mode: RenderMode,
    mask: BinaryMask,
    image: RgbaImage,
    background_key: String,
    passthrough: bool,
}

impl Composited {
    /// The composited (or passthrough) image.
    #[must_use]
    pub const fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// The mask that was composited.
    #[must_use]
    pub const fn mask(&self) -> &BinaryMask {
        &self.mask
    }

    /// Consume the pipeline and return the [`Rendered`] output.
    pub fn into_result(self) -> Rendered {
        Rendered {
            image: self.image,
            mode: self.mode,
            background_key: self.background_key,
            passthrough: self.passthrough,
        }
    }
}

/// Output of one pipeline run.
#[derive(Debug, Clone)]
pub struct Rendered {
    /// The composited image, or the original for the passthrough
    /// background. Always at the source's native resolution.
    pub image: RgbaImage,
    /// Mode that produced this image.
    pub mode: RenderMode,
    /// Key of the background that was used.
    pub background_key: String,
    /// `true` when the passthrough background short-circuited the run.
    pub passthrough: bool,
}

impl Rendered {
    /// Whether this result may be exported. Only final renders are.
    #[must_use]
    pub const fn is_exportable(&self) -> bool {
        matches!(self.mode, RenderMode::Final)
    }
}

// ──────────────────────────── PipelineStage ──────────────────────────

/// Total number of stages in the pipeline.
pub const STAGE_COUNT: usize = 6;

/// Uniform, borrowed view of what a stage produced.
#[must_use]
pub enum StageOutput<'a> {
    /// The source image, untouched.
    Source {
        /// Source image.
        source: &'a RgbaImage,
    },
    /// The image the threshold runs on.
    Prepared {
        /// Working image.
        working: &'a RgbaImage,
        /// Whether it was downscaled.
        downscaled: bool,
    },
    /// An ink mask (thresholded, denoised or upscaled).
    Mask {
        /// The mask.
        mask: &'a BinaryMask,
    },
    /// The composited result.
    Composited {
        /// The final image.
        image: &'a RgbaImage,
    },
}

/// Trait implemented by every pipeline stage.
pub trait PipelineStage {
    /// Short name of this stage (e.g. `"threshold"`).
    const NAME: &str;

    /// Zero-based position of this stage.
    const INDEX: usize;

    /// What this stage produced.
    fn output(&self) -> StageOutput<'_>;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Source {
            source: &self.source,
        }
    }
}

impl PipelineStage for Prepared {
    const NAME: &str = "prepare";
    const INDEX: usize = 1;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Prepared {
            working: self.working(),
            downscaled: self.downscaled(),
        }
    }
}

impl PipelineStage for Thresholded {
    const NAME: &str = "threshold";
    const INDEX: usize = 2;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Mask { mask: &self.mask }
    }
}

impl PipelineStage for Denoised {
    const NAME: &str = "denoise";
    const INDEX: usize = 3;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Mask { mask: &self.mask }
    }
}

impl PipelineStage for MaskReady {
    const NAME: &str = "upscale";
    const INDEX: usize = 4;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Mask { mask: &self.mask }
    }
}

impl PipelineStage for Composited {
    const NAME: &str = "composite";
    const INDEX: usize = 5;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Composited { image: &self.image }
    }
}

/// Entry point for stage-by-stage execution.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline over a loaded source image.
    ///
    /// No processing is performed until [`Pending::prepare`] is called.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(source: Arc<RgbaImage>, config: PipelineConfig, mode: RenderMode) -> Pending {
        Pending {
            config,
            mode,
            source,
        }
    }
}
