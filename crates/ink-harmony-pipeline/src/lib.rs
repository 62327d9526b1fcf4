//! ink-harmony-pipeline: Pure ink-on-paper compositing pipeline (sans-IO).
//!
//! Turns a photo of dark strokes on light paper into black ink on a
//! chosen background:
//! luminance -> inverse threshold -> noise suppression ->
//! background materialization -> compositing.
//!
//! This crate has **no I/O dependencies**: it operates on in-memory
//! images and returns structured data. Resource probing, caching and
//! the realtime preview driver live in `ink-harmony-io`; encoding for
//! download lives in `ink-harmony-export`.

pub mod background;
pub mod composite;
pub mod denoise;
pub mod materialize;
pub mod pipeline;
pub mod resample;
pub mod sequence;
pub mod session;
pub mod source;
pub mod threshold;
pub mod types;

use std::sync::Arc;

pub use background::{
    BackgroundDescriptor, BackgroundKind, BackgroundOptionList, CatalogConfig, Color,
    DirectoryCategory, resolve,
};
pub use composite::composite;
pub use denoise::{DenoiseKind, SpeckFilter, suppress};
pub use materialize::{BackgroundImages, NoBackgroundImages, materialize};
pub use pipeline::{Pipeline, Rendered};
pub use resample::ResampleFilter;
pub use sequence::{LatestSlot, Sequencer, Ticket};
pub use session::{RenderSnapshot, Session};
pub use source::decode_source;
pub use threshold::transform;
pub use types::{
    AspectClass, BinaryMask, Dimensions, ErrorKind, GrayImage, NotReadyReason, PipelineConfig,
    PipelineError, RenderMode, RgbaImage, Threshold,
};

/// Run the full pipeline once.
///
/// # Pipeline steps
///
/// 1. Passthrough short-circuit: the original background returns the
///    source unchanged, skipping every step below
/// 2. Realtime only: optional downscale to `realtime_max_dimension`
/// 3. Luminance and inverse threshold
/// 4. Noise suppression (always for final, optional for realtime)
/// 5. Nearest-neighbor mask upscale to native resolution
/// 6. Background materialization at native resolution
/// 7. Compositing
///
/// Output is byte-identical for identical inputs and identical
/// `images` contents.
///
/// # Errors
///
/// Returns [`PipelineError::NotReady`] if `source` is `None`.
/// Returns [`PipelineError::ZeroDimensions`] if the source is empty.
pub fn run(
    source: Option<&Arc<RgbaImage>>,
    threshold: Threshold,
    background: &BackgroundDescriptor,
    mode: RenderMode,
    config: &PipelineConfig,
    images: &dyn BackgroundImages,
) -> Result<Rendered, PipelineError> {
    let source = source.ok_or(PipelineError::NotReady(NotReadyReason::NoImage))?;
    crate::source::ensure_nonzero(source)?;

    if background.is_original() {
        tracing::trace!(%mode, "original background selected, passing through");
        return Ok(Rendered {
            image: RgbaImage::clone(source),
            mode,
            background_key: background.key.clone(),
            passthrough: true,
        });
    }

    let rendered = Pipeline::new(Arc::clone(source), config.clone(), mode)
        .prepare()?
        .threshold(threshold)
        .denoise()
        .upscale()
        .composite(background, images)?
        .into_result();
    tracing::debug!(%mode, %threshold, background = %background.key, "rendered");
    Ok(rendered)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Dark block with scattered single-pixel specks on light paper.
    fn sample(w: u32, h: u32) -> Arc<RgbaImage> {
        Arc::new(RgbaImage::from_fn(w, h, |x, y| {
            let block = (w / 3..2 * w / 3).contains(&x) && (h / 3..2 * h / 3).contains(&y);
            let speck = (x * 7 + y * 11) % 53 == 0;
            if block || speck {
                image::Rgba([15, 10, 5, 255])
            } else {
                image::Rgba([235, 232, 225, 200])
            }
        }))
    }

    fn white() -> BackgroundDescriptor {
        BackgroundDescriptor::solid("Pure White", "default", Color::WHITE)
    }

    #[test]
    fn no_source_is_not_ready() {
        let result = run(
            None,
            Threshold::DEFAULT,
            &white(),
            RenderMode::Final,
            &PipelineConfig::default(),
            &NoBackgroundImages,
        );
        assert!(matches!(
            result,
            Err(PipelineError::NotReady(NotReadyReason::NoImage))
        ));
    }

    #[test]
    fn passthrough_ignores_threshold() {
        let src = sample(30, 20);
        for t in [0, 128, 255] {
            let rendered = run(
                Some(&src),
                Threshold::new(t),
                &BackgroundDescriptor::original(),
                RenderMode::Final,
                &PipelineConfig::default(),
                &NoBackgroundImages,
            )
            .unwrap();
            assert!(rendered.passthrough);
            assert_eq!(rendered.image.as_raw(), src.as_raw());
        }
    }

    #[test]
    fn threshold_zero_reproduces_background() {
        let src = sample(30, 20);
        let rendered = run(
            Some(&src),
            Threshold::new(0),
            &white(),
            RenderMode::Final,
            &PipelineConfig::default(),
            &NoBackgroundImages,
        )
        .unwrap();
        assert!(rendered.image.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn threshold_255_on_white_source_keeps_background() {
        let src = Arc::new(RgbaImage::from_pixel(9, 9, image::Rgba([255, 255, 255, 255])));
        let rendered = run(
            Some(&src),
            Threshold::new(255),
            &white(),
            RenderMode::Final,
            &PipelineConfig::default(),
            &NoBackgroundImages,
        )
        .unwrap();
        assert!(rendered.image.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn final_output_has_native_size_and_black_strokes() {
        let src = sample(60, 45);
        let rendered = run(
            Some(&src),
            Threshold::DEFAULT,
            &white(),
            RenderMode::Final,
            &PipelineConfig::default(),
            &NoBackgroundImages,
        )
        .unwrap();
        assert_eq!(rendered.image.dimensions(), (60, 45));
        assert_eq!(rendered.image.get_pixel(30, 22).0, [0, 0, 0, 255]);
        assert!(rendered.is_exportable());
    }

    #[test]
    fn final_run_is_idempotent() {
        let src = sample(50, 50);
        let config = PipelineConfig::default();
        let go = || {
            run(
                Some(&src),
                Threshold::new(90),
                &white(),
                RenderMode::Final,
                &config,
                &NoBackgroundImages,
            )
            .unwrap()
        };
        assert_eq!(go().image.as_raw(), go().image.as_raw());
    }

    #[test]
    fn realtime_output_has_native_size() {
        let src = sample(120, 40);
        let config = PipelineConfig {
            realtime_max_dimension: Some(30),
            ..PipelineConfig::default()
        };
        let rendered = run(
            Some(&src),
            Threshold::DEFAULT,
            &white(),
            RenderMode::Realtime,
            &config,
            &NoBackgroundImages,
        )
        .unwrap();
        assert_eq!(rendered.image.dimensions(), (120, 40));
        assert!(!rendered.is_exportable());
    }

    #[test]
    fn missing_texture_renders_on_white() {
        let src = sample(20, 20);
        let texture = BackgroundDescriptor::from_image_path("background/paper/washi.jpg").unwrap();
        let rendered = run(
            Some(&src),
            Threshold::new(0),
            &texture,
            RenderMode::Final,
            &PipelineConfig::default(),
            &NoBackgroundImages,
        )
        .unwrap();
        assert!(rendered.image.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }
}
