//! Background materialization: turn a descriptor into a full-size raster.

use std::collections::HashMap;
use std::hash::BuildHasher;
use std::sync::Arc;

use crate::background::{BackgroundDescriptor, BackgroundKind, Color};
use crate::resample::{ResampleFilter, resize_to};
use crate::types::{Dimensions, RgbaImage};

/// Read access to already-decoded background textures.
///
/// The pipeline never loads resources itself. Whatever performed the
/// probing (see `ink-harmony-io`) hands its decoded images over through
/// this trait, keyed by the descriptor's resource path.
pub trait BackgroundImages {
    /// The decoded texture at `path`, if it has been loaded.
    fn get(&self, path: &str) -> Option<&RgbaImage>;
}

/// A texture source with nothing loaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackgroundImages;

impl BackgroundImages for NoBackgroundImages {
    fn get(&self, _path: &str) -> Option<&RgbaImage> {
        None
    }
}

impl<S: BuildHasher> BackgroundImages for HashMap<String, RgbaImage, S> {
    fn get(&self, path: &str) -> Option<&RgbaImage> {
        Self::get(self, path)
    }
}

impl<S: BuildHasher> BackgroundImages for HashMap<String, Arc<RgbaImage>, S> {
    fn get(&self, path: &str) -> Option<&RgbaImage> {
        Self::get(self, path).map(|texture| &**texture)
    }
}

/// Produce the background raster for `descriptor` at `size`.
///
/// Never fails: an image background whose texture is missing degrades
/// to solid white.
#[must_use = "returns the background raster"]
pub fn materialize(
    descriptor: &BackgroundDescriptor,
    size: Dimensions,
    original: &RgbaImage,
    images: &dyn BackgroundImages,
    filter: ResampleFilter,
) -> RgbaImage {
    match &descriptor.kind {
        BackgroundKind::Original => resize_to(original, size, filter),
        BackgroundKind::SolidColor { color } => fill(*color, size),
        BackgroundKind::Image { path } => images.get(path).map_or_else(
            || {
                tracing::debug!(%path, key = %descriptor.key, "background texture unavailable, using white");
                fill(Color::WHITE, size)
            },
            |texture| resize_to(texture, size, filter),
        ),
    }
}

fn fill(color: Color, size: Dimensions) -> RgbaImage {
    RgbaImage::from_pixel(size.width, size.height, color.to_rgba())
}
