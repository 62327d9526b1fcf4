//! Existence-by-load probing.
//!
//! There is no directory listing: a background resource exists if and
//! only if loading and decoding it succeeds. A [`Prober`] performs that
//! load synchronously; [`crate::BackgroundLibrary`] runs probes on the
//! blocking pool so they can proceed concurrently.

use std::path::{Component, Path, PathBuf};

use ink_harmony_pipeline::RgbaImage;

/// Loads background resources by catalog-relative path.
pub trait Prober: Send + Sync + 'static {
    /// Load and decode the resource at `path`.
    ///
    /// Returns `None` if the resource is missing or cannot be decoded;
    /// the two are not distinguished.
    fn load(&self, path: &str) -> Option<RgbaImage>;
}

impl<F> Prober for F
where
    F: Fn(&str) -> Option<RgbaImage> + Send + Sync + 'static,
{
    fn load(&self, path: &str) -> Option<RgbaImage> {
        self(path)
    }
}

/// Probes resources under a filesystem root (the assets directory).
#[derive(Debug, Clone)]
pub struct FsProber {
    root: PathBuf,
}

impl FsProber {
    /// Probe files relative to `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The assets root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem location of a catalog path, or `None` if the path
    /// would leave the root.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path);
        let contained = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        contained.then(|| self.root.join(relative))
    }
}

impl Prober for FsProber {
    fn load(&self, path: &str) -> Option<RgbaImage> {
        let Some(file) = self.resolve(path) else {
            tracing::debug!(%path, "refusing to probe path outside the assets root");
            return None;
        };
        let decoded = image::ImageReader::open(&file)
            .and_then(image::ImageReader::with_guessed_format)
            .map_err(image::ImageError::from)
            .and_then(image::ImageReader::decode);
        match decoded {
            Ok(img) => Some(img.to_rgba8()),
            Err(err) => {
                tracing::debug!(path = %file.display(), %err, "probe failed");
                None
            }
        }
    }
}
