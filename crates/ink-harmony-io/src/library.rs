//! Concurrent background discovery with a resource cache.

use std::collections::HashMap;
use std::sync::Arc;

use ink_harmony_pipeline::{AspectClass, BackgroundOptionList, CatalogConfig, RgbaImage};
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::probe::Prober;

/// Decoded background textures keyed by catalog path.
///
/// Implements [`ink_harmony_pipeline::BackgroundImages`], so it can be
/// handed straight to a pipeline run.
pub type ImageCache = HashMap<String, Arc<RgbaImage>>;

/// Result of one discovery pass.
#[derive(Debug, Clone)]
pub struct Discovery {
    /// Ordered option list for the image's aspect class.
    pub options: BackgroundOptionList,
    /// Textures for every image entry that was found.
    pub images: Arc<ImageCache>,
}

/// Probes background candidates and remembers what loaded.
///
/// A resource that loaded once is served from the cache afterwards and
/// never decoded again. Failed probes are not remembered, so a resource
/// that appears later is picked up on the next discovery.
pub struct BackgroundLibrary<P> {
    prober: Arc<P>,
    cache: Mutex<ImageCache>,
}

impl<P: Prober> BackgroundLibrary<P> {
    /// A library with an empty cache.
    pub fn new(prober: P) -> Self {
        Self {
            prober: Arc::new(prober),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Number of cached textures.
    pub async fn cached_len(&self) -> usize {
        self.cache.lock().await.len()
    }

    /// Build the option list for `aspect`.
    ///
    /// Every uncached candidate is probed concurrently on the blocking
    /// pool. Outcomes are matched back to candidates by index, so the
    /// list order does not depend on which probe finished first. A
    /// probe task that panics counts as a failed probe.
    pub async fn discover(&self, catalog: &CatalogConfig, aspect: AspectClass) -> Discovery {
        let candidates = catalog.candidates(aspect);
        let mut found = vec![false; candidates.len()];
        let mut images = ImageCache::new();
        let mut tasks: JoinSet<(usize, Option<RgbaImage>)> = JoinSet::new();

        {
            let cache = self.cache.lock().await;
            for (index, candidate) in candidates.iter().enumerate() {
                if let Some(texture) = cache.get(&candidate.path) {
                    found[index] = true;
                    images.insert(candidate.path.clone(), Arc::clone(texture));
                    continue;
                }
                let prober = Arc::clone(&self.prober);
                let path = candidate.path.clone();
                tasks.spawn(async move {
                    let loaded = tokio::task::spawn_blocking(move || prober.load(&path)).await;
                    (index, loaded.ok().flatten())
                });
            }
        }

        let probed = tasks.len();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Some(texture))) => {
                    let path = &candidates[index].path;
                    tracing::debug!(%path, "background candidate loaded");
                    let texture = Arc::new(texture);
                    self.cache
                        .lock()
                        .await
                        .insert(path.clone(), Arc::clone(&texture));
                    images.insert(path.clone(), texture);
                    found[index] = true;
                }
                Ok((index, None)) => {
                    tracing::debug!(path = %candidates[index].path, "background candidate unavailable");
                }
                Err(err) => {
                    tracing::debug!(%err, "background probe task failed");
                }
            }
        }

        let options = catalog.assemble(&candidates, &found);
        tracing::info!(
            %aspect,
            candidates = candidates.len(),
            probed,
            found = found.iter().filter(|f| **f).count(),
            options = options.len(),
            exhausted = options.discovery_exhausted(),
            "background discovery complete"
        );
        Discovery {
            options,
            images: Arc::new(images),
        }
    }
}
