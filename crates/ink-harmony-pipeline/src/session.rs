//! Explicit session context.
//!
//! Holds everything a run depends on besides its arguments: the loaded
//! source image, the resolved background options, and the current
//! selection. The source image and option list are only ever replaced
//! wholesale, so a [`RenderSnapshot`] taken before a replacement keeps
//! rendering against the values it captured.

use std::sync::Arc;

use crate::background::{BackgroundDescriptor, BackgroundOptionList, CatalogConfig, resolve};
use crate::materialize::BackgroundImages;
use crate::pipeline::Rendered;
use crate::types::{
    AspectClass, Dimensions, NotReadyReason, PipelineConfig, PipelineError, RenderMode, RgbaImage,
    Threshold,
};

/// Current image, background options and selection.
#[derive(Debug, Clone)]
pub struct Session {
    config: PipelineConfig,
    catalog: CatalogConfig,
    source: Option<Arc<RgbaImage>>,
    options: Arc<BackgroundOptionList>,
    selected: String,
}

impl Session {
    /// A session with nothing loaded and the passthrough selected.
    #[must_use]
    pub fn new(config: PipelineConfig, catalog: CatalogConfig) -> Self {
        let options = Arc::new(catalog.base_options());
        Self {
            config,
            catalog,
            source: None,
            options,
            selected: BackgroundDescriptor::ORIGINAL_KEY.to_owned(),
        }
    }

    /// Pipeline configuration.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Background catalog configuration.
    #[must_use]
    pub const fn catalog(&self) -> &CatalogConfig {
        &self.catalog
    }

    /// The loaded source image, if any.
    #[must_use]
    pub const fn source(&self) -> Option<&Arc<RgbaImage>> {
        self.source.as_ref()
    }

    /// Aspect class of the loaded image, if any.
    #[must_use]
    pub fn aspect(&self) -> Option<AspectClass> {
        self.source
            .as_deref()
            .map(|image| Dimensions::of(image).aspect_class())
    }

    /// Replace the source image.
    ///
    /// The option list is reset to the base entries until discovery for
    /// the new aspect class completes (see [`Self::set_options`]). The
    /// selected key is kept across the reset and only checked against the
    /// resolved list; until then [`Self::selected`] falls back to the
    /// passthrough if the key is not a base entry.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ZeroDimensions`] if the image is empty.
    pub fn load_image(&mut self, image: RgbaImage) -> Result<AspectClass, PipelineError> {
        crate::source::ensure_nonzero(&image)?;
        let dims = Dimensions::of(&image);
        let aspect = dims.aspect_class();
        tracing::info!(%dims, %aspect, "loaded source image");
        self.source = Some(Arc::new(image));
        self.options = Arc::new(self.catalog.base_options());
        Ok(aspect)
    }

    /// Decode upload bytes and replace the source image.
    ///
    /// # Errors
    ///
    /// Returns any error from [`crate::decode_source`]. The previous
    /// image stays loaded on failure.
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<AspectClass, PipelineError> {
        let image = crate::source::decode_source(bytes)?;
        self.load_image(image)
    }

    /// Resolved background options.
    #[must_use]
    pub const fn options(&self) -> &Arc<BackgroundOptionList> {
        &self.options
    }

    /// Replace the option list.
    ///
    /// If the current selection is not in the new list, the passthrough
    /// entry is selected.
    pub fn set_options(&mut self, options: BackgroundOptionList) {
        if options.find(&self.selected).is_none() {
            tracing::debug!(key = %self.selected, "selection no longer available, reverting to original");
            self.selected = BackgroundDescriptor::ORIGINAL_KEY.to_owned();
        }
        self.options = Arc::new(options);
    }

    /// Resolve the option list for the loaded image with a synchronous
    /// probe and install it.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NotReady`] if no image is loaded.
    pub fn resolve_with(
        &mut self,
        probe: impl FnMut(&str) -> bool,
    ) -> Result<&BackgroundOptionList, PipelineError> {
        let aspect = self
            .aspect()
            .ok_or(PipelineError::NotReady(NotReadyReason::NoImage))?;
        let options = resolve(&self.catalog, aspect, probe);
        self.set_options(options);
        Ok(self.options.as_ref())
    }

    /// Select a background by key (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnknownBackground`] if no option has that
    /// key. The selection is unchanged in that case.
    pub fn select(&mut self, key: &str) -> Result<&BackgroundDescriptor, PipelineError> {
        let found = self
            .options
            .find(key)
            .ok_or_else(|| PipelineError::UnknownBackground(key.to_owned()))?;
        self.selected.clone_from(&found.key);
        Ok(found)
    }

    /// The selected background descriptor.
    #[must_use]
    pub fn selected(&self) -> &BackgroundDescriptor {
        self.options
            .find(&self.selected)
            .unwrap_or_else(|| self.options.original())
    }

    /// Run the pipeline against the current state.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NotReady`] if no image is loaded, or any
    /// error from [`crate::run`].
    pub fn run(
        &self,
        threshold: Threshold,
        mode: RenderMode,
        images: &dyn BackgroundImages,
    ) -> Result<Rendered, PipelineError> {
        crate::run(
            self.source.as_ref(),
            threshold,
            self.selected(),
            mode,
            &self.config,
            images,
        )
    }

    /// Capture what a run needs, detached from the session.
    #[must_use]
    pub fn snapshot(&self) -> RenderSnapshot {
        RenderSnapshot {
            source: self.source.clone(),
            background: self.selected().clone(),
            config: self.config.clone(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(PipelineConfig::default(), CatalogConfig::default())
    }
}

/// Owned inputs for one run, safe to move to another thread.
#[derive(Debug, Clone)]
pub struct RenderSnapshot {
    /// Source image at capture time.
    pub source: Option<Arc<RgbaImage>>,
    /// Selected background at capture time.
    pub background: BackgroundDescriptor,
    /// Pipeline configuration at capture time.
    pub config: PipelineConfig,
}

impl RenderSnapshot {
    /// Run the pipeline against the captured state.
    ///
    /// # Errors
    ///
    /// Same as [`Session::run`].
    pub fn run(
        &self,
        threshold: Threshold,
        mode: RenderMode,
        images: &dyn BackgroundImages,
    ) -> Result<Rendered, PipelineError> {
        crate::run(
            self.source.as_ref(),
            threshold,
            &self.background,
            mode,
            &self.config,
            images,
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::background::BackgroundKind;
    use crate::materialize::NoBackgroundImages;

    fn landscape() -> RgbaImage {
        RgbaImage::from_fn(40, 20, |x, _| {
            if x < 10 {
                image::Rgba([0, 0, 0, 255])
            } else {
                image::Rgba([240, 240, 240, 255])
            }
        })
    }

    #[test]
    fn run_without_image_is_not_ready() {
        let session = Session::default();
        let err = session
            .run(Threshold::DEFAULT, RenderMode::Final, &NoBackgroundImages)
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::NotReady(NotReadyReason::NoImage)
        ));
    }

    #[test]
    fn resolve_without_image_is_not_ready() {
        let mut session = Session::default();
        assert!(session.resolve_with(|_| true).is_err());
    }

    #[test]
    fn load_image_reports_aspect() {
        let mut session = Session::default();
        assert_eq!(session.load_image(landscape()).unwrap(), AspectClass::Landscape);
        assert_eq!(session.aspect(), Some(AspectClass::Landscape));
    }

    #[test]
    fn load_empty_image_keeps_previous() {
        let mut session = Session::default();
        session.load_image(landscape()).unwrap();
        assert!(session.load_image(RgbaImage::new(0, 0)).is_err());
        assert_eq!(session.aspect(), Some(AspectClass::Landscape));
    }

    #[test]
    fn select_unknown_key_fails_and_keeps_selection() {
        let mut session = Session::default();
        session.select("rice").unwrap();
        let err = session.select("missing").unwrap_err();
        assert!(matches!(err, PipelineError::UnknownBackground(_)));
        assert_eq!(session.selected().key, "rice");
    }

    #[test]
    fn select_is_case_insensitive() {
        let mut session = Session::default();
        assert_eq!(session.select("SILK").unwrap().key, "silk");
    }

    #[test]
    fn selection_reverts_when_option_disappears() {
        let mut session = Session::default();
        session.load_image(landscape()).unwrap();
        session.resolve_with(|_| true).unwrap();
        session.select("xuan_paper").unwrap();

        // New discovery no longer contains the texture.
        session.resolve_with(|_| false).unwrap();
        assert!(session.selected().is_original());
    }

    #[test]
    fn selection_survives_new_upload_when_still_offered() {
        let mut session = Session::default();
        session.select("tea").unwrap();
        session.load_image(landscape()).unwrap();
        assert_eq!(session.selected().key, "tea");
    }

    #[test]
    fn texture_selection_survives_new_upload_when_still_offered() {
        let mut session = Session::default();
        session.load_image(landscape()).unwrap();
        session.resolve_with(|_| true).unwrap();
        session.select("xuan_paper").unwrap();

        session.load_image(landscape()).unwrap();
        // Base-only list until discovery for the new image finishes.
        assert!(session.selected().is_original());

        session.resolve_with(|_| true).unwrap();
        assert_eq!(session.selected().key, "xuan_paper");
    }

    #[test]
    fn texture_selection_reverts_when_new_upload_lacks_it() {
        let mut session = Session::default();
        session.load_image(landscape()).unwrap();
        session.resolve_with(|_| true).unwrap();
        session.select("landscape_scroll").unwrap();

        // Portrait uploads are not offered the horizontal directory.
        session
            .load_image(RgbaImage::from_pixel(20, 40, image::Rgba([9, 9, 9, 255])))
            .unwrap();
        session.resolve_with(|_| true).unwrap();
        assert!(session.selected().is_original());
        assert!(session.select("landscape_scroll").is_err());
    }

    #[test]
    fn default_selection_is_passthrough() {
        let mut session = Session::default();
        session.load_image(landscape()).unwrap();
        let rendered = session
            .run(Threshold::DEFAULT, RenderMode::Final, &NoBackgroundImages)
            .unwrap();
        assert!(rendered.passthrough);
        assert_eq!(rendered.image.as_raw(), landscape().as_raw());
    }

    #[test]
    fn solid_background_composites() {
        let mut session = Session::default();
        session.load_image(landscape()).unwrap();
        session.select("default").unwrap();
        let rendered = session
            .run(Threshold::DEFAULT, RenderMode::Final, &NoBackgroundImages)
            .unwrap();
        assert!(!rendered.passthrough);
        assert_eq!(rendered.image.get_pixel(5, 5).0, [0, 0, 0, 255]);
        assert_eq!(rendered.image.get_pixel(30, 5).0, [255, 255, 255, 255]);
    }

    #[test]
    fn snapshot_is_detached_from_later_uploads() {
        let mut session = Session::default();
        session.load_image(landscape()).unwrap();
        session.select("default").unwrap();
        let snapshot = session.snapshot();

        session
            .load_image(RgbaImage::from_pixel(5, 5, image::Rgba([0, 0, 0, 255])))
            .unwrap();

        let rendered = snapshot
            .run(Threshold::DEFAULT, RenderMode::Final, &NoBackgroundImages)
            .unwrap();
        assert_eq!(rendered.image.dimensions(), (40, 20));
        assert!(matches!(
            snapshot.background.kind,
            BackgroundKind::SolidColor { .. }
        ));
    }
}
