//! ink-harmony-io: Native I/O around the sans-IO pipeline.
//!
//! Handles existence-by-load probing of background resources,
//! concurrent discovery with a decoded-texture cache, and the realtime
//! preview driver that debounces threshold changes and discards stale
//! renders.

pub mod library;
pub mod preview;
pub mod probe;

pub use library::{BackgroundLibrary, Discovery, ImageCache};
pub use preview::{PreviewFrame, PreviewHandle, PreviewRequest, render_final};
pub use probe::{FsProber, Prober};
