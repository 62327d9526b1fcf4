//! Realtime preview driver.
//!
//! While the threshold control moves, previews are requested far faster
//! than they can be rendered. The driver collects requests for a short
//! window, keeps only the newest, renders it in realtime mode on the
//! blocking pool, and publishes the frame on a `watch` channel. The
//! window is bounded from its first request, so a slider that never
//! pauses still gets a frame per window. Every request carries a
//! [`Ticket`]; a frame is published only if it is newer than the one on
//! screen, so a slow render can never overwrite a newer one.

use std::sync::Arc;
use std::time::Duration;

use ink_harmony_pipeline::{
    LatestSlot, NotReadyReason, PipelineError, RenderMode, RenderSnapshot, Rendered, Sequencer,
    Threshold, Ticket,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::library::ImageCache;

/// Default coalescing window before a preview is rendered.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(30);

/// One preview request.
#[derive(Debug, Clone)]
pub struct PreviewRequest {
    /// Session state to render.
    pub snapshot: RenderSnapshot,
    /// Threshold control value.
    pub threshold: Threshold,
    /// Loaded background textures.
    pub images: Arc<ImageCache>,
}

/// A published preview.
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    /// Ticket of the request that produced this frame.
    pub ticket: Ticket,
    /// The realtime render.
    pub rendered: Rendered,
}

/// Sending side of a running preview driver.
pub struct PreviewHandle {
    requests: mpsc::UnboundedSender<(Ticket, PreviewRequest)>,
    sequencer: Arc<Sequencer>,
    task: JoinHandle<()>,
}

impl PreviewHandle {
    /// Queue a preview. Any older queued request is superseded.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NotReady`] with
    /// [`NotReadyReason::BackendUnavailable`] if the driver has stopped.
    pub fn request(&self, request: PreviewRequest) -> Result<Ticket, PipelineError> {
        let ticket = self.sequencer.issue();
        self.requests
            .send((ticket, request))
            .map_err(|_| PipelineError::NotReady(NotReadyReason::BackendUnavailable))?;
        Ok(ticket)
    }

    /// The newest ticket issued.
    #[must_use]
    pub fn latest(&self) -> Option<Ticket> {
        self.sequencer.latest()
    }

    /// Stop accepting requests and wait for the driver to finish the
    /// request it is working on.
    pub async fn shutdown(self) {
        drop(self.requests);
        if let Err(err) = self.task.await {
            tracing::debug!(%err, "preview driver task ended abnormally");
        }
    }
}

/// Spawn a preview driver on the current tokio runtime.
///
/// Returns the request handle and a receiver for published frames.
///
/// # Panics
///
/// Panics if called outside a tokio runtime, like [`tokio::spawn`].
#[must_use]
pub fn spawn(debounce: Duration) -> (PreviewHandle, watch::Receiver<Option<Arc<PreviewFrame>>>) {
    let (requests, rx) = mpsc::unbounded_channel();
    let (frames, frames_rx) = watch::channel(None);
    let sequencer = Arc::new(Sequencer::new());
    let task = tokio::spawn(drive(rx, Arc::clone(&sequencer), frames, debounce));
    (
        PreviewHandle {
            requests,
            sequencer,
            task,
        },
        frames_rx,
    )
}

async fn drive(
    mut rx: mpsc::UnboundedReceiver<(Ticket, PreviewRequest)>,
    sequencer: Arc<Sequencer>,
    frames: watch::Sender<Option<Arc<PreviewFrame>>>,
    debounce: Duration,
) {
    let mut shown: LatestSlot<Arc<PreviewFrame>> = LatestSlot::new();

    while let Some(mut pending) = rx.recv().await {
        // Coalesce everything that arrives within `debounce` of the first
        // request. The window does not restart, so a continuous drag
        // still renders once per window.
        let deadline = tokio::time::Instant::now() + debounce;
        loop {
            tokio::select! {
                next = rx.recv() => match next {
                    Some(newer) => pending = newer,
                    None => break,
                },
                () = tokio::time::sleep_until(deadline) => break,
            }
        }
        while let Ok(newer) = rx.try_recv() {
            pending = newer;
        }

        let (ticket, request) = pending;
        if !sequencer.is_current(ticket) {
            tracing::trace!(
                ticket = ticket.get(),
                latest = ?sequencer.latest(),
                "rendering while newer requests are in flight"
            );
        }

        let rendered = tokio::task::spawn_blocking(move || {
            request
                .snapshot
                .run(request.threshold, RenderMode::Realtime, request.images.as_ref())
        })
        .await;

        match rendered {
            Ok(Ok(rendered)) => {
                let frame = Arc::new(PreviewFrame { ticket, rendered });
                if shown.advance(ticket, Arc::clone(&frame)) {
                    frames.send_replace(Some(frame));
                }
            }
            // Realtime failures are never surfaced to the user.
            Ok(Err(err)) => tracing::debug!(%err, ticket = ticket.get(), "realtime preview failed"),
            Err(err) => tracing::debug!(%err, ticket = ticket.get(), "realtime preview task failed"),
        }
    }
    tracing::debug!("preview driver stopped");
}

/// Render in final mode on the blocking pool.
///
/// # Errors
///
/// Returns any [`PipelineError`] from the run, or
/// [`PipelineError::NotReady`] with [`NotReadyReason::BackendUnavailable`]
/// if the blocking task could not complete.
pub async fn render_final(
    snapshot: RenderSnapshot,
    threshold: Threshold,
    images: Arc<ImageCache>,
) -> Result<Rendered, PipelineError> {
    tokio::task::spawn_blocking(move || {
        snapshot.run(threshold, RenderMode::Final, images.as_ref())
    })
    .await
    .map_err(|err| {
        tracing::debug!(%err, "final render task failed");
        PipelineError::NotReady(NotReadyReason::BackendUnavailable)
    })?
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ink_harmony_pipeline::{RgbaImage, Session};

    use super::*;

    fn session() -> Session {
        let mut session = Session::default();
        session
            .load_image(RgbaImage::from_fn(64, 48, |x, _| {
                let v = u8::try_from(x * 4).unwrap();
                image::Rgba([v, v, v, 255])
            }))
            .unwrap();
        session.select("default").unwrap();
        session
    }

    fn request(session: &Session, threshold: u8) -> PreviewRequest {
        PreviewRequest {
            snapshot: session.snapshot(),
            threshold: Threshold::new(threshold),
            images: Arc::new(ImageCache::new()),
        }
    }

    #[tokio::test]
    async fn rapid_requests_coalesce_to_latest() {
        let session = session();
        let (handle, mut frames) = spawn(Duration::from_millis(50));

        let mut last = None;
        for t in [10, 60, 110, 160, 210] {
            last = Some(handle.request(request(&session, t)).unwrap());
        }

        tokio::time::timeout(Duration::from_secs(5), frames.changed())
            .await
            .unwrap()
            .unwrap();
        let frame = frames.borrow_and_update().clone().unwrap();
        assert_eq!(Some(frame.ticket), last);
        assert_eq!(frame.rendered.mode, RenderMode::Realtime);
        assert_eq!(frame.rendered.image.dimensions(), (64, 48));

        // Nothing older is published afterwards.
        assert!(
            tokio::time::timeout(Duration::from_millis(200), frames.changed())
                .await
                .is_err()
        );
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn frame_reflects_requested_threshold() {
        let session = session();
        let (handle, mut frames) = spawn(Duration::from_millis(1));

        handle.request(request(&session, 0)).unwrap();
        tokio::time::timeout(Duration::from_secs(5), frames.changed())
            .await
            .unwrap()
            .unwrap();
        let frame = frames.borrow_and_update().clone().unwrap();
        // Threshold zero inks nothing: the white background shows through.
        assert!(frame.rendered.image.pixels().all(|p| p.0 == [255, 255, 255, 255]));
        handle.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn continuous_drag_publishes_frames_before_release() {
        let session = session();
        let (handle, frames) = spawn(DEFAULT_DEBOUNCE);

        // Steps arrive faster than the coalescing window.
        let mut first_seen = None;
        for step in 0..40_u8 {
            handle.request(request(&session, step * 5)).unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
            if first_seen.is_none() && frames.borrow().is_some() {
                first_seen = Some(step);
            }
        }
        let released = handle.latest().unwrap();
        let first_seen = first_seen.unwrap();
        assert!(first_seen < 39, "first frame only after the drag ended");

        handle.shutdown().await;
        let last = frames.borrow().clone().unwrap();
        assert_eq!(last.ticket, released);
    }

    #[tokio::test]
    async fn failing_render_publishes_nothing() {
        let (handle, mut frames) = spawn(Duration::from_millis(1));
        // No image loaded: the run fails with NotReady, which is swallowed.
        let empty = Session::default();
        handle.request(request(&empty, 128)).unwrap();
        assert!(
            tokio::time::timeout(Duration::from_millis(200), frames.changed())
                .await
                .is_err()
        );
        assert!(frames.borrow().is_none());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn request_after_driver_stops_is_backend_unavailable() {
        let (handle, _frames) = spawn(DEFAULT_DEBOUNCE);
        handle.task.abort();
        // Wait for the abort to drop the receiver.
        while !handle.requests.is_closed() {
            tokio::task::yield_now().await;
        }
        let err = handle.request(request(&session(), 1)).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::NotReady(NotReadyReason::BackendUnavailable)
        ));
    }

    #[tokio::test]
    async fn final_render_runs_off_thread() {
        let session = session();
        let rendered = render_final(session.snapshot(), Threshold::DEFAULT, Arc::new(ImageCache::new()))
            .await
            .unwrap();
        assert!(rendered.is_exportable());
    }
}
