//! Capture session lifecycle.
//!
//! A [`CaptureSession`] owns source acquisition, the compositor loop,
//! the surface-to-stream bridge, and the recorder feeding the chunk
//! buffer. At most one source, one surface stream, and one recorder
//! are alive at a time; starting anew tears the previous instances
//! down first.

use crate::capture::{CaptureBackend, CaptureError, SourceRequest, StopHandle};
use crate::chunks::{ChunkBuffer, SharedChunkBuffer};
use crate::compositor::composite_frames;
use crate::recorder::{drive_recorder, ChunkRecorder};
use crate::surface::{CanvasGeometry, CanvasSurface, SharedSurface};
use crate::transform::{Transform, TransformCell};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How long teardown waits for a loop to observe track teardown before
/// aborting it.
const TEARDOWN_WAIT: Duration = Duration::from_secs(2);

/// Buffered chunks in flight between the recorder and the append task.
const CHUNK_CHANNEL_CAPACITY: usize = 64;

/// Owns the live-capture pipeline for one capture view.
pub struct CaptureSession {
    backend: Arc<dyn CaptureBackend>,
    surface: SharedSurface,
    transform: TransformCell,
    chunks: SharedChunkBuffer,

    source_stop: Option<StopHandle>,
    compositor_task: Option<JoinHandle<()>>,

    surface_stop: Option<StopHandle>,
    sampler_task: Option<JoinHandle<Result<(), String>>>,
    append_task: Option<JoinHandle<()>>,
}

impl CaptureSession {
    /// Create a session compositing onto a canvas of the given geometry.
    pub fn new(backend: Arc<dyn CaptureBackend>, geometry: CanvasGeometry) -> Self {
        Self {
            backend,
            surface: CanvasSurface::shared(geometry),
            transform: TransformCell::new(Transform::default()),
            chunks: ChunkBuffer::shared(),
            source_stop: None,
            compositor_task: None,
            surface_stop: None,
            sampler_task: None,
            append_task: None,
        }
    }

    /// Shared handle to the compositing surface.
    pub fn surface(&self) -> SharedSurface {
        self.surface.clone()
    }

    /// Shared handle to the compositing transform.
    pub fn transform(&self) -> TransformCell {
        self.transform.clone()
    }

    /// Shared handle to the recorded chunk buffer.
    pub fn chunks(&self) -> SharedChunkBuffer {
        self.chunks.clone()
    }

    /// Whether a source is currently being composited.
    pub fn has_source(&self) -> bool {
        self.compositor_task
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    /// Whether a recording is currently in progress.
    pub fn is_recording(&self) -> bool {
        self.sampler_task
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    /// Resize the canvas. Clamped; clears the surface.
    pub async fn resize_canvas(&self, geometry: CanvasGeometry) {
        self.surface.lock().await.resize(geometry);
    }

    /// Select a new capture source and begin compositing it.
    ///
    /// Any prior source is fully stopped (all tracks) before the new
    /// one is acquired. Acquisition failure (denied or cancelled
    /// prompt) is reported and leaves the session without a source;
    /// nothing else changes.
    pub async fn select_source(&mut self, request: &SourceRequest) -> Result<(), CaptureError> {
        self.stop_source().await;

        let source = match self.backend.acquire(request) {
            Ok(source) => source,
            Err(e) => {
                warn!("Source acquisition failed: {}", e);
                return Err(e);
            }
        };

        self.source_stop = Some(source.stop_handle());
        self.compositor_task = Some(tokio::spawn(composite_frames(
            source,
            self.surface.clone(),
            self.transform.clone(),
        )));
        debug!("source selected, compositor running");
        Ok(())
    }

    /// Start recording the canvas at `frame_rate` frames per second.
    ///
    /// Clears the chunk buffer, derives a stream from the surface, and
    /// binds a recorder whose chunks are appended to the buffer in
    /// arrival order. Recorder construction failure is logged and
    /// returned; no recording state is left behind.
    pub async fn start(&mut self, frame_rate: u32) -> Result<(), String> {
        self.stop_recording().await;

        let geometry = self.surface.lock().await.geometry();
        let (chunk_tx, mut chunk_rx) = mpsc::channel::<Vec<u8>>(CHUNK_CHANNEL_CAPACITY);

        // Construct the recorder before touching the chunk buffer so a
        // construction failure leaves any prior take intact.
        let recorder = match ChunkRecorder::start(geometry, frame_rate, chunk_tx) {
            Ok(recorder) => recorder,
            Err(e) => {
                warn!("Recorder construction failed: {}", e);
                return Err(e);
            }
        };
        self.chunks.lock().await.clear();

        let chunks = self.chunks.clone();
        self.append_task = Some(tokio::spawn(async move {
            while let Some(chunk) = chunk_rx.recv().await {
                chunks.lock().await.append(chunk);
            }
        }));

        let stop: StopHandle = Arc::new(AtomicBool::new(false));
        self.surface_stop = Some(stop.clone());
        self.sampler_task = Some(tokio::spawn(drive_recorder(
            self.surface.clone(),
            frame_rate,
            stop,
            recorder,
        )));
        debug!("recording started at {} fps", frame_rate);
        Ok(())
    }

    /// Stop every track of the source and the surface stream.
    ///
    /// Idempotent; safe to call when neither exists. Track teardown
    /// implicitly ends the recorder's data flow, and the final chunk is
    /// appended before this returns.
    pub async fn stop(&mut self) {
        self.stop_source().await;
        self.stop_recording().await;
    }

    async fn stop_source(&mut self) {
        if let Some(stop) = self.source_stop.take() {
            stop.store(true, Ordering::SeqCst);
        }
        if let Some(mut task) = self.compositor_task.take() {
            if tokio::time::timeout(TEARDOWN_WAIT, &mut task).await.is_err() {
                // A backend that ignores the stop flag keeps the loop
                // alive; abort it so it cannot draw over a successor.
                warn!("compositor did not end after track teardown, aborting it");
                task.abort();
                let _ = task.await;
            }
        }
    }

    async fn stop_recording(&mut self) {
        if let Some(stop) = self.surface_stop.take() {
            stop.store(true, Ordering::SeqCst);
        }
        if let Some(task) = self.sampler_task.take() {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Recorder ended with error: {}", e),
                Err(e) => warn!("Recorder task error: {}", e),
            }
        }
        // The recorder has flushed by now; drain the remaining chunks.
        if let Some(task) = self.append_task.take() {
            let _ = task.await;
        }
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("has_source", &self.has_source())
            .field("is_recording", &self.is_recording())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{SourceFrame, SourceStream};
    use std::sync::Mutex as StdMutex;

    /// Backend that hands out empty sources and records, at each
    /// acquisition, whether every previously handed-out source had its
    /// stop flag set.
    struct MockBackend {
        handed_out: StdMutex<Vec<StopHandle>>,
        priors_stopped_at_acquire: StdMutex<Vec<bool>>,
    }

    impl MockBackend {
        fn new() -> Self {
            Self {
                handed_out: StdMutex::new(Vec::new()),
                priors_stopped_at_acquire: StdMutex::new(Vec::new()),
            }
        }
    }

    impl CaptureBackend for MockBackend {
        fn acquire(&self, _request: &SourceRequest) -> Result<SourceStream, CaptureError> {
            let mut handed_out = self.handed_out.lock().unwrap();
            let priors_stopped = handed_out
                .iter()
                .all(|stop| stop.load(Ordering::SeqCst));
            self.priors_stopped_at_acquire
                .lock()
                .unwrap()
                .push(priors_stopped);

            let (tx, rx) = mpsc::channel(4);
            // A couple of frames, then natural exhaustion.
            let _ = tx.try_send(SourceFrame::new(2, 2, vec![1; 16]));
            let _ = tx.try_send(SourceFrame::new(2, 2, vec![2; 16]));
            drop(tx);

            let stop: StopHandle = Arc::new(AtomicBool::new(false));
            handed_out.push(stop.clone());
            Ok(SourceStream::new(rx, stop))
        }
    }

    /// Backend whose producer ignores the stop flag entirely and keeps
    /// sending fresh frames.
    struct RunawayBackend;

    impl CaptureBackend for RunawayBackend {
        fn acquire(&self, _request: &SourceRequest) -> Result<SourceStream, CaptureError> {
            let (tx, rx) = mpsc::channel(4);
            tokio::spawn(async move {
                let mut v: u8 = 0;
                loop {
                    v = v.wrapping_add(1);
                    if tx.send(SourceFrame::new(2, 2, vec![v; 16])).await.is_err() {
                        break;
                    }
                    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                }
            });
            Ok(SourceStream::new(rx, Arc::new(AtomicBool::new(false))))
        }
    }

    /// Backend that always reports a denied prompt.
    struct DenyingBackend;

    impl CaptureBackend for DenyingBackend {
        fn acquire(&self, _request: &SourceRequest) -> Result<SourceStream, CaptureError> {
            Err(CaptureError::PermissionDenied("test".to_string()))
        }
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let backend = Arc::new(MockBackend::new());
        let mut session = CaptureSession::new(backend, CanvasGeometry::new(32, 32));

        session.stop().await;
        session.stop().await;
    }

    #[tokio::test]
    async fn reselecting_stops_the_prior_source_first() {
        let backend = Arc::new(MockBackend::new());
        let mut session =
            CaptureSession::new(backend.clone(), CanvasGeometry::new(32, 32));

        session.select_source(&SourceRequest::default()).await.unwrap();
        session.select_source(&SourceRequest::default()).await.unwrap();
        session.select_source(&SourceRequest::default()).await.unwrap();

        let observed = backend.priors_stopped_at_acquire.lock().unwrap();
        assert_eq!(observed.as_slice(), &[true, true, true]);
    }

    #[tokio::test]
    async fn acquisition_failure_leaves_session_unchanged() {
        let mut session =
            CaptureSession::new(Arc::new(DenyingBackend), CanvasGeometry::new(32, 32));

        let result = session.select_source(&SourceRequest::default()).await;
        assert!(result.is_err());
        assert!(!session.has_source());

        // Still safe to stop afterwards.
        session.stop().await;
    }

    #[tokio::test]
    async fn stop_aborts_a_compositor_whose_source_ignores_teardown() {
        let mut session =
            CaptureSession::new(Arc::new(RunawayBackend), CanvasGeometry::new(32, 32));

        session.select_source(&SourceRequest::default()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        session.stop().await;
        assert!(!session.has_source());

        // Nothing may draw onto the surface once stop() has returned.
        let surface = session.surface();
        let before = surface.lock().await.pixels()[0];
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let after = surface.lock().await.pixels()[0];
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn compositing_draws_acquired_frames() {
        let backend = Arc::new(MockBackend::new());
        let mut session = CaptureSession::new(backend, CanvasGeometry::new(32, 32));

        session.select_source(&SourceRequest::default()).await.unwrap();
        // The mock source is finite; wait for the compositor to drain it.
        if let Some(task) = session.compositor_task.take() {
            task.await.unwrap();
        }

        let surface = session.surface();
        let canvas = surface.lock().await;
        assert_eq!(&canvas.pixels()[0..4], &[2, 2, 2, 2]);
    }
}
