//! Live source stream handed out by capture backends.

use super::types::{FrameReceiver, SourceFrame, StopHandle};
use futures_util::Stream;
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::task::{Context, Poll};

/// A live sequence of video frames from a selected display or window.
///
/// Owned exclusively by the consumer once acquired. Frames arrive in
/// capture order; `next_frame()` returning `None` means the source has
/// ended, either naturally or because its tracks were stopped.
pub struct SourceStream {
    frames: FrameReceiver,
    stop: StopHandle,
}

impl SourceStream {
    /// Bundle a frame channel and its producer-side stop flag.
    pub fn new(frames: FrameReceiver, stop: StopHandle) -> Self {
        Self { frames, stop }
    }

    /// Await the next frame. Returns `None` once the producer has
    /// stopped sending and the channel is drained.
    pub async fn next_frame(&mut self) -> Option<SourceFrame> {
        self.frames.recv().await
    }

    /// Handle that stops every track of this source when set.
    ///
    /// Teardown is push-based: the producer observes the flag, stops
    /// sending, and drops its sender, so the next `next_frame()` call
    /// reports completion on its own.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Stop all tracks of this source.
    pub fn stop_tracks(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

impl Stream for SourceStream {
    type Item = SourceFrame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.frames.poll_recv(cx)
    }
}

impl std::fmt::Debug for SourceStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceStream")
            .field("stopped", &self.stop.load(Ordering::SeqCst))
            .finish()
    }
}
