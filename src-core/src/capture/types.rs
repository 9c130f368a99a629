//! Shared types for source acquisition and frame delivery.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Receiver side of a live frame channel.
pub type FrameReceiver = mpsc::Receiver<SourceFrame>;

/// Shared flag used to request teardown of a live source.
///
/// Setting the flag is the only cancellation primitive: the producer
/// observes it, stops sending, and drops its sender, which ends the
/// consumer's read loop without an explicit cancel signal.
pub type StopHandle = Arc<AtomicBool>;

/// Hook invoked when a frame's underlying capture resource is released.
pub type ReleaseHook = Box<dyn FnOnce() + Send>;

/// Kind of display surface to capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceKind {
    /// A single application window
    #[default]
    Window,
    /// An entire display
    Display,
}

/// Parameters for acquiring a live source from a capture backend.
///
/// The default request matches the recording pipeline's needs: a
/// window-level video surface with no audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRequest {
    /// Which kind of surface to ask the platform for.
    pub kind: SurfaceKind,
    /// Whether to request audio tracks. The compositing pipeline never
    /// does; this exists so backends can reject unsupported requests.
    pub with_audio: bool,
}

impl Default for SourceRequest {
    fn default() -> Self {
        Self {
            kind: SurfaceKind::Window,
            with_audio: false,
        }
    }
}

/// A single live video frame with its native dimensions and BGRA pixel data.
///
/// Frames hold scarce capture-side resources. `close()` releases them;
/// callers must do so as soon as the frame has been drawn. Dropping a
/// frame without closing it releases the resource as a safety net.
pub struct SourceFrame {
    width: u32,
    height: u32,
    /// BGRA pixel data, `width * height * 4` bytes
    data: Vec<u8>,
    release: Option<ReleaseHook>,
}

impl SourceFrame {
    /// Create a frame that owns plain pixel data with no external resource.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
            release: None,
        }
    }

    /// Create a frame whose underlying resource is released through `hook`.
    pub fn with_release_hook(width: u32, height: u32, data: Vec<u8>, hook: ReleaseHook) -> Self {
        Self {
            width,
            height,
            data,
            release: Some(hook),
        }
    }

    /// Native display width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Native display height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// BGRA pixel data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Release the frame's underlying resource.
    pub fn close(mut self) {
        self.run_release();
    }

    fn run_release(&mut self) {
        self.data = Vec::new();
        if let Some(hook) = self.release.take() {
            hook();
        }
    }
}

impl Drop for SourceFrame {
    fn drop(&mut self) {
        self.run_release();
    }
}

impl fmt::Debug for SourceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}
