//! Source acquisition seam.
//!
//! Platform display capture lives behind the [`CaptureBackend`] trait.
//! A backend turns a [`SourceRequest`] into a [`SourceStream`]: a frame
//! channel plus a stop handle. Backends must honor the stop handle by
//! ending their producer loop and dropping the sender, which is what
//! lets consumers observe completion.

pub mod error;
pub mod source;
pub mod types;

pub use error::CaptureError;
pub use source::SourceStream;
pub use types::{
    FrameReceiver, ReleaseHook, SourceFrame, SourceRequest, StopHandle, SurfaceKind,
};

/// Trait for acquiring live capture sources.
pub trait CaptureBackend: Send + Sync {
    /// Request a new live source from the platform.
    ///
    /// May fail if the user denies or cancels the capture-source
    /// prompt, or if the backend cannot satisfy the request.
    fn acquire(&self, request: &SourceRequest) -> Result<SourceStream, CaptureError>;
}
