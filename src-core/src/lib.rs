//! canvasrec core: real-time frame compositing and capture pipeline.
//!
//! Pulls frames from a live capture source, draws them onto a
//! user-controlled canvas, records the canvas as an encoded chunk
//! stream, and transcodes the buffered recording into an animated GIF.

pub mod capture;
pub mod chunks;
pub mod compositor;
pub mod config;
pub mod logging;
pub mod preview;
pub mod recorder;
pub mod session;
pub mod surface;
pub mod transcode;
pub mod transform;
pub mod view;

pub use capture::{CaptureBackend, CaptureError, SourceFrame, SourceRequest, SourceStream};
pub use chunks::{ChunkBuffer, SharedChunkBuffer};
pub use session::CaptureSession;
pub use surface::{CanvasGeometry, CanvasSurface, SharedSurface};
pub use transform::{Transform, TransformCell, TransformPatch};
pub use view::{SideEffect, ViewEvent, ViewState, ViewStateMachine};
