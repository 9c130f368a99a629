//! Error types for source acquisition.

use std::fmt;

/// Error type for source acquisition and capture operations.
#[derive(Debug)]
pub enum CaptureError {
    /// The user denied the capture-source prompt
    PermissionDenied(String),
    /// The user cancelled the capture-source prompt
    Cancelled,
    /// The requested capture target was not found
    TargetNotFound(String),
    /// The backend cannot satisfy the request (e.g. audio tracks)
    Unsupported(String),
    /// Platform-specific capture error
    PlatformError(String),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            CaptureError::Cancelled => write!(f, "Source selection cancelled"),
            CaptureError::TargetNotFound(msg) => write!(f, "Capture target not found: {}", msg),
            CaptureError::Unsupported(msg) => write!(f, "Unsupported request: {}", msg),
            CaptureError::PlatformError(msg) => write!(f, "Platform error: {}", msg),
        }
    }
}

impl std::error::Error for CaptureError {}

impl From<CaptureError> for String {
    fn from(err: CaptureError) -> Self {
        err.to_string()
    }
}
