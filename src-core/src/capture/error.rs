//! Error types for capture operations.

use std::fmt;

/// Error type for capture session, context, worker, and event queue operations.
///
/// Ownership violations (`NotBound`, `ContextBusy`, `ContextNotOwned`,
/// `SessionBusy`) indicate a bug in the calling sequence and are not
/// recoverable by retrying the same call. `GrabFailed` and `SinkFailed` end
/// the current worker run early but leave the session releasable and
/// reusable. `ProviderUnavailable` is fatal to the whole session lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The capture provider cannot be reached or refused the session
    ProviderUnavailable(String),
    /// The session is already open
    AlreadyOpen,
    /// The capture context is not bound to any thread
    NotBound,
    /// The capture context is already bound to a thread
    ContextBusy,
    /// The capture context is bound to a different thread than the caller
    ContextNotOwned,
    /// A capture dimension is zero
    InvalidGeometry,
    /// The provider rejected the requested buffer format
    UnsupportedFormat(String),
    /// The session has an active worker or is not in a teardown-able state
    SessionBusy,
    /// A frame grab failed
    GrabFailed(String),
    /// The frame sink rejected a frame
    SinkFailed(String),
    /// The event queue is not running
    NotRunning,
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::ProviderUnavailable(msg) => {
                write!(f, "Capture provider unavailable: {}", msg)
            }
            CaptureError::AlreadyOpen => write!(f, "Session is already open"),
            CaptureError::NotBound => write!(f, "Capture context is not bound"),
            CaptureError::ContextBusy => write!(f, "Capture context is bound to another thread"),
            CaptureError::ContextNotOwned => {
                write!(f, "Capture context is not owned by the calling thread")
            }
            CaptureError::InvalidGeometry => {
                write!(f, "Invalid geometry: width and height must be nonzero")
            }
            CaptureError::UnsupportedFormat(msg) => write!(f, "Unsupported format: {}", msg),
            CaptureError::SessionBusy => write!(f, "Session is busy"),
            CaptureError::GrabFailed(msg) => write!(f, "Frame grab failed: {}", msg),
            CaptureError::SinkFailed(msg) => write!(f, "Frame sink failed: {}", msg),
            CaptureError::NotRunning => write!(f, "Event queue is not running"),
        }
    }
}

impl std::error::Error for CaptureError {}

impl From<CaptureError> for String {
    fn from(err: CaptureError) -> Self {
        err.to_string()
    }
}
