//! Capture provider boundary.
//!
//! A provider is the component that actually produces frames. Session
//! lifecycle calls map 1:1 onto provider calls; each reports success or a
//! status code, and on failure the provider exposes a human-readable
//! last-error string keyed by the session handle, which is surfaced
//! unmodified in failure reports.

use crate::capture::types::{BufferFormat, FrameSize};

/// Opaque identifier for an open provider connection.
///
/// Created once per open, destroyed once per close, never copied between
/// sessions.
pub type ProviderHandle = u64;

/// Handle value used for errors that occur before a handle exists.
pub const NULL_HANDLE: ProviderHandle = 0;

/// Status codes reported by provider calls that fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStatus {
    /// The handle does not identify an open session
    InvalidHandle,
    /// A call parameter was rejected
    InvalidParameter,
    /// The requested buffer format is not supported
    UnsupportedFormat,
    /// The provider is not in a state that allows the call
    NotReady,
    /// Any other provider failure
    Failed,
}

/// Provider-reported state of the display pipeline, queried after open.
#[derive(Debug, Clone, Copy)]
pub struct DisplayStatus {
    /// Whether a capture session can currently be created
    pub can_capture: bool,
    /// Native size of the display, when the provider knows it
    pub display_size: Option<FrameSize>,
}

/// Information about one delivered frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameInfo {
    /// Monotonically increasing sequence number assigned per grab
    pub frame_id: u64,
    pub width: u32,
    pub height: u32,
    /// Bytes of the buffer actually written
    pub byte_len: usize,
}

/// The capture provider boundary.
///
/// Implementations must be callable from whichever thread currently holds
/// the capture context; the session guarantees the calls are never
/// concurrent for one handle.
pub trait CaptureProvider: Send + Sync {
    /// Establishes the provider connection and returns a fresh handle.
    fn open(&self) -> Result<ProviderHandle, ProviderStatus>;

    /// Queries the display pipeline state for the given handle.
    fn status(&self, handle: ProviderHandle) -> Result<DisplayStatus, ProviderStatus>;

    /// Declares a capture session of a fixed size, optionally with the
    /// cursor composited into each frame.
    fn configure(
        &self,
        handle: ProviderHandle,
        size: FrameSize,
        with_cursor: bool,
    ) -> Result<(), ProviderStatus>;

    /// Prepares frame delivery for the given buffer format.
    ///
    /// Returns the byte length the caller must allocate for one frame.
    fn setup(&self, handle: ProviderHandle, format: BufferFormat) -> Result<usize, ProviderStatus>;

    /// Blocks until a new frame is available and writes it into `buffer`.
    ///
    /// A new frame is one produced after the previous successful grab
    /// (display refresh or cursor movement), so every grab yields a frame
    /// that is genuinely new, never a duplicate.
    fn grab(&self, handle: ProviderHandle, buffer: &mut [u8]) -> Result<FrameInfo, ProviderStatus>;

    /// Reverses `setup` and `configure`, ending frame delivery.
    fn teardown(&self, handle: ProviderHandle) -> Result<(), ProviderStatus>;

    /// Destroys the handle and closes the provider connection.
    fn close(&self, handle: ProviderHandle) -> Result<(), ProviderStatus>;

    /// Human-readable description of the last failure on this handle.
    fn last_error(&self, handle: ProviderHandle) -> String;
}
