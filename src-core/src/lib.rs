//! Core library for framegrab screen capture.
//!
//! Owns the capture-session state machine with its cross-thread context
//! handoff, the frame-grab worker loop, and the frame-ready event queue.
//! Frames come from a [`capture::CaptureProvider`] (a dynamically loaded
//! native library or the in-process synthetic provider) and go to a
//! [`sink::FrameSink`] such as the BMP file writer.
//!
//! The ownership model is the interesting part: a session is shared between
//! threads but never used concurrently. The capture context is an exclusive
//! capability tracked by an atomic owner word; the owning thread sets the
//! session up, releases the context, a worker thread binds it for the grab
//! loop, and the owner rebinds it for teardown.

pub mod capture;
pub mod events;
pub mod sink;

pub use capture::{
    BufferFormat, CaptureError, CaptureProvider, CaptureSession, FrameGrabResult, FrameReadyEvent,
    FrameSize, NativeProvider, SyntheticProvider, WorkerReport,
};
pub use events::{event_queue, EventQueue};
pub use sink::{BmpSink, FrameSink, NullSink};
