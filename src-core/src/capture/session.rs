//! Capture session lifecycle and state.
//!
//! The session owns the provider handle, the single frame buffer, and the
//! capture context. The canonical lifecycle is
//! `open → configure → setup → [grab]* → teardown → close`; every
//! session-mutating call after `open` requires the calling thread to hold
//! the capture context, enforced through [`CaptureContext::ensure_owned`].
//!
//! Opening the session binds the context to the opening thread, matching
//! provider semantics where handle creation implies a bound context. The
//! typical flow is therefore: open/configure/setup on the owning thread,
//! `release`, hand the session to a worker thread which binds and grabs,
//! join the worker, `bind` again, teardown/close.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::{debug, info};

use crate::capture::context::CaptureContext;
use crate::capture::error::CaptureError;
use crate::capture::provider::{CaptureProvider, ProviderHandle, ProviderStatus, NULL_HANDLE};
use crate::capture::types::{BufferFormat, FrameGrabResult, FrameSize};

/// Lifecycle phase of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Closed,
    Open,
    Configured,
    Ready,
}

struct SessionInner {
    phase: Phase,
    handle: ProviderHandle,
    display_size: Option<FrameSize>,
    frame_size: Option<FrameSize>,
    format: Option<BufferFormat>,
    /// Single frame buffer, valid between setup and teardown. Mutated only
    /// by the thread that currently holds the capture context.
    buffer: Vec<u8>,
}

/// A capture session shared, non-concurrently, between threads.
///
/// The session itself is `Sync`; exclusivity is enforced by the capture
/// context, not by callers being on one particular thread.
pub struct CaptureSession {
    provider: Arc<dyn CaptureProvider>,
    context: CaptureContext,
    active_workers: AtomicU32,
    inner: Mutex<SessionInner>,
}

impl CaptureSession {
    /// Creates a closed session around the given provider.
    pub fn new(provider: Arc<dyn CaptureProvider>) -> Self {
        Self {
            provider,
            context: CaptureContext::unbound(),
            active_workers: AtomicU32::new(0),
            inner: Mutex::new(SessionInner {
                phase: Phase::Closed,
                handle: NULL_HANDLE,
                display_size: None,
                frame_size: None,
                format: None,
                buffer: Vec::new(),
            }),
        }
    }

    /// Establishes the provider connection and binds the capture context to
    /// the calling thread.
    ///
    /// Fails with `AlreadyOpen` on a second call, and with
    /// `ProviderUnavailable` when the provider cannot be reached or reports
    /// that capture is currently impossible.
    pub fn open(&self) -> Result<(), CaptureError> {
        self.context.claim()?;

        let mut inner = self.inner.lock().unwrap();
        if inner.phase != Phase::Closed {
            return Err(CaptureError::AlreadyOpen);
        }

        let handle = self.provider.open().map_err(|status| {
            CaptureError::ProviderUnavailable(self.describe(NULL_HANDLE, status))
        })?;

        let status = match self.provider.status(handle) {
            Ok(status) => status,
            Err(code) => {
                let msg = self.describe(handle, code);
                let _ = self.provider.close(handle);
                return Err(CaptureError::ProviderUnavailable(msg));
            }
        };
        if !status.can_capture {
            let _ = self.provider.close(handle);
            return Err(CaptureError::ProviderUnavailable(
                "provider reports capture is not currently possible".to_string(),
            ));
        }

        inner.handle = handle;
        inner.display_size = status.display_size;
        inner.phase = Phase::Open;
        info!("Capture session opened (handle: {})", handle);
        Ok(())
    }

    /// Declares a capture of fixed `size`, optionally compositing the
    /// cursor into each frame.
    ///
    /// The frame size is immutable until teardown. No state changes on
    /// failure.
    pub fn configure(&self, size: FrameSize, with_cursor: bool) -> Result<(), CaptureError> {
        self.context.ensure_owned()?;

        let mut inner = self.inner.lock().unwrap();
        if inner.phase != Phase::Open {
            return Err(CaptureError::SessionBusy);
        }
        if size.width == 0 || size.height == 0 {
            return Err(CaptureError::InvalidGeometry);
        }

        self.provider
            .configure(inner.handle, size, with_cursor)
            .map_err(|status| match status {
                ProviderStatus::InvalidParameter => CaptureError::InvalidGeometry,
                other => CaptureError::ProviderUnavailable(self.describe(inner.handle, other)),
            })?;

        inner.frame_size = Some(size);
        inner.phase = Phase::Configured;
        info!(
            "Capture session configured: {}x{}, cursor: {}",
            size.width, size.height, with_cursor
        );
        Ok(())
    }

    /// Obtains the frame buffer for `format` and starts frame delivery.
    pub fn setup(&self, format: BufferFormat) -> Result<(), CaptureError> {
        self.context.ensure_owned()?;

        let mut inner = self.inner.lock().unwrap();
        if inner.phase != Phase::Configured {
            return Err(CaptureError::SessionBusy);
        }

        let buffer_len =
            self.provider
                .setup(inner.handle, format)
                .map_err(|status| match status {
                    ProviderStatus::UnsupportedFormat => {
                        CaptureError::UnsupportedFormat(self.describe(inner.handle, status))
                    }
                    other => CaptureError::ProviderUnavailable(self.describe(inner.handle, other)),
                })?;

        inner.buffer = vec![0u8; buffer_len];
        inner.format = Some(format);
        inner.phase = Phase::Ready;
        info!("Capture session set up: {:?}, {} byte buffer", format, buffer_len);
        Ok(())
    }

    /// Blocks until the provider delivers a new frame into the session
    /// buffer.
    ///
    /// Only valid between setup and teardown, and only for the thread
    /// holding the capture context. The returned latency is telemetry, not
    /// a control input.
    pub fn grab(&self) -> Result<FrameGrabResult, CaptureError> {
        self.context.ensure_owned()?;

        let mut inner = self.inner.lock().unwrap();
        if inner.phase != Phase::Ready {
            return Err(CaptureError::GrabFailed(
                "session is not set up for grabbing".to_string(),
            ));
        }
        let handle = inner.handle;
        let expected = inner.frame_size.expect("frame size set in Ready phase");

        let started = Instant::now();
        let info = self
            .provider
            .grab(handle, &mut inner.buffer)
            .map_err(|status| CaptureError::GrabFailed(self.describe(handle, status)))?;
        let grab_latency_ms = started.elapsed().as_millis() as u64;

        if info.width != expected.width || info.height != expected.height {
            return Err(CaptureError::GrabFailed(format!(
                "provider delivered {}x{}, session is fixed at {}x{}",
                info.width, info.height, expected.width, expected.height
            )));
        }

        debug!(
            "Grabbed frame {} in {} ms ({} bytes)",
            info.frame_id, grab_latency_ms, info.byte_len
        );
        Ok(FrameGrabResult {
            frame_id: info.frame_id,
            width: info.width,
            height: info.height,
            grab_latency_ms,
        })
    }

    /// Lends the frame buffer to the calling thread.
    ///
    /// The borrow never escapes the closure, so the buffer cannot be
    /// aliased outside the bind/release window. The contents are whatever
    /// the most recent grab wrote; the next grab overwrites them.
    pub fn with_frame<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R, CaptureError> {
        self.context.ensure_owned()?;

        let inner = self.inner.lock().unwrap();
        if inner.phase != Phase::Ready {
            return Err(CaptureError::GrabFailed(
                "frame buffer is not set up".to_string(),
            ));
        }
        Ok(f(&inner.buffer))
    }

    /// Ends frame delivery and drops the frame buffer, reversing
    /// `configure` and `setup`.
    ///
    /// Fails with `SessionBusy` while a worker is active or when there is
    /// nothing to tear down.
    pub fn teardown(&self) -> Result<(), CaptureError> {
        if self.active_workers.load(Ordering::Acquire) > 0 {
            return Err(CaptureError::SessionBusy);
        }
        self.context.ensure_owned()?;

        let mut inner = self.inner.lock().unwrap();
        if inner.phase != Phase::Configured && inner.phase != Phase::Ready {
            return Err(CaptureError::SessionBusy);
        }

        self.provider
            .teardown(inner.handle)
            .map_err(|status| {
                CaptureError::ProviderUnavailable(self.describe(inner.handle, status))
            })?;

        inner.buffer = Vec::new();
        inner.frame_size = None;
        inner.format = None;
        inner.phase = Phase::Open;
        info!("Capture session torn down");
        Ok(())
    }

    /// Destroys the provider handle and releases the capture context,
    /// reversing `open`. The session may be opened again afterwards.
    pub fn close(&self) -> Result<(), CaptureError> {
        if self.active_workers.load(Ordering::Acquire) > 0 {
            return Err(CaptureError::SessionBusy);
        }
        self.context.ensure_owned()?;

        let mut inner = self.inner.lock().unwrap();
        if inner.phase != Phase::Open {
            return Err(CaptureError::SessionBusy);
        }

        self.provider
            .close(inner.handle)
            .map_err(|status| {
                CaptureError::ProviderUnavailable(self.describe(inner.handle, status))
            })?;

        inner.handle = NULL_HANDLE;
        inner.display_size = None;
        inner.phase = Phase::Closed;
        drop(inner);

        self.context.release()?;
        info!("Capture session closed");
        Ok(())
    }

    /// Binds the capture context to the calling thread.
    pub fn bind(&self) -> Result<(), CaptureError> {
        self.context.bind()
    }

    /// Releases the capture context held by the calling thread.
    pub fn release(&self) -> Result<(), CaptureError> {
        self.context.release()
    }

    /// Whether any thread currently holds the capture context.
    pub fn is_context_bound(&self) -> bool {
        self.context.is_bound()
    }

    /// Display size reported by the provider at open time, if known.
    pub fn display_size(&self) -> Option<FrameSize> {
        self.inner.lock().unwrap().display_size
    }

    /// Frame size fixed at configure time, if configured.
    pub fn frame_size(&self) -> Option<FrameSize> {
        self.inner.lock().unwrap().frame_size
    }

    /// Buffer format fixed at setup time, if set up.
    pub fn format(&self) -> Option<BufferFormat> {
        self.inner.lock().unwrap().format
    }

    pub(crate) fn worker_enter(&self) {
        self.active_workers.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn worker_exit(&self) {
        self.active_workers.fetch_sub(1, Ordering::AcqRel);
    }

    /// Formats a provider failure, surfacing the provider's last-error
    /// string unmodified.
    fn describe(&self, handle: ProviderHandle, status: ProviderStatus) -> String {
        let detail = self.provider.last_error(handle);
        if detail.is_empty() {
            format!("{:?}", status)
        } else {
            detail
        }
    }
}
