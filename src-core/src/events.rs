//! Frame-ready event queue.
//!
//! Decouples the capture worker's production cadence from a consumer's
//! processing cadence inside one process. The queue is a process-wide
//! singleton with at-most-once construction; events are delivered FIFO as
//! long as a single consumer drains them (draining order with multiple
//! consumers is unspecified).
//!
//! Events carry frame metadata only. The frame bytes live in the capture
//! session's single buffer, so an event goes stale as soon as the next grab
//! starts overwriting it.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, OnceLock};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::capture::error::CaptureError;
use crate::capture::types::FrameReadyEvent;

struct QueueInner {
    running: bool,
    buf: VecDeque<FrameReadyEvent>,
}

/// Mutex-guarded FIFO buffer of frame-ready notifications.
///
/// All operations hold the lock only for the append or pop itself, so a
/// producer is never blocked behind a slow consumer callback.
pub struct EventQueue {
    inner: Mutex<QueueInner>,
    cond: Condvar,
}

static EVENT_QUEUE: OnceLock<EventQueue> = OnceLock::new();

/// Returns the process-wide event queue, constructing it on first access.
///
/// Construction is guarded by the one-time initialization of `OnceLock`, so
/// concurrent first accesses never race to build two instances.
pub fn event_queue() -> &'static EventQueue {
    EVENT_QUEUE.get_or_init(EventQueue::new)
}

impl EventQueue {
    fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                running: false,
                buf: VecDeque::new(),
            }),
            cond: Condvar::new(),
        }
    }

    /// Starts the queue's active processing bracket.
    ///
    /// Calling `start` on a queue that is already running is a no-op.
    pub fn start(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.running {
            debug!("Event queue already running");
            return;
        }
        inner.running = true;
        debug!("Event queue started");
    }

    /// Ends the processing bracket, waking any blocked consumer.
    ///
    /// Undelivered events are dropped; their count is logged.
    pub fn end(&self) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.running {
            debug!("Event queue already stopped");
            return;
        }
        inner.running = false;
        let dropped = inner.buf.len();
        inner.buf.clear();
        drop(inner);
        self.cond.notify_all();
        if dropped > 0 {
            info!("Event queue stopped, dropped {} undelivered event(s)", dropped);
        } else {
            debug!("Event queue stopped");
        }
    }

    /// Appends an event, failing with `NotRunning` outside the
    /// start/end bracket.
    pub fn add_event(&self, event: FrameReadyEvent) -> Result<(), CaptureError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.running {
            return Err(CaptureError::NotRunning);
        }
        inner.buf.push_back(event);
        drop(inner);
        self.cond.notify_one();
        Ok(())
    }

    /// Waits up to `timeout` for the next event.
    ///
    /// Returns `Ok(None)` on timeout and `NotRunning` once the queue has
    /// been ended (or was never started).
    pub fn next_event(&self, timeout: Duration) -> Result<Option<FrameReadyEvent>, CaptureError> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock().unwrap();
        loop {
            if !inner.running {
                return Err(CaptureError::NotRunning);
            }
            if let Some(event) = inner.buf.pop_front() {
                return Ok(Some(event));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let (guard, _timeout_result) = self.cond.wait_timeout(inner, deadline - now).unwrap();
            inner = guard;
        }
    }

    /// Whether the queue is inside its start/end bracket.
    pub fn is_running(&self) -> bool {
        self.inner.lock().unwrap().running
    }
}
