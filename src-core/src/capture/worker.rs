//! Capture worker loop.
//!
//! A worker binds the capture context, runs a configured number of
//! grab-and-sink iterations, and releases the context again:
//! `Idle → Bound → {Grabbing → Sinking}* → Releasing → Done`. On any grab
//! or sink failure it moves straight to the release, surfacing the error
//! and skipping the remaining iterations. The worker never retries; a
//! caller wanting retries runs a fresh worker.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tracing::{debug, info};

use crate::capture::error::CaptureError;
use crate::capture::session::CaptureSession;
use crate::capture::types::{FrameReadyEvent, FrameSize, IterationStats, WorkerReport};
use crate::events::event_queue;
use crate::sink::FrameSink;

/// Runs `frames` grab-and-sink iterations on the calling thread.
///
/// Binds the capture context first and always releases it before
/// returning, whatever the loop outcome. Zero iterations is a legal no-op
/// (bind immediately followed by release).
pub fn run(
    session: &CaptureSession,
    sink: &dyn FrameSink,
    frames: u32,
) -> Result<WorkerReport, CaptureError> {
    session.bind()?;
    debug!("Worker bound capture context");
    session.worker_enter();

    let outcome = run_bound(session, sink, frames);

    session.worker_exit();
    debug!("Worker releasing capture context");
    session.release()?;
    outcome
}

/// Spawns a dedicated worker thread running [`run`].
pub fn spawn(
    session: Arc<CaptureSession>,
    sink: Arc<dyn FrameSink>,
    frames: u32,
) -> thread::JoinHandle<Result<WorkerReport, CaptureError>> {
    thread::spawn(move || run(&session, sink.as_ref(), frames))
}

fn run_bound(
    session: &CaptureSession,
    sink: &dyn FrameSink,
    frames: u32,
) -> Result<WorkerReport, CaptureError> {
    let mut report = WorkerReport::default();
    if frames == 0 {
        debug!("Worker configured for zero iterations");
        return Ok(report);
    }

    let format = session.format().ok_or_else(|| {
        CaptureError::GrabFailed("session is not set up for grabbing".to_string())
    })?;

    info!("Worker capturing {} frames", frames);
    let mut last_frame_id: Option<u64> = None;

    for _ in 0..frames {
        let grab = session.grab()?;

        // Frame id gaps are diagnostic only; the blocking grab policy means
        // they never gate delivery.
        if let Some(prev) = last_frame_id {
            if grab.frame_id > prev + 1 {
                debug!(
                    "Frame id gap: {} frame(s) between {} and {}",
                    grab.frame_id - prev - 1,
                    prev,
                    grab.frame_id
                );
            }
        }
        last_frame_id = Some(grab.frame_id);

        // Notify any consumer. A stopped queue is an observability gap, not
        // a capture failure.
        let event = FrameReadyEvent {
            frame_id: grab.frame_id,
            width: grab.width,
            height: grab.height,
            byte_len: format.buffer_len(FrameSize::new(grab.width, grab.height)),
        };
        if let Err(e) = event_queue().add_event(event) {
            debug!("Frame-ready event not delivered: {}", e);
        }

        let sink_started = Instant::now();
        session
            .with_frame(|buf| sink.write_frame(format, buf, grab.width, grab.height))?
            .map_err(CaptureError::SinkFailed)?;
        let sink_ms = sink_started.elapsed().as_millis() as u64;

        info!(
            "Frame {} grabbed in {} ms, sunk in {} ms",
            grab.frame_id, grab.grab_latency_ms, sink_ms
        );
        report.iterations.push(IterationStats {
            frame_id: grab.frame_id,
            grab_ms: grab.grab_latency_ms,
            sink_ms,
        });
        report.frames_completed += 1;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::synthetic::SyntheticProvider;
    use crate::capture::types::BufferFormat;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Sink that counts calls and fails on the configured call number.
    struct FailOnNthSink {
        calls: AtomicU32,
        fail_on: u32,
    }

    impl FailOnNthSink {
        fn new(fail_on: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail_on,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl FrameSink for FailOnNthSink {
        fn write_frame(
            &self,
            _format: BufferFormat,
            _data: &[u8],
            _width: u32,
            _height: u32,
        ) -> Result<(), String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call == self.fail_on {
                Err("disk full".to_string())
            } else {
                Ok(())
            }
        }
    }

    /// Sink that accepts every frame and counts them.
    struct CountingSink {
        calls: AtomicU32,
    }

    impl CountingSink {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
            }
        }
    }

    impl FrameSink for CountingSink {
        fn write_frame(
            &self,
            _format: BufferFormat,
            _data: &[u8],
            _width: u32,
            _height: u32,
        ) -> Result<(), String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn ready_session() -> Arc<CaptureSession> {
        let provider = SyntheticProvider::new().with_refresh_interval(Duration::ZERO);
        let session = Arc::new(CaptureSession::new(Arc::new(provider)));
        session.open().unwrap();
        session.configure(FrameSize::new(6, 6), false).unwrap();
        session.setup(BufferFormat::Rgb).unwrap();
        session.release().unwrap();
        session
    }

    #[test]
    fn zero_iterations_is_bind_release_noop() {
        let session = ready_session();
        let sink = CountingSink::new();

        let report = run(&session, &sink, 0).unwrap();
        assert_eq!(report.frames_completed, 0);
        assert!(report.iterations.is_empty());
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);

        // The worker released the context; the session is rebindable.
        assert!(!session.is_context_bound());
        session.bind().unwrap();
        session.teardown().unwrap();
        session.close().unwrap();
    }

    #[test]
    fn full_run_sinks_every_frame() {
        let session = ready_session();
        let sink = Arc::new(CountingSink::new());

        let handle = spawn(session.clone(), sink.clone(), 4);
        let report = handle.join().unwrap().unwrap();

        assert_eq!(report.frames_completed, 4);
        assert_eq!(report.iterations.len(), 4);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 4);

        // Frame ids in the report are strictly increasing.
        for pair in report.iterations.windows(2) {
            assert!(pair[1].frame_id > pair[0].frame_id);
        }

        session.bind().unwrap();
        session.teardown().unwrap();
        session.close().unwrap();
    }

    #[test]
    fn sink_failure_terminates_loop_early_and_session_stays_usable() {
        let session = ready_session();
        let sink = Arc::new(FailOnNthSink::new(2));

        let handle = spawn(session.clone(), sink.clone(), 3);
        let err = handle.join().unwrap().unwrap_err();

        assert_eq!(err, CaptureError::SinkFailed("disk full".to_string()));
        // The second sink call failed, so exactly one iteration completed
        // and no third grab was attempted.
        assert_eq!(sink.calls(), 2);

        // A fresh bind by another thread succeeds and can keep grabbing.
        let remote = session.clone();
        thread::spawn(move || {
            remote.bind().unwrap();
            remote.grab().unwrap();
            remote.release().unwrap();
        })
        .join()
        .unwrap();

        session.bind().unwrap();
        session.teardown().unwrap();
        session.close().unwrap();
    }

    #[test]
    fn teardown_is_refused_while_worker_is_active() {
        let provider = SyntheticProvider::new().with_refresh_interval(Duration::from_millis(20));
        let session = Arc::new(CaptureSession::new(Arc::new(provider)));
        session.open().unwrap();
        session.configure(FrameSize::new(6, 6), false).unwrap();
        session.setup(BufferFormat::Rgb).unwrap();
        session.release().unwrap();

        let handle = spawn(session.clone(), Arc::new(CountingSink::new()), 5);

        // While the worker holds the context, teardown from here must fail;
        // either the worker-activity or the ownership check trips.
        let mut saw_refusal = false;
        for _ in 0..50 {
            match session.teardown() {
                Err(CaptureError::SessionBusy)
                | Err(CaptureError::ContextNotOwned)
                | Err(CaptureError::NotBound) => {
                    saw_refusal = true;
                }
                other => panic!("teardown unexpectedly returned {:?}", other),
            }
            thread::sleep(Duration::from_millis(1));
        }
        assert!(saw_refusal);

        handle.join().unwrap().unwrap();
        session.bind().unwrap();
        session.teardown().unwrap();
        session.close().unwrap();
    }
}
