//! CLI command implementations.
//!
//! `capture` drives the full session lifecycle: the main thread opens,
//! configures, and sets up the session, releases the capture context, hands
//! the session to a dedicated worker thread for the grab loop, then rebinds
//! the context to tear everything down. A consumer thread drains the
//! frame-ready event queue for the duration of the run.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use framegrab_core::capture::worker;
use framegrab_core::{
    event_queue, BmpSink, BufferFormat, CaptureError, CaptureProvider, CaptureSession, FrameSink,
    FrameSize, NativeProvider, SyntheticProvider, NullSink, WorkerReport,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::colors;
use crate::exit_codes::ExitCode;
use crate::{CaptureOptions, FormatKind, ProviderKind, SinkKind};

/// How long the event consumer waits per poll before re-checking.
const CONSUMER_POLL: Duration = Duration::from_millis(200);

/// Summary printed after a capture run (pretty JSON with --json).
#[derive(Serialize)]
struct CaptureSummary {
    frames_requested: u32,
    frames_completed: u32,
    width: u32,
    height: u32,
    output_dir: Option<String>,
    report: WorkerReport,
}

fn build_provider(kind: ProviderKind) -> Result<Arc<dyn CaptureProvider>, String> {
    match kind {
        ProviderKind::Native => Ok(Arc::new(NativeProvider::load_default()?)),
        ProviderKind::Synthetic => Ok(Arc::new(
            SyntheticProvider::new().with_refresh_interval(Duration::from_millis(16)),
        )),
    }
}

fn stage_failed(stage: &str, err: &dyn std::fmt::Display, quiet: bool) {
    if !quiet {
        eprintln!("{}", colors::error(&format!("{} failed: {}", stage, err)));
    }
}

/// Resolves the output directory: `--output` (tilde-expanded), else the
/// user's pictures directory, else the current directory.
fn resolve_output_dir(output: Option<&str>) -> PathBuf {
    if let Some(raw) = output {
        return PathBuf::from(shellexpand::tilde(raw).into_owned());
    }
    directories::UserDirs::new()
        .and_then(|dirs| dirs.picture_dir().map(|p| p.join("framegrab")))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Capture frames through the full session lifecycle.
pub fn capture(options: CaptureOptions, json: bool, quiet: bool) -> ExitCode {
    let provider = match build_provider(options.provider) {
        Ok(provider) => provider,
        Err(e) => {
            stage_failed("provider load", &e, quiet);
            return ExitCode::ProviderUnavailable;
        }
    };
    let session = Arc::new(CaptureSession::new(provider));

    if let Err(e) = session.open() {
        stage_failed("open", &e, quiet);
        return ExitCode::ProviderUnavailable;
    }

    let size = match (options.width, options.height) {
        (Some(width), Some(height)) => FrameSize::new(width, height),
        (None, None) => match session.display_size() {
            Some(size) => size,
            None => {
                stage_failed(
                    "configure",
                    &"provider did not report a display size; pass --width and --height",
                    quiet,
                );
                let _ = session.close();
                return ExitCode::InvalidArguments;
            }
        },
        _ => {
            stage_failed("configure", &"pass both --width and --height", quiet);
            let _ = session.close();
            return ExitCode::InvalidArguments;
        }
    };

    let format = match options.format {
        FormatKind::Rgb => BufferFormat::Rgb,
        FormatKind::Bgra => BufferFormat::Bgra,
    };

    if let Err(e) = session.configure(size, !options.no_cursor) {
        stage_failed("configure", &e, quiet);
        let _ = session.close();
        return ExitCode::SessionSetupFailed;
    }
    if let Err(e) = session.setup(format) {
        stage_failed("setup", &e, quiet);
        let _ = session.close();
        return ExitCode::SessionSetupFailed;
    }

    let mut output_dir = None;
    let sink: Arc<dyn FrameSink> = match options.sink {
        SinkKind::Bmp => {
            let dir = resolve_output_dir(options.output.as_deref());
            match BmpSink::new(&dir) {
                Ok(sink) => {
                    output_dir = Some(dir);
                    Arc::new(sink)
                }
                Err(e) => {
                    stage_failed("sink", &e, quiet);
                    let _ = session.teardown();
                    let _ = session.close();
                    return ExitCode::SinkFailed;
                }
            }
        }
        SinkKind::Null => Arc::new(NullSink),
    };

    // Consumer side of the frame-ready queue, running for the whole grab
    // phase. It only observes; the worker sinks frames synchronously.
    let queue = event_queue();
    queue.start();
    let consumer = thread::spawn(move || loop {
        match queue.next_event(CONSUMER_POLL) {
            Ok(Some(event)) => {
                debug!(
                    "Frame {} ready: {}x{}, {} bytes",
                    event.frame_id, event.width, event.height, event.byte_len
                );
            }
            Ok(None) => continue,
            Err(_) => break,
        }
    });

    // Hand the capture context over to the worker thread.
    if let Err(e) = session.release() {
        stage_failed("context release", &e, quiet);
        queue.end();
        let _ = consumer.join();
        return ExitCode::GeneralError;
    }

    let worker_handle = worker::spawn(session.clone(), sink, options.frames);
    let worker_result = worker_handle.join().unwrap_or_else(|_| {
        Err(CaptureError::GrabFailed("worker thread panicked".to_string()))
    });

    queue.end();
    let _ = consumer.join();

    // Reclaim the context for teardown, mirroring the handoff in reverse.
    let mut teardown_code = None;
    if let Err(e) = session.bind() {
        stage_failed("context rebind", &e, quiet);
        teardown_code = Some(ExitCode::TeardownFailed);
    } else {
        if let Err(e) = session.teardown() {
            stage_failed("teardown", &e, quiet);
            teardown_code = Some(ExitCode::TeardownFailed);
        }
        if let Err(e) = session.close() {
            stage_failed("close", &e, quiet);
            teardown_code.get_or_insert(ExitCode::TeardownFailed);
        }
    }

    match worker_result {
        Ok(report) => {
            print_summary(&options, size, output_dir.as_deref(), report, json, quiet);
            teardown_code.unwrap_or(ExitCode::Success)
        }
        Err(err) => {
            let stage = match err {
                CaptureError::SinkFailed(_) => "sink",
                _ => "capture",
            };
            stage_failed(stage, &err, quiet);
            // Worker failure takes precedence over any teardown failure.
            match err {
                CaptureError::SinkFailed(_) => ExitCode::SinkFailed,
                _ => ExitCode::CaptureFailed,
            }
        }
    }
}

fn print_summary(
    options: &CaptureOptions,
    size: FrameSize,
    output_dir: Option<&std::path::Path>,
    report: WorkerReport,
    json: bool,
    quiet: bool,
) {
    if json {
        let summary = CaptureSummary {
            frames_requested: options.frames,
            frames_completed: report.frames_completed,
            width: size.width,
            height: size.height,
            output_dir: output_dir.map(|p| p.display().to_string()),
            report,
        };
        match serde_json::to_string_pretty(&summary) {
            Ok(out) => println!("{}", out),
            Err(e) => warn!("Failed to serialize summary: {}", e),
        }
        return;
    }
    if quiet {
        return;
    }

    println!(
        "{}",
        colors::success(&format!(
            "Captured {} frame(s) at {}x{}",
            report.frames_completed, size.width, size.height
        ))
    );
    if let Some(dir) = output_dir {
        println!("Frames written to {}", colors::path(&dir.display().to_string()));
    }
    if !report.iterations.is_empty() {
        let grab_total: u64 = report.iterations.iter().map(|s| s.grab_ms).sum();
        let sink_total: u64 = report.iterations.iter().map(|s| s.sink_ms).sum();
        let n = report.iterations.len() as u64;
        println!(
            "{}",
            colors::dim(&format!(
                "Average grab {} ms, average sink {} ms",
                grab_total / n,
                sink_total / n
            ))
        );
    }
}

/// Open the capture provider, report its status, and close again.
pub fn probe(kind: ProviderKind, json: bool, quiet: bool) -> ExitCode {
    let provider = match build_provider(kind) {
        Ok(provider) => provider,
        Err(e) => {
            stage_failed("provider load", &e, quiet);
            return ExitCode::ProviderUnavailable;
        }
    };

    let session = CaptureSession::new(provider);
    if let Err(e) = session.open() {
        stage_failed("open", &e, quiet);
        return ExitCode::ProviderUnavailable;
    }
    let display = session.display_size();

    if json {
        #[derive(Serialize)]
        struct ProbeSummary {
            can_capture: bool,
            display: Option<FrameSize>,
        }
        let summary = ProbeSummary {
            can_capture: true,
            display,
        };
        match serde_json::to_string_pretty(&summary) {
            Ok(out) => println!("{}", out),
            Err(e) => warn!("Failed to serialize probe result: {}", e),
        }
    } else if !quiet {
        println!("{}", colors::header("Capture provider"));
        println!("  capture: {}", colors::success("available"));
        match display {
            Some(size) => println!(
                "  display: {}",
                colors::number(&format!("{}x{}", size.width, size.height))
            ),
            None => println!("  display: {}", colors::dim("size not reported")),
        }
    }

    if let Err(e) = session.close() {
        stage_failed("close", &e, quiet);
        return ExitCode::TeardownFailed;
    }
    ExitCode::Success
}

/// Show version information.
pub fn version(json: bool) {
    if json {
        println!(
            "{{\"name\": \"framegrab\", \"version\": \"{}\"}}",
            env!("CARGO_PKG_VERSION")
        );
    } else {
        println!("framegrab {}", env!("CARGO_PKG_VERSION"));
    }
}
