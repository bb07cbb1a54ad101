//! Runtime types shared across the capture session, worker, and event queue.

use serde::Serialize;

/// Fixed width and height of a capture session, established at configure time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Uncompressed per-pixel buffer format delivered by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferFormat {
    /// 3 bytes per pixel, red first
    Rgb,
    /// 4 bytes per pixel, blue first
    Bgra,
}

impl BufferFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            BufferFormat::Rgb => 3,
            BufferFormat::Bgra => 4,
        }
    }

    /// Buffer length in bytes for one frame of the given size.
    pub fn buffer_len(self, size: FrameSize) -> usize {
        self.bytes_per_pixel() * size.width as usize * size.height as usize
    }
}

/// Result of one successful blocking grab.
///
/// `frame_id` is assigned by the provider and increases monotonically per
/// grab. Gaps are diagnostic only; the blocking grab policy guarantees every
/// call yields a genuinely new frame. The latency field is observability
/// telemetry and is never used for control decisions.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FrameGrabResult {
    pub frame_id: u64,
    pub width: u32,
    pub height: u32,
    pub grab_latency_ms: u64,
}

/// Frame-ready notification delivered through the event queue.
///
/// Carries frame metadata only. The frame bytes stay in the session's single
/// buffer, so an event is stale once the next grab starts overwriting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReadyEvent {
    pub frame_id: u64,
    pub width: u32,
    pub height: u32,
    pub byte_len: usize,
}

/// Per-iteration timing telemetry recorded by the capture worker.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct IterationStats {
    pub frame_id: u64,
    pub grab_ms: u64,
    pub sink_ms: u64,
}

/// Summary of a completed (or early-terminated) worker run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkerReport {
    pub frames_completed: u32,
    pub iterations: Vec<IterationStats>,
}
