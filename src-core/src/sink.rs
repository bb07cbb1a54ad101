//! Frame sinks.
//!
//! A sink is the external consumer of raw frames: it accepts a pixel format
//! tag, the raw buffer, and the frame dimensions, and either stores the
//! frame durably or discards it. Sink failures end the current worker run
//! but never corrupt session state.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::capture::types::BufferFormat;

/// Destination for captured frames.
pub trait FrameSink: Send + Sync {
    /// Consumes one raw frame. Returns a failure description on error.
    fn write_frame(
        &self,
        format: BufferFormat,
        data: &[u8],
        width: u32,
        height: u32,
    ) -> Result<(), String>;
}

/// Sink that encodes each frame as a BMP file in an output directory.
///
/// Files are named `frame<n>.bmp` by write order.
pub struct BmpSink {
    out_dir: PathBuf,
    next_index: AtomicU64,
}

impl BmpSink {
    /// Creates the sink, creating the output directory if needed.
    pub fn new(out_dir: impl Into<PathBuf>) -> Result<Self, String> {
        let out_dir = out_dir.into();
        std::fs::create_dir_all(&out_dir)
            .map_err(|e| format!("Failed to create {}: {}", out_dir.display(), e))?;
        Ok(Self {
            out_dir,
            next_index: AtomicU64::new(0),
        })
    }

    pub fn out_dir(&self) -> &std::path::Path {
        &self.out_dir
    }
}

impl FrameSink for BmpSink {
    fn write_frame(
        &self,
        format: BufferFormat,
        data: &[u8],
        width: u32,
        height: u32,
    ) -> Result<(), String> {
        let expected = format.bytes_per_pixel() * width as usize * height as usize;
        if data.len() != expected {
            return Err(format!(
                "frame buffer is {} bytes, expected {} for {}x{} {:?}",
                data.len(),
                expected,
                width,
                height,
                format
            ));
        }

        let index = self.next_index.fetch_add(1, Ordering::Relaxed);
        let path = self.out_dir.join(format!("frame{}.bmp", index));

        let result = match format {
            BufferFormat::Rgb => image::save_buffer_with_format(
                &path,
                data,
                width,
                height,
                image::ExtendedColorType::Rgb8,
                image::ImageFormat::Bmp,
            ),
            BufferFormat::Bgra => {
                // The encoder expects RGBA channel order.
                let mut rgba = data.to_vec();
                for px in rgba.chunks_exact_mut(4) {
                    px.swap(0, 2);
                }
                image::save_buffer_with_format(
                    &path,
                    &rgba,
                    width,
                    height,
                    image::ExtendedColorType::Rgba8,
                    image::ImageFormat::Bmp,
                )
            }
        };
        result.map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;

        debug!("Wrote {}", path.display());
        Ok(())
    }
}

/// Sink that discards every frame. Useful for timing runs.
pub struct NullSink;

impl FrameSink for NullSink {
    fn write_frame(
        &self,
        _format: BufferFormat,
        _data: &[u8],
        _width: u32,
        _height: u32,
    ) -> Result<(), String> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_out_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("framegrab-sink-{}-{}", tag, std::process::id()))
    }

    #[test]
    fn writes_rgb_frames_as_numbered_bmp_files() {
        let dir = temp_out_dir("rgb");
        let sink = BmpSink::new(&dir).unwrap();

        let data = vec![128u8; 3 * 4 * 2];
        sink.write_frame(BufferFormat::Rgb, &data, 4, 2).unwrap();
        sink.write_frame(BufferFormat::Rgb, &data, 4, 2).unwrap();

        assert!(dir.join("frame0.bmp").is_file());
        assert!(dir.join("frame1.bmp").is_file());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn writes_bgra_frames() {
        let dir = temp_out_dir("bgra");
        let sink = BmpSink::new(&dir).unwrap();

        let data = vec![64u8; 4 * 2 * 2];
        sink.write_frame(BufferFormat::Bgra, &data, 2, 2).unwrap();
        assert!(dir.join("frame0.bmp").is_file());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn rejects_mismatched_buffer_length() {
        let dir = temp_out_dir("short");
        let sink = BmpSink::new(&dir).unwrap();

        let err = sink
            .write_frame(BufferFormat::Rgb, &[0u8; 5], 4, 2)
            .unwrap_err();
        assert!(err.contains("expected 24"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn null_sink_accepts_everything() {
        NullSink
            .write_frame(BufferFormat::Bgra, &[0u8; 16], 2, 2)
            .unwrap();
    }
}
