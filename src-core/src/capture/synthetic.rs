//! In-process synthetic capture provider.
//!
//! Produces deterministic test-pattern frames without touching any display
//! hardware. Used by the test suite and by `framegrab --provider synthetic`
//! for smoke-testing the full lifecycle on machines without a native
//! provider library.

use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crate::capture::provider::{
    CaptureProvider, DisplayStatus, FrameInfo, ProviderHandle, ProviderStatus,
};
use crate::capture::types::{BufferFormat, FrameSize};

const DEFAULT_DISPLAY: FrameSize = FrameSize {
    width: 1280,
    height: 720,
};

/// The single handle value this provider hands out.
const HANDLE: ProviderHandle = 1;

#[derive(Default)]
struct SyntheticState {
    open: bool,
    frame_size: Option<FrameSize>,
    format: Option<BufferFormat>,
    next_frame_id: u64,
    last_error: String,
}

/// Synthetic provider generating a moving gradient pattern.
///
/// Supports one open handle at a time, mirroring the single-session-per-
/// process model of real providers. Frame ids increase monotonically across
/// grabs and the "display refresh" is simulated by sleeping for the
/// configured interval inside `grab`.
pub struct SyntheticProvider {
    state: Mutex<SyntheticState>,
    display: FrameSize,
    refresh_interval: Duration,
}

impl SyntheticProvider {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SyntheticState::default()),
            display: DEFAULT_DISPLAY,
            refresh_interval: Duration::from_millis(1),
        }
    }

    /// Sets the simulated display refresh interval for blocking grabs.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Sets the display size reported by `status`.
    pub fn with_display_size(mut self, size: FrameSize) -> Self {
        self.display = size;
        self
    }
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureProvider for SyntheticProvider {
    fn open(&self) -> Result<ProviderHandle, ProviderStatus> {
        let mut state = self.state.lock().unwrap();
        if state.open {
            state.last_error = "a synthetic session is already open".to_string();
            return Err(ProviderStatus::Failed);
        }
        *state = SyntheticState {
            open: true,
            ..SyntheticState::default()
        };
        Ok(HANDLE)
    }

    fn status(&self, handle: ProviderHandle) -> Result<DisplayStatus, ProviderStatus> {
        let mut state = self.state.lock().unwrap();
        if !state.open || handle != HANDLE {
            state.last_error = "invalid handle".to_string();
            return Err(ProviderStatus::InvalidHandle);
        }
        Ok(DisplayStatus {
            can_capture: true,
            display_size: Some(self.display),
        })
    }

    fn configure(
        &self,
        handle: ProviderHandle,
        size: FrameSize,
        _with_cursor: bool,
    ) -> Result<(), ProviderStatus> {
        let mut state = self.state.lock().unwrap();
        if !state.open || handle != HANDLE {
            state.last_error = "invalid handle".to_string();
            return Err(ProviderStatus::InvalidHandle);
        }
        if size.width == 0 || size.height == 0 {
            state.last_error = "frame size must be nonzero".to_string();
            return Err(ProviderStatus::InvalidParameter);
        }
        state.frame_size = Some(size);
        Ok(())
    }

    fn setup(&self, handle: ProviderHandle, format: BufferFormat) -> Result<usize, ProviderStatus> {
        let mut state = self.state.lock().unwrap();
        if !state.open || handle != HANDLE {
            state.last_error = "invalid handle".to_string();
            return Err(ProviderStatus::InvalidHandle);
        }
        let Some(size) = state.frame_size else {
            state.last_error = "setup called before configure".to_string();
            return Err(ProviderStatus::NotReady);
        };
        state.format = Some(format);
        Ok(format.buffer_len(size))
    }

    fn grab(&self, handle: ProviderHandle, buffer: &mut [u8]) -> Result<FrameInfo, ProviderStatus> {
        let (size, frame_id) = {
            let mut state = self.state.lock().unwrap();
            if !state.open || handle != HANDLE {
                state.last_error = "invalid handle".to_string();
                return Err(ProviderStatus::InvalidHandle);
            }
            let (Some(size), Some(format)) = (state.frame_size, state.format) else {
                state.last_error = "grab called before setup".to_string();
                return Err(ProviderStatus::NotReady);
            };
            if buffer.len() < format.buffer_len(size) {
                state.last_error = "grab buffer too small".to_string();
                return Err(ProviderStatus::InvalidParameter);
            }
            state.next_frame_id += 1;
            (size, state.next_frame_id)
        };

        // Simulate waiting for the next display refresh.
        thread::sleep(self.refresh_interval);

        // Deterministic gradient that shifts with the frame id, so
        // consecutive frames are never byte-identical.
        for (i, byte) in buffer.iter_mut().enumerate() {
            *byte = ((i as u64).wrapping_add(frame_id.wrapping_mul(7)) & 0xff) as u8;
        }

        Ok(FrameInfo {
            frame_id,
            width: size.width,
            height: size.height,
            byte_len: buffer.len(),
        })
    }

    fn teardown(&self, handle: ProviderHandle) -> Result<(), ProviderStatus> {
        let mut state = self.state.lock().unwrap();
        if !state.open || handle != HANDLE {
            state.last_error = "invalid handle".to_string();
            return Err(ProviderStatus::InvalidHandle);
        }
        state.frame_size = None;
        state.format = None;
        Ok(())
    }

    fn close(&self, handle: ProviderHandle) -> Result<(), ProviderStatus> {
        let mut state = self.state.lock().unwrap();
        if !state.open || handle != HANDLE {
            state.last_error = "invalid handle".to_string();
            return Err(ProviderStatus::InvalidHandle);
        }
        state.open = false;
        Ok(())
    }

    fn last_error(&self, _handle: ProviderHandle) -> String {
        self.state.lock().unwrap().last_error.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_ids_are_monotonic() {
        let provider = SyntheticProvider::new().with_refresh_interval(Duration::ZERO);
        let handle = provider.open().unwrap();
        provider
            .configure(handle, FrameSize::new(4, 4), true)
            .unwrap();
        let len = provider.setup(handle, BufferFormat::Rgb).unwrap();
        let mut buffer = vec![0u8; len];

        let mut last = 0;
        for _ in 0..5 {
            let info = provider.grab(handle, &mut buffer).unwrap();
            assert!(info.frame_id > last);
            last = info.frame_id;
        }
    }

    #[test]
    fn open_twice_fails_until_closed() {
        let provider = SyntheticProvider::new();
        let handle = provider.open().unwrap();
        assert_eq!(provider.open().unwrap_err(), ProviderStatus::Failed);
        assert!(!provider.last_error(handle).is_empty());

        provider.close(handle).unwrap();
        provider.open().unwrap();
    }

    #[test]
    fn grab_before_setup_reports_not_ready() {
        let provider = SyntheticProvider::new();
        let handle = provider.open().unwrap();
        let mut buffer = vec![0u8; 16];
        assert_eq!(
            provider.grab(handle, &mut buffer).unwrap_err(),
            ProviderStatus::NotReady
        );
        assert_eq!(provider.last_error(handle), "grab called before setup");
    }

    #[test]
    fn consecutive_frames_differ() {
        let provider = SyntheticProvider::new().with_refresh_interval(Duration::ZERO);
        let handle = provider.open().unwrap();
        provider
            .configure(handle, FrameSize::new(8, 8), false)
            .unwrap();
        let len = provider.setup(handle, BufferFormat::Bgra).unwrap();

        let mut first = vec![0u8; len];
        let mut second = vec![0u8; len];
        provider.grab(handle, &mut first).unwrap();
        provider.grab(handle, &mut second).unwrap();
        assert_ne!(first, second);
    }
}
