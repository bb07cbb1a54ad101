//! Native capture provider loaded from a shared library at runtime.
//!
//! The provider library is resolved at startup rather than linked, so the
//! binary runs on machines without capture hardware (using the synthetic
//! provider instead) and provider updates don't require a rebuild. The
//! library exports a small C ABI; all functions return an `i32` status
//! (0 = success, see [`status_from_code`]) and failures are described by
//! `fg_last_error`, keyed by the session handle.
//!
//! Exported symbols:
//!
//! ```text
//! fg_open(out_handle: *mut u64) -> i32
//! fg_status(handle: u64, out: *mut FgStatusInfo) -> i32
//! fg_configure(handle: u64, width: u32, height: u32, with_cursor: u32) -> i32
//! fg_setup(handle: u64, format: u32, out_buffer_len: *mut usize) -> i32
//! fg_grab(handle: u64, buffer: *mut u8, buffer_len: usize, out: *mut FgFrameInfo) -> i32
//! fg_teardown(handle: u64) -> i32
//! fg_close(handle: u64) -> i32
//! fg_last_error(handle: u64) -> *const c_char
//! ```
//!
//! `fg_grab` blocks until the next display refresh produces a new frame.

use std::ffi::{c_char, CStr};
use std::path::Path;

use libloading::Library;
use tracing::info;

use crate::capture::provider::{
    CaptureProvider, DisplayStatus, FrameInfo, ProviderHandle, ProviderStatus,
};
use crate::capture::types::{BufferFormat, FrameSize};

/// Environment variable overriding the provider library path.
pub const PROVIDER_ENV: &str = "FRAMEGRAB_PROVIDER";

#[cfg(target_os = "windows")]
const DEFAULT_LIB_NAME: &str = "framegrab_provider.dll";
#[cfg(target_os = "macos")]
const DEFAULT_LIB_NAME: &str = "libframegrab_provider.dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const DEFAULT_LIB_NAME: &str = "libframegrab_provider.so";

/// Status block written by `fg_status`.
#[repr(C)]
#[derive(Clone, Copy)]
struct FgStatusInfo {
    can_capture: u32,
    display_width: u32,
    display_height: u32,
}

/// Frame block written by `fg_grab`.
#[repr(C)]
#[derive(Clone, Copy)]
struct FgFrameInfo {
    frame_id: u64,
    width: u32,
    height: u32,
    byte_len: usize,
}

/// Format tags understood by `fg_setup`.
fn format_tag(format: BufferFormat) -> u32 {
    match format {
        BufferFormat::Rgb => 0,
        BufferFormat::Bgra => 1,
    }
}

/// Maps a provider status code to [`ProviderStatus`].
fn status_from_code(code: i32) -> ProviderStatus {
    match code {
        1 => ProviderStatus::InvalidHandle,
        2 => ProviderStatus::InvalidParameter,
        3 => ProviderStatus::UnsupportedFormat,
        4 => ProviderStatus::NotReady,
        _ => ProviderStatus::Failed,
    }
}

/// Capture provider backed by a dynamically loaded shared library.
pub struct NativeProvider {
    // Kept alive for the lifetime of the function pointers below.
    _lib: Library,
    open: unsafe extern "C" fn(*mut u64) -> i32,
    status: unsafe extern "C" fn(u64, *mut FgStatusInfo) -> i32,
    configure: unsafe extern "C" fn(u64, u32, u32, u32) -> i32,
    setup: unsafe extern "C" fn(u64, u32, *mut usize) -> i32,
    grab: unsafe extern "C" fn(u64, *mut u8, usize, *mut FgFrameInfo) -> i32,
    teardown: unsafe extern "C" fn(u64) -> i32,
    close: unsafe extern "C" fn(u64) -> i32,
    last_error: unsafe extern "C" fn(u64) -> *const c_char,
}

// SAFETY: the library handle and resolved function pointers carry no
// thread-local state; the session serializes per-handle calls.
unsafe impl Send for NativeProvider {}
unsafe impl Sync for NativeProvider {}

impl NativeProvider {
    /// Loads the provider library named by `FRAMEGRAB_PROVIDER`, falling
    /// back to the platform default library name.
    pub fn load_default() -> Result<Self, String> {
        let path = std::env::var(PROVIDER_ENV).unwrap_or_else(|_| DEFAULT_LIB_NAME.to_string());
        Self::load(&path)
    }

    /// Loads the provider library from the given path and resolves all
    /// entry points.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        unsafe {
            let lib = Library::new(path)
                .map_err(|e| format!("Failed to load provider library {}: {}", path.display(), e))?;

            let open = *lib
                .get::<unsafe extern "C" fn(*mut u64) -> i32>(b"fg_open\0")
                .map_err(|e| format!("Failed to resolve fg_open: {}", e))?;

            let status = *lib
                .get::<unsafe extern "C" fn(u64, *mut FgStatusInfo) -> i32>(b"fg_status\0")
                .map_err(|e| format!("Failed to resolve fg_status: {}", e))?;

            let configure = *lib
                .get::<unsafe extern "C" fn(u64, u32, u32, u32) -> i32>(b"fg_configure\0")
                .map_err(|e| format!("Failed to resolve fg_configure: {}", e))?;

            let setup = *lib
                .get::<unsafe extern "C" fn(u64, u32, *mut usize) -> i32>(b"fg_setup\0")
                .map_err(|e| format!("Failed to resolve fg_setup: {}", e))?;

            let grab = *lib
                .get::<unsafe extern "C" fn(u64, *mut u8, usize, *mut FgFrameInfo) -> i32>(
                    b"fg_grab\0",
                )
                .map_err(|e| format!("Failed to resolve fg_grab: {}", e))?;

            let teardown = *lib
                .get::<unsafe extern "C" fn(u64) -> i32>(b"fg_teardown\0")
                .map_err(|e| format!("Failed to resolve fg_teardown: {}", e))?;

            let close = *lib
                .get::<unsafe extern "C" fn(u64) -> i32>(b"fg_close\0")
                .map_err(|e| format!("Failed to resolve fg_close: {}", e))?;

            let last_error = *lib
                .get::<unsafe extern "C" fn(u64) -> *const c_char>(b"fg_last_error\0")
                .map_err(|e| format!("Failed to resolve fg_last_error: {}", e))?;

            info!("Loaded capture provider library: {}", path.display());

            Ok(Self {
                _lib: lib,
                open,
                status,
                configure,
                setup,
                grab,
                teardown,
                close,
                last_error,
            })
        }
    }
}

impl CaptureProvider for NativeProvider {
    fn open(&self) -> Result<ProviderHandle, ProviderStatus> {
        let mut handle: u64 = 0;
        let code = unsafe { (self.open)(&mut handle) };
        if code == 0 {
            Ok(handle)
        } else {
            Err(status_from_code(code))
        }
    }

    fn status(&self, handle: ProviderHandle) -> Result<DisplayStatus, ProviderStatus> {
        let mut info = FgStatusInfo {
            can_capture: 0,
            display_width: 0,
            display_height: 0,
        };
        let code = unsafe { (self.status)(handle, &mut info) };
        if code != 0 {
            return Err(status_from_code(code));
        }
        let display_size = if info.display_width > 0 && info.display_height > 0 {
            Some(FrameSize::new(info.display_width, info.display_height))
        } else {
            None
        };
        Ok(DisplayStatus {
            can_capture: info.can_capture != 0,
            display_size,
        })
    }

    fn configure(
        &self,
        handle: ProviderHandle,
        size: FrameSize,
        with_cursor: bool,
    ) -> Result<(), ProviderStatus> {
        let code =
            unsafe { (self.configure)(handle, size.width, size.height, u32::from(with_cursor)) };
        if code == 0 {
            Ok(())
        } else {
            Err(status_from_code(code))
        }
    }

    fn setup(&self, handle: ProviderHandle, format: BufferFormat) -> Result<usize, ProviderStatus> {
        let mut buffer_len: usize = 0;
        let code = unsafe { (self.setup)(handle, format_tag(format), &mut buffer_len) };
        if code == 0 {
            Ok(buffer_len)
        } else {
            Err(status_from_code(code))
        }
    }

    fn grab(&self, handle: ProviderHandle, buffer: &mut [u8]) -> Result<FrameInfo, ProviderStatus> {
        let mut info = FgFrameInfo {
            frame_id: 0,
            width: 0,
            height: 0,
            byte_len: 0,
        };
        let code = unsafe { (self.grab)(handle, buffer.as_mut_ptr(), buffer.len(), &mut info) };
        if code != 0 {
            return Err(status_from_code(code));
        }
        Ok(FrameInfo {
            frame_id: info.frame_id,
            width: info.width,
            height: info.height,
            byte_len: info.byte_len,
        })
    }

    fn teardown(&self, handle: ProviderHandle) -> Result<(), ProviderStatus> {
        let code = unsafe { (self.teardown)(handle) };
        if code == 0 {
            Ok(())
        } else {
            Err(status_from_code(code))
        }
    }

    fn close(&self, handle: ProviderHandle) -> Result<(), ProviderStatus> {
        let code = unsafe { (self.close)(handle) };
        if code == 0 {
            Ok(())
        } else {
            Err(status_from_code(code))
        }
    }

    fn last_error(&self, handle: ProviderHandle) -> String {
        let ptr = unsafe { (self.last_error)(handle) };
        if ptr.is_null() {
            return "no provider error description available".to_string();
        }
        unsafe { CStr::from_ptr(ptr).to_string_lossy().into_owned() }
    }
}
