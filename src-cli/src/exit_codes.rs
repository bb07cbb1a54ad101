//! Exit codes for the CLI.
//!
//! Each code names the lifecycle stage that failed, enabling scripting
//! integration.

/// Exit codes for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum ExitCode {
    /// Full lifecycle completed successfully
    Success = 0,
    /// General/unspecified error
    GeneralError = 1,
    /// Invalid command-line arguments
    InvalidArguments = 2,
    /// The capture provider could not be reached or refused the session
    ProviderUnavailable = 3,
    /// Session configure/setup failed
    SessionSetupFailed = 4,
    /// Frame capture failed during the worker loop
    CaptureFailed = 5,
    /// The frame sink rejected a frame
    SinkFailed = 6,
    /// Session teardown/close failed
    TeardownFailed = 7,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitCode::Success => write!(f, "success"),
            ExitCode::GeneralError => write!(f, "general error"),
            ExitCode::InvalidArguments => write!(f, "invalid arguments"),
            ExitCode::ProviderUnavailable => write!(f, "provider unavailable"),
            ExitCode::SessionSetupFailed => write!(f, "session setup failed"),
            ExitCode::CaptureFailed => write!(f, "capture failed"),
            ExitCode::SinkFailed => write!(f, "sink failed"),
            ExitCode::TeardownFailed => write!(f, "teardown failed"),
        }
    }
}
