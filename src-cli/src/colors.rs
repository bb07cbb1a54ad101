//! Terminal color support for CLI output.
//!
//! Colors are applied only when the target stream is an interactive
//! terminal, so piped or redirected output stays plain.

use owo_colors::OwoColorize;
use std::io::IsTerminal;

fn stdout_tty() -> bool {
    std::io::stdout().is_terminal()
}

fn stderr_tty() -> bool {
    std::io::stderr().is_terminal()
}

/// Style for error messages (stderr).
pub fn error(msg: &str) -> String {
    if stderr_tty() {
        format!("{} {}", "error:".red().bold(), msg)
    } else {
        format!("error: {}", msg)
    }
}

/// Style for warning messages (stderr).
#[allow(dead_code)]
pub fn warning(msg: &str) -> String {
    if stderr_tty() {
        format!("{} {}", "warning:".yellow().bold(), msg)
    } else {
        format!("warning: {}", msg)
    }
}

/// Style for success messages.
pub fn success(msg: &str) -> String {
    if stdout_tty() {
        msg.green().to_string()
    } else {
        msg.to_string()
    }
}

/// Style for section headers.
pub fn header(msg: &str) -> String {
    if stdout_tty() {
        msg.bold().to_string()
    } else {
        msg.to_string()
    }
}

/// Style for dim/secondary text.
pub fn dim(msg: &str) -> String {
    if stdout_tty() {
        msg.dimmed().to_string()
    } else {
        msg.to_string()
    }
}

/// Style for numeric values.
pub fn number(msg: &str) -> String {
    if stdout_tty() {
        msg.cyan().to_string()
    } else {
        msg.to_string()
    }
}

/// Style for file paths.
pub fn path(msg: &str) -> String {
    if stdout_tty() {
        msg.underline().to_string()
    } else {
        msg.to_string()
    }
}
