//! framegrab Command-Line Interface
//!
//! Captures screen frames through a capture provider and writes them to
//! disk, driving the capture session across a main/worker thread handoff.

mod colors;
mod commands;
mod exit_codes;

use clap::{Parser, Subcommand, ValueEnum};
use exit_codes::ExitCode;
use tracing_subscriber::EnvFilter;

/// framegrab - Screen Frame Capture CLI
#[derive(Parser, Debug)]
#[command(name = "framegrab")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format for scripting
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Capture frames from the display into image files
    Capture {
        #[command(flatten)]
        options: CaptureOptions,
    },
    /// Open the capture provider and report its status
    Probe {
        /// Capture provider to probe
        #[arg(long, value_enum, default_value_t = ProviderKind::Native)]
        provider: ProviderKind,
    },
    /// Show version information
    Version,
}

#[derive(Parser, Debug, Clone)]
pub struct CaptureOptions {
    /// Number of frames to capture
    #[arg(short, long, default_value_t = 10)]
    pub frames: u32,

    /// Capture width in pixels (default: native display width)
    #[arg(long)]
    pub width: Option<u32>,

    /// Capture height in pixels (default: native display height)
    #[arg(long)]
    pub height: Option<u32>,

    /// Do not composite the mouse cursor into frames
    #[arg(long)]
    pub no_cursor: bool,

    /// Pixel format delivered by the provider
    #[arg(long, value_enum, default_value_t = FormatKind::Rgb)]
    pub format: FormatKind,

    /// Output directory for frame files (default: pictures dir)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Capture provider
    #[arg(long, value_enum, default_value_t = ProviderKind::Native)]
    pub provider: ProviderKind,

    /// Frame sink
    #[arg(long, value_enum, default_value_t = SinkKind::Bmp)]
    pub sink: SinkKind,
}

/// Capture provider selection.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Provider shared library loaded at runtime
    Native,
    /// In-process synthetic test-pattern provider
    Synthetic,
}

/// Pixel format selection.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    Rgb,
    Bgra,
}

/// Frame sink selection.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// Write each frame as a BMP file
    Bmp,
    /// Discard frames (timing runs)
    Null,
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so --json output on stdout stays parseable.
    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let exit_code = match cli.command {
        Commands::Capture { options } => commands::capture(options, cli.json, cli.quiet),
        Commands::Probe { provider } => commands::probe(provider, cli.json, cli.quiet),
        Commands::Version => {
            commands::version(cli.json);
            ExitCode::Success
        }
    };
    std::process::exit(exit_code.as_i32());
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    /// Verify the CLI definition is valid
    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    /// Test parsing 'capture' with defaults
    #[test]
    fn parse_capture_defaults() {
        let cli = Cli::try_parse_from(["framegrab", "capture"]).unwrap();
        match cli.command {
            Commands::Capture { options } => {
                assert_eq!(options.frames, 10);
                assert_eq!(options.width, None);
                assert_eq!(options.height, None);
                assert!(!options.no_cursor);
                assert_eq!(options.format, FormatKind::Rgb);
                assert_eq!(options.provider, ProviderKind::Native);
                assert_eq!(options.sink, SinkKind::Bmp);
            }
            _ => panic!("Expected Capture command"),
        }
    }

    /// Test parsing 'capture' with an explicit frame count
    #[test]
    fn parse_capture_with_frames() {
        let cli = Cli::try_parse_from(["framegrab", "capture", "--frames", "3"]).unwrap();
        match cli.command {
            Commands::Capture { options } => assert_eq!(options.frames, 3),
            _ => panic!("Expected Capture command"),
        }
    }

    /// Test parsing 'capture' with explicit geometry and format
    #[test]
    fn parse_capture_with_geometry() {
        let cli = Cli::try_parse_from([
            "framegrab",
            "capture",
            "--width",
            "1920",
            "--height",
            "1080",
            "--format",
            "bgra",
            "--no-cursor",
        ])
        .unwrap();
        match cli.command {
            Commands::Capture { options } => {
                assert_eq!(options.width, Some(1920));
                assert_eq!(options.height, Some(1080));
                assert_eq!(options.format, FormatKind::Bgra);
                assert!(options.no_cursor);
            }
            _ => panic!("Expected Capture command"),
        }
    }

    /// Test parsing 'capture' with the synthetic provider and null sink
    #[test]
    fn parse_capture_synthetic_null() {
        let cli = Cli::try_parse_from([
            "framegrab",
            "capture",
            "--provider",
            "synthetic",
            "--sink",
            "null",
        ])
        .unwrap();
        match cli.command {
            Commands::Capture { options } => {
                assert_eq!(options.provider, ProviderKind::Synthetic);
                assert_eq!(options.sink, SinkKind::Null);
            }
            _ => panic!("Expected Capture command"),
        }
    }

    /// Test parsing capture with output path and global flags
    #[test]
    fn parse_capture_with_output_and_globals() {
        let cli = Cli::try_parse_from([
            "framegrab",
            "capture",
            "-o",
            "~/shots",
            "--json",
            "-q",
        ])
        .unwrap();
        assert!(cli.json);
        assert!(cli.quiet);
        match cli.command {
            Commands::Capture { options } => {
                assert_eq!(options.output, Some("~/shots".to_string()));
            }
            _ => panic!("Expected Capture command"),
        }
    }

    /// Test parsing 'probe'
    #[test]
    fn parse_probe() {
        let cli = Cli::try_parse_from(["framegrab", "probe"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Probe {
                provider: ProviderKind::Native
            }
        ));
    }

    /// Test parsing 'probe' with the synthetic provider
    #[test]
    fn parse_probe_synthetic() {
        let cli = Cli::try_parse_from(["framegrab", "probe", "--provider", "synthetic"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Probe {
                provider: ProviderKind::Synthetic
            }
        ));
    }

    /// Test parsing 'version'
    #[test]
    fn parse_version() {
        let cli = Cli::try_parse_from(["framegrab", "version"]).unwrap();
        assert!(matches!(cli.command, Commands::Version));
    }

    /// Test invalid subcommand returns error
    #[test]
    fn parse_invalid_command() {
        assert!(Cli::try_parse_from(["framegrab", "record"]).is_err());
    }

    /// Test invalid provider value returns error
    #[test]
    fn parse_invalid_provider() {
        assert!(Cli::try_parse_from(["framegrab", "capture", "--provider", "x11"]).is_err());
    }
}
