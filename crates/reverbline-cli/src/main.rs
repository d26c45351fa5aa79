//! reverbline - reverberated speech dataset builder
//!
//! Downloads phrase and impulse-response archives, then convolves every
//! phrase against every impulse response into a flat output directory.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod cmd;
mod settings;

use settings::Settings;

#[derive(Parser)]
#[command(name = "reverbline")]
#[command(about = "Build a reverberated speech dataset by convolution")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Settings file (default: ./reverbline.toml or the user config dir)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Read timeout in seconds for stall detection
    #[arg(long, global = true)]
    read_timeout: Option<u64>,

    /// Retry attempts for transient download failures
    #[arg(long, global = true)]
    max_retries: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Download, extract and convolve (skips anything already done)
    Run(cmd::DatasetArgs),
    /// Download and extract archives only
    Fetch(cmd::DatasetArgs),
    /// Show archive state and pending units
    Status(cmd::DatasetArgs),
    /// Remove partial downloads and unfinished outputs
    Clean(cmd::DatasetArgs),
    /// Show effective settings
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let progress = Arc::new(reverbline_core::ProgressContext::new());

    // TTY: warn unless --debug, bars show activity. Non-TTY: info.
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let verbosity = reverbline_core::Verbosity::from_flags(is_tty, cli.debug);
    reverbline_core::init_logging(verbosity, multi);

    reverbline_core::install_signal_handlers().context("Failed to install signal handlers")?;

    let settings = match cli.settings {
        Some(path) => Settings::from_file(&path)?,
        None => Settings::load()?,
    };

    // Settings file defaults, CLI overrides
    reverbline_core::set_http_config(reverbline_core::HttpConfig {
        read_timeout: Duration::from_secs(cli.read_timeout.unwrap_or(settings.http.read_timeout)),
        max_retries: cli.max_retries.unwrap_or(settings.http.max_retries),
    });

    match cli.command {
        Command::Run(args) => cmd::run::run(args, &settings, &progress),
        Command::Fetch(args) => cmd::fetch::run(args, &settings, &progress),
        Command::Status(args) => cmd::status::run(args),
        Command::Clean(args) => cmd::clean::run(args),
        Command::Config => {
            let http = reverbline_core::http_config();
            cmd::print_summary(
                "Setting",
                &[
                    ("Read timeout", format!("{}s", http.read_timeout.as_secs())),
                    ("Max retries", http.max_retries.to_string()),
                    (
                        "Workers",
                        format!(
                            "{} (max: {})",
                            settings.workers.default, settings.workers.max
                        ),
                    ),
                ],
            );
            Ok(())
        }
    }
}
