//! Logging initialization

use anyhow::{Context, Result};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::args::{Args, LogFormat};

/// Initialize logging based on CLI arguments
///
/// When a log file is requested the returned guard must be kept alive until
/// exit so buffered lines are flushed.
pub fn init(args: &Args) -> Result<Option<WorkerGuard>> {
    // Determine log level
    let level = if args.quiet {
        Level::ERROR
    } else {
        match args.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    // Build env filter
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let (file_writer, guard) = match args.log_file {
        Some(ref log_file) => {
            let file = std::fs::File::create(log_file)
                .with_context(|| format!("Failed to create log file: {}", log_file))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    // Set up subscriber based on format
    match args.log_format {
        LogFormat::Text => {
            let file_layer =
                file_writer.map(|writer| fmt::layer().with_ansi(false).with_writer(writer));
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(args.verbose >= 2)
                        .with_thread_ids(args.verbose >= 3)
                        .with_file(args.verbose >= 3)
                        .with_line_number(args.verbose >= 3),
                )
                .with(file_layer)
                .try_init()
                .context("Failed to install log subscriber")?;
        }
        LogFormat::Json => {
            let file_layer = file_writer.map(|writer| fmt::layer().json().with_writer(writer));
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .with(file_layer)
                .try_init()
                .context("Failed to install log subscriber")?;
        }
        LogFormat::Compact => {
            let file_layer = file_writer.map(|writer| {
                fmt::layer()
                    .compact()
                    .with_ansi(false)
                    .with_writer(writer)
            });
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .with(file_layer)
                .try_init()
                .context("Failed to install log subscriber")?;
        }
    }

    Ok(guard)
}
