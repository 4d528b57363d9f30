//! Tracing setup for the CLI and the detached executor process.

use crate::cli::Command;
use crate::Result;
use anyhow::{anyhow, Context};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_LOG_LEVEL: &str = "warn";
const LOG_FILE_NAME: &str = "atlana.log";
static LOGGING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Keeps the non-blocking file writer alive for the duration of the command.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize tracing for the given CLI command.
///
/// The `run` subcommand (the detached executor) additionally logs to a file
/// under the user's `.atlana/logs` directory; its `--debug`/`--info` flags
/// override the `RUST_LOG` filter.
pub fn init(command: &Command) -> Result<LoggingGuard> {
    if LOGGING_INITIALIZED.swap(true, Ordering::SeqCst) {
        return Err(anyhow!("logging already initialized"));
    }

    let filter = EnvFilter::try_new(select_log_level(command))
        .context("failed to build log filter; check RUST_LOG")?;

    let console_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let mut file_guard = None;
    let file_layer = if matches!(command, Command::Run(_)) {
        let log_dir = log_directory();
        fs::create_dir_all(&log_dir)
            .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
        let appender = tracing_appender::rolling::never(&log_dir, LOG_FILE_NAME);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        file_guard = Some(guard);
        Some(fmt::layer().with_writer(writer).with_ansi(false))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

fn select_log_level(command: &Command) -> String {
    if let Command::Run(args) = command {
        if args.debug {
            return "debug".to_string();
        }
        if args.info {
            return "info".to_string();
        }
    }
    env::var("RUST_LOG")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

fn log_directory() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(env::temp_dir)
        .join(".atlana")
        .join("logs")
}
