//! Logging lifecycle.
//!
//! The entry point calls [`init_logging`] once and holds the returned
//! [`LoggingGuard`] for the life of the process. Events go to two places:
//! a debug file (everything at the configured level) and stderr (errors only).
//! `RUST_LOG` overrides the file filter.

use std::fs::OpenOptions;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

pub(crate) const DEFAULT_LOG_FILE: &str = "./debug.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct LogConfig {
    /// Debug log destination; `None` disables the file entirely.
    pub(crate) file: Option<PathBuf>,
    pub(crate) level: LogLevel,
}

/// Keeps the subscriber installed. Dropping it flushes and uninstalls logging.
pub(crate) struct LoggingGuard {
    _default: tracing::subscriber::DefaultGuard,
}

impl Drop for LoggingGuard {
    fn drop(&mut self) {
        tracing::debug!("logging shut down");
    }
}

pub(crate) fn init_logging(config: &LogConfig) -> io::Result<LoggingGuard> {
    let file_layer = match &config.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("detective={}", config.level.as_str())));
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_filter(filter),
            )
        }
        None => None,
    };

    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .with_ansi(io::stderr().is_terminal())
        .with_filter(LevelFilter::ERROR);

    let default = tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .set_default();
    tracing::debug!(file = ?config.file, level = config.level.as_str(), "logging initialized");
    Ok(LoggingGuard { _default: default })
}
