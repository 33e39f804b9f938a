//! Leveled log sink injected into components, and the process-wide logging
//! lifecycle behind it.
//!
//! Components never reach for a global logger. They are handed an
//! `Arc<dyn LogSink>` at construction; the binary decides what that sink is.
//! The usual choice is [`TracingSink`], which forwards into whatever
//! `tracing` subscriber [`init`] installed at startup. The returned
//! [`LogGuard`] must be kept alive until shutdown so buffered file output is
//! flushed.

use crate::config::LogConfig;
use crate::error::{Result, SensorError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter};

/// Target used for every event emitted through [`TracingSink`].
pub const LOG_TARGET: &str = "jiffymon";

/// Severity of a log message, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    /// Directive string understood by `EnvFilter`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = LogLevelParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" | "fatal" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" | "verbose" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(LogLevelParseError {
                input: s.to_owned(),
                valid_options: &["error", "warn", "info", "debug", "trace"],
            }),
        }
    }
}

/// Error type for parsing [`LogLevel`] from string.
#[derive(Debug, thiserror::Error)]
#[error("Invalid log level '{input}'. Valid options: {}", valid_options.join(", "))]
pub struct LogLevelParseError {
    input: String,
    valid_options: &'static [&'static str],
}

/// Destination for leveled messages.
///
/// Logging is a side channel: implementations must not fail and callers
/// never use a log call in place of returning an error.
pub trait LogSink: Send + Sync {
    /// Record one message.
    fn log(&self, level: LogLevel, message: &str);

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }
}

/// Forwards messages to the installed `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Error => tracing::error!(target: LOG_TARGET, "{message}"),
            LogLevel::Warn => tracing::warn!(target: LOG_TARGET, "{message}"),
            LogLevel::Info => tracing::info!(target: LOG_TARGET, "{message}"),
            LogLevel::Debug => tracing::debug!(target: LOG_TARGET, "{message}"),
            LogLevel::Trace => tracing::trace!(target: LOG_TARGET, "{message}"),
        }
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _level: LogLevel, _message: &str) {}
}

/// Keeps every message in memory, in order.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<(LogLevel, String)>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded messages.
    #[must_use]
    pub fn entries(&self) -> Vec<(LogLevel, String)> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded messages at exactly `level`.
    #[must_use]
    pub fn count(&self, level: LogLevel) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(l, _)| *l == level)
            .count()
    }
}

impl LogSink for MemorySink {
    fn log(&self, level: LogLevel, message: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level, message.to_owned()));
    }
}

/// Keeps the logging backend alive; dropping it flushes pending file output.
#[must_use = "dropping the guard flushes and closes the log file immediately"]
#[derive(Debug)]
pub struct LogGuard {
    file: Option<WorkerGuard>,
}

impl LogGuard {
    /// Whether a log file writer is attached.
    #[must_use]
    pub fn has_file(&self) -> bool {
        self.file.is_some()
    }

    /// Flush and close the file writer.
    pub fn shutdown(self) {
        drop(self);
    }
}

/// Install the process-wide `tracing` subscriber.
///
/// Call once at startup. `RUST_LOG` takes precedence over the configured
/// level. Messages go to stderr, and additionally to `config.file` through a
/// non-blocking writer when one is configured.
///
/// # Errors
///
/// Returns [`SensorError::Config`] if a subscriber is already installed or
/// the log file path is unusable.
pub fn init(config: &LogConfig) -> Result<LogGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let stderr_layer = tracing_fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    let (file_layer, file_guard) = match &config.file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path.file_name().ok_or_else(|| {
                SensorError::config_with_value(
                    "Log file path has no file name",
                    path.display().to_string(),
                )
            })?;
            std::fs::create_dir_all(dir).map_err(|e| SensorError::from_io(dir, e))?;

            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| SensorError::config(format!("Logging already initialized: {e}")))?;

    Ok(LogGuard { file: file_guard })
}
