//! Error taxonomy shared by every jiffymon component.

use std::path::{Path, PathBuf};

/// Result type for counter reads and sampling.
pub type Result<T> = std::result::Result<T, SensorError>;

/// Failure modes of the counter engine.
///
/// Every variant is scoped to the single read or sample call that produced
/// it; nothing here is process-fatal.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    /// The counter source does not exist (or the process exited).
    #[error("Counter source not found: {}", path.display())]
    NotFound {
        /// Path that was looked up
        path: PathBuf,
    },

    /// The counter source exists but could not be opened or read.
    #[error("Counter source unreadable: {}", path.display())]
    Unreadable {
        /// Path that failed
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Structurally malformed counter text.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of what failed to parse
        message: String,
        /// The offending line, if it is safe to echo
        line: Option<String>,
        /// Optional source error for chaining
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No tick progress across an entire sampling window.
    #[error("No tick progress across {samples} sample(s)")]
    ZeroWindow {
        /// Number of samples that made up the window
        samples: u32,
    },

    /// The caller cancelled a sampling run.
    #[error("Sampling cancelled after {completed} completed sample(s)")]
    Cancelled {
        /// Samples that finished before cancellation was observed
        completed: u32,
    },

    /// Invalid settings.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration issue
        message: String,
        /// The invalid configuration value if applicable
        value: Option<String>,
    },
}

impl SensorError {
    /// Create a not-found error for `path`.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create an unreadable error for `path`.
    pub fn unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Unreadable {
            path: path.into(),
            source,
        }
    }

    /// Classify an I/O error raised while reading `path`.
    ///
    /// `ESRCH` shows up when a process exits between open and read; it is
    /// reported the same way as a missing file.
    pub fn from_io(path: &Path, err: std::io::Error) -> Self {
        const ESRCH: i32 = 3;
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(path),
            _ if err.raw_os_error() == Some(ESRCH) => Self::not_found(path),
            _ => Self::unreadable(path, err),
        }
    }

    /// Create a new parse error with a simple message.
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse {
            message: message.into(),
            line: None,
            source: None,
        }
    }

    /// Create a new parse error that echoes the offending line.
    pub fn parse_line<S: Into<String>, L: Into<String>>(message: S, line: L) -> Self {
        Self::Parse {
            message: message.into(),
            line: Some(line.into()),
            source: None,
        }
    }

    /// Create a new parse error with a source error.
    pub fn parse_with_source<S: Into<String>, E>(message: S, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Parse {
            message: message.into(),
            line: None,
            source: Some(Box::new(source)),
        }
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
            value: None,
        }
    }

    /// Create a new configuration error with the invalid value.
    pub fn config_with_value<S: Into<String>, V: Into<String>>(message: S, value: V) -> Self {
        Self::Config {
            message: message.into(),
            value: Some(value.into()),
        }
    }

    /// Check if this error represents a temporary condition.
    ///
    /// A retry of the same call may succeed for these.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        match self {
            Self::ZeroWindow { .. } | Self::Cancelled { .. } => true,
            Self::Unreadable { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::Interrupted | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}
