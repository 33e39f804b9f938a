//! # jiffymon-core
//!
//! Shared plumbing for the jiffymon CPU monitor.
//!
//! - **Error handling** - [`SensorError`], the typed failure taxonomy every
//!   read and sample call returns
//! - **Configuration** - RON configuration under `~/.config/jiffymon/`
//! - **Logging** - the injectable [`LogSink`] and the process-wide
//!   [`logging::init`] / [`LogGuard`] lifecycle
//! - **Cancellation** - [`CancelToken`] for aborting blocking sampling runs
//!
//! ## Quick Start
//!
//! ```rust
//! use jiffymon_core::{CancelToken, LogSink, MemorySink};
//! use std::time::Duration;
//!
//! let sink = MemorySink::new();
//! sink.info("sampling started");
//!
//! let token = CancelToken::new();
//! token.cancel();
//! assert!(token.wait(Duration::from_secs(1)));
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod logging;

pub use cancel::CancelToken;
pub use config::{LoadScale, LogConfig, MonitorConfig};
pub use error::{Result, SensorError};
pub use logging::{LogGuard, LogLevel, LogSink, MemorySink, NullSink, TracingSink};
