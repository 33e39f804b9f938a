//! CPU counter acquisition and utilization estimation for jiffymon.
//!
//! This crate reads the kernel's tick counters from `/proc/stat` and
//! `/proc/<pid>/stat`, derives active/idle/total jiffies, and turns counter
//! deltas across a sampling window into a usage percentage.
//!
//! # Examples
//!
//! ```rust
//! use jiffymon_cpu::CounterSeries;
//!
//! let series = CounterSeries::parse("cpu 100 0 50 800 10 0 0 0 0 0\ncpu0 100 0 50 800 10 0 0 0 0 0\nintr 1\n")?;
//! assert_eq!(series.len(), 2);
//! assert_eq!(series.aggregate().active(), 150);
//! assert_eq!(series.aggregate().total(), 960);
//! # Ok::<(), jiffymon_core::SensorError>(())
//! ```

pub mod cpu;
pub mod format;
pub mod jiffies;
pub mod process;
pub mod reader;
pub mod sampler;
pub mod stat;

#[cfg(test)]
mod testing;

pub use cpu::{CpuInfo, CpuMonitor};
pub use format::{LinuxProcFormat, ProcessStatParser, SeriesParser};
pub use jiffies::TickDelta;
pub use process::{ProcessStat, ProcessState};
pub use reader::{CounterFile, CounterSource, ProcFs};
pub use sampler::{Utilization, UtilizationSampler};
pub use stat::{CounterSeries, CounterSnapshot};
