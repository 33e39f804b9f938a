//! Parsing capabilities, one per counter format.
//!
//! [`CpuMonitor`](crate::CpuMonitor) is generic over these so another
//! platform's layout, or a fake, can be plugged in without dynamic dispatch.

use crate::process::ProcessStat;
use crate::stat::CounterSeries;
use jiffymon_core::Result;

/// Turns the text of the system counter source into a [`CounterSeries`].
pub trait SeriesParser {
    fn parse_series(&self, text: &str) -> Result<CounterSeries>;
}

/// Turns the text of a process status source into a [`ProcessStat`].
pub trait ProcessStatParser {
    fn parse_process_stat(&self, text: &str, expected_pid: u32) -> Result<ProcessStat>;
}

/// The Linux procfs layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinuxProcFormat;

impl SeriesParser for LinuxProcFormat {
    fn parse_series(&self, text: &str) -> Result<CounterSeries> {
        CounterSeries::parse(text)
    }
}

impl ProcessStatParser for LinuxProcFormat {
    fn parse_process_stat(&self, text: &str, expected_pid: u32) -> Result<ProcessStat> {
        ProcessStat::parse(text, expected_pid)
    }
}
