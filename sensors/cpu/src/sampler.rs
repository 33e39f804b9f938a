//! Usage percentages from counter deltas across sampling windows.
//!
//! A reading blocks for `interval` per window. Callers that must stay
//! responsive run it on a worker thread and abort it through the
//! [`CancelToken`], which is checked before every window and wakes the wait
//! between the two reads of a window.

use crate::cpu::CpuMonitor;
use crate::format::{ProcessStatParser, SeriesParser};
use crate::jiffies::TickDelta;
use crate::reader::{CounterFile, CounterSource};
use jiffymon_core::{CancelToken, LoadScale, LogSink, Result, SensorError};
use std::time::Duration;

/// Outcome of a sampling run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Utilization {
    /// Usage in percent.
    Measured(f64),
    /// No tick progress at all across the window; reported as 0%.
    ZeroWindow {
        /// Windows that made up the run
        samples: u32,
    },
}

impl Utilization {
    /// `100 × active / total`, clamped to [0, 100]; a zero total yields
    /// [`Utilization::ZeroWindow`].
    #[must_use]
    pub fn from_ticks(active: u64, total: u64, samples: u32) -> Self {
        if total == 0 {
            return Self::ZeroWindow { samples };
        }
        Self::Measured((active as f64 / total as f64 * 100.0).clamp(0.0, 100.0))
    }

    /// Percentage, 0.0 for a zero window.
    #[must_use]
    pub fn percent(self) -> f64 {
        match self {
            Self::Measured(percent) => percent,
            Self::ZeroWindow { .. } => 0.0,
        }
    }

    #[must_use]
    pub fn is_zero_window(self) -> bool {
        matches!(self, Self::ZeroWindow { .. })
    }

    /// Multiply a measured value; a zero window stays a zero window.
    #[must_use]
    pub fn scaled(self, factor: f64) -> Self {
        match self {
            Self::Measured(percent) => Self::Measured(percent * factor),
            zero => zero,
        }
    }

    /// Treat a zero window as a failure.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::ZeroWindow`] for a zero window.
    pub fn into_strict(self) -> Result<f64> {
        match self {
            Self::Measured(percent) => Ok(percent),
            Self::ZeroWindow { samples } => Err(SensorError::ZeroWindow { samples }),
        }
    }
}

/// Runs timed readings against a [`CpuMonitor`].
pub struct UtilizationSampler<'m, R, F> {
    monitor: &'m CpuMonitor<R, F>,
}

impl<'m, R, F> UtilizationSampler<'m, R, F>
where
    R: CounterSource,
    F: SeriesParser + ProcessStatParser,
{
    pub(crate) fn new(monitor: &'m CpuMonitor<R, F>) -> Self {
        Self { monitor }
    }

    fn log(&self) -> &dyn LogSink {
        self.monitor.log()
    }

    fn cancelled(&self, completed: u32) -> SensorError {
        self.log()
            .info(&format!("Sampling cancelled after {completed} window(s)"));
        SensorError::Cancelled { completed }
    }

    /// System-wide usage averaged over `sample_count` windows of `interval`.
    ///
    /// Deltas are summed across windows before dividing, so each window is
    /// weighted by the ticks it covered.
    ///
    /// # Errors
    ///
    /// Fails with the first read or parse error (the run is abandoned, no
    /// partial average is produced), with [`SensorError::Cancelled`] if
    /// `cancel` fires, or with [`SensorError::Config`] if `sample_count` is 0.
    pub fn system_usage(
        &self,
        sample_count: u32,
        interval: Duration,
        cancel: &CancelToken,
    ) -> Result<Utilization> {
        if sample_count == 0 {
            return Err(SensorError::config_with_value(
                "Sample count must be at least 1",
                "0",
            ));
        }

        let mut window = TickDelta::default();
        for completed in 0..sample_count {
            if cancel.is_cancelled() {
                return Err(self.cancelled(completed));
            }

            let before = self.monitor.read_aggregate()?;
            if cancel.wait(interval) {
                return Err(self.cancelled(completed));
            }
            let after = self.monitor.read_aggregate()?;

            if TickDelta::regressed(&before, &after) {
                self.log().warn(&format!(
                    "Counters went backwards in window {}; clamped to zero",
                    completed + 1
                ));
            }
            let delta = after.delta_since(&before);
            if delta.is_zero() {
                self.log()
                    .warn(&format!("No tick progress in window {}", completed + 1));
            }
            self.log().debug(&format!(
                "Window {}/{sample_count}: active +{} of total +{}",
                completed + 1,
                delta.active,
                delta.total
            ));
            window = window.accumulate(delta);
        }

        let utilization = Utilization::from_ticks(window.active, window.total, sample_count);
        if utilization.is_zero_window() {
            self.log().warn(&format!(
                "No tick progress across {sample_count} window(s); reporting 0%"
            ));
        }
        Ok(utilization)
    }

    /// Share of the machine used by `pid` over one window of `interval`.
    ///
    /// Computes `100 × Δprocess-active / Δsystem-total`; with
    /// [`LoadScale::PerCore`] the result is multiplied by the core count.
    ///
    /// # Errors
    ///
    /// Fails with any read or parse error, with [`SensorError::NotFound`] if
    /// the pid was recycled by a different process during the window, or with
    /// [`SensorError::Cancelled`] if `cancel` fires.
    pub fn process_usage(
        &self,
        pid: u32,
        interval: Duration,
        cancel: &CancelToken,
    ) -> Result<Utilization> {
        if cancel.is_cancelled() {
            return Err(self.cancelled(0));
        }

        let system_before = self.monitor.read_counter_series()?;
        let process_before = self.monitor.read_process_stat(pid)?;
        if cancel.wait(interval) {
            return Err(self.cancelled(0));
        }
        let system_after = self.monitor.read_counter_series()?;
        let process_after = self.monitor.read_process_stat(pid)?;

        if process_after.starttime != process_before.starttime {
            self.log().warn(&format!(
                "Pid {pid} was reused during the window ({} -> {})",
                process_before.command, process_after.command
            ));
            return Err(SensorError::not_found(
                self.monitor.describe(CounterFile::ProcessStat(pid)),
            ));
        }

        let system = system_after.aggregate().delta_since(system_before.aggregate());
        let process = process_after.active().saturating_sub(process_before.active());
        self.log().debug(&format!(
            "Pid {pid}: active +{process} of system total +{}",
            system.total
        ));

        let utilization = Utilization::from_ticks(process, system.total, 1);
        if utilization.is_zero_window() {
            self.log()
                .warn(&format!("No system tick progress while sampling pid {pid}"));
        }

        Ok(match self.monitor.load_scale() {
            LoadScale::System => utilization,
            LoadScale::PerCore => utilization.scaled(system_after.core_count() as f64),
        })
    }
}
