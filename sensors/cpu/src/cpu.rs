//! CPU counter monitor.
//!
//! [`CpuMonitor`] ties a [`CounterSource`] to a parsing format and a log
//! sink, and exposes the read and sampling operations on top of them. It
//! holds no snapshots between calls; every operation reads fresh counters.

use crate::format::{LinuxProcFormat, ProcessStatParser, SeriesParser};
use crate::process::ProcessStat;
use crate::reader::{CounterFile, CounterSource};
use crate::sampler::{Utilization, UtilizationSampler};
use crate::stat::{CounterSeries, CounterSnapshot};
use jiffymon_core::{CancelToken, LoadScale, LogSink, Result, SensorError};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Reads and samples CPU counters.
///
/// # Examples
///
/// ```rust,no_run
/// use jiffymon_cpu::{CpuMonitor, ProcFs};
/// use jiffymon_core::{CancelToken, TracingSink};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let monitor = CpuMonitor::new(ProcFs::new(), Arc::new(TracingSink));
/// let usage = monitor.sample_system_usage(5, Duration::from_millis(500), &CancelToken::new())?;
/// println!("CPU usage: {:.1}%", usage.percent());
/// # Ok::<(), jiffymon_core::SensorError>(())
/// ```
pub struct CpuMonitor<R, F = LinuxProcFormat> {
    source: R,
    format: F,
    log: Arc<dyn LogSink>,
    load_scale: LoadScale,
}

impl<R: fmt::Debug, F: fmt::Debug> fmt::Debug for CpuMonitor<R, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpuMonitor")
            .field("source", &self.source)
            .field("format", &self.format)
            .field("load_scale", &self.load_scale)
            .finish_non_exhaustive()
    }
}

impl<R: CounterSource> CpuMonitor<R> {
    /// Monitor reading the Linux procfs layout from `source`.
    pub fn new(source: R, log: Arc<dyn LogSink>) -> Self {
        Self {
            source,
            format: LinuxProcFormat,
            log,
            load_scale: LoadScale::default(),
        }
    }
}

impl<R, F> CpuMonitor<R, F>
where
    R: CounterSource,
    F: SeriesParser + ProcessStatParser,
{
    /// Swap the parsing format.
    pub fn with_format<G>(self, format: G) -> CpuMonitor<R, G>
    where
        G: SeriesParser + ProcessStatParser,
    {
        CpuMonitor {
            source: self.source,
            format,
            log: self.log,
            load_scale: self.load_scale,
        }
    }

    /// Set how per-process readings are expressed.
    #[must_use]
    pub fn with_load_scale(mut self, scale: LoadScale) -> Self {
        self.load_scale = scale;
        self
    }

    #[must_use]
    pub fn load_scale(&self) -> LoadScale {
        self.load_scale
    }

    pub fn log(&self) -> &dyn LogSink {
        self.log.as_ref()
    }

    pub fn source(&self) -> &R {
        &self.source
    }

    /// Where `file` is read from, for messages.
    pub fn describe(&self, file: CounterFile) -> PathBuf {
        self.source.describe(file)
    }

    fn report(&self, err: SensorError) -> SensorError {
        self.log.error(&err.to_string());
        err
    }

    fn read_text(&self, file: CounterFile) -> Result<String> {
        self.source.read(file).map_err(|e| self.report(e))
    }

    /// Read and parse the aggregate and per-core counters.
    ///
    /// # Errors
    ///
    /// Returns the reader's [`SensorError::NotFound`] or
    /// [`SensorError::Unreadable`], or a [`SensorError::Parse`] from the
    /// format. Every failure is logged once at error level.
    pub fn read_counter_series(&self) -> Result<CounterSeries> {
        let text = self.read_text(CounterFile::SystemCounters)?;
        self.format.parse_series(&text).map_err(|e| self.report(e))
    }

    /// Read the aggregate counter line only.
    pub fn read_aggregate(&self) -> Result<CounterSnapshot> {
        self.read_counter_series().map(CounterSeries::into_aggregate)
    }

    /// Read and parse `pid`'s status line.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::NotFound`] if the process does not exist (or
    /// exited while being read), or a [`SensorError::Parse`] if the line is
    /// malformed or belongs to another pid.
    pub fn read_process_stat(&self, pid: u32) -> Result<ProcessStat> {
        let text = self.read_text(CounterFile::ProcessStat(pid))?;
        self.format
            .parse_process_stat(&text, pid)
            .map_err(|e| self.report(e))
    }

    /// Sampler borrowing this monitor.
    pub fn sampler(&self) -> UtilizationSampler<'_, R, F> {
        UtilizationSampler::new(self)
    }

    /// See [`UtilizationSampler::system_usage`].
    pub fn sample_system_usage(
        &self,
        sample_count: u32,
        interval: Duration,
        cancel: &CancelToken,
    ) -> Result<Utilization> {
        self.sampler().system_usage(sample_count, interval, cancel)
    }

    /// See [`UtilizationSampler::process_usage`].
    pub fn sample_process_usage(
        &self,
        pid: u32,
        interval: Duration,
        cancel: &CancelToken,
    ) -> Result<Utilization> {
        self.sampler().process_usage(pid, interval, cancel)
    }

    /// Aggregate active + idle ticks since boot.
    pub fn total_jiffies(&self) -> Result<u64> {
        self.read_aggregate().map(|s| s.total())
    }

    /// Aggregate active ticks since boot.
    pub fn active_jiffies(&self) -> Result<u64> {
        self.read_aggregate().map(|s| s.active())
    }

    /// Aggregate idle ticks since boot.
    pub fn idle_jiffies(&self) -> Result<u64> {
        self.read_aggregate().map(|s| s.idle())
    }

    /// Ticks `pid` and its waited-for children have run.
    ///
    /// This is an absolute count since the process started, not a share of
    /// anything; use [`Self::sample_process_usage`] for a percentage.
    pub fn process_active_jiffies(&self, pid: u32) -> Result<u64> {
        self.read_process_stat(pid).map(|p| p.active())
    }

    /// Processor description from the CPU information source.
    pub fn cpu_info(&self) -> Result<CpuInfo> {
        let text = self.read_text(CounterFile::CpuInfo)?;
        Ok(CpuInfo::parse(&text))
    }

    /// Verify that the system counters can be read and parsed.
    pub fn check_availability(&self) -> Result<()> {
        let series = self.read_counter_series()?;
        self.log.debug(&format!(
            "Counter source available: {} core line(s)",
            series.cores().len()
        ));
        Ok(())
    }
}

/// CPU information extracted from `/proc/cpuinfo`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpuInfo {
    /// CPU model name
    pub model_name: String,
    /// Number of logical processors
    pub core_count: usize,
    /// First reported frequency in MHz (if available)
    pub frequency_mhz: Option<f64>,
}

impl CpuInfo {
    /// Parse cpuinfo content.
    ///
    /// Unknown keys are ignored and a missing model name becomes
    /// `"Unknown CPU"`; the format varies too much across architectures to
    /// reject anything.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let mut model_name = None;
        let mut core_count = 0;
        let mut frequency = None;

        for line in content.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "model name" if model_name.is_none() => model_name = Some(value.to_owned()),
                "processor" => core_count += 1,
                "cpu MHz" if frequency.is_none() => frequency = value.parse().ok(),
                _ => {}
            }
        }

        Self {
            model_name: model_name.unwrap_or_else(|| "Unknown CPU".to_owned()),
            core_count,
            frequency_mhz: frequency,
        }
    }

    /// Format CPU information as a human-readable string.
    #[must_use]
    pub fn format_info(&self) -> String {
        let mut info = format!("CPU: {}\nCores: {}", self.model_name, self.core_count);
        if let Some(mhz) = self.frequency_mhz {
            info.push_str(&format!("\nFrequency: {}", frequency_to_human(mhz)));
        }
        info
    }
}

fn frequency_to_human(mhz: f64) -> String {
    if mhz >= 1000.0 {
        format!("{:.1}GHz", mhz / 1000.0)
    } else {
        format!("{mhz:.0}MHz")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::ProcFs;
    use crate::testing::{process_line, ScriptedSource};
    use jiffymon_core::{LogLevel, MemorySink, NullSink};
    use std::fs;

    const STAT: &str = "cpu  100 0 50 800 10 0 0 0 0 0\n\
                        cpu0 60 0 30 400 5 0 0 0 0 0\n\
                        cpu1 40 0 20 400 5 0 0 0 0 0\n\
                        intr 12345 0 0\n\
                        ctxt 999\n";

    const CPUINFO: &str = r#"
processor       : 0
model name      : Intel(R) Core(TM) i7-8700K CPU @ 3.70GHz
cpu MHz         : 3700.000

processor       : 1
model name      : Intel(R) Core(TM) i7-8700K CPU @ 3.70GHz
cpu MHz         : 3600.000
"#;

    fn proc_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("stat"), STAT).unwrap();
        fs::write(dir.path().join("cpuinfo"), CPUINFO).unwrap();
        fs::create_dir(dir.path().join("4242")).unwrap();
        fs::write(
            dir.path().join("4242/stat"),
            process_line(4242, "tmux: server", 30, 12, 777),
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_read_counter_series() {
        let dir = proc_tree();
        let monitor = CpuMonitor::new(ProcFs::with_root(dir.path()), Arc::new(NullSink));

        let series = monitor.read_counter_series().unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.core_count(), 2);
        assert_eq!(series.aggregate().total(), 960);
        assert_eq!(series.cores()[1].label, "cpu1");
    }

    #[test]
    fn test_jiffies_accessors() {
        let dir = proc_tree();
        let monitor = CpuMonitor::new(ProcFs::with_root(dir.path()), Arc::new(NullSink));

        assert_eq!(monitor.active_jiffies().unwrap(), 150);
        assert_eq!(monitor.idle_jiffies().unwrap(), 810);
        assert_eq!(monitor.total_jiffies().unwrap(), 960);
        assert_eq!(monitor.process_active_jiffies(4242).unwrap(), 42);
    }

    #[test]
    fn test_read_process_stat() {
        let dir = proc_tree();
        let monitor = CpuMonitor::new(ProcFs::with_root(dir.path()), Arc::new(NullSink));

        let stat = monitor.read_process_stat(4242).unwrap();
        assert_eq!(stat.command, "tmux: server");
        assert_eq!(stat.starttime, 777);

        let err = monitor.read_process_stat(4243).unwrap_err();
        match err {
            SensorError::NotFound { path } => assert_eq!(path, dir.path().join("4243/stat")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_failures_logged_once() {
        let sink = Arc::new(MemorySink::new());
        let monitor = CpuMonitor::new(ScriptedSource::repeating("intr 1\n"), sink.clone());

        assert!(matches!(
            monitor.read_counter_series(),
            Err(SensorError::Parse { .. })
        ));
        assert!(matches!(
            monitor.read_process_stat(1),
            Err(SensorError::NotFound { .. })
        ));
        assert_eq!(sink.count(LogLevel::Error), 2);
    }

    #[test]
    fn test_check_availability() {
        let dir = proc_tree();
        let monitor = CpuMonitor::new(ProcFs::with_root(dir.path()), Arc::new(NullSink));
        assert!(monitor.check_availability().is_ok());

        let empty = tempfile::tempdir().unwrap();
        let monitor = CpuMonitor::new(ProcFs::with_root(empty.path()), Arc::new(NullSink));
        assert!(matches!(
            monitor.check_availability(),
            Err(SensorError::NotFound { .. })
        ));
    }

    #[test]
    fn test_custom_format() {
        struct Fixed;

        impl SeriesParser for Fixed {
            fn parse_series(&self, _text: &str) -> Result<CounterSeries> {
                CounterSeries::parse("cpu 1 1 1 1 1 1 1 1 1 1\n")
            }
        }

        impl ProcessStatParser for Fixed {
            fn parse_process_stat(&self, _text: &str, _pid: u32) -> Result<ProcessStat> {
                Err(SensorError::parse("unsupported"))
            }
        }

        let monitor = CpuMonitor::new(ScriptedSource::repeating("anything"), Arc::new(NullSink))
            .with_format(Fixed);
        assert_eq!(monitor.total_jiffies().unwrap(), 8);
    }

    #[test]
    fn test_cpu_info() {
        let dir = proc_tree();
        let monitor = CpuMonitor::new(ProcFs::with_root(dir.path()), Arc::new(NullSink));

        let info = monitor.cpu_info().unwrap();
        assert_eq!(info.model_name, "Intel(R) Core(TM) i7-8700K CPU @ 3.70GHz");
        assert_eq!(info.core_count, 2);
        assert_eq!(info.frequency_mhz, Some(3700.0));
    }

    #[test]
    fn test_cpu_info_without_model() {
        let info = CpuInfo::parse("processor : 0\nBogoMIPS : 48.00\n");
        assert_eq!(info.model_name, "Unknown CPU");
        assert_eq!(info.core_count, 1);
        assert_eq!(info.frequency_mhz, None);
    }

    #[test]
    fn test_format_info() {
        let info = CpuInfo::parse(CPUINFO);
        assert_eq!(
            info.format_info(),
            "CPU: Intel(R) Core(TM) i7-8700K CPU @ 3.70GHz\nCores: 2\nFrequency: 3.7GHz"
        );
        assert_eq!(frequency_to_human(800.0), "800MHz");
    }
}
