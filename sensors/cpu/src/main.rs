//! jiffymon-cpu: CPU usage monitor.
//!
//! Samples system-wide or per-process CPU usage from procfs and prints one
//! JSON report per reading.

use anyhow::{bail, Context};
use clap::Parser;
use jiffymon_core::{
    logging, CancelToken, LoadScale, LogLevel, LogSink, MonitorConfig, SensorError, TracingSink,
};
use jiffymon_cpu::{CpuMonitor, ProcFs, Utilization};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

/// Command-line arguments for the CPU monitor.
#[derive(Parser)]
#[command(name = "jiffymon-cpu")]
#[command(about = "CPU usage monitor reading kernel tick counters")]
#[command(version)]
#[command(author)]
struct Args {
    /// Sampling window in milliseconds (minimum 100ms)
    #[arg(short, long, value_parser = validate_interval)]
    interval: Option<u64>,

    /// Windows averaged per system-wide reading
    #[arg(short, long, value_parser = validate_sample_count)]
    samples: Option<u32>,

    /// Report the share used by this process instead of the whole system
    #[arg(short, long)]
    pid: Option<u32>,

    /// Express per-process usage per core (a process busy on two cores reports 200)
    #[arg(long)]
    per_core: bool,

    /// One-shot mode (output once and exit)
    #[arg(short, long)]
    once: bool,

    /// Abandon a reading that takes longer than this many milliseconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Treat a window without tick progress as an error instead of 0%
    #[arg(long)]
    strict: bool,

    /// Where procfs is mounted
    #[arg(long)]
    proc_root: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<LogLevel>,

    /// Also write log messages to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Verify the counter files are readable and exit
    #[arg(long)]
    check: bool,

    /// Generate example config file and exit
    #[arg(long)]
    generate_config: bool,
}

/// Validate that the interval is at least 100ms.
fn validate_interval(s: &str) -> Result<u64, String> {
    let interval = s
        .parse::<u64>()
        .map_err(|_| "Interval must be a positive integer".to_owned())?;

    if interval < MonitorConfig::MIN_SAMPLE_INTERVAL {
        return Err(format!(
            "Interval must be at least {}ms",
            MonitorConfig::MIN_SAMPLE_INTERVAL
        ));
    }

    Ok(interval)
}

/// Validate that at least one window is requested.
fn validate_sample_count(s: &str) -> Result<u32, String> {
    match s.parse::<u32>() {
        Ok(0) => Err("Sample count must be at least 1".to_owned()),
        Ok(count) => Ok(count),
        Err(_) => Err("Sample count must be a positive integer".to_owned()),
    }
}

/// What one reading measures.
#[derive(Debug, Clone, Copy)]
enum Target {
    System,
    Process(u32),
}

/// How a reading ended.
enum Reading {
    Finished(jiffymon_core::Result<Utilization>),
    TimedOut,
    Interrupted,
}

/// One line of output.
#[derive(Debug, Serialize)]
struct Report {
    scope: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pid: Option<u32>,
    percent: f64,
    zero_window: bool,
    samples: u32,
    interval_ms: u64,
    load_scale: LoadScale,
}

impl Report {
    fn new(target: Target, usage: Utilization, config: &MonitorConfig) -> Self {
        let (scope, pid, samples) = match target {
            Target::System => ("system", None, config.sample_count),
            Target::Process(pid) => ("process", Some(pid), 1),
        };
        Self {
            scope,
            pid,
            percent: usage.percent(),
            zero_window: usage.is_zero_window(),
            samples,
            interval_ms: config.sample_interval_ms,
            load_scale: config.load_scale,
        }
    }
}

/// Load the config file and apply command line overrides.
fn resolve_config(args: &Args) -> anyhow::Result<MonitorConfig> {
    let mut config = MonitorConfig::load().context("Failed to load configuration")?;

    if let Some(interval) = args.interval {
        config = config.with_sample_interval_ms(interval);
    }
    if let Some(samples) = args.samples {
        config = config.with_sample_count(samples);
    }
    if args.per_core {
        config = config.with_load_scale(LoadScale::PerCore);
    }
    if let Some(root) = &args.proc_root {
        config = config.with_proc_root(root);
    }
    if let Some(level) = args.log_level {
        config.log.level = level;
    }
    if let Some(file) = &args.log_file {
        config.log.file = Some(file.clone());
    }

    config.validate()?;
    Ok(config)
}

/// Run one reading on a blocking worker, cancelling it on Ctrl-C or timeout.
async fn take_reading(
    monitor: &Arc<CpuMonitor<ProcFs>>,
    target: Target,
    config: &MonitorConfig,
    timeout: Option<Duration>,
) -> anyhow::Result<Reading> {
    let token = CancelToken::new();
    let mut worker = {
        let monitor = Arc::clone(monitor);
        let token = token.clone();
        let count = config.sample_count;
        let interval = config.sample_interval();
        tokio::task::spawn_blocking(move || match target {
            Target::System => monitor.sample_system_usage(count, interval, &token),
            Target::Process(pid) => monitor.sample_process_usage(pid, interval, &token),
        })
    };

    let deadline = async {
        match timeout {
            Some(limit) => time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };

    let stopped = tokio::select! {
        result = &mut worker => return Ok(Reading::Finished(result?)),
        () = deadline => Reading::TimedOut,
        _ = tokio::signal::ctrl_c() => Reading::Interrupted,
    };

    token.cancel();
    match worker.await? {
        Err(SensorError::Cancelled { .. }) => Ok(stopped),
        finished => Ok(Reading::Finished(finished)),
    }
}

/// Turn a finished reading into a report, honouring `--strict`.
fn to_report(
    result: jiffymon_core::Result<Utilization>,
    target: Target,
    config: &MonitorConfig,
    strict: bool,
) -> jiffymon_core::Result<Report> {
    let usage = result?;
    if strict {
        usage.into_strict()?;
    }
    Ok(Report::new(target, usage, config))
}

/// Main entry point for the CPU monitor.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Handle config generation
    if args.generate_config {
        let Some(config_path) = MonitorConfig::default_config_path() else {
            bail!("Could not determine config directory");
        };
        MonitorConfig::save_example_config_to_file(&config_path)?;
        println!("Generated example config at: {}", config_path.display());
        println!("\nYou can now edit this file to customize sampling and logging.");
        return Ok(());
    }

    let config = resolve_config(&args)?;
    let guard = logging::init(&config.log)?;
    let sink = Arc::new(TracingSink);

    let monitor = Arc::new(
        CpuMonitor::new(ProcFs::with_root(&config.proc_root), sink.clone())
            .with_load_scale(config.load_scale),
    );

    // Check availability if requested
    if args.check {
        monitor
            .check_availability()
            .context("CPU counters are not available")?;
        if let Some(pid) = args.pid {
            monitor
                .read_process_stat(pid)
                .with_context(|| format!("Process {pid} is not readable"))?;
        }
        println!("CPU counters are available");
        match monitor.cpu_info() {
            Ok(info) => println!("{}", info.format_info()),
            Err(e) => sink.warn(&format!("No processor description: {e}")),
        }
        guard.shutdown();
        return Ok(());
    }

    let target = args.pid.map_or(Target::System, Target::Process);
    let timeout = args.timeout.map(Duration::from_millis);
    sink.info(&format!(
        "Sampling {target:?}: {} x {}ms windows, {} scale",
        config.sample_count, config.sample_interval_ms, config.load_scale
    ));

    let mut ticker = time::interval(config.sample_interval());
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let result = match take_reading(&monitor, target, &config, timeout).await? {
            Reading::Finished(result) => result,
            Reading::TimedOut => {
                let limit = timeout.unwrap_or_default().as_millis();
                let err = anyhow::anyhow!("Reading timed out after {limit}ms");
                if args.once {
                    return Err(err);
                }
                sink.error(&err.to_string());
                continue;
            }
            Reading::Interrupted => {
                sink.info("Interrupted, shutting down");
                break;
            }
        };

        match to_report(result, target, &config, args.strict) {
            Ok(report) => {
                println!("{}", serde_json::to_string(&report)?);
                io::stdout().flush()?;
            }
            Err(e) if args.once => return Err(e.into()),
            // Continue running on errors, they are already logged
            Err(e) if e.is_temporary() => sink.warn(&e.to_string()),
            Err(SensorError::NotFound { .. }) if matches!(target, Target::Process(_)) => {
                sink.info("Process is gone, shutting down");
                break;
            }
            Err(_) => {} // already logged by the monitor
        }

        if args.once {
            break;
        }
    }

    guard.shutdown();
    Ok(())
}
