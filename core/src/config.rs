//! Configuration loaded from `~/.config/jiffymon/config.ron`.

use crate::error::{Result, SensorError};
use crate::logging::LogLevel;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How a per-process share is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadScale {
    /// Share of the whole machine, 0-100.
    System,
    /// Share of one core, 0-100 per core (a process busy on two cores of
    /// an eight-core machine reports 200).
    PerCore,
}

impl Default for LoadScale {
    fn default() -> Self {
        Self::System
    }
}

impl fmt::Display for LoadScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::System => "system",
            Self::PerCore => "percore",
        };
        f.write_str(name)
    }
}

/// Logging settings consumed by [`crate::logging::init`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct LogConfig {
    /// Minimum level written (overridden by `RUST_LOG`)
    #[serde(default)]
    pub level: LogLevel,
    /// Optional file that receives a copy of every message
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Monitor settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MonitorConfig {
    /// Number of windows averaged for a system-wide reading
    #[serde(default = "default_sample_count")]
    pub sample_count: u32,
    /// Length of one sampling window in milliseconds (minimum 100ms)
    #[serde(
        default = "default_sample_interval",
        deserialize_with = "validate_sample_interval"
    )]
    pub sample_interval_ms: u64,
    /// Scale used for per-process readings
    #[serde(default)]
    pub load_scale: LoadScale,
    /// Mount point of procfs
    #[serde(default = "default_proc_root")]
    pub proc_root: PathBuf,
    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
}

fn default_sample_count() -> u32 {
    5
}

fn default_sample_interval() -> u64 {
    500
}

fn default_proc_root() -> PathBuf {
    PathBuf::from("/proc")
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sample_count: default_sample_count(),
            sample_interval_ms: default_sample_interval(),
            load_scale: LoadScale::default(),
            proc_root: default_proc_root(),
            log: LogConfig::default(),
        }
    }
}

/// Validate the sampling interval during deserialization.
fn validate_sample_interval<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let interval = u64::deserialize(deserializer)?;
    if interval < MonitorConfig::MIN_SAMPLE_INTERVAL {
        return Err(serde::de::Error::custom(format!(
            "Sample interval must be at least {}ms, got {}ms",
            MonitorConfig::MIN_SAMPLE_INTERVAL,
            interval
        )));
    }
    Ok(interval)
}

impl MonitorConfig {
    /// Minimum allowed sampling interval in milliseconds.
    pub const MIN_SAMPLE_INTERVAL: u64 = 100;

    /// Load configuration from the standard config file location.
    ///
    /// Searches for config in:
    /// 1. ~/.config/jiffymon/config.ron
    /// 2. ~/.jiffymon/config.ron (fallback)
    ///
    /// Returns default config if no file is found.
    pub fn load() -> Result<Self> {
        match Self::find_config_file() {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SensorError::from_io(path, e))?;

        let config: Self = ron::from_str(&content).map_err(|e| {
            SensorError::config_with_value(
                format!("Failed to parse config file: {e}"),
                path.display().to_string(),
            )
        })?;
        config.validate()?;

        Ok(config)
    }

    /// Find the config file in standard locations.
    pub fn find_config_file() -> Option<PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            let xdg_path = config_dir.join("jiffymon").join("config.ron");
            if xdg_path.exists() {
                return Some(xdg_path);
            }
        }

        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir.join(".jiffymon").join("config.ron");
            if home_path.exists() {
                return Some(home_path);
            }
        }

        None
    }

    /// Get the default config file path for writing.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("jiffymon").join("config.ron"))
    }

    /// Save configuration to a specific file path.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SensorError::from_io(parent, e))?;
        }

        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| SensorError::config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content).map_err(|e| SensorError::from_io(path, e))?;

        Ok(())
    }

    /// Save a commented example configuration to `path`.
    pub fn save_example_config_to_file(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SensorError::from_io(parent, e))?;
        }

        let template = r##"// jiffymon configuration
// Command line arguments override these settings.
(
    // Windows averaged for one system-wide reading
    sample_count: 5,

    // Length of one window in milliseconds (minimum 100)
    sample_interval_ms: 500,

    // Per-process readings: system (0-100 of the machine) or percore (0-100 per core)
    load_scale: system,

    // Where procfs is mounted
    proc_root: "/proc",

    log: (
        // error, warn, info, debug, trace (RUST_LOG wins when set)
        level: info,
        // Copy of every message, in addition to stderr. Use an absolute path.
        // file: Some("/var/log/jiffymon/system_monitor.log"),
    ),
)
"##;

        std::fs::write(path, template).map_err(|e| SensorError::from_io(path, e))?;
        Ok(())
    }

    /// Reject settings the sampler cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sample_count == 0 {
            return Err(SensorError::config_with_value(
                "Sample count must be at least 1",
                "0",
            ));
        }
        if self.sample_interval_ms < Self::MIN_SAMPLE_INTERVAL {
            return Err(SensorError::config_with_value(
                format!(
                    "Sample interval must be at least {}ms",
                    Self::MIN_SAMPLE_INTERVAL
                ),
                self.sample_interval_ms.to_string(),
            ));
        }
        Ok(())
    }

    /// Set the number of averaged windows.
    #[must_use]
    pub fn with_sample_count(mut self, count: u32) -> Self {
        self.sample_count = count;
        self
    }

    /// Set the window length in milliseconds.
    #[must_use]
    pub fn with_sample_interval_ms(mut self, millis: u64) -> Self {
        self.sample_interval_ms = millis;
        self
    }

    /// Set the per-process scale.
    #[must_use]
    pub fn with_load_scale(mut self, scale: LoadScale) -> Self {
        self.load_scale = scale;
        self
    }

    /// Set the procfs mount point.
    #[must_use]
    pub fn with_proc_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.proc_root = root.into();
        self
    }

    /// Get the window length as a Duration.
    #[must_use]
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}
