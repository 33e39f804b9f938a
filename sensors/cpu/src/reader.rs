//! Raw access to the kernel counter pseudo-files.

use jiffymon_core::{Result, SensorError};
use std::fs;
use std::path::{Path, PathBuf};

/// Logical identifier of a counter source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterFile {
    /// Aggregate and per-core tick counters (`/proc/stat`)
    SystemCounters,
    /// One process's status line (`/proc/<pid>/stat`)
    ProcessStat(u32),
    /// Processor description (`/proc/cpuinfo`)
    CpuInfo,
}

impl CounterFile {
    /// Location relative to the procfs root.
    #[must_use]
    pub fn relative_path(self) -> PathBuf {
        match self {
            Self::SystemCounters => PathBuf::from("stat"),
            Self::ProcessStat(pid) => PathBuf::from(pid.to_string()).join("stat"),
            Self::CpuInfo => PathBuf::from("cpuinfo"),
        }
    }
}

/// Reads a counter source into text.
///
/// Implementations fail with [`SensorError::NotFound`] when the source is
/// absent and [`SensorError::Unreadable`] for any other I/O failure. They
/// never retry and never cache.
pub trait CounterSource {
    fn read(&self, file: CounterFile) -> Result<String>;

    /// Where `file` lives, for error messages.
    fn describe(&self, file: CounterFile) -> PathBuf {
        file.relative_path()
    }
}

impl<T: CounterSource + ?Sized> CounterSource for &T {
    fn read(&self, file: CounterFile) -> Result<String> {
        (**self).read(file)
    }

    fn describe(&self, file: CounterFile) -> PathBuf {
        (**self).describe(file)
    }
}

/// Reads counter sources from a mounted procfs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcFs {
    root: PathBuf,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcFs {
    /// Standard procfs mount point.
    pub const DEFAULT_ROOT: &'static str = "/proc";

    /// Reader rooted at `/proc`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_root(Self::DEFAULT_ROOT)
    }

    /// Reader rooted somewhere else (useful for testing).
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of `file` under this root.
    #[must_use]
    pub fn path_of(&self, file: CounterFile) -> PathBuf {
        self.root.join(file.relative_path())
    }

    /// Verify that the system counter file exists and is readable.
    pub fn check_availability(&self) -> Result<()> {
        let path = self.path_of(CounterFile::SystemCounters);
        if !path.exists() {
            return Err(SensorError::not_found(path));
        }
        self.read(CounterFile::SystemCounters).map(|_| ())
    }
}

impl CounterSource for ProcFs {
    fn read(&self, file: CounterFile) -> Result<String> {
        let path = self.path_of(file);
        let bytes = fs::read(&path).map_err(|e| SensorError::from_io(&path, e))?;
        // A process name may hold arbitrary bytes; every other field is ASCII.
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn describe(&self, file: CounterFile) -> PathBuf {
        self.path_of(file)
    }
}
