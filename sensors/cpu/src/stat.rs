//! Tick counters from `/proc/stat`.
//!
//! The file starts with one aggregate line (`cpu`) followed by one line per
//! logical core (`cpu0`, `cpu1`, ...). Everything after the first line that
//! does not carry the `cpu` prefix (`intr`, `ctxt`, ...) is ignored. All
//! values are in jiffies (clock ticks).

use crate::jiffies::{self, TickDelta};
use crate::sampler::Utilization;
use jiffymon_core::{Result, SensorError};

/// Prefix of every counter line's label.
pub const COUNTER_PREFIX: &str = "cpu";

/// Numeric fields required after the label.
pub const COUNTER_FIELDS: usize = 10;

/// One line of tick counters, for the whole system or a single core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Line label: `cpu` for the aggregate, `cpuN` for core N
    pub label: String,
    /// Time spent in user mode (normal processes)
    pub user: u64,
    /// Time spent in user mode with low priority (nice)
    pub nice: u64,
    /// Time spent in system mode (kernel)
    pub system: u64,
    /// Time spent idle
    pub idle: u64,
    /// Time waiting for I/O to complete
    pub iowait: u64,
    /// Time servicing hardware interrupts
    pub irq: u64,
    /// Time servicing software interrupts
    pub softirq: u64,
    /// Time stolen by virtualization
    pub steal: u64,
    /// Time running a guest (already counted in `user`)
    pub guest: u64,
    /// Time running a niced guest (already counted in `nice`)
    pub guest_nice: u64,
}

impl CounterSnapshot {
    /// Parse a single counter line.
    ///
    /// # Errors
    ///
    /// Returns a [`SensorError::Parse`] if the label lacks the `cpu` prefix,
    /// fewer than ten values follow it, or a value is not an unsigned integer.
    pub fn parse_line(line: &str) -> Result<Self> {
        let mut tokens = line.split_whitespace();
        let label = tokens
            .next()
            .filter(|label| label.starts_with(COUNTER_PREFIX))
            .ok_or_else(|| SensorError::parse_line("Line is not a counter line", line))?;

        let values = tokens
            .take(COUNTER_FIELDS)
            .map(str::parse::<u64>)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| SensorError::parse_with_source(format!("Invalid counter on '{label}'"), e))?;

        let [user, nice, system, idle, iowait, irq, softirq, steal, guest, guest_nice] =
            <[u64; COUNTER_FIELDS]>::try_from(values).map_err(|values| {
                SensorError::parse_line(
                    format!(
                        "Insufficient counters on '{label}': expected {COUNTER_FIELDS}, got {}",
                        values.len()
                    ),
                    line,
                )
            })?;

        Ok(Self {
            label: label.to_owned(),
            user,
            nice,
            system,
            idle,
            iowait,
            irq,
            softirq,
            steal,
            guest,
            guest_nice,
        })
    }

    /// Whether this is the system-wide line.
    #[must_use]
    pub fn is_aggregate(&self) -> bool {
        self.label == COUNTER_PREFIX
    }

    /// Core number for per-core lines, `None` for the aggregate.
    #[must_use]
    pub fn core_id(&self) -> Option<usize> {
        self.label.strip_prefix(COUNTER_PREFIX)?.parse().ok()
    }

    /// Ticks spent doing work.
    #[must_use]
    pub fn active(&self) -> u64 {
        jiffies::active(self)
    }

    /// Ticks spent idle or waiting on I/O.
    #[must_use]
    pub fn idle(&self) -> u64 {
        jiffies::idle(self)
    }

    /// Active plus idle ticks.
    #[must_use]
    pub fn total(&self) -> u64 {
        jiffies::total(self)
    }

    /// Tick progress since an earlier reading of the same line.
    #[must_use]
    pub fn delta_since(&self, earlier: &Self) -> TickDelta {
        TickDelta::between(earlier, self)
    }

    /// Usage between a previous reading and this one.
    #[must_use]
    pub fn usage_since(&self, prev: &Self) -> Utilization {
        let delta = self.delta_since(prev);
        Utilization::from_ticks(delta.active, delta.total, 1)
    }
}

/// Counter lines in file order: aggregate first, then each core.
///
/// Never empty; element 0 is always the aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSeries {
    snapshots: Vec<CounterSnapshot>,
}

impl CounterSeries {
    /// Parse the text of `/proc/stat`.
    ///
    /// Scanning stops at the first line whose label does not start with
    /// `cpu`; counter lines are contiguous at the top of the file.
    ///
    /// # Errors
    ///
    /// Returns a [`SensorError::Parse`] if a counter line is malformed, no
    /// counter line is present, or the first counter line is not the
    /// aggregate.
    pub fn parse(text: &str) -> Result<Self> {
        let mut snapshots = Vec::new();
        for line in text.lines() {
            let is_counter = line
                .split_whitespace()
                .next()
                .is_some_and(|label| label.starts_with(COUNTER_PREFIX));
            if !is_counter {
                break;
            }
            snapshots.push(CounterSnapshot::parse_line(line)?);
        }

        let first = snapshots
            .first()
            .ok_or_else(|| SensorError::parse("No counter lines found"))?;
        if !first.is_aggregate() {
            return Err(SensorError::parse(format!(
                "First counter line is '{}', expected the '{COUNTER_PREFIX}' aggregate",
                first.label
            )));
        }

        Ok(Self { snapshots })
    }

    /// The system-wide line.
    #[must_use]
    pub fn aggregate(&self) -> &CounterSnapshot {
        &self.snapshots[0]
    }

    /// Per-core lines in file order.
    #[must_use]
    pub fn cores(&self) -> &[CounterSnapshot] {
        &self.snapshots[1..]
    }

    /// Number of cores for normalization; at least 1.
    #[must_use]
    pub fn core_count(&self) -> usize {
        self.cores().len().max(1)
    }

    /// Number of lines including the aggregate.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Always false; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CounterSnapshot> {
        self.snapshots.iter()
    }

    /// Take ownership of the aggregate, dropping the per-core lines.
    #[must_use]
    pub fn into_aggregate(mut self) -> CounterSnapshot {
        self.snapshots.swap_remove(0)
    }
}

impl<'a> IntoIterator for &'a CounterSeries {
    type Item = &'a CounterSnapshot;
    type IntoIter = std::slice::Iter<'a, CounterSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
