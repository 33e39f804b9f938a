//! Active/idle/total tick derivation.
//!
//! All sums saturate at `u64::MAX` instead of wrapping.

use crate::process::ProcessStat;
use crate::stat::CounterSnapshot;

fn saturating_sum(values: &[u64]) -> u64 {
    values.iter().fold(0u64, |acc, v| acc.saturating_add(*v))
}

/// user + nice + system + irq + softirq + steal
#[must_use]
pub fn active(s: &CounterSnapshot) -> u64 {
    saturating_sum(&[s.user, s.nice, s.system, s.irq, s.softirq, s.steal])
}

/// idle + iowait
#[must_use]
pub fn idle(s: &CounterSnapshot) -> u64 {
    s.idle.saturating_add(s.iowait)
}

/// active + idle. Guest time is already part of user/nice and is not added again.
#[must_use]
pub fn total(s: &CounterSnapshot) -> u64 {
    active(s).saturating_add(idle(s))
}

/// utime + stime + cutime + cstime
#[must_use]
pub fn process_active(p: &ProcessStat) -> u64 {
    saturating_sum(&[p.utime, p.stime, p.cutime, p.cstime])
}

/// Tick progress between two readings of the same counter line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickDelta {
    pub active: u64,
    pub total: u64,
}

impl TickDelta {
    /// Progress from `earlier` to `later`.
    ///
    /// A window whose counters went backwards is zero as a whole: if either
    /// sum decreased, or active grew by more than total (iowait may
    /// decrease), neither component is counted.
    #[must_use]
    pub fn between(earlier: &CounterSnapshot, later: &CounterSnapshot) -> Self {
        let active = later.active().checked_sub(earlier.active());
        let total = later.total().checked_sub(earlier.total());
        match (active, total) {
            (Some(active), Some(total)) if active <= total => Self { active, total },
            _ => Self::default(),
        }
    }

    /// Whether the window from `earlier` to `later` went backwards and is
    /// clamped by [`Self::between`].
    #[must_use]
    pub fn regressed(earlier: &CounterSnapshot, later: &CounterSnapshot) -> bool {
        match (
            later.active().checked_sub(earlier.active()),
            later.total().checked_sub(earlier.total()),
        ) {
            (Some(active), Some(total)) => active > total,
            _ => true,
        }
    }

    /// Sum of two windows.
    #[must_use]
    pub fn accumulate(self, other: Self) -> Self {
        Self {
            active: self.active.saturating_add(other.active),
            total: self.total.saturating_add(other.total),
        }
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.total == 0
    }
}
