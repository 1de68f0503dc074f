//! Runner resource statistics.

use serde::{Deserialize, Serialize};

/// Point-in-time resource usage of a runner process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunnerStats {
    /// CPU usage as a percentage of one core since the last reading.
    pub cpu_percent: f64,
    /// Resident memory in bytes.
    pub memory_bytes: u64,
}

/// Best-effort stats reading for a runner slot.
///
/// Failures to read OS-level statistics degrade to `NotRunning`
/// rather than raising.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunnerStatsReading {
    /// The slot has no live process (or its stats are unreadable).
    NotRunning,
    /// The slot's process is alive with the given usage.
    Stats(RunnerStats),
}

impl RunnerStatsReading {
    /// Returns the stats when the slot is running.
    #[must_use]
    pub const fn stats(&self) -> Option<RunnerStats> {
        match self {
            Self::Stats(stats) => Some(*stats),
            Self::NotRunning => None,
        }
    }

    /// Returns whether the reading found a live process.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Stats(_))
    }
}
