//! Observable runner slot state.

use super::{RunnerKind, RunnerStatsReading, SourceRevision};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a runner slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerStatus {
    /// No process; the slot has never started or was destroyed.
    Stopped,
    /// A spawn is underway.
    Starting,
    /// The process is alive with its source loaded.
    Running,
    /// The process exited without being asked to; not auto-restarted.
    Crashed,
}

impl RunnerStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Crashed => "crashed",
        }
    }
}

impl fmt::Display for RunnerStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Snapshot of one runner slot, as reported to the admin layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerSlotSnapshot {
    kind: RunnerKind,
    status: RunnerStatus,
    pid: Option<u32>,
    revision: Option<SourceRevision>,
    last_stats: RunnerStatsReading,
    updated_at: DateTime<Utc>,
}

impl RunnerSlotSnapshot {
    /// Creates a snapshot.
    #[must_use]
    pub const fn new(
        kind: RunnerKind,
        status: RunnerStatus,
        pid: Option<u32>,
        revision: Option<SourceRevision>,
        last_stats: RunnerStatsReading,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            status,
            pid,
            revision,
            last_stats,
            updated_at,
        }
    }

    /// Returns the slot kind.
    #[must_use]
    pub const fn kind(&self) -> RunnerKind {
        self.kind
    }

    /// Returns the slot status.
    #[must_use]
    pub const fn status(&self) -> RunnerStatus {
        self.status
    }

    /// Returns the process ID, when a process is live.
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Returns the loaded source revision, when any.
    #[must_use]
    pub const fn revision(&self) -> Option<&SourceRevision> {
        self.revision.as_ref()
    }

    /// Returns the last-known resource stats reading.
    #[must_use]
    pub const fn last_stats(&self) -> RunnerStatsReading {
        self.last_stats
    }

    /// Returns when the slot last changed state.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
