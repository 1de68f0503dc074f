//! Aggregated runner telemetry for one connection.

use crate::runner::domain::RunnerStatsReading;
use serde::{Deserialize, Serialize};

/// Stats of all three runner slots of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRunnerStats {
    /// Method-execution runner.
    pub method: RunnerStatsReading,
    /// Post-connect hook runner.
    pub on_mount: RunnerStatsReading,
    /// Schema-configuration runner.
    pub table_config: RunnerStatsReading,
}
