//! Wire messages between the supervisor and the `script_runner`
//! binary.
//!
//! The channel is line-delimited JSON over the child's standard
//! streams: the parent writes one [`RunnerPayload`] line to stdin,
//! the child answers with [`RunnerEvent::Ready`] on stdout and then
//! serves [`RunnerCommand`] lines until its stdin closes or it
//! receives a termination signal.

use crate::runner::domain::RunnerKind;
use serde::{Deserialize, Serialize};

/// Environment variable marking a process as a spawned runner.
pub const RUNNER_PROC_ENV: &str = "BRUNEL_RUNNER_PROC";

/// Environment variable carrying the runner kind for diagnostics.
pub const RUNNER_KIND_ENV: &str = "BRUNEL_RUNNER_KIND";

/// Initial payload delivered to a runner process on stdin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerPayload {
    /// Which slot this process serves.
    pub kind: RunnerKind,
    /// The script source to load.
    pub source: String,
    /// Credentials the runner may use; the only ones it ever holds.
    pub connection_uri: String,
}

/// Commands the parent may send after the runner is ready.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum RunnerCommand {
    /// Liveness check.
    Ping,
    /// Resource usage self-report.
    Stats,
}

/// Events a runner process emits on stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunnerEvent {
    /// The source is loaded and the process is serving commands.
    Ready {
        /// The runner's own process ID.
        pid: u32,
    },
    /// Answer to [`RunnerCommand::Ping`].
    Pong,
    /// Answer to [`RunnerCommand::Stats`].
    Stats {
        /// CPU usage percentage self-reported by the runner.
        cpu_percent: f64,
        /// Resident memory in bytes.
        memory_bytes: u64,
    },
    /// The payload or a command could not be handled.
    Error {
        /// Diagnostic detail.
        detail: String,
    },
}

/// Encodes a message as a single wire line.
///
/// # Errors
///
/// Returns serialization failures from `serde_json`.
pub fn encode_line<T: Serialize>(message: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}

/// Decodes a single wire line.
///
/// # Errors
///
/// Returns deserialization failures from `serde_json`.
pub fn decode_line<T: for<'de> Deserialize<'de>>(line: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(line.trim())
}
