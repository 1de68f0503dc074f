//! Error types for runner supervision.

use super::RunnerKind;
use thiserror::Error;

/// Errors surfaced by the script-runner supervisor.
///
/// Failures are isolated to the slot they occur on; the supervisor
/// itself stays usable for subsequent calls.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunnerError {
    /// The isolated process could not be spawned or did not become
    /// ready.
    #[error("failed to spawn {kind} runner: {detail}")]
    Spawn {
        /// Slot the spawn was for.
        kind: RunnerKind,
        /// Host diagnostic.
        detail: String,
    },
}

/// Error returned while parsing a [`RunnerKind`] from text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown runner kind: {0}")]
pub struct ParseRunnerKindError(pub String);
