//! Shared failure taxonomy for connection lifecycle errors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a connection lifecycle failure.
///
/// The class drives the retry decision in the startup supervisor and
/// is part of the serializable error surface handed to the admin
/// layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Bad or missing descriptor fields, init scripts, or settings.
    Configuration,
    /// Credentials were rejected by the server.
    Authentication,
    /// The target database does not exist.
    DatabaseMissing,
    /// The connection succeeded but the role lacks superuser rights.
    NotSuperuser,
    /// A connection-level failure assumed transient: timeouts, refused
    /// connections, DNS failures.
    TransientConnectivity,
    /// A concurrent identical start attempt was already in progress.
    DuplicateAttempt,
    /// An isolated script-runner process could not be spawned.
    RunnerSpawn,
    /// An isolated script-runner process exited unexpectedly.
    RunnerCrashed,
    /// A programming-level anomaly outside the documented shapes.
    Internal,
}

impl ErrorClass {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Authentication => "authentication",
            Self::DatabaseMissing => "database_missing",
            Self::NotSuperuser => "not_superuser",
            Self::TransientConnectivity => "transient_connectivity",
            Self::DuplicateAttempt => "duplicate_attempt",
            Self::RunnerSpawn => "runner_spawn",
            Self::RunnerCrashed => "runner_crashed",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
