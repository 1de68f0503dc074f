//! Retryability classification for startup failures.

use crate::probe::domain::{ErrorClass, ProbeError};
use std::collections::HashSet;

/// Decides whether a classified failure is worth another attempt.
///
/// The class boundary is fixed — configuration, authentication,
/// missing-database, superuser, and duplicate-attempt failures never
/// retry — while the sqlstate boundary is configurable: any code in
/// the fatal set turns an otherwise transient failure terminal. The
/// defaults mirror the two codes the source deployment treats as
/// fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    fatal_codes: HashSet<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            fatal_codes: ["3D000", "28P01"]
                .into_iter()
                .map(ToOwned::to_owned)
                .collect(),
        }
    }
}

impl RetryPolicy {
    /// Creates the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sqlstate code to the fatal set.
    #[must_use]
    pub fn with_fatal_code(mut self, code: impl Into<String>) -> Self {
        self.fatal_codes.insert(code.into());
        self
    }

    /// Returns whether a failure should be retried.
    #[must_use]
    pub fn is_retryable(&self, error: &ProbeError) -> bool {
        match error.class() {
            ErrorClass::Configuration
            | ErrorClass::Authentication
            | ErrorClass::DatabaseMissing
            | ErrorClass::NotSuperuser
            | ErrorClass::DuplicateAttempt
            | ErrorClass::RunnerSpawn
            | ErrorClass::RunnerCrashed
            | ErrorClass::Internal => false,
            ErrorClass::TransientConnectivity => error
                .code()
                .is_none_or(|code| !self.fatal_codes.contains(code)),
        }
    }
}
