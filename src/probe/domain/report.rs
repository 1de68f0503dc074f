//! Successful probe outcome.

use crate::connection::domain::ValidatedConnectionDescriptor;
use serde::{Deserialize, Serialize};

/// Outcome of a successful connection probe.
///
/// Created per probe attempt and discarded once folded into startup
/// state or returned to the caller. Carries the effective descriptor,
/// which differs from the requested one when the SSL-mode fallback
/// was taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReport {
    descriptor: ValidatedConnectionDescriptor,
    schema_version: Option<String>,
    can_create_db: Option<bool>,
    ssl_fallback_used: bool,
}

impl ProbeReport {
    /// Creates a probe report for an effective descriptor.
    #[must_use]
    pub const fn new(
        descriptor: ValidatedConnectionDescriptor,
        schema_version: Option<String>,
        can_create_db: Option<bool>,
    ) -> Self {
        Self {
            descriptor,
            schema_version,
            can_create_db,
            ssl_fallback_used: false,
        }
    }

    /// Marks the report as obtained through the `sslmode=prefer`
    /// fallback.
    #[must_use]
    pub const fn via_ssl_fallback(mut self) -> Self {
        self.ssl_fallback_used = true;
        self
    }

    /// Returns the effective descriptor the probe connected with.
    #[must_use]
    pub const fn descriptor(&self) -> &ValidatedConnectionDescriptor {
        &self.descriptor
    }

    /// Returns the installed schema version, when discoverable.
    #[must_use]
    pub fn schema_version(&self) -> Option<&str> {
        self.schema_version.as_deref()
    }

    /// Returns whether the role may create databases, when discoverable.
    #[must_use]
    pub const fn can_create_db(&self) -> Option<bool> {
        self.can_create_db
    }

    /// Returns whether the non-SSL fallback path was taken.
    #[must_use]
    pub const fn ssl_fallback_used(&self) -> bool {
        self.ssl_fallback_used
    }
}
