//! Serializable probe failure.

use super::ErrorClass;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A classified, serializable connection failure.
///
/// The detail is human-readable and must never contain credentials;
/// construction sites only ever feed it server diagnostics and
/// redacted URIs. The optional sqlstate code is preserved so retry
/// policies can refine classification, and the optional hint carries
/// environment-specific guidance for the admin layer.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{class}: {detail}")]
pub struct ProbeError {
    class: ErrorClass,
    detail: String,
    code: Option<String>,
    hint: Option<String>,
}

impl ProbeError {
    /// Creates a probe error from a class and detail message.
    #[must_use]
    pub fn new(class: ErrorClass, detail: impl Into<String>) -> Self {
        Self {
            class,
            detail: detail.into(),
            code: None,
            hint: None,
        }
    }

    /// Attaches the originating sqlstate code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Attaches operator guidance.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Returns the failure class.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        self.class
    }

    /// Returns the human-readable detail.
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Returns the originating sqlstate code, when known.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Returns attached operator guidance, when present.
    #[must_use]
    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }
}
