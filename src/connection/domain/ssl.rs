//! SSL negotiation mode and certificate material value objects.

use super::ParseSslModeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// SSL negotiation mode, using the libpq `sslmode` vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    /// Only try a non-SSL connection.
    Disable,
    /// First try a non-SSL connection; on failure try SSL.
    Allow,
    /// First try an SSL connection; on failure try non-SSL.
    Prefer,
    /// Only try an SSL connection.
    Require,
    /// Only SSL, and verify the server certificate chain.
    VerifyCa,
    /// Only SSL, verify the chain and the server hostname.
    VerifyFull,
}

impl SslMode {
    /// Returns the canonical `sslmode` parameter spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disable => "disable",
            Self::Allow => "allow",
            Self::Prefer => "prefer",
            Self::Require => "require",
            Self::VerifyCa => "verify-ca",
            Self::VerifyFull => "verify-full",
        }
    }
}

impl Default for SslMode {
    fn default() -> Self {
        Self::Prefer
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for SslMode {
    type Error = ParseSslModeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "disable" => Ok(Self::Disable),
            "allow" => Ok(Self::Allow),
            "prefer" => Ok(Self::Prefer),
            "require" => Ok(Self::Require),
            "verify-ca" => Ok(Self::VerifyCa),
            "verify-full" => Ok(Self::VerifyFull),
            _ => Err(ParseSslModeError(value.to_owned())),
        }
    }
}

/// Optional certificate material attached to a connection descriptor.
///
/// The PEM payloads are treated as opaque text; writing them to disk is
/// the responsibility of the registry's certificate store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SslCertificates {
    server_ca: Option<String>,
    client_certificate: Option<String>,
    client_key: Option<String>,
    reject_unauthorized: Option<bool>,
}

impl SslCertificates {
    /// Creates an empty certificate bundle.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            server_ca: None,
            client_certificate: None,
            client_key: None,
            reject_unauthorized: None,
        }
    }

    /// Sets the server CA certificate PEM.
    #[must_use]
    pub fn with_server_ca(mut self, pem: impl Into<String>) -> Self {
        self.server_ca = Some(pem.into());
        self
    }

    /// Sets the client certificate PEM.
    #[must_use]
    pub fn with_client_certificate(mut self, pem: impl Into<String>) -> Self {
        self.client_certificate = Some(pem.into());
        self
    }

    /// Sets the client key PEM.
    #[must_use]
    pub fn with_client_key(mut self, pem: impl Into<String>) -> Self {
        self.client_key = Some(pem.into());
        self
    }

    /// Sets whether unverifiable server certificates are rejected.
    #[must_use]
    pub const fn with_reject_unauthorized(mut self, reject: bool) -> Self {
        self.reject_unauthorized = Some(reject);
        self
    }

    /// Returns the server CA certificate PEM, when present.
    #[must_use]
    pub fn server_ca(&self) -> Option<&str> {
        self.server_ca.as_deref()
    }

    /// Returns the client certificate PEM, when present.
    #[must_use]
    pub fn client_certificate(&self) -> Option<&str> {
        self.client_certificate.as_deref()
    }

    /// Returns the client key PEM, when present.
    #[must_use]
    pub fn client_key(&self) -> Option<&str> {
        self.client_key.as_deref()
    }

    /// Returns whether unverifiable server certificates are rejected.
    ///
    /// Defaults to `true` when unset.
    #[must_use]
    pub fn reject_unauthorized(&self) -> bool {
        self.reject_unauthorized.unwrap_or(true)
    }

    /// Returns whether any certificate material is present.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.server_ca.is_none()
            && self.client_certificate.is_none()
            && self.client_key.is_none()
    }
}
