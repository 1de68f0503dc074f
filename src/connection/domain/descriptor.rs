//! Raw connection descriptor as supplied by the admin layer.

use super::{ParseDescriptorKindError, SslCertificates, SslMode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which representation of a descriptor is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptorKind {
    /// Structured host/port/user/password/database fields.
    Standard,
    /// A single `postgresql://` connection URI.
    ConnectionUri,
}

impl DescriptorKind {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::ConnectionUri => "connection_uri",
        }
    }
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for DescriptorKind {
    type Error = ParseDescriptorKindError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "standard" => Ok(Self::Standard),
            "connection_uri" | "connection-uri" | "connection uri" => Ok(Self::ConnectionUri),
            _ => Err(ParseDescriptorKindError(value.to_owned())),
        }
    }
}

/// Raw, possibly partial specification of how to reach a database.
///
/// Every field is optional; [`crate::connection::validation::validate`]
/// fills the gaps with defaults and produces the immutable
/// [`super::ValidatedConnectionDescriptor`] the rest of the system
/// consumes. Passwords held here must never be logged; use the
/// validated form's redacted URI for any diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    kind: Option<DescriptorKind>,
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
    database_name: Option<String>,
    ssl_mode: Option<SslMode>,
    #[serde(default)]
    certificates: SslCertificates,
    connection_uri: Option<String>,
}

impl ConnectionDescriptor {
    /// Creates an empty descriptor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a descriptor with an explicit kind.
    #[must_use]
    pub fn with_kind(kind: DescriptorKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// Creates a `ConnectionUri` descriptor from a raw URI string.
    #[must_use]
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self {
            kind: Some(DescriptorKind::ConnectionUri),
            connection_uri: Some(uri.into()),
            ..Self::default()
        }
    }

    /// Sets the host.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the user.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Sets the password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the database name.
    #[must_use]
    pub fn with_database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = Some(name.into());
        self
    }

    /// Sets the SSL mode.
    #[must_use]
    pub const fn with_ssl_mode(mut self, mode: SslMode) -> Self {
        self.ssl_mode = Some(mode);
        self
    }

    /// Sets the certificate material.
    #[must_use]
    pub fn with_certificates(mut self, certificates: SslCertificates) -> Self {
        self.certificates = certificates;
        self
    }

    /// Sets the raw connection URI.
    #[must_use]
    pub fn with_connection_uri(mut self, uri: impl Into<String>) -> Self {
        self.connection_uri = Some(uri.into());
        self
    }

    /// Returns the declared kind, when present.
    #[must_use]
    pub const fn kind(&self) -> Option<DescriptorKind> {
        self.kind
    }

    /// Returns the host, when present.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Returns the port, when present.
    #[must_use]
    pub const fn port(&self) -> Option<u16> {
        self.port
    }

    /// Returns the user, when present.
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Returns the password, when present.
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Returns the database name, when present.
    #[must_use]
    pub fn database_name(&self) -> Option<&str> {
        self.database_name.as_deref()
    }

    /// Returns the SSL mode, when present.
    #[must_use]
    pub const fn ssl_mode(&self) -> Option<SslMode> {
        self.ssl_mode
    }

    /// Returns the certificate material.
    #[must_use]
    pub const fn certificates(&self) -> &SslCertificates {
        &self.certificates
    }

    /// Returns the raw connection URI, when present.
    #[must_use]
    pub fn connection_uri(&self) -> Option<&str> {
        self.connection_uri.as_deref()
    }

    /// Returns whether any structured connection field is present.
    #[must_use]
    pub const fn has_structured_fields(&self) -> bool {
        self.host.is_some()
            || self.port.is_some()
            || self.user.is_some()
            || self.password.is_some()
            || self.database_name.is_some()
    }

    /// Returns whether the descriptor carries no usable coordinates at
    /// all: no URI, no user, and no database name.
    ///
    /// Such descriptors are rejected before any network attempt with
    /// credential-setup guidance rather than a connection error.
    #[must_use]
    pub const fn is_unconfigured(&self) -> bool {
        self.connection_uri.is_none() && self.user.is_none() && self.database_name.is_none()
    }
}
