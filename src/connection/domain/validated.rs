//! Fully-populated, immutable connection descriptor.

use super::{ConnectionDescriptor, DescriptorKind, SslCertificates, SslMode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use url::Url;

/// Placeholder substituted for the password in redacted URIs.
const REDACTED_PASSWORD: &str = "***";

/// A connection descriptor with every field populated and a canonical
/// URI string synchronized with the structured fields.
///
/// Canonicalization is representation-independent: validating the
/// structured form and validating the URI form of the same coordinates
/// produce equal values. Instances are only created by
/// [`crate::connection::validation::validate`] and never mutated;
/// revalidation produces a new instance. Anything user-visible must go
/// through [`Self::redacted_uri`] — the canonical URI embeds the
/// password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedConnectionDescriptor {
    host: String,
    port: u16,
    user: String,
    password: String,
    database_name: String,
    ssl_mode: SslMode,
    certificates: SslCertificates,
    connection_uri: String,
}

impl ValidatedConnectionDescriptor {
    /// Assembles a validated descriptor from its parts.
    ///
    /// Crate-internal: only the validator may construct instances, so
    /// the canonical-URI invariant is established in one place.
    #[must_use]
    #[expect(
        clippy::too_many_arguments,
        reason = "the validator assembles every field of a single value object"
    )]
    pub(crate) fn assemble(
        host: String,
        port: u16,
        user: String,
        password: String,
        database_name: String,
        ssl_mode: SslMode,
        certificates: SslCertificates,
        connection_uri: String,
    ) -> Self {
        Self {
            host,
            port,
            user,
            password,
            database_name,
            ssl_mode,
            certificates,
            connection_uri,
        }
    }

    /// Returns the host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the user.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Returns the password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Returns the database name.
    #[must_use]
    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    /// Returns the SSL mode.
    #[must_use]
    pub const fn ssl_mode(&self) -> SslMode {
        self.ssl_mode
    }

    /// Returns the certificate material.
    #[must_use]
    pub const fn certificates(&self) -> &SslCertificates {
        &self.certificates
    }

    /// Returns the canonical connection URI, including credentials.
    #[must_use]
    pub fn canonical_uri(&self) -> &str {
        &self.connection_uri
    }

    /// Returns the canonical URI with the password masked.
    ///
    /// This is the only URI form permitted in errors and log fields.
    #[must_use]
    pub fn redacted_uri(&self) -> String {
        let Ok(mut parsed) = Url::parse(&self.connection_uri) else {
            // The validator only stores parseable URIs; fall back to a
            // rebuilt form rather than risk echoing credentials.
            return format!(
                "postgresql://{}@{}:{}/{}",
                self.user, self.host, self.port, self.database_name
            );
        };
        if parsed.password().is_some() && parsed.set_password(Some(REDACTED_PASSWORD)).is_err() {
            return format!(
                "postgresql://{}@{}:{}/{}",
                self.user, self.host, self.port, self.database_name
            );
        }
        parsed.into()
    }

    /// Returns a stable dedup key over the connection coordinates.
    ///
    /// The key covers host, port, user, database, and SSL mode plus a
    /// digest of the password; the password itself never appears.
    #[must_use]
    pub fn signature(&self) -> DescriptorSignature {
        let mut hasher = Sha256::new();
        hasher.update(self.password.as_bytes());
        let digest = hasher.finalize();
        let mut password_digest = String::with_capacity(16);
        for byte in digest.iter().take(8) {
            password_digest.push_str(&format!("{byte:02x}"));
        }
        DescriptorSignature(format!(
            "{}:{}/{}?user={}&sslmode={}#{}",
            self.host, self.port, self.database_name, self.user, self.ssl_mode, password_digest
        ))
    }

    /// Re-expresses this descriptor in structured (`Standard`) form.
    ///
    /// Revalidating the result reproduces the same structured fields
    /// with a deterministically rebuilt canonical URI.
    #[must_use]
    pub fn as_standard_descriptor(&self) -> ConnectionDescriptor {
        ConnectionDescriptor::with_kind(DescriptorKind::Standard)
            .with_host(self.host.clone())
            .with_port(self.port)
            .with_user(self.user.clone())
            .with_password(self.password.clone())
            .with_database_name(self.database_name.clone())
            .with_ssl_mode(self.ssl_mode)
            .with_certificates(self.certificates.clone())
    }

    /// Re-expresses this descriptor in single-URI form.
    #[must_use]
    pub fn as_uri_descriptor(&self) -> ConnectionDescriptor {
        ConnectionDescriptor::from_uri(self.connection_uri.clone())
            .with_certificates(self.certificates.clone())
    }
}

/// Stable, password-free identity of a validated descriptor.
///
/// Used as the key for start deduplication and the attempts-in-progress
/// guard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DescriptorSignature(String);

impl DescriptorSignature {
    /// Returns the signature text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DescriptorSignature {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}
