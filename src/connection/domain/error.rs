//! Error types for connection descriptor validation and parsing.

use thiserror::Error;

/// Errors returned while validating a connection descriptor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectionValidationError {
    /// The descriptor declares no kind and none can be inferred.
    #[error(
        "unsupported descriptor kind: expected a connection URI or structured host fields"
    )]
    UnsupportedDescriptorKind,

    /// The raw connection URI could not be parsed.
    ///
    /// The detail carries the parser diagnostic only, never the URI
    /// itself, which may embed credentials.
    #[error("invalid connection URI: {0}")]
    InvalidConnectionUri(String),

    /// The connection URI uses a scheme other than `postgres`/`postgresql`.
    #[error("unsupported connection URI scheme '{0}'")]
    UnsupportedUriScheme(String),

    /// The `sslmode` query parameter is not a recognised mode.
    #[error(transparent)]
    InvalidSslMode(#[from] ParseSslModeError),
}

/// Error returned while parsing an [`super::SslMode`] from text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown sslmode: {0}")]
pub struct ParseSslModeError(pub String);

/// Error returned while parsing a [`super::DescriptorKind`] from text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown descriptor kind: {0}")]
pub struct ParseDescriptorKindError(pub String);
