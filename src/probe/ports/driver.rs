//! Driver port for opening and interrogating database connections.

use crate::connection::domain::ValidatedConnectionDescriptor;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Opens bounded connection attempts against a database server.
#[async_trait]
pub trait ProbeDriver: Send + Sync {
    /// Opens a connection within the given timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeDriverError::NoSslSupport`] for the specific
    /// "server does not support SSL" condition (recognised by the
    /// driver, not string-matched by callers),
    /// [`ProbeDriverError::Timeout`] when the attempt exceeds the
    /// bound, and server or I/O errors otherwise.
    async fn connect(
        &self,
        descriptor: &ValidatedConnectionDescriptor,
        timeout: Duration,
    ) -> Result<Box<dyn ProbeSession>, ProbeDriverError>;
}

/// An open connection under interrogation by the prober.
///
/// Sessions are short-lived: the prober closes every session before
/// returning, on success and failure alike.
#[async_trait]
pub trait ProbeSession: Send {
    /// Returns whether the connected role has the superuser bit.
    async fn is_superuser(&mut self) -> Result<bool, ProbeDriverError>;

    /// Returns the installed schema version, when the versions table
    /// exists.
    async fn schema_version(&mut self) -> Result<Option<String>, ProbeDriverError>;

    /// Returns whether the connected role may create databases.
    async fn can_create_database(&mut self) -> Result<bool, ProbeDriverError>;

    /// Executes a statement on behalf of a setup check.
    async fn execute(&mut self, sql: &str) -> Result<(), ProbeDriverError>;

    /// Releases the underlying connection handle.
    async fn close(self: Box<Self>);
}

/// Caller-supplied check run while a probe session is still open.
///
/// Used by guided setup flows to create missing roles or databases; a
/// check failure fails the probe, and the session is still closed
/// cleanly.
#[async_trait]
pub trait ProbeCheck: Send + Sync {
    /// Runs the check against the open session.
    async fn run(&self, session: &mut dyn ProbeSession) -> Result<(), ProbeDriverError>;
}

/// Errors surfaced by probe drivers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeDriverError {
    /// The server rejected the SSL negotiation entirely.
    #[error("the server does not support SSL connections")]
    NoSslSupport,

    /// The connection attempt exceeded its bound.
    #[error("connection attempt timed out after {0:?}")]
    Timeout(Duration),

    /// The descriptor could not be turned into a usable connection
    /// configuration.
    #[error("invalid connection configuration: {0}")]
    InvalidConfiguration(String),

    /// The server reported an error, with its sqlstate when known.
    #[error("server error: {message}")]
    Server {
        /// Five-character sqlstate code, when the driver can recover it.
        code: Option<String>,
        /// Server diagnostic message.
        message: String,
    },

    /// A transport-level failure outside the server's control.
    #[error("connection I/O error: {0}")]
    Io(String),
}

impl ProbeDriverError {
    /// Returns the sqlstate code, when known.
    #[must_use]
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Self::Server { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}
