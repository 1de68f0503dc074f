//! Error types for registry operations.

use crate::connection::domain::{ConnectionId, ConnectionValidationError};
use crate::probe::domain::ProbeError;
use crate::runner::domain::RunnerError;
use crate::startup::ports::SessionError;
use thiserror::Error;

/// Errors surfaced by the connection registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// No stored connection has the given identity.
    #[error("connection {0} not found")]
    ConnectionNotFound(ConnectionId),

    /// The connection is not currently started.
    #[error("connection {0} is not connected")]
    NotConnected(ConnectionId),

    /// The stored descriptor failed validation.
    #[error(transparent)]
    Validation(#[from] ConnectionValidationError),

    /// The connection probe failed.
    #[error(transparent)]
    Probe(#[from] ProbeError),

    /// The live session could not be opened or operated on.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A runner slot operation failed.
    #[error(transparent)]
    Runner(#[from] RunnerError),

    /// The backing connection store failed.
    #[error("connection store failure: {0}")]
    Store(String),
}
