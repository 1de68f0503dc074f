//! Session factory and live-session contracts.
//!
//! Shared by the startup supervisor (the primary session) and the
//! connection registry (per-target sessions): both persist the handle
//! a successful probe earns them.

use crate::connection::domain::ValidatedConnectionDescriptor;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// A live database session handle.
///
/// The handle is owned exclusively by the registry entry (or startup
/// state) holding it; runners never receive one — they get explicit
/// credentials at spawn time instead.
#[async_trait]
pub trait DbSession: Send + Sync {
    /// Re-validates the session against the current database schema.
    async fn reload_schema(&self) -> Result<(), SessionError>;

    /// Releases the session's resources.
    ///
    /// Idempotent; called after every runner slot of the owning
    /// connection has been destroyed.
    async fn close(&self);
}

/// Opens live sessions for validated descriptors.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Opens a session.
    async fn open(
        &self,
        descriptor: &ValidatedConnectionDescriptor,
    ) -> Result<Arc<dyn DbSession>, SessionError>;
}

/// Errors surfaced by session factories and sessions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The session could not be opened.
    #[error("failed to open database session: {0}")]
    Open(String),

    /// A session operation failed.
    #[error("database session operation failed: {0}")]
    Operation(String),
}
