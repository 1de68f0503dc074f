//! Read-only access to persisted connection records.

use crate::connection::domain::ConnectionId;
use crate::registry::domain::ConnectionRecord;
use async_trait::async_trait;
use thiserror::Error;

/// Read-only source of persisted connection records.
///
/// Implemented by the surrounding application's storage layer; the
/// registry never writes through this port.
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Looks up a connection record by identity.
    ///
    /// Returns `Ok(None)` when no record exists.
    async fn find(&self, id: ConnectionId) -> Result<Option<ConnectionRecord>, StoreError>;
}

/// Error surfaced by connection store implementations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("connection store failure: {0}")]
pub struct StoreError(pub String);
