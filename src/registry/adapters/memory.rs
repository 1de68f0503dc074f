//! In-memory connection store for tests.

use crate::connection::domain::ConnectionId;
use crate::registry::domain::ConnectionRecord;
use crate::registry::ports::{ConnectionStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory connection store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConnectionStore {
    records: Arc<RwLock<HashMap<ConnectionId, ConnectionRecord>>>,
}

impl InMemoryConnectionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a record.
    pub fn upsert(&self, record: ConnectionRecord) {
        if let Ok(mut records) = self.records.write() {
            records.insert(record.id(), record);
        }
    }

    /// Removes a record.
    pub fn remove(&self, id: ConnectionId) {
        if let Ok(mut records) = self.records.write() {
            records.remove(&id);
        }
    }
}

#[async_trait]
impl ConnectionStore for InMemoryConnectionStore {
    async fn find(&self, id: ConnectionId) -> Result<Option<ConnectionRecord>, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|err| StoreError(err.to_string()))?;
        Ok(records.get(&id).cloned())
    }
}
