//! Pooled `PostgreSQL` session factory backed by Diesel and r2d2.

use crate::connection::domain::ValidatedConnectionDescriptor;
use crate::startup::ports::{DbSession, SessionError, SessionFactory};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use std::sync::Arc;
use std::time::Duration;

/// `PostgreSQL` connection pool type used for live sessions.
pub type SessionPgPool = Pool<ConnectionManager<PgConnection>>;

/// Default bound for pool connection checkouts.
const DEFAULT_CHECKOUT_TIMEOUT: Duration = Duration::from_secs(10);

/// Session factory producing r2d2-pooled Diesel sessions.
#[derive(Debug, Clone)]
pub struct PooledSessionFactory {
    checkout_timeout: Duration,
}

impl Default for PooledSessionFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl PooledSessionFactory {
    /// Creates a factory with the default checkout timeout.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            checkout_timeout: DEFAULT_CHECKOUT_TIMEOUT,
        }
    }

    /// Overrides the pool checkout timeout.
    #[must_use]
    pub const fn with_checkout_timeout(mut self, timeout: Duration) -> Self {
        self.checkout_timeout = timeout;
        self
    }
}

#[async_trait]
impl SessionFactory for PooledSessionFactory {
    async fn open(
        &self,
        descriptor: &ValidatedConnectionDescriptor,
    ) -> Result<Arc<dyn DbSession>, SessionError> {
        let uri = descriptor.canonical_uri().to_owned();
        let timeout = self.checkout_timeout;

        let pool = tokio::task::spawn_blocking(move || {
            Pool::builder()
                .connection_timeout(timeout)
                .build(ConnectionManager::<PgConnection>::new(uri))
                .map_err(|err| SessionError::Open(err.to_string()))
        })
        .await
        .map_err(|err| SessionError::Open(err.to_string()))??;

        Ok(Arc::new(PooledDbSession { pool }))
    }
}

/// Live session backed by an r2d2 connection pool.
pub struct PooledDbSession {
    pool: SessionPgPool,
}

impl PooledDbSession {
    /// Returns the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &SessionPgPool {
        &self.pool
    }
}

#[async_trait]
impl DbSession for PooledDbSession {
    async fn reload_schema(&self) -> Result<(), SessionError> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool
                .get()
                .map_err(|err| SessionError::Operation(err.to_string()))?;
            diesel::sql_query("SELECT 1")
                .execute(&mut connection)
                .map_err(|err| SessionError::Operation(err.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|err| SessionError::Operation(err.to_string()))?
    }

    async fn close(&self) {
        // r2d2 releases its connections when the last pool handle
        // drops; there is nothing to flush eagerly.
    }
}
