//! In-memory probe driver for deterministic tests.

use crate::connection::domain::{SslMode, ValidatedConnectionDescriptor};
use crate::probe::ports::{ProbeDriver, ProbeDriverError, ProbeSession};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Record of a single connect attempt seen by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectAttempt {
    /// Redacted URI of the attempted descriptor.
    pub redacted_uri: String,
    /// SSL mode of the attempted descriptor.
    pub ssl_mode: SslMode,
}

#[derive(Debug, Default)]
struct DriverState {
    scripted_failures: VecDeque<ProbeDriverError>,
    connect_delay: Option<Duration>,
    reject_ssl: bool,
    superuser: bool,
    schema_version: Option<String>,
    can_create_db: Option<bool>,
    fail_schema_version: bool,
    fail_can_create_db: bool,
    execute_failure: Option<ProbeDriverError>,
    executed_statements: Vec<String>,
    attempts: Vec<ConnectAttempt>,
    open_sessions: usize,
    closed_sessions: usize,
}

/// In-memory probe driver.
///
/// Models connection behaviour without any network traffic: outcomes
/// are scripted per call, and the driver records every attempt so
/// tests can assert on fallback paths and session hygiene.
#[derive(Debug, Clone)]
pub struct InMemoryProbeDriver {
    state: Arc<Mutex<DriverState>>,
}

impl Default for InMemoryProbeDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryProbeDriver {
    /// Creates a driver that accepts every connection as a superuser.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(DriverState {
                superuser: true,
                can_create_db: Some(true),
                ..DriverState::default()
            })),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, DriverState>, ProbeDriverError> {
        self.state
            .lock()
            .map_err(|err| ProbeDriverError::Io(err.to_string()))
    }

    /// Delays every connect attempt, so tests can overlap callers
    /// deterministically.
    pub fn set_connect_delay(&self, delay: Option<Duration>) {
        if let Ok(mut state) = self.state.lock() {
            state.connect_delay = delay;
        }
    }

    /// Queues a failure for the next connect attempt.
    pub fn fail_next_connect(&self, error: ProbeDriverError) {
        if let Ok(mut state) = self.state.lock() {
            state.scripted_failures.push_back(error);
        }
    }

    /// Makes the server reject SSL unless `sslmode=disable`.
    pub fn reject_ssl(&self, reject: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.reject_ssl = reject;
        }
    }

    /// Sets whether connected roles carry the superuser bit.
    pub fn set_superuser(&self, superuser: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.superuser = superuser;
        }
    }

    /// Sets the discoverable schema version.
    pub fn set_schema_version(&self, version: Option<String>) {
        if let Ok(mut state) = self.state.lock() {
            state.schema_version = version;
        }
    }

    /// Sets the discoverable create-database privilege.
    pub fn set_can_create_db(&self, can_create: Option<bool>) {
        if let Ok(mut state) = self.state.lock() {
            state.can_create_db = can_create;
        }
    }

    /// Makes the schema-version discovery query fail.
    pub fn fail_schema_version(&self, fail: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_schema_version = fail;
        }
    }

    /// Makes the create-database discovery query fail.
    pub fn fail_can_create_db(&self, fail: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_can_create_db = fail;
        }
    }

    /// Makes setup-check statements fail with the given error.
    pub fn fail_execute(&self, error: Option<ProbeDriverError>) {
        if let Ok(mut state) = self.state.lock() {
            state.execute_failure = error;
        }
    }

    /// Returns every connect attempt seen so far.
    #[must_use]
    pub fn attempts(&self) -> Vec<ConnectAttempt> {
        self.state
            .lock()
            .map(|state| state.attempts.clone())
            .unwrap_or_default()
    }

    /// Returns the number of connect attempts seen so far.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.state.lock().map(|state| state.attempts.len()).unwrap_or(0)
    }

    /// Returns the number of sessions still open.
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.state.lock().map(|state| state.open_sessions).unwrap_or(0)
    }

    /// Returns the statements executed by setup checks.
    #[must_use]
    pub fn executed_statements(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|state| state.executed_statements.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ProbeDriver for InMemoryProbeDriver {
    async fn connect(
        &self,
        descriptor: &ValidatedConnectionDescriptor,
        _timeout: Duration,
    ) -> Result<Box<dyn ProbeSession>, ProbeDriverError> {
        let connect_delay = self.lock()?.connect_delay;
        if let Some(wait) = connect_delay {
            tokio::time::sleep(wait).await;
        }

        let mut state = self.lock()?;
        state.attempts.push(ConnectAttempt {
            redacted_uri: descriptor.redacted_uri(),
            ssl_mode: descriptor.ssl_mode(),
        });

        if let Some(error) = state.scripted_failures.pop_front() {
            return Err(error);
        }
        if state.reject_ssl && descriptor.ssl_mode() != SslMode::Disable {
            return Err(ProbeDriverError::NoSslSupport);
        }

        state.open_sessions = state.open_sessions.saturating_add(1);
        drop(state);
        Ok(Box::new(InMemorySession {
            state: Arc::clone(&self.state),
        }))
    }
}

struct InMemorySession {
    state: Arc<Mutex<DriverState>>,
}

impl InMemorySession {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, DriverState>, ProbeDriverError> {
        self.state
            .lock()
            .map_err(|err| ProbeDriverError::Io(err.to_string()))
    }
}

#[async_trait]
impl ProbeSession for InMemorySession {
    async fn is_superuser(&mut self) -> Result<bool, ProbeDriverError> {
        Ok(self.lock()?.superuser)
    }

    async fn schema_version(&mut self) -> Result<Option<String>, ProbeDriverError> {
        let state = self.lock()?;
        if state.fail_schema_version {
            return Err(ProbeDriverError::Server {
                code: Some("42P01".to_owned()),
                message: "relation \"brunel.versions\" does not exist".to_owned(),
            });
        }
        Ok(state.schema_version.clone())
    }

    async fn can_create_database(&mut self) -> Result<bool, ProbeDriverError> {
        let state = self.lock()?;
        if state.fail_can_create_db {
            return Err(ProbeDriverError::Io("catalog unavailable".to_owned()));
        }
        Ok(state.can_create_db.unwrap_or(false))
    }

    async fn execute(&mut self, sql: &str) -> Result<(), ProbeDriverError> {
        let mut state = self.lock()?;
        if let Some(error) = state.execute_failure.clone() {
            return Err(error);
        }
        state.executed_statements.push(sql.to_owned());
        Ok(())
    }

    async fn close(self: Box<Self>) {
        if let Ok(mut state) = self.state.lock() {
            state.open_sessions = state.open_sessions.saturating_sub(1);
            state.closed_sessions = state.closed_sessions.saturating_add(1);
        }
    }
}
