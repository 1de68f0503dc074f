//! Process host port for isolated runner processes.

use crate::runner::domain::{RunnerKind, RunnerLog, RunnerStats};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;

/// Everything a runner process receives at spawn time.
///
/// The connection URI here is the only credential a runner ever
/// holds; runners never share the owning connection's live session
/// handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnSpec {
    kind: RunnerKind,
    source: String,
    connection_uri: String,
    env: BTreeMap<String, String>,
    ready_timeout: Duration,
}

impl SpawnSpec {
    /// Default bound for the readiness handshake.
    pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a spawn spec.
    #[must_use]
    pub fn new(
        kind: RunnerKind,
        source: impl Into<String>,
        connection_uri: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            source: source.into(),
            connection_uri: connection_uri.into(),
            env: BTreeMap::new(),
            ready_timeout: Self::DEFAULT_READY_TIMEOUT,
        }
    }

    /// Adds extra environment variables for the process.
    #[must_use]
    pub fn with_env(mut self, values: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env = values.into_iter().collect();
        self
    }

    /// Overrides the readiness timeout.
    #[must_use]
    pub const fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Returns the slot kind.
    #[must_use]
    pub const fn kind(&self) -> RunnerKind {
        self.kind
    }

    /// Returns the script source.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the connection URI handed to the process.
    #[must_use]
    pub fn connection_uri(&self) -> &str {
        &self.connection_uri
    }

    /// Returns the extra environment variables.
    #[must_use]
    pub const fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Returns the readiness timeout.
    #[must_use]
    pub const fn ready_timeout(&self) -> Duration {
        self.ready_timeout
    }
}

/// How a runner process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerExit {
    /// Exit code, when the process exited normally.
    pub code: Option<i32>,
    /// Whether the exit was requested through [`RunnerProcessHost::stop`].
    pub requested: bool,
}

/// Opaque handle to a live runner process.
///
/// Raw OS child handles never leave the host adapter; the supervisor
/// only sees the pid, the exit notification, and the output log.
pub struct RunnerHandle {
    pid: u32,
    exit: Mutex<Option<oneshot::Receiver<RunnerExit>>>,
    log: Arc<RunnerLog>,
}

impl RunnerHandle {
    /// Creates a handle; called by host adapters only.
    #[must_use]
    pub fn new(pid: u32, exit: oneshot::Receiver<RunnerExit>, log: Arc<RunnerLog>) -> Self {
        Self {
            pid,
            exit: Mutex::new(Some(exit)),
            log,
        }
    }

    /// Returns the process ID.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Takes the exit notification receiver.
    ///
    /// Returns `None` after the first call; the supervisor's crash
    /// watcher is the single consumer.
    #[must_use]
    pub fn take_exit(&self) -> Option<oneshot::Receiver<RunnerExit>> {
        self.exit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Returns the process output log.
    #[must_use]
    pub fn log(&self) -> Arc<RunnerLog> {
        Arc::clone(&self.log)
    }
}

/// Runtime control contract for isolated runner processes.
#[async_trait]
pub trait RunnerProcessHost: Send + Sync {
    /// Spawns a process loaded with the spec's source and waits for
    /// its readiness signal.
    async fn spawn(&self, spec: SpawnSpec) -> Result<RunnerHandle, RunnerHostError>;

    /// Stops a process: graceful first, forced once the grace period
    /// elapses. Idempotent; stopping an already-dead process is a
    /// no-op.
    async fn stop(&self, handle: &RunnerHandle, grace: Duration);

    /// Reads current resource usage for a process.
    async fn stats(&self, handle: &RunnerHandle) -> Result<RunnerStats, RunnerHostError>;
}

/// Errors surfaced by runner host adapters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunnerHostError {
    /// The process could not be created.
    #[error("failed to spawn runner process: {0}")]
    Spawn(String),

    /// The process started but never signalled readiness.
    #[error("runner process did not become ready: {0}")]
    NotReady(String),

    /// The process is not running (or its stats are unreadable).
    #[error("runner process {0} is not running")]
    NotRunning(u32),

    /// An I/O failure on the process channel.
    #[error("runner process I/O error: {0}")]
    Io(String),
}
