//! Per-connection supervision of isolated script-runner processes.

use crate::connection::domain::ConnectionId;
use crate::runner::domain::{
    RunnerError, RunnerKind, RunnerSlotSnapshot, RunnerStatsReading, RunnerStatus,
    SourceRevision,
};
use crate::runner::ports::{RunnerHandle, RunnerProcessHost, SpawnSpec};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info};

/// Default grace period before a stop escalates to a forced kill.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(2);

/// Mutable state of one runner slot.
struct SlotState {
    status: RunnerStatus,
    revision: Option<SourceRevision>,
    handle: Option<RunnerHandle>,
    last_stats: RunnerStatsReading,
    updated_at: DateTime<Utc>,
}

impl SlotState {
    fn new(updated_at: DateTime<Utc>) -> Self {
        Self {
            status: RunnerStatus::Stopped,
            revision: None,
            handle: None,
            last_stats: RunnerStatsReading::NotRunning,
            updated_at,
        }
    }

    fn snapshot(&self, kind: RunnerKind) -> RunnerSlotSnapshot {
        RunnerSlotSnapshot::new(
            kind,
            self.status,
            self.handle.as_ref().map(RunnerHandle::pid),
            self.revision.clone(),
            self.last_stats,
            self.updated_at,
        )
    }
}

/// Supervises the runner slots of one target connection.
///
/// Guarantees at most one live process per slot. Operations on the
/// same slot serialize behind its async mutex; different slots (and
/// different connections) proceed in parallel. A process that exits
/// without being destroyed marks its slot `Crashed` and is not
/// restarted automatically — the next `ensure_running` spawns fresh.
pub struct ScriptRunnerSupervisor<H, C>
where
    H: RunnerProcessHost,
    C: Clock + Send + Sync,
{
    connection_id: ConnectionId,
    connection_uri: String,
    host: Arc<H>,
    clock: Arc<C>,
    grace: Duration,
    method_slot: Arc<Mutex<SlotState>>,
    on_mount_slot: Arc<Mutex<SlotState>>,
    table_config_slot: Arc<Mutex<SlotState>>,
}

impl<H, C> ScriptRunnerSupervisor<H, C>
where
    H: RunnerProcessHost + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a supervisor for one connection.
    ///
    /// The connection URI is the credential set handed to every
    /// runner this supervisor spawns.
    #[must_use]
    pub fn new(
        connection_id: ConnectionId,
        connection_uri: impl Into<String>,
        host: Arc<H>,
        clock: Arc<C>,
    ) -> Self {
        let now = clock.utc();
        Self {
            connection_id,
            connection_uri: connection_uri.into(),
            host,
            clock,
            grace: DEFAULT_STOP_GRACE,
            method_slot: Arc::new(Mutex::new(SlotState::new(now))),
            on_mount_slot: Arc::new(Mutex::new(SlotState::new(now))),
            table_config_slot: Arc::new(Mutex::new(SlotState::new(now))),
        }
    }

    /// Overrides the stop grace period.
    #[must_use]
    pub const fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Returns the connection this supervisor belongs to.
    #[must_use]
    pub const fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    const fn slot(&self, kind: RunnerKind) -> &Arc<Mutex<SlotState>> {
        match kind {
            RunnerKind::Method => &self.method_slot,
            RunnerKind::OnMount => &self.on_mount_slot,
            RunnerKind::TableConfig => &self.table_config_slot,
        }
    }

    /// Ensures a runner for `kind` is live with the given source.
    ///
    /// A process already running the same source revision is left
    /// untouched. A different revision (or a stopped/crashed slot)
    /// tears down any existing process — gracefully, forced after the
    /// grace period — and spawns a fresh one.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Spawn`] when the process cannot be
    /// created or never signals readiness; the failure is isolated to
    /// this slot.
    pub async fn ensure_running(
        &self,
        kind: RunnerKind,
        source: &str,
    ) -> Result<RunnerSlotSnapshot, RunnerError> {
        let revision = SourceRevision::from_source(source);
        let slot = self.slot(kind);
        let mut state = slot.lock().await;

        if state.status == RunnerStatus::Running
            && state.revision.as_ref() == Some(&revision)
            && state.handle.is_some()
        {
            return Ok(state.snapshot(kind));
        }

        if let Some(handle) = state.handle.take() {
            self.host.stop(&handle, self.grace).await;
        }
        state.status = RunnerStatus::Starting;
        state.revision = None;
        state.updated_at = self.clock.utc();

        let spec = SpawnSpec::new(kind, source, self.connection_uri.clone());
        match self.host.spawn(spec).await {
            Ok(handle) => {
                let pid = handle.pid();
                self.watch_for_crash(kind, pid, &handle, slot);
                state.status = RunnerStatus::Running;
                state.revision = Some(revision.clone());
                state.handle = Some(handle);
                state.updated_at = self.clock.utc();
                info!(
                    connection = %self.connection_id,
                    kind = kind.as_str(),
                    pid,
                    revision = %revision,
                    "runner started"
                );
                Ok(state.snapshot(kind))
            }
            Err(host_error) => {
                state.status = RunnerStatus::Stopped;
                state.revision = None;
                state.updated_at = self.clock.utc();
                error!(
                    connection = %self.connection_id,
                    kind = kind.as_str(),
                    "runner spawn failed: {host_error}"
                );
                Err(RunnerError::Spawn {
                    kind,
                    detail: host_error.to_string(),
                })
            }
        }
    }

    /// Registers the single crash watcher for a fresh process.
    fn watch_for_crash(
        &self,
        kind: RunnerKind,
        pid: u32,
        handle: &RunnerHandle,
        slot: &Arc<Mutex<SlotState>>,
    ) {
        let Some(exit) = handle.take_exit() else {
            return;
        };
        let log = handle.log();
        let slot = Arc::clone(slot);
        let connection_id = self.connection_id;
        let clock = Arc::clone(&self.clock);
        tokio::spawn(async move {
            let Ok(notice) = exit.await else {
                return;
            };
            if notice.requested {
                return;
            }
            let mut state = slot.lock().await;
            // A newer process may own the slot by now; only the
            // still-current pid marks it crashed.
            if state.handle.as_ref().map(RunnerHandle::pid) == Some(pid) {
                state.status = RunnerStatus::Crashed;
                state.handle = None;
                state.last_stats = RunnerStatsReading::NotRunning;
                state.updated_at = clock.utc();
                error!(
                    connection = %connection_id,
                    kind = kind.as_str(),
                    pid,
                    code = notice.code,
                    log_tail = ?log.tail(5),
                    "runner exited unexpectedly"
                );
            }
        });
    }

    /// Stops and clears a slot.
    ///
    /// Idempotent: destroying an already-stopped slot is a no-op and
    /// never errors.
    pub async fn destroy(&self, kind: RunnerKind) {
        let slot = self.slot(kind);
        let mut state = slot.lock().await;
        if let Some(handle) = state.handle.take() {
            self.host.stop(&handle, self.grace).await;
            info!(
                connection = %self.connection_id,
                kind = kind.as_str(),
                pid = handle.pid(),
                "runner destroyed"
            );
        }
        state.status = RunnerStatus::Stopped;
        state.revision = None;
        state.last_stats = RunnerStatsReading::NotRunning;
        state.updated_at = self.clock.utc();
    }

    /// Destroys every slot, in the fixed teardown order.
    ///
    /// Called before the owning connection's session handle is
    /// released, so no runner outlives its session.
    pub async fn destroy_all(&self) {
        for kind in RunnerKind::ALL {
            self.destroy(kind).await;
        }
    }

    /// Reads best-effort resource stats for a slot.
    ///
    /// Any failure to read OS-level statistics degrades to
    /// [`RunnerStatsReading::NotRunning`].
    pub async fn stats(&self, kind: RunnerKind) -> RunnerStatsReading {
        let slot = self.slot(kind);
        let mut state = slot.lock().await;
        let reading = match (&state.status, &state.handle) {
            (RunnerStatus::Running, Some(handle)) => match self.host.stats(handle).await {
                Ok(stats) => RunnerStatsReading::Stats(stats),
                Err(_) => RunnerStatsReading::NotRunning,
            },
            _ => RunnerStatsReading::NotRunning,
        };
        state.last_stats = reading;
        reading
    }

    /// Returns the current snapshot of a slot.
    pub async fn snapshot(&self, kind: RunnerKind) -> RunnerSlotSnapshot {
        let slot = self.slot(kind);
        let state = slot.lock().await;
        state.snapshot(kind)
    }

    /// Returns the last log lines of a slot's process.
    pub async fn log_tail(&self, kind: RunnerKind, count: usize) -> Vec<String> {
        let slot = self.slot(kind);
        let state = slot.lock().await;
        state
            .handle
            .as_ref()
            .map(|handle| handle.log().tail(count))
            .unwrap_or_default()
    }
}
