//! The in-memory registry of live target connections.

use super::CertificateStore;
use crate::connection::domain::{
    ConnectionDescriptor, ConnectionId, ValidatedConnectionDescriptor,
};
use crate::connection::validation::validate;
use crate::probe::domain::{ProbeError, ProbeReport};
use crate::probe::ports::{ProbeCheck, ProbeDriver};
use crate::probe::services::ConnectionProber;
use crate::registry::domain::{
    ConnectionRecord, ConnectionRunnerStats, RegistryError, StoragePaths,
};
use crate::registry::ports::ConnectionStore;
use crate::runner::domain::{RunnerKind, RunnerSlotSnapshot};
use crate::runner::ports::RunnerProcessHost;
use crate::runner::services::ScriptRunnerSupervisor;
use crate::startup::ports::{DbSession, SessionFactory};
use mockable::Clock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{error, info, warn};

/// The method runner loads no static source; procedures arrive per
/// call over its IPC channel.
const METHOD_RUNNER_SOURCE: &str = "";

/// One live connection's resources.
struct ReadyEntry<H, C>
where
    H: RunnerProcessHost,
    C: Clock + Send + Sync,
{
    record: ConnectionRecord,
    session: Arc<dyn DbSession>,
    runners: Arc<ScriptRunnerSupervisor<H, C>>,
    session_path: String,
}

impl<H, C> Clone for ReadyEntry<H, C>
where
    H: RunnerProcessHost,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            record: self.record.clone(),
            session: Arc::clone(&self.session),
            runners: Arc::clone(&self.runners),
            session_path: self.session_path.clone(),
        }
    }
}

/// Registry slot: a started connection or its stored failure.
enum EntryState<H, C>
where
    H: RunnerProcessHost,
    C: Clock + Send + Sync,
{
    Ready(ReadyEntry<H, C>),
    Failed(ProbeError),
}

/// Owns every live target connection.
///
/// Exactly one entry may exist per connection identity; the registry
/// enforces this with a per-identity mutex, so concurrent starts of
/// the same connection serialize while different connections proceed
/// in parallel. Teardown always destroys the connection's runner
/// slots before releasing its session handle.
pub struct ConnectionRegistry<S, D, F, H, C>
where
    S: ConnectionStore,
    D: ProbeDriver,
    F: SessionFactory,
    H: RunnerProcessHost,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    prober: ConnectionProber<D>,
    sessions: Arc<F>,
    runner_host: Arc<H>,
    clock: Arc<C>,
    paths: StoragePaths,
    certs: CertificateStore,
    entries: Mutex<HashMap<ConnectionId, EntryState<H, C>>>,
    start_locks: Mutex<HashMap<ConnectionId, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S, D, F, H, C> ConnectionRegistry<S, D, F, H, C>
where
    S: ConnectionStore,
    D: ProbeDriver,
    F: SessionFactory,
    H: RunnerProcessHost + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a registry.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        prober: ConnectionProber<D>,
        sessions: Arc<F>,
        runner_host: Arc<H>,
        clock: Arc<C>,
        paths: StoragePaths,
    ) -> Self {
        let certs = CertificateStore::new(paths.certificates_root());
        Self {
            store,
            prober,
            sessions,
            runner_host,
            clock,
            paths,
            certs,
            entries: Mutex::new(HashMap::new()),
            start_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the derived storage paths.
    #[must_use]
    pub const fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<ConnectionId, EntryState<H, C>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the per-identity start lock, creating it on first use.
    fn start_lock(&self, id: ConnectionId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .start_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(id).or_default())
    }

    /// Validates a raw descriptor without touching the network.
    ///
    /// # Errors
    ///
    /// Returns validation failures from the pure transform.
    pub fn validate_connection(
        descriptor: &ConnectionDescriptor,
    ) -> Result<ValidatedConnectionDescriptor, RegistryError> {
        Ok(validate(descriptor)?)
    }

    /// Probes a raw descriptor, without registering anything.
    ///
    /// # Errors
    ///
    /// Returns validation failures and classified probe failures.
    pub async fn test_connection(
        &self,
        descriptor: &ConnectionDescriptor,
        require_superuser: bool,
        check: Option<&dyn ProbeCheck>,
    ) -> Result<ProbeReport, RegistryError> {
        let validated = validate(descriptor)?;
        Ok(self
            .prober
            .probe(&validated, require_superuser, check)
            .await?)
    }

    /// Starts a target connection and returns its session path.
    ///
    /// An already-started connection returns its existing path; a
    /// connection whose previous start failed re-raises the stored
    /// failure until it is disconnected. At most one entry exists per
    /// identity.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::ConnectionNotFound`] for unknown
    /// identities, plus validation, probe, and session failures.
    pub async fn start_connection(&self, id: ConnectionId) -> Result<String, RegistryError> {
        let start_lock = self.start_lock(id);
        let _guard = start_lock.lock().await;

        match self.lock_entries().get(&id) {
            Some(EntryState::Ready(entry)) => return Ok(entry.session_path.clone()),
            Some(EntryState::Failed(probe_error)) => {
                return Err(RegistryError::Probe(probe_error.clone()));
            }
            None => {}
        }

        let record = self
            .store
            .find(id)
            .await
            .map_err(|err| RegistryError::Store(err.to_string()))?
            .ok_or(RegistryError::ConnectionNotFound(id))?;
        let validated = validate(record.descriptor())?;

        if let Err(cert_error) = self.certs.persist(id, validated.certificates()) {
            // Certificates are an input to the server's TLS stack, not
            // a precondition of the probe; keep going.
            error!(connection = %id, "failed writing ssl certificates: {cert_error}");
        }

        let report = match self.prober.probe(&validated, false, None).await {
            Ok(probe_report) => probe_report,
            Err(probe_error) => {
                self.lock_entries()
                    .insert(id, EntryState::Failed(probe_error.clone()));
                return Err(RegistryError::Probe(probe_error));
            }
        };
        if report.ssl_fallback_used() {
            warn!(connection = %id, "connected through the sslmode=disable fallback");
        }

        let session = self.sessions.open(report.descriptor()).await?;
        let runners = Arc::new(ScriptRunnerSupervisor::new(
            id,
            report.descriptor().canonical_uri(),
            Arc::clone(&self.runner_host),
            Arc::clone(&self.clock),
        ));

        // Script slots come up with the connection; a failing script
        // disables only its own slot, never the connection.
        if !record.table_config_disabled()
            && let Some(source) = record.table_config_source()
            && let Err(runner_error) = runners.ensure_running(RunnerKind::TableConfig, source).await
        {
            error!(connection = %id, "table config runner disabled: {runner_error}");
        }
        if !record.on_mount_disabled()
            && let Some(source) = record.on_mount_source()
            && let Err(runner_error) = runners.ensure_running(RunnerKind::OnMount, source).await
        {
            error!(connection = %id, "on-mount runner disabled: {runner_error}");
        }

        let session_path = self.paths.session_path(id);
        info!(
            connection = %id,
            name = record.name(),
            path = session_path,
            "connection started"
        );
        self.lock_entries().insert(
            id,
            EntryState::Ready(ReadyEntry {
                record,
                session,
                runners,
                session_path: session_path.clone(),
            }),
        );
        Ok(session_path)
    }

    /// Disconnects a target connection, releasing all its resources.
    ///
    /// Every runner slot is destroyed before the session handle is
    /// released. Returns whether an entry existed.
    ///
    /// # Errors
    ///
    /// This operation itself is infallible apart from certificate
    /// cleanup, which is reported but never blocks the disconnect.
    pub async fn disconnect(&self, id: ConnectionId) -> Result<bool, RegistryError> {
        let start_lock = self.start_lock(id);
        let _guard = start_lock.lock().await;

        let entry = self.lock_entries().remove(&id);
        match entry {
            None => Ok(false),
            Some(EntryState::Failed(_)) => Ok(true),
            Some(EntryState::Ready(ready)) => {
                // Runners first: none of them may outlive the session
                // they were spawned against.
                ready.runners.destroy_all().await;
                ready.session.close().await;
                if let Err(cert_error) = self.certs.remove(id) {
                    warn!(connection = %id, "failed removing ssl certificates: {cert_error}");
                }
                info!(connection = %id, "connection disconnected");
                Ok(true)
            }
        }
    }

    fn ready_entry(&self, id: ConnectionId) -> Result<ReadyEntry<H, C>, RegistryError> {
        match self.lock_entries().get(&id) {
            Some(EntryState::Ready(entry)) => Ok(entry.clone()),
            Some(EntryState::Failed(probe_error)) => {
                Err(RegistryError::Probe(probe_error.clone()))
            }
            None => Err(RegistryError::NotConnected(id)),
        }
    }

    /// Re-validates a live connection against the current schema.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotConnected`] for unstarted
    /// connections and session failures otherwise.
    pub async fn reload_schema(&self, id: ConnectionId) -> Result<(), RegistryError> {
        let entry = self.ready_entry(id)?;
        entry.session.reload_schema().await?;
        Ok(())
    }

    /// Installs, replaces, or disables the post-connect hook script.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotConnected`] for unstarted
    /// connections and spawn failures isolated to the slot.
    pub async fn set_on_mount_script(
        &self,
        id: ConnectionId,
        source: Option<&str>,
        disabled: bool,
    ) -> Result<(), RegistryError> {
        self.set_script_slot(id, RunnerKind::OnMount, source, disabled)
            .await
    }

    /// Installs, replaces, or disables the schema-configuration
    /// script.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotConnected`] for unstarted
    /// connections and spawn failures isolated to the slot.
    pub async fn set_table_config_script(
        &self,
        id: ConnectionId,
        source: Option<&str>,
        disabled: bool,
    ) -> Result<(), RegistryError> {
        self.set_script_slot(id, RunnerKind::TableConfig, source, disabled)
            .await
    }

    async fn set_script_slot(
        &self,
        id: ConnectionId,
        kind: RunnerKind,
        source: Option<&str>,
        disabled: bool,
    ) -> Result<(), RegistryError> {
        let entry = self.ready_entry(id)?;
        match source {
            Some(text) if !disabled && !text.trim().is_empty() => {
                entry.runners.ensure_running(kind, text).await?;
                Ok(())
            }
            _ => {
                entry.runners.destroy(kind).await;
                Ok(())
            }
        }
    }

    /// Ensures the method runner is live, spawning it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotConnected`] for unstarted
    /// connections and spawn failures isolated to the slot.
    pub async fn ensure_method_runner(
        &self,
        id: ConnectionId,
    ) -> Result<RunnerSlotSnapshot, RegistryError> {
        let entry = self.ready_entry(id)?;
        Ok(entry
            .runners
            .ensure_running(RunnerKind::Method, METHOD_RUNNER_SOURCE)
            .await?)
    }

    /// Reads best-effort stats for all three runner slots.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotConnected`] for unstarted
    /// connections; unreadable slots degrade to `NotRunning`.
    pub async fn runner_stats(
        &self,
        id: ConnectionId,
    ) -> Result<ConnectionRunnerStats, RegistryError> {
        let entry = self.ready_entry(id)?;
        Ok(ConnectionRunnerStats {
            method: entry.runners.stats(RunnerKind::Method).await,
            on_mount: entry.runners.stats(RunnerKind::OnMount).await,
            table_config: entry.runners.stats(RunnerKind::TableConfig).await,
        })
    }

    /// Returns whether a connection currently has a live entry.
    #[must_use]
    pub fn is_connected(&self, id: ConnectionId) -> bool {
        matches!(self.lock_entries().get(&id), Some(EntryState::Ready(_)))
    }

    /// Returns the identities of every registered entry.
    #[must_use]
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.lock_entries().keys().copied().collect()
    }
}
