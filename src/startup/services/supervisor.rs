//! Resilient startup supervision for the primary connection.

use crate::connection::domain::ValidatedConnectionDescriptor;
use crate::connection::validation::validate;
use crate::probe::domain::{ErrorClass, ProbeError};
use crate::probe::ports::ProbeDriver;
use crate::probe::services::ConnectionProber;
use crate::startup::domain::{BackoffPolicy, RetryPolicy, StartKey, StartRequest, StartupState};
use crate::startup::ports::SessionFactory;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{error, info, warn};

/// Default number of probe attempts per start cycle.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Guidance returned when no credentials are configured at all.
const MISSING_CREDENTIALS_GUIDANCE: &str = "\
Make sure the environment contains superuser postgres credentials:
  POSTGRES_URL
  or
  POSTGRES_DB
  POSTGRES_USER

To create a superuser and database on linux:
  sudo -su postgres createuser -P --superuser myusername
  sudo -su postgres createdb mydatabase -O myusername";

/// Mutable supervisor state, owned behind a single mutex so terminal
/// transitions and listener notification are linearizable.
struct SupervisorState {
    terminal: Option<StartupState>,
    terminal_key: Option<StartKey>,
    listeners: Vec<oneshot::Sender<StartupState>>,
    inflight: HashMap<StartKey, Vec<oneshot::Sender<StartupState>>>,
    attempts_in_progress: HashSet<StartKey>,
    generation: u64,
}

impl SupervisorState {
    fn new() -> Self {
        Self {
            terminal: None,
            terminal_key: None,
            listeners: Vec::new(),
            inflight: HashMap::new(),
            attempts_in_progress: HashSet::new(),
            generation: 0,
        }
    }
}

/// Result of driving one probe cycle.
enum CycleOutcome {
    /// The cycle ran to a terminal state.
    Completed(StartupState),
    /// The cycle was rejected by the duplicate-attempt guard before
    /// probing; only the rejected caller observes the error.
    Rejected(ProbeError),
}

/// How a `start` call participates in a cycle.
enum Participation {
    /// This caller runs the probe loop.
    Leader { generation: u64 },
    /// This caller waits for an identical in-flight cycle.
    Follower(oneshot::Receiver<StartupState>),
    /// A terminal state for this configuration already exists.
    Settled(StartupState),
}

/// Supervises the startup of the single primary ("state") connection.
///
/// Owns the `loading → ok | error` state machine: probes with bounded
/// retries and jittered exponential backoff, classifies failures via
/// the retry policy, deduplicates concurrent identical starts, and
/// broadcasts the terminal state to every listener exactly once. The
/// supervisor is a plain value with no package-level state; create one
/// per process.
pub struct StartupSupervisor<D, F>
where
    D: ProbeDriver,
    F: SessionFactory,
{
    prober: ConnectionProber<D>,
    sessions: Arc<F>,
    backoff: BackoffPolicy,
    retry: RetryPolicy,
    state: Arc<Mutex<SupervisorState>>,
}

impl<D, F> Clone for StartupSupervisor<D, F>
where
    D: ProbeDriver,
    F: SessionFactory,
{
    fn clone(&self) -> Self {
        Self {
            prober: self.prober.clone(),
            sessions: Arc::clone(&self.sessions),
            backoff: self.backoff.clone(),
            retry: self.retry.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<D, F> StartupSupervisor<D, F>
where
    D: ProbeDriver,
    F: SessionFactory,
{
    /// Creates a supervisor with default backoff and retry policies.
    #[must_use]
    pub fn new(prober: ConnectionProber<D>, sessions: Arc<F>) -> Self {
        Self {
            prober,
            sessions,
            backoff: BackoffPolicy::default(),
            retry: RetryPolicy::default(),
            state: Arc::new(Mutex::new(SupervisorState::new())),
        }
    }

    /// Overrides the backoff policy.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Overrides the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn lock_state(&self) -> MutexGuard<'_, SupervisorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the current startup state.
    #[must_use]
    pub fn current_state(&self) -> StartupState {
        self.lock_state()
            .terminal
            .clone()
            .unwrap_or(StartupState::Loading)
    }

    /// Subscribes to the terminal state of the current start cycle.
    ///
    /// When a terminal state is already known the receiver resolves
    /// immediately; otherwise it resolves exactly once when the cycle
    /// ends. Listeners are single-shot and are not re-invoked by
    /// later, unrelated cycles.
    #[must_use]
    pub fn subscribe(&self) -> oneshot::Receiver<StartupState> {
        let (sender, receiver) = oneshot::channel();
        let mut state = self.lock_state();
        match &state.terminal {
            Some(terminal) => {
                sender.send(terminal.clone()).ok();
            }
            None => state.listeners.push(sender),
        }
        receiver
    }

    /// Starts the primary connection.
    ///
    /// Idempotent under concurrency: callers with an equal
    /// descriptor/port/host triple share one probe sequence, while a
    /// different configuration proceeds independently. Returns the
    /// terminal state of the cycle.
    pub async fn start(&self, request: StartRequest, max_attempts: u32) -> StartupState {
        let (validated, key) = match self.admit(&request) {
            Ok(admitted) => admitted,
            Err(terminal) => return terminal,
        };

        match self.join_or_lead(&key) {
            Participation::Settled(terminal) => terminal,
            Participation::Follower(receiver) => receiver.await.unwrap_or_else(|_| {
                StartupState::Error(ProbeError::new(
                    ErrorClass::Internal,
                    "in-flight start cycle ended without publishing a state",
                ))
            }),
            Participation::Leader { generation } => {
                match self
                    .run_cycle(&validated, &key, generation, max_attempts)
                    .await
                {
                    CycleOutcome::Completed(outcome) => self.publish(&key, generation, outcome),
                    CycleOutcome::Rejected(duplicate) => {
                        let terminal = StartupState::Error(duplicate);
                        self.resolve_waiters(&key, &terminal);
                        terminal
                    }
                }
            }
        }
    }

    /// Restarts the primary connection with a (possibly new)
    /// descriptor.
    ///
    /// Clears any terminal state and runs a fresh cycle immediately,
    /// bypassing start deduplication; a concurrent identical restart
    /// is rejected by the duplicate-attempt guard.
    pub async fn restart(&self, request: StartRequest, max_attempts: u32) -> StartupState {
        let (validated, key) = match self.admit(&request) {
            Ok(admitted) => admitted,
            Err(terminal) => return terminal,
        };

        let generation = {
            let mut state = self.lock_state();
            state.terminal = None;
            state.terminal_key = None;
            state.generation = state.generation.wrapping_add(1);
            state.generation
        };

        match self
            .run_cycle(&validated, &key, generation, max_attempts)
            .await
        {
            CycleOutcome::Completed(outcome) => self.publish(&key, generation, outcome),
            CycleOutcome::Rejected(duplicate) => StartupState::Error(duplicate),
        }
    }

    /// Validates the request and computes its dedup key, producing an
    /// immediate terminal error for unconfigured or invalid
    /// descriptors.
    #[expect(
        clippy::result_large_err,
        reason = "the error side is the terminal state handed straight back to the caller"
    )]
    fn admit(
        &self,
        request: &StartRequest,
    ) -> Result<(ValidatedConnectionDescriptor, StartKey), StartupState> {
        if request.descriptor().is_unconfigured() {
            let terminal = StartupState::Error(ProbeError::new(
                ErrorClass::Configuration,
                MISSING_CREDENTIALS_GUIDANCE,
            ));
            return Err(self.settle_unkeyed(terminal));
        }

        match validate(request.descriptor()) {
            Ok(validated) => {
                let key = StartKey::new(validated.signature(), request.port(), request.host());
                Ok((validated, key))
            }
            Err(validation_error) => {
                let terminal = StartupState::Error(ProbeError::new(
                    ErrorClass::Configuration,
                    validation_error.to_string(),
                ));
                Err(self.settle_unkeyed(terminal))
            }
        }
    }

    /// Publishes a terminal state that never entered the dedup
    /// registry (admission failures).
    fn settle_unkeyed(&self, terminal: StartupState) -> StartupState {
        let listeners = {
            let mut state = self.lock_state();
            state.terminal = Some(terminal.clone());
            state.terminal_key = None;
            std::mem::take(&mut state.listeners)
        };
        for listener in listeners {
            listener.send(terminal.clone()).ok();
        }
        terminal
    }

    fn join_or_lead(&self, key: &StartKey) -> Participation {
        let mut state = self.lock_state();

        if let (Some(terminal), Some(terminal_key)) = (&state.terminal, &state.terminal_key)
            && terminal_key == key
        {
            // The singleton is immutable until an explicit restart or
            // a start with a different configuration.
            return Participation::Settled(terminal.clone());
        }

        if let Some(waiters) = state.inflight.get_mut(key) {
            let (sender, receiver) = oneshot::channel();
            waiters.push(sender);
            return Participation::Follower(receiver);
        }

        state.inflight.insert(key.clone(), Vec::new());
        state.generation = state.generation.wrapping_add(1);
        Participation::Leader {
            generation: state.generation,
        }
    }

    /// Ends a cycle: resolves same-key waiters, records the terminal
    /// state (unless superseded), and fires pending listeners.
    fn publish(&self, key: &StartKey, generation: u64, outcome: StartupState) -> StartupState {
        let (waiters, listeners) = {
            let mut state = self.lock_state();
            let waiters = state.inflight.remove(key).unwrap_or_default();
            let listeners = if state.generation == generation {
                state.terminal = Some(outcome.clone());
                state.terminal_key = Some(key.clone());
                std::mem::take(&mut state.listeners)
            } else {
                Vec::new()
            };
            (waiters, listeners)
        };

        for waiter in waiters {
            waiter.send(outcome.clone()).ok();
        }
        for listener in listeners {
            listener.send(outcome.clone()).ok();
        }
        outcome
    }

    /// Resolves same-key waiters without touching the terminal state.
    fn resolve_waiters(&self, key: &StartKey, outcome: &StartupState) {
        let waiters = self.lock_state().inflight.remove(key).unwrap_or_default();
        for waiter in waiters {
            waiter.send(outcome.clone()).ok();
        }
    }

    fn is_superseded(&self, generation: u64) -> bool {
        self.lock_state().generation != generation
    }

    async fn run_cycle(
        &self,
        validated: &ValidatedConnectionDescriptor,
        key: &StartKey,
        generation: u64,
        max_attempts: u32,
    ) -> CycleOutcome {
        let attempts = max_attempts.max(1);
        let mut last_error = ProbeError::new(
            ErrorClass::Internal,
            "start cycle ended without executing an attempt",
        );

        for attempt in 1..=attempts {
            let guard = match AttemptGuard::acquire(Arc::clone(&self.state), key) {
                Ok(guard) => guard,
                Err(duplicate) => {
                    warn!(attempt, "rejecting re-entrant start attempt");
                    return CycleOutcome::Rejected(duplicate);
                }
            };

            let result = self.prober.probe(validated, true, None).await;
            drop(guard);

            match result {
                Ok(report) => {
                    if report.ssl_fallback_used() {
                        warn!("primary connection fell back to sslmode=disable");
                    }
                    match self.sessions.open(report.descriptor()).await {
                        Ok(session) => {
                            info!(
                                attempt,
                                uri = report.descriptor().redacted_uri(),
                                "primary connection ready"
                            );
                            return CycleOutcome::Completed(StartupState::Ok(session));
                        }
                        Err(session_error) => {
                            last_error = ProbeError::new(
                                ErrorClass::TransientConnectivity,
                                session_error.to_string(),
                            );
                        }
                    }
                }
                Err(probe_error) => {
                    if !self.retry.is_retryable(&probe_error) {
                        info!(
                            attempt,
                            class = probe_error.class().as_str(),
                            "primary connection failed terminally"
                        );
                        return CycleOutcome::Completed(StartupState::Error(probe_error));
                    }
                    last_error = probe_error;
                }
            }

            if attempt < attempts {
                if self.is_superseded(generation) {
                    warn!("start cycle superseded; stopping further retries");
                    return CycleOutcome::Completed(StartupState::Error(superseded_error()));
                }
                let delay = {
                    let mut rng = rand::thread_rng();
                    self.backoff.jittered_delay(attempt, &mut rng)
                };
                tokio::time::sleep(delay).await;
                if self.is_superseded(generation) {
                    warn!("start cycle superseded during backoff; stopping");
                    return CycleOutcome::Completed(StartupState::Error(superseded_error()));
                }
            }
        }

        error!(
            attempts,
            class = last_error.class().as_str(),
            "primary connection failed after exhausting retries"
        );
        CycleOutcome::Completed(StartupState::Error(last_error))
    }
}

fn superseded_error() -> ProbeError {
    ProbeError::new(
        ErrorClass::DuplicateAttempt,
        "start cycle superseded by a newer request with a different configuration",
    )
}

/// RAII entry in the attempts-in-progress set.
///
/// Acquisition fails when an attempt for the same configuration is
/// already underway via a code path that bypassed start deduplication;
/// the key is released when the attempt finishes, success or failure.
struct AttemptGuard {
    state: Arc<Mutex<SupervisorState>>,
    key: StartKey,
}

impl AttemptGuard {
    fn acquire(
        state: Arc<Mutex<SupervisorState>>,
        key: &StartKey,
    ) -> Result<Self, ProbeError> {
        {
            let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
            if !guard.attempts_in_progress.insert(key.clone()) {
                return Err(ProbeError::new(
                    ErrorClass::DuplicateAttempt,
                    "a connection attempt for this configuration is already in progress",
                ));
            }
        }
        Ok(Self {
            state,
            key: key.clone(),
        })
    }
}

impl Drop for AttemptGuard {
    fn drop(&mut self) {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        guard.attempts_in_progress.remove(&self.key);
    }
}
