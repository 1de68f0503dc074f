//! In-memory runner host for deterministic tests.

use crate::runner::domain::{RunnerLog, RunnerStats};
use crate::runner::ports::{
    RunnerExit, RunnerHandle, RunnerHostError, RunnerProcessHost, SpawnSpec,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;

/// First fake pid handed out by the in-memory host.
const FIRST_FAKE_PID: u32 = 40000;

#[derive(Debug)]
struct HostState {
    next_pid: u32,
    spawn_count: usize,
    fail_next_spawn: Option<String>,
    running: HashMap<u32, oneshot::Sender<RunnerExit>>,
    stats: RunnerStats,
    specs: Vec<SpawnSpec>,
}

/// In-memory runner process host.
///
/// Models process lifecycle without spawning anything: spawns hand out
/// fake pids, stops resolve exits as requested, and an out-of-band
/// [`Self::kill`] simulates a crash. Suitable for unit and behaviour
/// tests.
#[derive(Debug, Clone)]
pub struct InMemoryRunnerHost {
    state: Arc<Mutex<HostState>>,
}

impl Default for InMemoryRunnerHost {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRunnerHost {
    /// Creates an empty host.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(HostState {
                next_pid: FIRST_FAKE_PID,
                spawn_count: 0,
                fail_next_spawn: None,
                running: HashMap::new(),
                stats: RunnerStats {
                    cpu_percent: 1.5,
                    memory_bytes: 16 * 1024 * 1024,
                },
                specs: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes the next spawn fail with the given diagnostic.
    pub fn fail_next_spawn(&self, detail: impl Into<String>) {
        self.lock().fail_next_spawn = Some(detail.into());
    }

    /// Overrides the stats every running process reports.
    pub fn set_stats(&self, stats: RunnerStats) {
        self.lock().stats = stats;
    }

    /// Returns how many spawns have been performed.
    #[must_use]
    pub fn spawn_count(&self) -> usize {
        self.lock().spawn_count
    }

    /// Returns the pids currently considered running.
    #[must_use]
    pub fn running_pids(&self) -> Vec<u32> {
        let mut pids: Vec<u32> = self.lock().running.keys().copied().collect();
        pids.sort_unstable();
        pids
    }

    /// Returns every spawn spec seen so far.
    #[must_use]
    pub fn specs(&self) -> Vec<SpawnSpec> {
        self.lock().specs.clone()
    }

    /// Simulates an out-of-band process death (e.g. an OOM kill).
    ///
    /// Returns whether the pid was running.
    pub fn kill(&self, pid: u32) -> bool {
        let sender = self.lock().running.remove(&pid);
        match sender {
            Some(exit) => {
                exit.send(RunnerExit {
                    code: Some(137),
                    requested: false,
                })
                .ok();
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl RunnerProcessHost for InMemoryRunnerHost {
    async fn spawn(&self, spec: SpawnSpec) -> Result<RunnerHandle, RunnerHostError> {
        let mut state = self.lock();
        if let Some(detail) = state.fail_next_spawn.take() {
            return Err(RunnerHostError::Spawn(detail));
        }

        let pid = state.next_pid;
        state.next_pid = state.next_pid.wrapping_add(1);
        state.spawn_count = state.spawn_count.saturating_add(1);

        let (exit_sender, exit_receiver) = oneshot::channel();
        state.running.insert(pid, exit_sender);
        state.specs.push(spec.clone());
        drop(state);

        let log = Arc::new(RunnerLog::new());
        log.push(format!("{} runner ready (pid {pid})", spec.kind()));
        Ok(RunnerHandle::new(pid, exit_receiver, log))
    }

    async fn stop(&self, handle: &RunnerHandle, _grace: Duration) {
        let sender = self.lock().running.remove(&handle.pid());
        if let Some(exit) = sender {
            exit.send(RunnerExit {
                code: Some(0),
                requested: true,
            })
            .ok();
        }
    }

    async fn stats(&self, handle: &RunnerHandle) -> Result<RunnerStats, RunnerHostError> {
        let state = self.lock();
        if state.running.contains_key(&handle.pid()) {
            Ok(state.stats)
        } else {
            Err(RunnerHostError::NotRunning(handle.pid()))
        }
    }
}
