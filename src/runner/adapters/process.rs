//! OS process runner host backed by the `script_runner` binary.

use crate::runner::domain::{RunnerLog, RunnerStats};
use crate::runner::ipc::{
    RUNNER_KIND_ENV, RUNNER_PROC_ENV, RunnerEvent, RunnerPayload, decode_line, encode_line,
};
use crate::runner::ports::{
    RunnerExit, RunnerHandle, RunnerHostError, RunnerProcessHost, SpawnSpec,
};
use async_trait::async_trait;
use camino::Utf8PathBuf;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
#[cfg(target_os = "linux")]
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Environment variable pointing at the runner binary.
pub const RUNNER_BIN_ENV: &str = "BRUNEL_RUNNER_BIN";

/// Kernel scheduler tick rate; `USER_HZ` is 100 on supported targets.
#[cfg(target_os = "linux")]
const CLOCK_TICKS_PER_SECOND: f64 = 100.0;

/// Page size used for resident-memory accounting.
#[cfg(target_os = "linux")]
const PAGE_SIZE_BYTES: u64 = 4096;

/// Request delivered to a process's controlling task.
struct StopRequest {
    grace: Duration,
    done: oneshot::Sender<()>,
}

#[cfg(target_os = "linux")]
#[derive(Debug, Clone, Copy)]
struct CpuSample {
    ticks: u64,
    at: Instant,
}

/// Runner host spawning real OS processes.
///
/// Each spawn launches the `script_runner` binary with piped standard
/// streams, delivers the payload on stdin, and waits for the readiness
/// event before returning. The child handle is owned by a controlling
/// task; the rest of the system only ever sees the pid.
pub struct OsProcessRunnerHost {
    program: Utf8PathBuf,
    controls: Arc<Mutex<HashMap<u32, mpsc::Sender<StopRequest>>>>,
    #[cfg(target_os = "linux")]
    cpu_samples: Arc<Mutex<HashMap<u32, CpuSample>>>,
}

impl OsProcessRunnerHost {
    /// Creates a host spawning the given runner binary.
    #[must_use]
    pub fn new(program: Utf8PathBuf) -> Self {
        Self {
            program,
            controls: Arc::new(Mutex::new(HashMap::new())),
            #[cfg(target_os = "linux")]
            cpu_samples: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Creates a host from the `BRUNEL_RUNNER_BIN` environment
    /// variable.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let program = std::env::var(RUNNER_BIN_ENV).ok()?;
        Some(Self::new(Utf8PathBuf::from(program)))
    }

    fn lock_controls(&self) -> MutexGuard<'_, HashMap<u32, mpsc::Sender<StopRequest>>> {
        self.controls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn launch(&self, spec: &SpawnSpec) -> Result<Child, RunnerHostError> {
        let mut command = Command::new(self.program.as_std_path());
        command
            .env(RUNNER_PROC_ENV, "1")
            .env(RUNNER_KIND_ENV, spec.kind().as_str())
            .envs(spec.env())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
            .spawn()
            .map_err(|err| RunnerHostError::Spawn(err.to_string()))
    }
}

#[async_trait]
impl RunnerProcessHost for OsProcessRunnerHost {
    async fn spawn(&self, spec: SpawnSpec) -> Result<RunnerHandle, RunnerHostError> {
        let mut child = self.launch(&spec).await?;
        let pid = child
            .id()
            .ok_or_else(|| RunnerHostError::Spawn("process exited before startup".to_owned()))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| RunnerHostError::Io("runner stdin not piped".to_owned()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RunnerHostError::Io("runner stdout not piped".to_owned()))?;

        let payload = RunnerPayload {
            kind: spec.kind(),
            source: spec.source().to_owned(),
            connection_uri: spec.connection_uri().to_owned(),
        };
        let mut line =
            encode_line(&payload).map_err(|err| RunnerHostError::Io(err.to_string()))?;
        line.push('\n');
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|err| RunnerHostError::Io(err.to_string()))?;

        let log = Arc::new(RunnerLog::new());
        let mut stdout_lines = BufReader::new(stdout).lines();

        let readiness = tokio::time::timeout(
            spec.ready_timeout(),
            wait_for_ready(&mut stdout_lines, &log),
        )
        .await;
        match readiness {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                child.start_kill().ok();
                child.wait().await.ok();
                return Err(error);
            }
            Err(_elapsed) => {
                child.start_kill().ok();
                child.wait().await.ok();
                return Err(RunnerHostError::NotReady(format!(
                    "no readiness signal within {:?}",
                    spec.ready_timeout()
                )));
            }
        }
        debug!(pid, kind = spec.kind().as_str(), "runner process ready");

        // Stream the remaining output into the slot log.
        let stdout_log = Arc::clone(&log);
        tokio::spawn(async move {
            while let Ok(Some(output_line)) = stdout_lines.next_line().await {
                stdout_log.push(output_line);
            }
        });
        if let Some(stderr) = child.stderr.take() {
            let stderr_log = Arc::clone(&log);
            tokio::spawn(async move {
                let mut stderr_lines = BufReader::new(stderr).lines();
                while let Ok(Some(output_line)) = stderr_lines.next_line().await {
                    stderr_log.push(output_line);
                }
            });
        }

        let (stop_sender, stop_receiver) = mpsc::channel(4);
        let (exit_sender, exit_receiver) = oneshot::channel();
        self.lock_controls().insert(pid, stop_sender);

        let controls = Arc::clone(&self.controls);
        tokio::spawn(supervise_child(
            child, stdin, pid, stop_receiver, exit_sender, controls,
        ));

        Ok(RunnerHandle::new(pid, exit_receiver, log))
    }

    async fn stop(&self, handle: &RunnerHandle, grace: Duration) {
        let Some(sender) = self.lock_controls().get(&handle.pid()).cloned() else {
            return;
        };
        let (done_sender, done_receiver) = oneshot::channel();
        let request = StopRequest {
            grace,
            done: done_sender,
        };
        if sender.send(request).await.is_ok() {
            done_receiver.await.ok();
        }
    }

    async fn stats(&self, handle: &RunnerHandle) -> Result<RunnerStats, RunnerHostError> {
        self.sample_stats(handle.pid())
    }
}

impl OsProcessRunnerHost {
    #[cfg(target_os = "linux")]
    fn sample_stats(&self, pid: u32) -> Result<RunnerStats, RunnerHostError> {
        let ticks = read_cpu_ticks(pid)?;
        let memory_bytes = read_resident_bytes(pid)?;
        let now = Instant::now();

        let mut samples = self
            .cpu_samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let cpu_percent = samples
            .get(&pid)
            .map_or(0.0, |previous| cpu_percent_between(previous, ticks, now));
        samples.insert(pid, CpuSample { ticks, at: now });

        Ok(RunnerStats {
            cpu_percent,
            memory_bytes,
        })
    }

    #[cfg(not(target_os = "linux"))]
    fn sample_stats(&self, pid: u32) -> Result<RunnerStats, RunnerHostError> {
        Err(RunnerHostError::Io(format!(
            "process statistics unsupported on this platform (pid {pid})"
        )))
    }
}

/// Drains stdout until the runner reports readiness.
async fn wait_for_ready(
    lines: &mut tokio::io::Lines<BufReader<tokio::process::ChildStdout>>,
    log: &Arc<RunnerLog>,
) -> Result<(), RunnerHostError> {
    loop {
        let Some(line) = lines
            .next_line()
            .await
            .map_err(|err| RunnerHostError::Io(err.to_string()))?
        else {
            return Err(RunnerHostError::NotReady(
                "runner stdout closed before the ready event".to_owned(),
            ));
        };
        log.push(line.clone());
        match decode_line::<RunnerEvent>(&line) {
            Ok(RunnerEvent::Ready { .. }) => return Ok(()),
            Ok(RunnerEvent::Error { detail }) => return Err(RunnerHostError::NotReady(detail)),
            _ => {}
        }
    }
}

/// Owns a child process for its whole life: waits for natural exit or
/// serves one stop request, then reports how the process ended.
async fn supervise_child(
    mut child: Child,
    stdin: ChildStdin,
    pid: u32,
    mut stop_receiver: mpsc::Receiver<StopRequest>,
    exit_sender: oneshot::Sender<RunnerExit>,
    controls: Arc<Mutex<HashMap<u32, mpsc::Sender<StopRequest>>>>,
) {
    let mut requested = false;
    let code = loop {
        tokio::select! {
            status = child.wait() => {
                break status.ok().and_then(|exit| exit.code());
            }
            Some(stop) = stop_receiver.recv() => {
                requested = true;
                graceful_terminate(pid);
                let code = match tokio::time::timeout(stop.grace, child.wait()).await {
                    Ok(status) => status.ok().and_then(|exit| exit.code()),
                    Err(_elapsed) => {
                        warn!(pid, "runner ignored graceful stop; killing");
                        child.start_kill().ok();
                        child.wait().await.ok().and_then(|exit| exit.code())
                    }
                };
                stop.done.send(()).ok();
                break code;
            }
        }
    };

    controls
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(&pid);
    // Closing stdin only now: the runner treats a closed stdin as a
    // shutdown request, so it must stay open while the process runs.
    drop(stdin);
    exit_sender.send(RunnerExit { code, requested }).ok();
}

#[cfg(unix)]
fn graceful_terminate(pid: u32) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    if let Ok(raw) = i32::try_from(pid) {
        kill(Pid::from_raw(raw), Signal::SIGTERM).ok();
    }
}

#[cfg(not(unix))]
fn graceful_terminate(_pid: u32) {}

#[cfg(target_os = "linux")]
fn read_cpu_ticks(pid: u32) -> Result<u64, RunnerHostError> {
    let stat = std::fs::read_to_string(format!("/proc/{pid}/stat"))
        .map_err(|_| RunnerHostError::NotRunning(pid))?;
    // Skip past the parenthesised comm field; it may contain spaces.
    let after_comm = stat
        .rsplit_once(')')
        .map(|(_, rest)| rest)
        .ok_or(RunnerHostError::NotRunning(pid))?;
    let mut fields = after_comm.split_whitespace();
    let utime: u64 = fields
        .nth(11)
        .and_then(|value| value.parse().ok())
        .ok_or(RunnerHostError::NotRunning(pid))?;
    let stime: u64 = fields
        .next()
        .and_then(|value| value.parse().ok())
        .ok_or(RunnerHostError::NotRunning(pid))?;
    Ok(utime.saturating_add(stime))
}

#[cfg(target_os = "linux")]
fn read_resident_bytes(pid: u32) -> Result<u64, RunnerHostError> {
    let statm = std::fs::read_to_string(format!("/proc/{pid}/statm"))
        .map_err(|_| RunnerHostError::NotRunning(pid))?;
    let resident: u64 = statm
        .split_whitespace()
        .nth(1)
        .and_then(|value| value.parse().ok())
        .ok_or(RunnerHostError::NotRunning(pid))?;
    Ok(resident.saturating_mul(PAGE_SIZE_BYTES))
}

#[cfg(target_os = "linux")]
#[expect(
    clippy::cast_precision_loss,
    reason = "tick deltas are far below the 2^52 precision boundary"
)]
#[expect(
    clippy::float_arithmetic,
    reason = "CPU percentage is a ratio of tick time to wall time"
)]
fn cpu_percent_between(previous: &CpuSample, ticks: u64, now: Instant) -> f64 {
    let elapsed = now.saturating_duration_since(previous.at).as_secs_f64();
    if elapsed <= 0.0 {
        return 0.0;
    }
    let tick_delta = ticks.saturating_sub(previous.ticks) as f64;
    (tick_delta / CLOCK_TICKS_PER_SECOND) / elapsed * 100.0
}
