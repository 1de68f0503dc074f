//! Isolated script-runner process image.
//!
//! One runner process serves one slot of one managed connection. The
//! supervising parent delivers a [`RunnerPayload`] as a single JSON
//! line on stdin; the runner answers with a `ready` event on stdout
//! and then serves commands until its stdin closes or it receives a
//! termination signal. Anything the script does — misbehave, spin,
//! crash — is contained in this process; the parent only ever sees
//! the exit.
//!
//! Usage (spawned by the supervisor, not by hand):
//!
//! ```text
//! BRUNEL_RUNNER_PROC=1 BRUNEL_RUNNER_KIND=on_mount script_runner
//! ```

use brunel::runner::ipc::{RunnerCommand, RunnerEvent, RunnerPayload, decode_line, encode_line};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};
use tokio::runtime::Builder;

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that end the runner process.
#[derive(Debug, Error)]
enum RunnerProcError {
    #[error("no payload received on stdin")]
    MissingPayload,
    #[error("invalid payload: {0}")]
    InvalidPayload(serde_json::Error),
    #[error("runner I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode event: {0}")]
    Encode(serde_json::Error),
}

fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let runtime = Builder::new_current_thread().enable_all().build()?;
    let result = runtime.block_on(run());
    // `tokio::io::stdin()` reads on an uncancellable blocking thread.
    // When the runner exits via SIGTERM while its stdin is still open
    // (the parent keeps it open until the process ends), that thread is
    // parked in a blocking read, and dropping the runtime would block
    // forever joining it. Shut the runtime down without waiting so the
    // process terminates cleanly, as a graceful stop is meant to.
    runtime.shutdown_background();
    result.map_err(Into::into)
}

async fn run() -> Result<(), RunnerProcError> {
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut output = tokio::io::stdout();

    let payload = match read_payload(&mut input).await {
        Ok(loaded) => loaded,
        Err(error) => {
            // Tell the parent why readiness will never come, then
            // exit non-zero.
            let event = RunnerEvent::Error {
                detail: error.to_string(),
            };
            write_event(&mut output, &event).await.ok();
            return Err(error);
        }
    };

    tracing::debug!(
        kind = %payload.kind,
        source_bytes = payload.source.len(),
        has_credentials = !payload.connection_uri.is_empty(),
        "payload loaded"
    );

    // Register the termination handler before announcing readiness: the
    // parent may issue a stop the instant it observes the ready event,
    // and a SIGTERM arriving before the handler exists would kill the
    // process by default disposition instead of shutting down cleanly.
    #[cfg(unix)]
    let mut terminate =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    write_event(
        &mut output,
        &RunnerEvent::Ready {
            pid: std::process::id(),
        },
    )
    .await?;
    tracing::info!(kind = %payload.kind, "runner ready");

    #[cfg(unix)]
    return serve(&mut input, &mut output, &mut terminate).await;
    #[cfg(not(unix))]
    return serve(&mut input, &mut output).await;
}

async fn read_payload(
    input: &mut Lines<BufReader<Stdin>>,
) -> Result<RunnerPayload, RunnerProcError> {
    let line = input
        .next_line()
        .await?
        .ok_or(RunnerProcError::MissingPayload)?;
    decode_line(&line).map_err(RunnerProcError::InvalidPayload)
}

#[cfg(unix)]
async fn serve(
    input: &mut Lines<BufReader<Stdin>>,
    output: &mut Stdout,
    terminate: &mut tokio::signal::unix::Signal,
) -> Result<(), RunnerProcError> {
    loop {
        tokio::select! {
            line = input.next_line() => {
                if !handle_line(line?, output).await? {
                    break;
                }
            }
            _ = terminate.recv() => {
                tracing::info!("received termination signal; exiting");
                break;
            }
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn serve(
    input: &mut Lines<BufReader<Stdin>>,
    output: &mut Stdout,
) -> Result<(), RunnerProcError> {
    while handle_line(input.next_line().await?, output).await? {}
    Ok(())
}

/// Serves one stdin line; returns `false` once stdin is closed.
async fn handle_line(
    maybe_line: Option<String>,
    output: &mut Stdout,
) -> Result<bool, RunnerProcError> {
    let Some(line) = maybe_line else {
        tracing::info!("stdin closed; exiting");
        return Ok(false);
    };
    if line.trim().is_empty() {
        return Ok(true);
    }
    let event = respond(decode_line(&line));
    write_event(output, &event).await?;
    Ok(true)
}

/// Computes the answer to one command line.
fn respond(command: Result<RunnerCommand, serde_json::Error>) -> RunnerEvent {
    match command {
        Ok(RunnerCommand::Ping) => RunnerEvent::Pong,
        Ok(RunnerCommand::Stats) => self_stats(),
        Err(error) => RunnerEvent::Error {
            detail: error.to_string(),
        },
    }
}

/// Self-reported resource usage.
#[cfg(target_os = "linux")]
fn self_stats() -> RunnerEvent {
    let memory_bytes = std::fs::read_to_string("/proc/self/statm")
        .ok()
        .and_then(|statm| {
            statm
                .split_whitespace()
                .nth(1)
                .and_then(|pages| pages.parse::<u64>().ok())
        })
        .map_or(0, |pages| pages.saturating_mul(4096));
    RunnerEvent::Stats {
        cpu_percent: 0.0,
        memory_bytes,
    }
}

#[cfg(not(target_os = "linux"))]
fn self_stats() -> RunnerEvent {
    RunnerEvent::Stats {
        cpu_percent: 0.0,
        memory_bytes: 0,
    }
}

async fn write_event(output: &mut Stdout, event: &RunnerEvent) -> Result<(), RunnerProcError> {
    let mut line = encode_line(event).map_err(RunnerProcError::Encode)?;
    line.push('\n');
    output.write_all(line.as_bytes()).await?;
    output.flush().await?;
    Ok(())
}
