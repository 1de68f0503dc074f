//! Unit tests for the script-runner supervisor against the in-memory
//! host.

use crate::connection::domain::ConnectionId;
use crate::runner::adapters::InMemoryRunnerHost;
use crate::runner::domain::{RunnerError, RunnerKind, RunnerStats, RunnerStatus};
use crate::runner::services::ScriptRunnerSupervisor;
use mockable::DefaultClock;
use rstest::rstest;
use std::sync::Arc;
use std::time::Duration;

type TestSupervisor = ScriptRunnerSupervisor<InMemoryRunnerHost, DefaultClock>;

fn build(host: &InMemoryRunnerHost) -> TestSupervisor {
    ScriptRunnerSupervisor::new(
        ConnectionId::new(),
        "postgresql://svc@db.internal:5432/app?sslmode=prefer",
        Arc::new(host.clone()),
        Arc::new(DefaultClock),
    )
    .with_stop_grace(Duration::from_millis(50))
}

/// Polls until the slot reports the expected status.
async fn wait_for_status(
    supervisor: &TestSupervisor,
    kind: RunnerKind,
    expected: RunnerStatus,
) {
    for _ in 0..100 {
        if supervisor.snapshot(kind).await.status() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let status = supervisor.snapshot(kind).await.status();
    panic!("slot {kind} never reached {expected}; last status {status}");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn ensure_running_spawns_once_per_revision() {
    let host = InMemoryRunnerHost::new();
    let supervisor = build(&host);

    let first = supervisor
        .ensure_running(RunnerKind::OnMount, "hook()")
        .await
        .expect("spawn should succeed");
    let second = supervisor
        .ensure_running(RunnerKind::OnMount, "hook()")
        .await
        .expect("second call should succeed");

    assert_eq!(host.spawn_count(), 1);
    assert_eq!(first.pid(), second.pid());
    assert_eq!(second.status(), RunnerStatus::Running);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn a_new_revision_replaces_the_running_process() {
    let host = InMemoryRunnerHost::new();
    let supervisor = build(&host);

    let first = supervisor
        .ensure_running(RunnerKind::OnMount, "hook_v1()")
        .await
        .expect("spawn should succeed");
    let second = supervisor
        .ensure_running(RunnerKind::OnMount, "hook_v2()")
        .await
        .expect("respawn should succeed");

    assert_eq!(host.spawn_count(), 2);
    assert_ne!(first.pid(), second.pid());
    assert_ne!(first.revision(), second.revision());
    // Only the replacement process is still alive.
    assert_eq!(
        host.running_pids(),
        second.pid().map(|pid| vec![pid]).unwrap_or_default()
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn destroy_is_idempotent() {
    let host = InMemoryRunnerHost::new();
    let supervisor = build(&host);

    supervisor
        .ensure_running(RunnerKind::TableConfig, "config()")
        .await
        .expect("spawn should succeed");

    supervisor.destroy(RunnerKind::TableConfig).await;
    supervisor.destroy(RunnerKind::TableConfig).await;

    let snapshot = supervisor.snapshot(RunnerKind::TableConfig).await;
    assert_eq!(snapshot.status(), RunnerStatus::Stopped);
    assert_eq!(snapshot.pid(), None);
    assert!(host.running_pids().is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn spawn_failure_is_isolated_to_the_slot() {
    let host = InMemoryRunnerHost::new();
    host.fail_next_spawn("no such binary");
    let supervisor = build(&host);

    let error = supervisor
        .ensure_running(RunnerKind::Method, "run()")
        .await
        .expect_err("spawn should fail");
    assert_eq!(
        error,
        RunnerError::Spawn {
            kind: RunnerKind::Method,
            detail: "failed to spawn runner process: no such binary".to_owned(),
        }
    );

    // The supervisor stays usable: the same slot spawns fresh, and
    // other slots were never affected.
    let retried = supervisor
        .ensure_running(RunnerKind::Method, "run()")
        .await
        .expect("retry should succeed");
    assert_eq!(retried.status(), RunnerStatus::Running);

    let other = supervisor
        .ensure_running(RunnerKind::OnMount, "hook()")
        .await
        .expect("other slot should spawn");
    assert_eq!(other.status(), RunnerStatus::Running);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn an_out_of_band_exit_marks_the_slot_crashed() {
    let host = InMemoryRunnerHost::new();
    let supervisor = build(&host);

    let snapshot = supervisor
        .ensure_running(RunnerKind::OnMount, "hook()")
        .await
        .expect("spawn should succeed");
    let pid = snapshot.pid().expect("running slot should expose a pid");

    assert!(host.kill(pid));
    wait_for_status(&supervisor, RunnerKind::OnMount, RunnerStatus::Crashed).await;

    assert_eq!(
        supervisor.stats(RunnerKind::OnMount).await.stats(),
        None
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn a_crash_does_not_affect_other_slots_or_connections() {
    let host = InMemoryRunnerHost::new();
    let supervisor = build(&host);
    let sibling = build(&host);

    let crashing = supervisor
        .ensure_running(RunnerKind::OnMount, "hook()")
        .await
        .expect("spawn should succeed");
    supervisor
        .ensure_running(RunnerKind::TableConfig, "config()")
        .await
        .expect("spawn should succeed");
    sibling
        .ensure_running(RunnerKind::OnMount, "hook()")
        .await
        .expect("sibling spawn should succeed");

    host.kill(crashing.pid().expect("running slot should expose a pid"));
    wait_for_status(&supervisor, RunnerKind::OnMount, RunnerStatus::Crashed).await;

    assert!(supervisor.stats(RunnerKind::TableConfig).await.is_running());
    assert!(sibling.stats(RunnerKind::OnMount).await.is_running());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn ensure_running_after_a_crash_spawns_fresh() {
    let host = InMemoryRunnerHost::new();
    let supervisor = build(&host);

    let first = supervisor
        .ensure_running(RunnerKind::Method, "run()")
        .await
        .expect("spawn should succeed");
    host.kill(first.pid().expect("running slot should expose a pid"));
    wait_for_status(&supervisor, RunnerKind::Method, RunnerStatus::Crashed).await;

    let second = supervisor
        .ensure_running(RunnerKind::Method, "run()")
        .await
        .expect("respawn should succeed");

    assert_eq!(host.spawn_count(), 2);
    assert_eq!(second.status(), RunnerStatus::Running);
    assert_ne!(first.pid(), second.pid());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stats_report_usage_while_running_and_degrade_after_destroy() {
    let host = InMemoryRunnerHost::new();
    host.set_stats(RunnerStats {
        cpu_percent: 12.5,
        memory_bytes: 64 * 1024 * 1024,
    });
    let supervisor = build(&host);

    supervisor
        .ensure_running(RunnerKind::Method, "run()")
        .await
        .expect("spawn should succeed");

    let reading = supervisor.stats(RunnerKind::Method).await;
    let stats = reading.stats().expect("running slot should report stats");
    assert_eq!(stats.memory_bytes, 64 * 1024 * 1024);

    supervisor.destroy(RunnerKind::Method).await;
    assert!(!supervisor.stats(RunnerKind::Method).await.is_running());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn runners_receive_exactly_the_spawn_credentials() {
    let host = InMemoryRunnerHost::new();
    let supervisor = build(&host);

    supervisor
        .ensure_running(RunnerKind::OnMount, "hook()")
        .await
        .expect("spawn should succeed");

    let specs = host.specs();
    let spec = specs.first().expect("one spawn should be recorded");
    assert_eq!(spec.kind(), RunnerKind::OnMount);
    assert_eq!(spec.source(), "hook()");
    assert_eq!(
        spec.connection_uri(),
        "postgresql://svc@db.internal:5432/app?sslmode=prefer"
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn destroy_all_clears_every_slot() {
    let host = InMemoryRunnerHost::new();
    let supervisor = build(&host);

    for kind in RunnerKind::ALL {
        supervisor
            .ensure_running(kind, "code()")
            .await
            .expect("spawn should succeed");
    }
    assert_eq!(host.running_pids().len(), 3);

    supervisor.destroy_all().await;

    assert!(host.running_pids().is_empty());
    for kind in RunnerKind::ALL {
        assert_eq!(
            supervisor.snapshot(kind).await.status(),
            RunnerStatus::Stopped
        );
    }
}
