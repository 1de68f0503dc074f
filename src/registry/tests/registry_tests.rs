//! Unit tests for the connection registry against in-memory adapters.

use crate::connection::domain::{ConnectionDescriptor, ConnectionId, DescriptorKind};
use crate::probe::adapters::InMemoryProbeDriver;
use crate::probe::ports::ProbeDriverError;
use crate::probe::services::ConnectionProber;
use crate::registry::adapters::InMemoryConnectionStore;
use crate::registry::domain::{ConnectionRecord, RegistryError, StoragePaths};
use crate::registry::ports::{ConnectionStore, StoreError};
use crate::registry::services::ConnectionRegistry;
use crate::runner::adapters::InMemoryRunnerHost;
use crate::runner::domain::RunnerStatus;
use crate::startup::adapters::memory::InMemorySessionFactory;
use camino::Utf8PathBuf;
use mockable::DefaultClock;
use rstest::rstest;
use std::sync::Arc;

type TestRegistry = ConnectionRegistry<
    InMemoryConnectionStore,
    InMemoryProbeDriver,
    InMemorySessionFactory,
    InMemoryRunnerHost,
    DefaultClock,
>;

struct World {
    store: InMemoryConnectionStore,
    driver: InMemoryProbeDriver,
    sessions: Arc<InMemorySessionFactory>,
    host: InMemoryRunnerHost,
    registry: TestRegistry,
}

fn temp_root() -> Utf8PathBuf {
    let root = std::env::temp_dir().join(format!("brunel_registry_{}", uuid::Uuid::new_v4()));
    Utf8PathBuf::from_path_buf(root).expect("temp dir should be UTF-8")
}

fn build_world() -> World {
    let store = InMemoryConnectionStore::new();
    let driver = InMemoryProbeDriver::new();
    let sessions = Arc::new(InMemorySessionFactory::new());
    let host = InMemoryRunnerHost::new();
    let registry = ConnectionRegistry::new(
        Arc::new(store.clone()),
        ConnectionProber::new(Arc::new(driver.clone())).with_docker_hints(false),
        Arc::clone(&sessions),
        Arc::new(host.clone()),
        Arc::new(DefaultClock),
        StoragePaths::new(temp_root()),
    );
    World {
        store,
        driver,
        sessions,
        host,
        registry,
    }
}

fn record_with_scripts(id: ConnectionId) -> ConnectionRecord {
    ConnectionRecord::new(
        id,
        "analytics",
        ConnectionDescriptor::with_kind(DescriptorKind::Standard)
            .with_host("db.internal")
            .with_user("svc")
            .with_password("x")
            .with_database_name("app"),
    )
    .with_on_mount_source("hook()")
    .with_table_config_source("config()")
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn start_connection_probes_opens_a_session_and_spawns_scripts() {
    let world = build_world();
    let id = ConnectionId::new();
    world.store.upsert(record_with_scripts(id));

    let path = world
        .registry
        .start_connection(id)
        .await
        .expect("start should succeed");

    assert_eq!(path, format!("/api/db/{id}-dashboard/s"));
    assert_eq!(world.driver.connect_count(), 1);
    assert_eq!(world.sessions.open_count(), 1);
    // On-mount and table-config runners come up with the connection.
    assert_eq!(world.host.spawn_count(), 2);
    assert!(world.registry.is_connected(id));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn starting_an_unknown_connection_fails() {
    let world = build_world();
    let id = ConnectionId::new();

    let error = world
        .registry
        .start_connection(id)
        .await
        .expect_err("start should fail");

    assert_eq!(error, RegistryError::ConnectionNotFound(id));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn starting_twice_reuses_the_existing_entry() {
    let world = build_world();
    let id = ConnectionId::new();
    world.store.upsert(record_with_scripts(id));

    let first = world
        .registry
        .start_connection(id)
        .await
        .expect("first start should succeed");
    let second = world
        .registry
        .start_connection(id)
        .await
        .expect("second start should succeed");

    assert_eq!(first, second);
    assert_eq!(world.driver.connect_count(), 1);
    assert_eq!(world.sessions.open_count(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn a_failed_start_is_re_raised_until_disconnected() {
    let world = build_world();
    let id = ConnectionId::new();
    world.store.upsert(record_with_scripts(id));
    world
        .driver
        .fail_next_connect(ProbeDriverError::Io("connection refused".to_owned()));

    let first = world
        .registry
        .start_connection(id)
        .await
        .expect_err("first start should fail");
    let second = world
        .registry
        .start_connection(id)
        .await
        .expect_err("second start should re-raise");

    assert_eq!(first, second);
    // The stored failure answers without a fresh probe.
    assert_eq!(world.driver.connect_count(), 1);

    world
        .registry
        .disconnect(id)
        .await
        .expect("disconnect should succeed");
    world
        .registry
        .start_connection(id)
        .await
        .expect("start should succeed after the failure is cleared");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn disconnect_releases_runners_session_and_entry() {
    let world = build_world();
    let id = ConnectionId::new();
    world.store.upsert(record_with_scripts(id));
    world
        .registry
        .start_connection(id)
        .await
        .expect("start should succeed");

    let existed = world
        .registry
        .disconnect(id)
        .await
        .expect("disconnect should succeed");

    assert!(existed);
    assert!(world.host.running_pids().is_empty());
    let session = world
        .sessions
        .sessions()
        .into_iter()
        .next()
        .expect("a session should have been opened");
    assert!(session.is_closed());
    assert!(!world.registry.is_connected(id));

    let again = world
        .registry
        .disconnect(id)
        .await
        .expect("second disconnect should succeed");
    assert!(!again);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reload_schema_reaches_the_live_session() {
    let world = build_world();
    let id = ConnectionId::new();
    world.store.upsert(record_with_scripts(id));
    world
        .registry
        .start_connection(id)
        .await
        .expect("start should succeed");

    world
        .registry
        .reload_schema(id)
        .await
        .expect("reload should succeed");

    let session = world
        .sessions
        .sessions()
        .into_iter()
        .next()
        .expect("a session should have been opened");
    assert_eq!(session.reload_count(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn operations_on_unstarted_connections_report_not_connected() {
    let world = build_world();
    let id = ConnectionId::new();

    assert_eq!(
        world.registry.reload_schema(id).await,
        Err(RegistryError::NotConnected(id))
    );
    assert_eq!(
        world.registry.runner_stats(id).await.err(),
        Some(RegistryError::NotConnected(id))
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn set_on_mount_script_resolves_to_ensure_running() {
    let world = build_world();
    let id = ConnectionId::new();
    world.store.upsert(ConnectionRecord::new(
        id,
        "bare",
        ConnectionDescriptor::with_kind(DescriptorKind::Standard).with_host("db.internal"),
    ));
    world
        .registry
        .start_connection(id)
        .await
        .expect("start should succeed");
    assert_eq!(world.host.spawn_count(), 0);

    world
        .registry
        .set_on_mount_script(id, Some("hook()"), false)
        .await
        .expect("script install should succeed");
    world
        .registry
        .set_on_mount_script(id, Some("hook()"), false)
        .await
        .expect("unchanged script should be a no-op");

    assert_eq!(world.host.spawn_count(), 1);

    world
        .registry
        .set_on_mount_script(id, Some("hook()"), true)
        .await
        .expect("disabling should succeed");
    assert!(world.host.running_pids().is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn method_runner_is_spawned_lazily_and_once() {
    let world = build_world();
    let id = ConnectionId::new();
    world.store.upsert(ConnectionRecord::new(
        id,
        "bare",
        ConnectionDescriptor::with_kind(DescriptorKind::Standard).with_host("db.internal"),
    ));
    world
        .registry
        .start_connection(id)
        .await
        .expect("start should succeed");
    assert_eq!(world.host.spawn_count(), 0);

    let first = world
        .registry
        .ensure_method_runner(id)
        .await
        .expect("method runner should spawn");
    let second = world
        .registry
        .ensure_method_runner(id)
        .await
        .expect("method runner should be reused");

    assert_eq!(world.host.spawn_count(), 1);
    assert_eq!(first.pid(), second.pid());
    assert_eq!(second.status(), RunnerStatus::Running);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn runner_stats_cover_all_three_slots() {
    let world = build_world();
    let id = ConnectionId::new();
    world.store.upsert(record_with_scripts(id));
    world
        .registry
        .start_connection(id)
        .await
        .expect("start should succeed");

    let stats = world
        .registry
        .runner_stats(id)
        .await
        .expect("stats should succeed");

    assert!(!stats.method.is_running());
    assert!(stats.on_mount.is_running());
    assert!(stats.table_config.is_running());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn a_failing_startup_script_disables_only_its_slot() {
    let world = build_world();
    let id = ConnectionId::new();
    world.store.upsert(record_with_scripts(id));
    // The table-config slot spawns first and consumes the failure.
    world.host.fail_next_spawn("broken runner image");

    world
        .registry
        .start_connection(id)
        .await
        .expect("start should still succeed");

    let stats = world
        .registry
        .runner_stats(id)
        .await
        .expect("stats should succeed");
    assert!(!stats.table_config.is_running());
    assert!(stats.on_mount.is_running());
}

mockall::mock! {
    ConnStore {}

    #[async_trait::async_trait]
    impl ConnectionStore for ConnStore {
        async fn find(&self, id: ConnectionId) -> Result<Option<ConnectionRecord>, StoreError>;
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn store_failures_surface_as_store_errors() {
    let mut store = MockConnStore::new();
    store
        .expect_find()
        .returning(|_| Err(StoreError("backend offline".to_owned())));

    let registry = ConnectionRegistry::new(
        Arc::new(store),
        ConnectionProber::new(Arc::new(InMemoryProbeDriver::new())).with_docker_hints(false),
        Arc::new(InMemorySessionFactory::new()),
        Arc::new(InMemoryRunnerHost::new()),
        Arc::new(DefaultClock),
        StoragePaths::new(temp_root()),
    );

    let error = registry
        .start_connection(ConnectionId::new())
        .await
        .expect_err("start should fail");

    assert!(matches!(error, RegistryError::Store(_)));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn test_connection_probes_without_registering() {
    let world = build_world();
    let descriptor = ConnectionDescriptor::with_kind(DescriptorKind::Standard)
        .with_host("db.internal")
        .with_user("svc");

    world
        .registry
        .test_connection(&descriptor, false, None)
        .await
        .expect("probe should succeed");

    assert_eq!(world.driver.connect_count(), 1);
    assert!(world.registry.connection_ids().is_empty());
    assert_eq!(world.sessions.open_count(), 0);
}
