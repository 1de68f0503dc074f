//! Unit tests for [`ConnectionProber`] against the in-memory driver.

use crate::connection::domain::{
    ConnectionDescriptor, DescriptorKind, SslMode, ValidatedConnectionDescriptor,
};
use crate::connection::validation::validate;
use crate::probe::adapters::InMemoryProbeDriver;
use crate::probe::domain::ErrorClass;
use crate::probe::ports::{ProbeCheck, ProbeDriverError, ProbeSession};
use crate::probe::services::ConnectionProber;
use async_trait::async_trait;
use rstest::{fixture, rstest};
use std::sync::Arc;
use std::time::Duration;

fn prober(driver: &InMemoryProbeDriver) -> ConnectionProber<InMemoryProbeDriver> {
    ConnectionProber::new(Arc::new(driver.clone())).with_docker_hints(false)
}

#[fixture]
fn descriptor() -> ValidatedConnectionDescriptor {
    validate(
        &ConnectionDescriptor::with_kind(DescriptorKind::Standard)
            .with_host("db.internal")
            .with_user("svc")
            .with_password("x")
            .with_database_name("app"),
    )
    .expect("descriptor should validate")
}

struct CreateRoleCheck;

#[async_trait]
impl ProbeCheck for CreateRoleCheck {
    async fn run(&self, session: &mut dyn ProbeSession) -> Result<(), ProbeDriverError> {
        session.execute("CREATE ROLE app_user LOGIN").await
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn successful_probe_reports_discovered_capabilities(
    descriptor: ValidatedConnectionDescriptor,
) {
    let driver = InMemoryProbeDriver::new();
    driver.set_schema_version(Some("1.2.0".to_owned()));

    let report = prober(&driver)
        .probe(&descriptor, false, None)
        .await
        .expect("probe should succeed");

    assert_eq!(report.schema_version(), Some("1.2.0"));
    assert_eq!(report.can_create_db(), Some(true));
    assert!(!report.ssl_fallback_used());
    assert_eq!(driver.connect_count(), 1);
    assert_eq!(driver.open_sessions(), 0);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn ssl_rejection_with_prefer_falls_back_to_disable(
    descriptor: ValidatedConnectionDescriptor,
) {
    let driver = InMemoryProbeDriver::new();
    driver.reject_ssl(true);

    let report = prober(&driver)
        .probe(&descriptor, false, None)
        .await
        .expect("fallback probe should succeed");

    assert!(report.ssl_fallback_used());
    assert_eq!(report.descriptor().ssl_mode(), SslMode::Disable);

    let attempts = driver.attempts();
    assert_eq!(attempts.len(), 2);
    assert_eq!(
        attempts.first().map(|attempt| attempt.ssl_mode),
        Some(SslMode::Prefer)
    );
    assert_eq!(
        attempts.get(1).map(|attempt| attempt.ssl_mode),
        Some(SslMode::Disable)
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn ssl_fallback_is_not_sticky_across_probes(descriptor: ValidatedConnectionDescriptor) {
    let driver = InMemoryProbeDriver::new();
    driver.reject_ssl(true);
    let service = prober(&driver);

    let first = service
        .probe(&descriptor, false, None)
        .await
        .expect("first probe should succeed");
    let second = service
        .probe(&descriptor, false, None)
        .await
        .expect("second probe should succeed");

    assert!(first.ssl_fallback_used());
    assert!(second.ssl_fallback_used());
    // Both probes walked the same prefer-then-disable path.
    assert_eq!(driver.connect_count(), 4);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn ssl_rejection_without_prefer_fails_without_retry() {
    let driver = InMemoryProbeDriver::new();
    driver.reject_ssl(true);
    let descriptor = validate(
        &ConnectionDescriptor::with_kind(DescriptorKind::Standard)
            .with_ssl_mode(SslMode::Require),
    )
    .expect("descriptor should validate");

    let error = prober(&driver)
        .probe(&descriptor, false, None)
        .await
        .expect_err("probe should fail");

    assert_eq!(error.class(), ErrorClass::TransientConnectivity);
    assert_eq!(driver.connect_count(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn non_superuser_role_fails_the_superuser_probe(
    descriptor: ValidatedConnectionDescriptor,
) {
    let driver = InMemoryProbeDriver::new();
    driver.set_superuser(false);

    let error = prober(&driver)
        .probe(&descriptor, true, None)
        .await
        .expect_err("probe should fail");

    assert_eq!(error.class(), ErrorClass::NotSuperuser);
    // The network connection itself succeeded and was released.
    assert_eq!(driver.connect_count(), 1);
    assert_eq!(driver.open_sessions(), 0);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn setup_check_runs_while_connected(descriptor: ValidatedConnectionDescriptor) {
    let driver = InMemoryProbeDriver::new();

    prober(&driver)
        .probe(&descriptor, false, Some(&CreateRoleCheck))
        .await
        .expect("probe should succeed");

    assert_eq!(
        driver.executed_statements(),
        vec!["CREATE ROLE app_user LOGIN".to_owned()]
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failing_setup_check_fails_the_probe_and_closes_the_session(
    descriptor: ValidatedConnectionDescriptor,
) {
    let driver = InMemoryProbeDriver::new();
    driver.fail_execute(Some(ProbeDriverError::Server {
        code: None,
        message: "permission denied".to_owned(),
    }));

    let error = prober(&driver)
        .probe(&descriptor, false, Some(&CreateRoleCheck))
        .await
        .expect_err("probe should fail");

    assert_eq!(error.class(), ErrorClass::TransientConnectivity);
    assert_eq!(driver.open_sessions(), 0);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn discovery_failures_degrade_to_unknown(descriptor: ValidatedConnectionDescriptor) {
    let driver = InMemoryProbeDriver::new();
    driver.set_schema_version(Some("1.2.0".to_owned()));
    driver.fail_schema_version(true);
    driver.fail_can_create_db(true);

    let report = prober(&driver)
        .probe(&descriptor, false, None)
        .await
        .expect("probe should succeed despite discovery failures");

    assert_eq!(report.schema_version(), None);
    assert_eq!(report.can_create_db(), None);
}

#[rstest]
#[case::authentication("28P01", ErrorClass::Authentication)]
#[case::database_missing("3D000", ErrorClass::DatabaseMissing)]
#[tokio::test(flavor = "multi_thread")]
async fn fatal_sqlstates_classify_as_non_transient(
    descriptor: ValidatedConnectionDescriptor,
    #[case] code: &str,
    #[case] expected: ErrorClass,
) {
    let driver = InMemoryProbeDriver::new();
    driver.fail_next_connect(ProbeDriverError::Server {
        code: Some(code.to_owned()),
        message: "rejected".to_owned(),
    });

    let error = prober(&driver)
        .probe(&descriptor, false, None)
        .await
        .expect_err("probe should fail");

    assert_eq!(error.class(), expected);
    assert_eq!(error.code(), Some(code));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn timeouts_classify_as_transient(descriptor: ValidatedConnectionDescriptor) {
    let driver = InMemoryProbeDriver::new();
    driver.fail_next_connect(ProbeDriverError::Timeout(Duration::from_secs(1)));

    let error = prober(&driver)
        .probe(&descriptor, false, None)
        .await
        .expect_err("probe should fail");

    assert_eq!(error.class(), ErrorClass::TransientConnectivity);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn error_detail_redacts_the_password(descriptor: ValidatedConnectionDescriptor) {
    let driver = InMemoryProbeDriver::new();
    driver.fail_next_connect(ProbeDriverError::Io("connection refused".to_owned()));

    let error = prober(&driver)
        .probe(&descriptor, false, None)
        .await
        .expect_err("probe should fail");

    assert!(!error.detail().contains("x@"));
    assert!(error.detail().contains("***"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn docker_hint_attaches_to_local_connectivity_failures() {
    let driver = InMemoryProbeDriver::new();
    driver.fail_next_connect(ProbeDriverError::Io("connection refused".to_owned()));
    let descriptor = validate(&ConnectionDescriptor::with_kind(DescriptorKind::Standard))
        .expect("descriptor should validate");

    let error = ConnectionProber::new(Arc::new(driver))
        .with_docker_hints(true)
        .probe(&descriptor, false, None)
        .await
        .expect_err("probe should fail");

    assert!(error.hint().is_some_and(|hint| hint.contains("extra_hosts")));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn docker_hint_is_omitted_for_remote_hosts(descriptor: ValidatedConnectionDescriptor) {
    let driver = InMemoryProbeDriver::new();
    driver.fail_next_connect(ProbeDriverError::Io("connection refused".to_owned()));

    let error = ConnectionProber::new(Arc::new(driver))
        .with_docker_hints(true)
        .probe(&descriptor, false, None)
        .await
        .expect_err("probe should fail");

    assert_eq!(error.hint(), None);
}
