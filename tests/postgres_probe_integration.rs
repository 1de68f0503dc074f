//! Live-database probe tests, gated on `BRUNEL_TEST_DATABASE_URL`.
//!
//! These exercise the Diesel probe driver against a real `PostgreSQL`
//! instance. They skip silently when the environment variable is
//! unset, so the default test run stays hermetic.

#![expect(
    clippy::expect_used,
    reason = "test code uses expect for assertion clarity"
)]

use brunel::connection::domain::ConnectionDescriptor;
use brunel::connection::validation::validate;
use brunel::probe::adapters::DieselProbeDriver;
use brunel::probe::services::{AUTHORITATIVE_PROBE_TIMEOUT, ConnectionProber};
use brunel::startup::adapters::postgres::PooledSessionFactory;
use brunel::startup::ports::SessionFactory;
use std::sync::Arc;

const URL_ENV: &str = "BRUNEL_TEST_DATABASE_URL";

fn live_descriptor() -> Option<ConnectionDescriptor> {
    std::env::var(URL_ENV)
        .ok()
        .map(ConnectionDescriptor::from_uri)
}

#[tokio::test(flavor = "multi_thread")]
async fn probes_a_live_database() {
    let Some(descriptor) = live_descriptor() else {
        return;
    };
    let validated = validate(&descriptor).expect("live URL should validate");

    let prober = ConnectionProber::new(Arc::new(DieselProbeDriver::new()))
        .with_timeout(AUTHORITATIVE_PROBE_TIMEOUT);
    let report = prober
        .probe(&validated, false, None)
        .await
        .expect("probe should reach the live database");

    // Discovery is best-effort; reaching this point at all proves the
    // session opened and closed cleanly.
    assert!(!report.ssl_fallback_used() || validated.ssl_mode().as_str() == "prefer");
}

#[tokio::test(flavor = "multi_thread")]
async fn opens_and_reloads_a_pooled_session() {
    let Some(descriptor) = live_descriptor() else {
        return;
    };
    let validated = validate(&descriptor).expect("live URL should validate");

    let factory = PooledSessionFactory::new();
    let session = factory
        .open(&validated)
        .await
        .expect("session should open");
    session
        .reload_schema()
        .await
        .expect("schema reload should succeed");
    session.close().await;
}
