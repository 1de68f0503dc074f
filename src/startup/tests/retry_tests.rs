//! Unit tests for the retry policy.

use crate::probe::domain::{ErrorClass, ProbeError};
use crate::startup::domain::RetryPolicy;
use rstest::rstest;

#[rstest]
#[case(ErrorClass::Configuration)]
#[case(ErrorClass::Authentication)]
#[case(ErrorClass::DatabaseMissing)]
#[case(ErrorClass::NotSuperuser)]
#[case(ErrorClass::DuplicateAttempt)]
#[case(ErrorClass::Internal)]
fn fatal_classes_never_retry(#[case] class: ErrorClass) {
    let policy = RetryPolicy::default();
    assert!(!policy.is_retryable(&ProbeError::new(class, "failure")));
}

#[rstest]
fn transient_failures_retry_by_default() {
    let policy = RetryPolicy::default();
    let error = ProbeError::new(ErrorClass::TransientConnectivity, "connection refused");
    assert!(policy.is_retryable(&error));
}

#[rstest]
#[case("3D000")]
#[case("28P01")]
fn default_fatal_codes_stop_retries(#[case] code: &str) {
    let policy = RetryPolicy::default();
    let error =
        ProbeError::new(ErrorClass::TransientConnectivity, "rejected").with_code(code);
    assert!(!policy.is_retryable(&error));
}

#[rstest]
fn unknown_codes_stay_retryable() {
    let policy = RetryPolicy::default();
    let error =
        ProbeError::new(ErrorClass::TransientConnectivity, "shutting down").with_code("57P03");
    assert!(policy.is_retryable(&error));
}

#[rstest]
fn the_fatal_boundary_is_configurable() {
    let policy = RetryPolicy::new().with_fatal_code("57P03");
    let error =
        ProbeError::new(ErrorClass::TransientConnectivity, "shutting down").with_code("57P03");
    assert!(!policy.is_retryable(&error));
}
