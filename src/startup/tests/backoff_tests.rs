//! Unit tests for the backoff schedule.

use crate::startup::domain::BackoffPolicy;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rstest::rstest;
use std::time::Duration;

fn policy() -> BackoffPolicy {
    BackoffPolicy::new(
        Duration::from_millis(1000),
        2.0,
        Duration::from_millis(30000),
        0.2,
    )
}

#[rstest]
#[case(1, 1000)]
#[case(2, 2000)]
#[case(3, 4000)]
#[case(4, 8000)]
#[case(5, 16000)]
#[case(6, 30000)]
#[case(7, 30000)]
#[case(20, 30000)]
fn base_delay_follows_the_documented_formula(#[case] attempt: u32, #[case] expected_ms: u64) {
    assert_eq!(
        policy().base_delay(attempt),
        Duration::from_millis(expected_ms)
    );
}

#[rstest]
fn base_delay_treats_attempt_zero_as_the_first() {
    assert_eq!(policy().base_delay(0), Duration::from_millis(1000));
}

#[rstest]
fn jittered_delay_stays_within_the_envelope() {
    let policy = policy();
    let mut rng = StdRng::seed_from_u64(7);

    for attempt in 1..=8 {
        let (lower, upper) = policy.jitter_bounds(attempt);
        for _ in 0..64 {
            let delay = policy.jittered_delay(attempt, &mut rng);
            assert!(delay >= lower, "attempt {attempt}: {delay:?} < {lower:?}");
            assert!(delay <= upper, "attempt {attempt}: {delay:?} > {upper:?}");
        }
    }
}

#[rstest]
fn zero_jitter_yields_the_base_delay_exactly() {
    let policy = BackoffPolicy::new(
        Duration::from_millis(500),
        2.0,
        Duration::from_millis(4000),
        0.0,
    );
    let mut rng = StdRng::seed_from_u64(7);

    assert_eq!(
        policy.jittered_delay(3, &mut rng),
        Duration::from_millis(2000)
    );
}

#[rstest]
fn factor_below_one_is_clamped_to_a_flat_schedule() {
    let policy = BackoffPolicy::new(
        Duration::from_millis(100),
        0.5,
        Duration::from_millis(1000),
        0.0,
    );

    assert_eq!(policy.base_delay(5), Duration::from_millis(100));
}
