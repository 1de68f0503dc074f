//! Exponential backoff schedule with symmetric jitter.

use rand::Rng;
use std::time::Duration;

/// Backoff schedule for startup retry attempts.
///
/// The base delay is a pure function of the attempt number, so the
/// schedule is testable independently of any scheduler; jitter is the
/// only randomised component and stays within a bounded fraction of
/// the base delay.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    initial_delay: Duration,
    factor: f64,
    max_delay: Duration,
    jitter_fraction: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            factor: 2.0,
            max_delay: Duration::from_secs(30),
            jitter_fraction: 0.2,
        }
    }
}

impl BackoffPolicy {
    /// Creates a policy from its schedule parameters.
    ///
    /// The factor is clamped to at least `1.0` and the jitter fraction
    /// into `[0, 1]`.
    #[must_use]
    pub fn new(
        initial_delay: Duration,
        factor: f64,
        max_delay: Duration,
        jitter_fraction: f64,
    ) -> Self {
        Self {
            initial_delay,
            factor: factor.max(1.0),
            max_delay,
            jitter_fraction: jitter_fraction.clamp(0.0, 1.0),
        }
    }

    /// Returns the configured jitter fraction.
    #[must_use]
    pub const fn jitter_fraction(&self) -> f64 {
        self.jitter_fraction
    }

    /// Returns the pre-jitter delay before attempt `attempt + 1`.
    ///
    /// Attempts are numbered from 1; the delay equals
    /// `min(initial_delay * factor^(attempt - 1), max_delay)`.
    #[must_use]
    #[expect(
        clippy::float_arithmetic,
        reason = "the schedule is defined over a real-valued multiplier"
    )]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(64);
        let exponent_i32 = i32::try_from(exponent).unwrap_or(64);
        let scaled = self.initial_delay.as_secs_f64() * self.factor.powi(exponent_i32);
        let capped = scaled.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Returns the inclusive jitter envelope around attempt `attempt`.
    #[must_use]
    #[expect(
        clippy::float_arithmetic,
        reason = "the envelope scales the base delay by the jitter fraction"
    )]
    pub fn jitter_bounds(&self, attempt: u32) -> (Duration, Duration) {
        let base = self.base_delay(attempt);
        (
            base.mul_f64(1.0 - self.jitter_fraction),
            base.mul_f64(1.0 + self.jitter_fraction),
        )
    }

    /// Returns the jittered delay before the next attempt.
    ///
    /// The result never leaves the envelope reported by
    /// [`Self::jitter_bounds`].
    #[must_use]
    #[expect(
        clippy::float_arithmetic,
        reason = "symmetric jitter offsets the base delay by a bounded fraction"
    )]
    pub fn jittered_delay(&self, attempt: u32, rng: &mut impl Rng) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter_fraction <= 0.0 {
            return base;
        }
        let offset = rng.gen_range(-self.jitter_fraction..=self.jitter_fraction);
        base.mul_f64(1.0 + offset)
    }
}
