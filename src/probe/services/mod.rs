//! Probing service.

mod prober;

pub use prober::{ConnectionProber, DEFAULT_PROBE_TIMEOUT, AUTHORITATIVE_PROBE_TIMEOUT};
