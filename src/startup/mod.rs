//! Primary-connection startup supervision for Brunel.
//!
//! The startup supervisor owns the lifecycle of the single primary
//! ("state") connection: a `loading → ok | error` state machine driven
//! by the connection prober, with bounded retries, exponential backoff
//! plus jitter, fatal-versus-transient classification, deduplication of
//! concurrent identical start requests, and single-shot listener
//! notification. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - The supervising service in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
