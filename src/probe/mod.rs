//! Bounded connection probing for Brunel.
//!
//! A probe is a single, timeout-bounded attempt to establish and
//! validate a database connection: open, optionally assert superuser,
//! run a caller-supplied setup check, opportunistically discover
//! ancillary facts, and always close the handle before returning. The
//! module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - The probing service in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
