//! Live target-connection ownership for Brunel.
//!
//! The connection registry is the in-memory map from connection
//! identity to its live resources: the database session handle, the
//! connection's script-runner supervisor, and its derived storage
//! paths. It enforces at most one live entry per identity and tears a
//! connection down in the safe order (runners first, session last).
//! The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - The registry service and certificate store in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
