//! Isolated script-runner supervision for Brunel.
//!
//! Each managed target connection owns a small set of named runner
//! slots — method execution, post-connect hooks, schema configuration
//! — each backed by an isolated OS process executing untrusted
//! user-authored scripts. This module guarantees at most one live
//! process per slot, serializes same-slot operations, detects crashes
//! without auto-restarting, and keeps a bounded log ring per slot. The
//! module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - The supervising service in [`services`]
//! - Wire messages shared with the runner binary in [`ipc`]

pub mod adapters;
pub mod domain;
pub mod ipc;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
