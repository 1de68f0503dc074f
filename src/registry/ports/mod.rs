//! Port contracts for the connection registry.

mod store;

pub use store::{ConnectionStore, StoreError};
