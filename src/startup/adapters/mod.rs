//! Adapter implementations of the session ports.

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryDbSession, InMemorySessionFactory};
pub use postgres::{PooledSessionFactory, SessionPgPool};
