//! Adapter implementations of the probe driver port.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryProbeDriver;
pub use postgres::DieselProbeDriver;
