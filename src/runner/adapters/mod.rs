//! Adapter implementations of the runner process host port.

pub mod memory;
pub mod process;

pub use memory::InMemoryRunnerHost;
pub use process::OsProcessRunnerHost;
