//! Port contracts for runner process hosting.

mod host;

pub use host::{RunnerExit, RunnerHandle, RunnerHostError, RunnerProcessHost, SpawnSpec};
