//! Runner supervision service.

mod supervisor;

pub use supervisor::{DEFAULT_STOP_GRACE, ScriptRunnerSupervisor};
