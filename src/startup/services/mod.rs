//! Startup supervision service.

mod supervisor;

pub use supervisor::{DEFAULT_MAX_ATTEMPTS, StartupSupervisor};
