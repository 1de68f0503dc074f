//! Port contracts for connection probing.

mod driver;

pub use driver::{ProbeCheck, ProbeDriver, ProbeDriverError, ProbeSession};
