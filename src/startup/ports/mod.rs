//! Port contracts for live database sessions.

mod session;

pub use session::{DbSession, SessionError, SessionFactory};
