//! Startup state machine values.

use crate::probe::domain::ProbeError;
use crate::startup::ports::DbSession;
use std::fmt;
use std::sync::Arc;

/// State of the primary-connection startup lifecycle.
///
/// `Loading` is the initial state; `Ok` and `Error` are terminal and
/// broadcast exactly once per start cycle. The supervisor owns the
/// only mutable copy — observers receive clones.
#[derive(Clone)]
pub enum StartupState {
    /// A start cycle is still in progress (or none has begun).
    Loading,
    /// The primary connection is up; carries the live session.
    Ok(Arc<dyn DbSession>),
    /// The start cycle failed terminally.
    Error(ProbeError),
}

impl StartupState {
    /// Returns the canonical status label.
    #[must_use]
    pub const fn status(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Ok(_) => "ok",
            Self::Error(_) => "error",
        }
    }

    /// Returns whether this state ends a start cycle.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Loading)
    }

    /// Returns the live session for an `Ok` state.
    #[must_use]
    pub fn session(&self) -> Option<Arc<dyn DbSession>> {
        match self {
            Self::Ok(session) => Some(Arc::clone(session)),
            _ => None,
        }
    }

    /// Returns the failure for an `Error` state.
    #[must_use]
    pub const fn error(&self) -> Option<&ProbeError> {
        match self {
            Self::Error(error) => Some(error),
            _ => None,
        }
    }
}

impl fmt::Debug for StartupState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => formatter.write_str("Loading"),
            Self::Ok(_) => formatter.write_str("Ok(..)"),
            Self::Error(error) => formatter.debug_tuple("Error").field(error).finish(),
        }
    }
}
