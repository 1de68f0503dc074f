//! In-memory session factory for deterministic tests.

use crate::connection::domain::ValidatedConnectionDescriptor;
use crate::startup::ports::{DbSession, SessionError, SessionFactory};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory session factory.
///
/// Opens [`InMemoryDbSession`] values and records every open so tests
/// can assert on session lifecycles and teardown ordering.
#[derive(Debug, Default)]
pub struct InMemorySessionFactory {
    open_failure: Mutex<Option<SessionError>>,
    sessions: Mutex<Vec<Arc<InMemoryDbSession>>>,
}

impl InMemorySessionFactory {
    /// Creates a factory whose opens succeed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent open fail with the given error.
    pub fn fail_opens(&self, error: Option<SessionError>) {
        if let Ok(mut failure) = self.open_failure.lock() {
            *failure = error;
        }
    }

    /// Returns every session opened so far.
    #[must_use]
    pub fn sessions(&self) -> Vec<Arc<InMemoryDbSession>> {
        self.sessions
            .lock()
            .map(|sessions| sessions.clone())
            .unwrap_or_default()
    }

    /// Returns the number of sessions opened so far.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.sessions.lock().map(|sessions| sessions.len()).unwrap_or(0)
    }
}

#[async_trait]
impl SessionFactory for InMemorySessionFactory {
    async fn open(
        &self,
        descriptor: &ValidatedConnectionDescriptor,
    ) -> Result<Arc<dyn DbSession>, SessionError> {
        if let Ok(failure) = self.open_failure.lock()
            && let Some(error) = failure.clone()
        {
            return Err(error);
        }

        let session = Arc::new(InMemoryDbSession::new(descriptor.clone()));
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.push(Arc::clone(&session));
        }
        Ok(session)
    }
}

/// In-memory live session with observable lifecycle counters.
#[derive(Debug)]
pub struct InMemoryDbSession {
    descriptor: ValidatedConnectionDescriptor,
    closed: AtomicBool,
    reloads: AtomicUsize,
}

impl InMemoryDbSession {
    fn new(descriptor: ValidatedConnectionDescriptor) -> Self {
        Self {
            descriptor,
            closed: AtomicBool::new(false),
            reloads: AtomicUsize::new(0),
        }
    }

    /// Returns the descriptor this session was opened with.
    #[must_use]
    pub const fn descriptor(&self) -> &ValidatedConnectionDescriptor {
        &self.descriptor
    }

    /// Returns whether the session has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Returns how many schema reloads have been requested.
    #[must_use]
    pub fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DbSession for InMemoryDbSession {
    async fn reload_schema(&self) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Operation("session is closed".to_owned()));
        }
        self.reloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
