use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use sessionkit_core::{Provider, Session, SessionError, SessionResult};
use tracing::debug;

/// In-memory implementation of Provider
#[derive(Debug, Default)]
pub struct MemoryProvider {
    /// Thread-safe storage of sessions
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl MemoryProvider {
    /// Create a new MemoryProvider
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Provider for MemoryProvider {
    fn init(&self, session: &Session) -> SessionResult<()> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| SessionError::lock_poisoned("write"))?;

        sessions.insert(session.id().to_string(), session.clone());
        debug!("Initialized session: {}", session.id());

        Ok(())
    }

    fn read(&self, id: &str) -> SessionResult<Session> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| SessionError::lock_poisoned("read"))?;

        sessions
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    fn destroy(&self, id: &str) -> SessionResult<()> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| SessionError::lock_poisoned("write"))?;

        if sessions.remove(id).is_none() {
            return Err(SessionError::NotFound(id.to_string()));
        }

        debug!("Destroyed session: {}", id);
        Ok(())
    }

    /// Values already live in process memory; there is nothing to flush.
    fn commit(&self, _id: &str) -> SessionResult<()> {
        Ok(())
    }
}
