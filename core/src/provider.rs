use std::fmt::Debug;
use std::sync::Arc;

use crate::errors::SessionResult;
use crate::session::Session;

/// Storage backend for sessions.
///
/// Every operation is keyed by session id. Absent ids are reported as
/// [`SessionError::NotFound`](crate::SessionError::NotFound) rather than
/// ignored so callers can tell "already gone" from "removed".
pub trait Provider: Send + Sync + Debug {
    /// Register `session` as live, replacing any prior entry with the same id.
    fn init(&self, session: &Session) -> SessionResult<()>;

    /// Fetch the live session for `id`.
    fn read(&self, id: &str) -> SessionResult<Session>;

    /// Remove the session for `id`.
    fn destroy(&self, id: &str) -> SessionResult<()>;

    /// Flush buffered mutations of the session for `id` to durable storage.
    fn commit(&self, id: &str) -> SessionResult<()>;

    /// Remove every expired session, returning how many were removed.
    ///
    /// Backends without a sweep report zero.
    fn cleanup(&self) -> SessionResult<usize> {
        Ok(0)
    }
}

/// Type alias for Arc-wrapped Provider trait objects
pub type ProviderRef = Arc<dyn Provider>;
