use thiserror::Error;

/// Session store errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// No live entry exists for the requested session id.
    #[error("Session not found: {0}")]
    NotFound(String),

    /// Persisted bytes do not describe a valid session.
    #[error("Failed to decode session {id}: {source}")]
    Decode {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    /// A value in the session bag has no byte encoding.
    #[error("Failed to encode session {id}: {reason}")]
    Encode { id: String, reason: String },

    #[error("Invalid session id: {0:?}")]
    InvalidId(String),

    #[error("Unknown session provider: {0}")]
    UnknownProvider(String),

    #[error("Session provider registered twice: {0}")]
    DuplicateRegistration(String),

    #[error("Session provider name must not be empty")]
    EmptyProviderName,

    #[error("Failed to generate session id: {0}")]
    IdGeneration(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    /// Internal bookkeeping failure, e.g. a poisoned lock.
    #[error("Storage Error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// True when the error reports an absent session id.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SessionError::NotFound(_))
    }

    /// Storage error for a poisoned lock.
    pub fn lock_poisoned(what: &str) -> Self {
        SessionError::Storage(format!("Failed to acquire {} lock", what))
    }
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;
