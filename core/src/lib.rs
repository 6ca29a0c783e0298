// This crate contains the storage-independent parts of the session store:
// - The Session handle and its value bag
// - The byte encoding used by durable backends
// - The Provider contract implemented by every backend
// - Configuration loading
// - Shared error types

// Export session module - Session handle, expiry, encoding
pub mod session;
pub use session::Session;

// Export value module - Values stored in a session bag
pub mod value;
pub use value::{Opaque, Value};

// Export provider module - Storage backend contract
pub mod provider;
pub use provider::{Provider, ProviderRef};

// Export config module - Configuration loading
pub mod config;
pub use config::{FileProviderConfig, ManagerOptions, SameSite, SessionConfig};

// Export errors module - Shared error types
pub mod errors;
pub use errors::{SessionError, SessionResult};
