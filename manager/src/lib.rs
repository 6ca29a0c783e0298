//! Cookie-bound session management
//!
//! This crate ties the session providers to HTTP: a [`Manager`] reads the
//! session cookie from a request, resolves it through a [`Provider`] and sets
//! a fresh cookie whenever it has to issue a new session. Sessions are
//! destroyed automatically once their lifetime elapses.
//!
//! [`Provider`]: sessionkit_core::Provider

pub mod cookie;
pub mod expiry;
pub mod id;
mod manager;
pub mod registry;

pub use cookie::{CookieSink, CookieSource, SessionCookie};
pub use expiry::ExpiryScheduler;
pub use id::{IdGenerator, RandomIdGenerator, UuidIdGenerator};
pub use manager::Manager;
pub use registry::{ProviderRegistry, FILE_PROVIDER, MEMORY_PROVIDER};

pub use sessionkit_core::{
    FileProviderConfig, ManagerOptions, Provider, ProviderRef, SameSite, Session, SessionConfig,
    SessionError, SessionResult, Value,
};
pub use sessionkit_file::FileProvider;
pub use sessionkit_memory::MemoryProvider;
