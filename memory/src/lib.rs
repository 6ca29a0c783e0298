// The sessionkit-memory crate provides the in-memory session provider.
// Sessions live in a process-local map and vanish with the process; the file
// provider reuses it as its live-session index.

mod provider;

pub use provider::MemoryProvider;
