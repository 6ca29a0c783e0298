// The sessionkit-file crate provides a session provider that keeps one file
// per session inside a single directory.

mod provider;

pub use provider::FileProvider;
