use std::collections::HashMap;
use std::sync::Arc;

use sessionkit_core::{FileProviderConfig, ProviderRef, SessionError, SessionResult};
use sessionkit_file::FileProvider;
use sessionkit_memory::MemoryProvider;
use tracing::debug;

/// Name of the in-memory provider registered by [`ProviderRegistry::with_builtin`]
pub const MEMORY_PROVIDER: &str = "memory";
/// Name of the file provider registered by [`ProviderRegistry::with_builtin`]
pub const FILE_PROVIDER: &str = "file";

/// Name → provider lookup consulted when building a Manager.
///
/// Each name can be registered once.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, ProviderRef>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding a `"memory"` provider and a `"file"` provider rooted
    /// at `file.dir`
    pub fn with_builtin(file: &FileProviderConfig) -> Self {
        let mut registry = Self::new();
        registry.must_register(MEMORY_PROVIDER, Arc::new(MemoryProvider::new()));
        registry.must_register(FILE_PROVIDER, Arc::new(FileProvider::from_config(file)));
        registry
    }

    /// Register `provider` under `name`.
    ///
    /// Fails if the name is empty or already taken.
    pub fn register(&mut self, name: impl Into<String>, provider: ProviderRef) -> SessionResult<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(SessionError::EmptyProviderName);
        }
        if self.providers.contains_key(&name) {
            return Err(SessionError::DuplicateRegistration(name));
        }

        debug!("Registered session provider: {}", name);
        self.providers.insert(name, provider);
        Ok(())
    }

    /// Like [`register`](Self::register), for startup code where a bad
    /// registration is a programming error.
    ///
    /// # Panics
    /// If registration fails.
    pub fn must_register(&mut self, name: impl Into<String>, provider: ProviderRef) {
        if let Err(e) = self.register(name, provider) {
            panic!("{}", e);
        }
    }

    pub fn get(&self, name: &str) -> Option<ProviderRef> {
        self.providers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register() {
        let mut registry = ProviderRegistry::new();
        registry
            .register("memory", Arc::new(MemoryProvider::new()))
            .unwrap();
        assert!(registry.contains("memory"));
        assert!(registry.get("memory").is_some());
        assert!(registry.get("invalid").is_none());

        // must register each name only once
        assert!(matches!(
            registry.register("memory", Arc::new(MemoryProvider::new())),
            Err(SessionError::DuplicateRegistration(_))
        ));
        assert!(matches!(
            registry.register("", Arc::new(MemoryProvider::new())),
            Err(SessionError::EmptyProviderName)
        ));
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn test_must_register_panics_on_duplicate() {
        let mut registry = ProviderRegistry::new();
        registry.must_register("memory", Arc::new(MemoryProvider::new()));
        registry.must_register("memory", Arc::new(MemoryProvider::new()));
    }

    #[test]
    fn test_builtin_providers() {
        let registry = ProviderRegistry::with_builtin(&FileProviderConfig::default());
        assert_eq!(registry.names(), vec!["file".to_string(), "memory".to_string()]);
    }
}
