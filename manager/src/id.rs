use std::fmt::Debug;

use rand::rngs::OsRng;
use rand::RngCore;
use sessionkit_core::{SessionError, SessionResult};
use uuid::Uuid;

/// Source of fresh session ids.
///
/// Ids are capability tokens; implementations must not be guessable.
pub trait IdGenerator: Send + Sync + Debug {
    fn generate(&self) -> SessionResult<String>;
}

/// Hex-encoded bytes from the operating system's CSPRNG
#[derive(Debug, Clone)]
pub struct RandomIdGenerator {
    length: usize,
}

impl RandomIdGenerator {
    /// `length` bytes of entropy, rendered as `2 * length` hex characters
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl IdGenerator for RandomIdGenerator {
    fn generate(&self) -> SessionResult<String> {
        let mut bytes = vec![0u8; self.length];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| SessionError::IdGeneration(e.to_string()))?;
        Ok(hex::encode(bytes))
    }
}

/// Random (v4) UUIDs in their 32-character simple form
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn generate(&self) -> SessionResult<String> {
        Ok(Uuid::new_v4().simple().to_string())
    }
}
