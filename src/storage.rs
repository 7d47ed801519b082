//! Tab-scoped key/value storage.
//!
//! DESIGN
//! ======
//! Mirrors the browser's `sessionStorage`: string keys, string (JSON)
//! values, lifetime bounded by the owning process. Only the store writes
//! through this seam; callers elsewhere never touch it directly.

use std::collections::HashMap;
use std::sync::Mutex;

/// Storage key for the persisted session record.
pub const SESSION_KEY: &str = "setu_chatbot_session";
/// Storage key for the persisted message-history record.
pub const MESSAGES_KEY: &str = "setu_chatbot_messages";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage write failed for {key}: {reason}")]
    Write { key: String, reason: String },
    #[error("storage read failed for {key}: {reason}")]
    Read { key: String, reason: String },
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub trait SessionStorage: Send + Sync {
    /// Read a value. `Ok(None)` when the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: String) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Process-lifetime storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.entries().insert(key.to_owned(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries().remove(key);
        Ok(())
    }
}
