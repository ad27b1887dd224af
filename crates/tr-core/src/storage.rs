//! Key-value persistence seam
//!
//! The store keeps two records, `settings` and `stats`, each a JSON string.
//! Hosts provide the backend: the extension hands writes to
//! `chrome.storage.local`, the CLI writes files, tests use memory.

use std::collections::HashMap;

/// Record key for the settings JSON.
pub const SETTINGS_KEY: &str = "settings";
/// Record key for the stats JSON.
pub const STATS_KEY: &str = "stats";

/// Error type for storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on '{key}': {message}")]
    Io { key: String, message: String },
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Minimal string key-value store.
pub trait KeyValueStorage {
    /// Read a record. A missing key is `Ok(None)`, not an error.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    /// Write a record, replacing any previous value.
    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError>;
}

impl<T: KeyValueStorage + ?Sized> KeyValueStorage for Box<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        (**self).set(key, value)
    }
}

/// In-memory storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    records: HashMap<String, String>,
    writes: usize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a record without counting it as a write.
    pub fn with_record(mut self, key: &str, value: impl Into<String>) -> Self {
        self.records.insert(key.to_string(), value.into());
        self
    }

    /// Number of `set` calls so far.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn record(&self, key: &str) -> Option<&str> {
        self.records.get(key).map(|s| s.as_str())
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.records.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        self.writes += 1;
        self.records.insert(key.to_string(), value);
        Ok(())
    }
}
