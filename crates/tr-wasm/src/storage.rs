//! Storage backend for the extension background page
//!
//! `chrome.storage.local` is asynchronous, so writes are queued here and the
//! background script drains them after each call. Nothing waits on the
//! write completing.

use std::collections::{BTreeMap, HashMap};

use tr_core::{KeyValueStorage, StorageError, SETTINGS_KEY, STATS_KEY};

#[derive(Debug, Default)]
pub struct QueuedStorage {
    records: HashMap<String, String>,
    pending: BTreeMap<String, String>,
}

impl QueuedStorage {
    /// Seed with the records `chrome.storage.local.get` returned at startup.
    pub fn seeded(settings: Option<String>, stats: Option<String>) -> Self {
        let mut records = HashMap::new();
        if let Some(settings) = settings.filter(|s| !s.is_empty()) {
            records.insert(SETTINGS_KEY.to_string(), settings);
        }
        if let Some(stats) = stats.filter(|s| !s.is_empty()) {
            records.insert(STATS_KEY.to_string(), stats);
        }
        Self {
            records,
            pending: BTreeMap::new(),
        }
    }

    /// Writes not yet handed to the browser. Only the latest value per key
    /// is kept.
    pub fn take_pending(&mut self) -> BTreeMap<String, String> {
        std::mem::take(&mut self.pending)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

impl KeyValueStorage for QueuedStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.records.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        self.records.insert(key.to_string(), value.clone());
        self.pending.insert(key.to_string(), value);
        Ok(())
    }
}
