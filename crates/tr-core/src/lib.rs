//! Tracker Remover Core Library
//!
//! This crate holds everything the extension's background script does that is
//! not browser glue: deciding how to clean a navigation URL, and owning the
//! user's settings and per-site counters.
//!
//! # Architecture
//!
//! A navigation event is run through [`cleaner::clean`], a pure function of the
//! URL and the current [`Settings`]. The [`Store`] owns the only live copy of
//! the settings and stats, applies counter updates when a URL is cleaned, and
//! answers the popup's [`protocol::Request`] messages. Persistence goes through
//! the [`KeyValueStorage`] trait so each host supplies its own backend.
//!
//! # Modules
//!
//! - `types`: Settings, site rules and stats records
//! - `url`: Query string helpers
//! - `cleaner`: The URL cleaning decision
//! - `storage`: Key-value persistence trait and in-memory backend
//! - `store`: Settings/stats lifecycle, merge and import/export
//! - `protocol`: Popup request/response messages
//! - `interceptor`: Navigation event handling
//! - `export`: Backup file naming and display helpers

pub mod types;
pub mod url;
pub mod cleaner;
pub mod storage;
pub mod store;
pub mod protocol;
pub mod interceptor;
pub mod export;

// Re-export commonly used types
pub use cleaner::{clean, clean_outcome, CleanError, CleanOutcome, Cleaned};
pub use export::{backup_file_name, describe_last_cleaned};
pub use interceptor::{on_before_navigate, NavigationEvent, Redirect};
pub use protocol::{Request, Response};
pub use storage::{KeyValueStorage, MemoryStorage, StorageError, SETTINGS_KEY, STATS_KEY};
pub use store::{merge_settings, Store, StoreError, EXPORT_VERSION};
pub use types::{
    ExportData, ImportPayload, Settings, SettingsPatch, SiteConfig, SiteRules, SiteStats, Stats,
    UiSettings,
};
