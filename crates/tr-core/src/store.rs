//! Settings/Stats Store
//!
//! The single owner of configuration and counters. Every mutation is written
//! back through the storage backend; write failures are logged and otherwise
//! ignored, so a failed write only risks counters drifting until the next
//! successful one.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cleaner::{clean, Cleaned};
use crate::storage::{KeyValueStorage, SETTINGS_KEY, STATS_KEY};
use crate::types::{ExportData, ImportPayload, Settings, SettingsPatch, Stats};

/// Version string written into exports.
pub const EXPORT_VERSION: &str = "1.0";

/// Source of "now" for stats and exports.
pub type Clock = fn() -> DateTime<Utc>;

/// Error type for store operations that can be refused.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Malformed import data: {0}")]
    MalformedImport(#[source] serde_json::Error),
}

/// Merge a partial settings update.
///
/// Top-level fields missing from `patch` take their default values. Sites are
/// layered defaults, then `current`, then the patch, so no default site is
/// ever lost and unknown sites are kept.
pub fn merge_settings(current: &Settings, patch: SettingsPatch) -> Settings {
    let defaults = Settings::default();

    let mut sites = defaults.sites;
    sites.overlay(&current.sites);
    if let Some(patch_sites) = &patch.sites {
        sites.overlay(patch_sites);
    }

    Settings {
        ui: patch.ui.unwrap_or(defaults.ui),
        tracking_enabled: patch.tracking_enabled.unwrap_or(defaults.tracking_enabled),
        sites,
    }
}

/// Owns the live settings and stats.
pub struct Store<S: KeyValueStorage> {
    settings: Settings,
    stats: Stats,
    storage: S,
    clock: Clock,
}

impl<S: KeyValueStorage> Store<S> {
    /// Load both records from `storage`, falling back to defaults for
    /// anything missing or unreadable.
    pub fn load(storage: S) -> Self {
        let stored_settings: Record<SettingsPatch> = read_record(&storage, SETTINGS_KEY);
        let settings = merge_settings(&Settings::default(), stored_settings.into_option().unwrap_or_default());

        let stored_stats: Record<Stats> = read_record(&storage, STATS_KEY);
        let stats_unreadable = matches!(stored_stats, Record::Unreadable);
        let mut stats = stored_stats.into_option().unwrap_or_default();
        let added = stats.reconcile(&settings.sites);

        let mut store = Self {
            settings,
            stats,
            storage,
            clock: Utc::now,
        };

        if stats_unreadable {
            log::warn!("Leaving unreadable '{}' record in place until stats change", STATS_KEY);
        } else if added > 0 {
            log::debug!("Added {} missing stats entries", added);
            store.persist_stats();
        }

        log::info!(
            "Loaded {} site rules (tracking {})",
            store.settings.sites.len(),
            if store.settings.tracking_enabled { "on" } else { "off" }
        );
        store
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    // -------------------------------------------------------------------------
    // Settings
    // -------------------------------------------------------------------------

    pub fn update_settings(&mut self, patch: SettingsPatch) -> &Settings {
        self.settings = merge_settings(&self.settings, patch);
        self.persist_settings();
        self.reconcile_stats();
        &self.settings
    }

    pub fn reset_settings(&mut self) -> &Settings {
        self.settings = Settings::default();
        self.persist_settings();
        self.reconcile_stats();
        &self.settings
    }

    // -------------------------------------------------------------------------
    // Stats
    // -------------------------------------------------------------------------

    /// Zero one site's counters, or every site's when `site` is `None` or has
    /// no entry.
    pub fn reset_stats(&mut self, site: Option<&str>) -> &Stats {
        let reset_one = match site {
            Some(site) => self.stats.reset_site(site),
            None => false,
        };

        if !reset_one {
            if let Some(site) = site {
                log::warn!("No stats for '{}', resetting every site", site);
            }
            self.stats = Stats::zeroed_for(&self.settings.sites);
        }

        self.persist_stats();
        &self.stats
    }

    // -------------------------------------------------------------------------
    // Export / Import
    // -------------------------------------------------------------------------

    pub fn export_data(&self) -> ExportData {
        ExportData {
            settings: self.settings.clone(),
            stats: self.stats.clone(),
            export_date: self.now(),
            version: EXPORT_VERSION.to_string(),
        }
    }

    /// Apply an import. Settings go through the regular merge, stats are
    /// replaced wholesale. Either half may be absent.
    pub fn import_data(&mut self, payload: ImportPayload) {
        let ImportPayload { settings, stats } = payload;

        if let Some(patch) = settings {
            self.settings = merge_settings(&self.settings, patch);
            self.persist_settings();
        }

        let replaced = stats.is_some();
        if let Some(stats) = stats {
            self.stats = stats;
        }

        let added = self.stats.reconcile(&self.settings.sites);
        if replaced || added > 0 {
            self.persist_stats();
        }
    }

    /// Parse and apply an exported JSON document. Nothing changes if the
    /// document does not parse.
    pub fn import_json(&mut self, json: &str) -> Result<(), StoreError> {
        let payload: ImportPayload = serde_json::from_str(json).map_err(StoreError::MalformedImport)?;
        self.import_data(payload);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Navigation
    // -------------------------------------------------------------------------

    /// Clean `url` against the current settings and count the removal.
    pub fn process_navigation(&mut self, url: &str) -> Option<Cleaned> {
        let cleaned = match clean(url, &self.settings) {
            Ok(Some(cleaned)) => cleaned,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("{}", e);
                return None;
            }
        };

        let now = self.now();
        self.stats.record(&cleaned.site, cleaned.removed, now);
        self.persist_stats();

        log::debug!(
            "Removed {} parameter(s) for {}",
            cleaned.removed,
            cleaned.site
        );
        Some(cleaned)
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    fn reconcile_stats(&mut self) {
        if self.stats.reconcile(&self.settings.sites) > 0 {
            self.persist_stats();
        }
    }

    fn persist_settings(&mut self) {
        write_record(&mut self.storage, SETTINGS_KEY, &self.settings);
    }

    fn persist_stats(&mut self) {
        write_record(&mut self.storage, STATS_KEY, &self.stats);
    }
}

/// Outcome of reading one stored record.
enum Record<T> {
    Missing,
    Loaded(T),
    /// Present but could not be read or parsed.
    Unreadable,
}

impl<T> Record<T> {
    fn into_option(self) -> Option<T> {
        match self {
            Record::Loaded(value) => Some(value),
            Record::Missing | Record::Unreadable => None,
        }
    }
}

fn read_record<S, T>(storage: &S, key: &str) -> Record<T>
where
    S: KeyValueStorage,
    T: DeserializeOwned,
{
    let raw = match storage.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            log::debug!("No '{}' record, using defaults", key);
            return Record::Missing;
        }
        Err(e) => {
            log::warn!("Failed to read '{}': {}", key, e);
            return Record::Unreadable;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Record::Loaded(value),
        Err(e) => {
            log::warn!("Ignoring unreadable '{}' record: {}", key, e);
            Record::Unreadable
        }
    }
}

fn write_record<S, T>(storage: &mut S, key: &str, value: &T)
where
    S: KeyValueStorage,
    T: Serialize,
{
    let json = match serde_json::to_string(value) {
        Ok(json) => json,
        Err(e) => {
            log::warn!("Failed to serialize '{}': {}", key, e);
            return;
        }
    };
    if let Err(e) = storage.set(key, json) {
        log::warn!("Failed to persist '{}': {}", key, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, StorageError};
    use crate::types::{SiteConfig, SiteStats, UiSettings};
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn store() -> Store<MemoryStorage> {
        Store::load(MemoryStorage::new()).with_clock(fixed_now)
    }

    #[test]
    fn test_load_empty_storage_uses_defaults() {
        let store = store();
        assert_eq!(store.settings(), &Settings::default());
        for site in store.settings().sites.keys() {
            assert_eq!(store.stats().get(site), Some(&SiteStats::default()));
        }
    }

    #[test]
    fn test_load_merges_stored_settings_over_defaults() {
        let storage = MemoryStorage::new().with_record(
            SETTINGS_KEY,
            r#"{"trackingEnabled":false,"sites":{"example.org":{"keepParams":["id"]}}}"#,
        );
        let store = Store::load(storage);
        assert!(!store.settings().tracking_enabled);
        assert_eq!(store.settings().ui, UiSettings::default());
        assert!(store.settings().sites.contains("google.com"));
        assert!(store.settings().sites.contains("example.org"));
        assert!(store.stats().contains("example.org"));
        // Reconciled stats were written back.
        assert!(store.storage().record(STATS_KEY).is_some());
    }

    #[test]
    fn test_load_ignores_garbage_records() {
        let storage = MemoryStorage::new()
            .with_record(SETTINGS_KEY, "not json")
            .with_record(STATS_KEY, "[1,2");
        let store = Store::load(storage);
        assert_eq!(store.settings(), &Settings::default());
        assert_eq!(store.stats().len(), Settings::default().sites.len());
    }

    #[test]
    fn test_load_does_not_overwrite_unreadable_stats() {
        let flat = r#"{"totalCleaned":12,"paramsRemoved":40,"lastCleaned":null}"#;
        let storage = MemoryStorage::new().with_record(STATS_KEY, flat);
        let mut store = Store::load(storage).with_clock(fixed_now);

        assert_eq!(store.stats().len(), Settings::default().sites.len());
        assert_eq!(store.storage().record(STATS_KEY), Some(flat));
        assert_eq!(store.storage().writes(), 0);

        store.process_navigation("https://www.google.com/search?q=a&ei=1");
        let persisted: Stats = serde_json::from_str(store.storage().record(STATS_KEY).unwrap()).unwrap();
        assert_eq!(persisted.get("google.com").unwrap().total_cleaned, 1);
    }

    #[test]
    fn test_load_keeps_stale_stats() {
        let storage = MemoryStorage::new()
            .with_record(STATS_KEY, r#"{"gone.com":{"totalCleaned":4,"paramsRemoved":9,"lastCleaned":null}}"#);
        let store = Store::load(storage);
        assert_eq!(store.stats().get("gone.com").unwrap().total_cleaned, 4);
    }

    #[test]
    fn test_update_settings_merges_sites() {
        let mut store = store();
        let patch = SettingsPatch {
            sites: Some([("example.org", SiteConfig::new(["id"]))].into_iter().collect()),
            ..SettingsPatch::default()
        };
        store.update_settings(patch);

        let patch = SettingsPatch {
            tracking_enabled: Some(false),
            sites: Some([("bing.com", SiteConfig::new(["q"]))].into_iter().collect()),
            ..SettingsPatch::default()
        };
        let settings = store.update_settings(patch).clone();

        assert!(!settings.tracking_enabled);
        assert!(settings.sites.contains("example.org"));
        assert_eq!(settings.sites.get("bing.com").unwrap().keep_params, vec!["q"]);
        assert!(settings.sites.contains("google.com"));
        assert!(store.stats().contains("example.org"));

        let persisted: Settings =
            serde_json::from_str(store.storage().record(SETTINGS_KEY).unwrap()).unwrap();
        assert_eq!(persisted, settings);
    }

    #[test]
    fn test_update_settings_missing_top_level_falls_back_to_defaults() {
        let mut store = store();
        store.update_settings(SettingsPatch {
            tracking_enabled: Some(false),
            ui: Some(UiSettings {
                theme: "dark".into(),
                ..UiSettings::default()
            }),
            ..SettingsPatch::default()
        });
        let settings = store.update_settings(SettingsPatch::default());
        assert!(settings.tracking_enabled);
        assert_eq!(settings.ui.theme, "gradient-purple");
    }

    #[test]
    fn test_reset_settings_restores_defaults() {
        let mut store = store();
        store.update_settings(SettingsPatch {
            sites: Some([("example.org", SiteConfig::new(["id"]))].into_iter().collect()),
            ..SettingsPatch::default()
        });
        let settings = store.reset_settings().clone();
        assert_eq!(settings, Settings::default());
        // Stats for the removed site may linger.
        assert!(store.stats().contains("example.org"));
    }

    #[test]
    fn test_process_navigation_records_stats() {
        let mut store = store();
        let cleaned = store
            .process_navigation("https://www.google.com/search?q=cats&ei=abc123&oq=cats")
            .unwrap();
        assert_eq!(cleaned.url, "https://www.google.com/search?q=cats");

        let google = store.stats().get("google.com").unwrap();
        assert_eq!(google.total_cleaned, 1);
        assert_eq!(google.params_removed, 2);
        assert_eq!(google.last_cleaned, Some(fixed_now()));

        assert!(store.process_navigation("https://www.google.com/search?q=cats").is_none());
        assert!(store.process_navigation("not a url").is_none());
        assert_eq!(store.stats().get("google.com").unwrap().total_cleaned, 1);
    }

    #[test]
    fn test_reset_stats_single_site() {
        let mut store = store();
        store.process_navigation("https://www.google.com/search?q=a&ei=1");
        store.process_navigation("https://www.bing.com/search?q=a&form=QBLH");

        store.reset_stats(Some("google.com"));
        assert_eq!(store.stats().get("google.com"), Some(&SiteStats::default()));
        assert_eq!(store.stats().get("bing.com").unwrap().total_cleaned, 1);
    }

    #[test]
    fn test_reset_stats_all_sites() {
        let mut store = store();
        store.process_navigation("https://www.google.com/search?q=a&ei=1");
        store.process_navigation("https://www.bing.com/search?q=a&form=QBLH");

        let stats = store.reset_stats(None).clone();
        assert_eq!(stats.totals(), SiteStats::default());
        assert_eq!(stats.len(), store.settings().sites.len());

        store.process_navigation("https://www.bing.com/search?q=a&form=QBLH");
        store.reset_stats(Some("unknown.example"));
        assert_eq!(store.stats().totals(), SiteStats::default());
    }

    #[test]
    fn test_export_import_roundtrip() {
        let mut store = store();
        store.update_settings(SettingsPatch {
            sites: Some([("example.org", SiteConfig::new(["id"]))].into_iter().collect()),
            ..SettingsPatch::default()
        });
        store.process_navigation("https://example.org/?id=1&ref=x");

        let export = store.export_data();
        assert_eq!(export.version, EXPORT_VERSION);
        assert_eq!(export.export_date, fixed_now());

        let settings_before = store.settings().clone();
        let stats_before = store.stats().clone();
        store.import_data(export.into());
        assert_eq!(store.settings(), &settings_before);
        assert_eq!(store.stats(), &stats_before);
    }

    #[test]
    fn test_import_partial_payloads() {
        let mut store = store();
        store.process_navigation("https://www.google.com/search?q=a&ei=1");
        let stats_before = store.stats().clone();

        store
            .import_json(r#"{"settings":{"trackingEnabled":false}}"#)
            .unwrap();
        assert!(!store.settings().tracking_enabled);
        assert_eq!(store.stats(), &stats_before);

        store
            .import_json(r#"{"stats":{"google.com":{"totalCleaned":7,"paramsRemoved":8,"lastCleaned":null}}}"#)
            .unwrap();
        assert!(!store.settings().tracking_enabled);
        assert_eq!(store.stats().get("google.com").unwrap().total_cleaned, 7);
        // Missing sites are filled back in.
        assert!(store.stats().contains("bing.com"));
    }

    #[test]
    fn test_import_malformed_leaves_state_untouched() {
        let mut store = store();
        let settings_before = store.settings().clone();
        let writes_before = store.storage().writes();

        let err = store.import_json(r#"{"settings": {"trackingEnabled": "#).unwrap_err();
        assert!(matches!(err, StoreError::MalformedImport(_)));

        let err = store
            .import_json(r#"{"settings":{"trackingEnabled":false},"stats":{"a":{"totalCleaned":-1}}}"#)
            .unwrap_err();
        assert!(matches!(err, StoreError::MalformedImport(_)));

        assert_eq!(store.settings(), &settings_before);
        assert_eq!(store.storage().writes(), writes_before);
    }

    struct FailingStorage;

    impl KeyValueStorage for FailingStorage {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("offline".into()))
        }

        fn set(&mut self, _key: &str, _value: String) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("offline".into()))
        }
    }

    #[test]
    fn test_storage_failures_are_not_fatal() {
        let mut store = Store::load(FailingStorage);
        assert_eq!(store.settings(), &Settings::default());
        let cleaned = store.process_navigation("https://www.google.com/search?q=a&ei=1");
        assert!(cleaned.is_some());
        assert_eq!(store.stats().get("google.com").unwrap().total_cleaned, 1);
    }
}
