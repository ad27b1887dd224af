//! Core type definitions for Tracker Remover
//!
//! These types are the persisted records (`settings` and `stats`) and the
//! shapes exchanged with the popup. Field names serialize as camelCase so the
//! JSON matches what the extension keeps in `chrome.storage.local`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ts_rs::TS;

// =============================================================================
// UI Settings
// =============================================================================

/// Popup presentation preferences. The core only stores these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(default, rename_all = "camelCase")]
#[ts(export)]
pub struct UiSettings {
    pub theme: String,
    pub show_stats: bool,
    pub show_last_cleaned: bool,
    pub animations_enabled: bool,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            theme: "gradient-purple".to_string(),
            show_stats: true,
            show_last_cleaned: true,
            animations_enabled: true,
        }
    }
}

// =============================================================================
// Site Configuration
// =============================================================================

/// Cleaning rules for one site fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SiteConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Allow-list of query parameter names. Everything else is stripped.
    #[serde(default, deserialize_with = "deserialize_keep_params")]
    pub keep_params: Vec<String>,
    /// Optional extra gate: the URL path must contain this string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub path_contains: Option<String>,
}

fn default_true() -> bool {
    true
}

impl SiteConfig {
    /// Enabled config keeping exactly `params` (duplicates dropped).
    pub fn new<I, P>(params: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        let mut config = Self {
            enabled: true,
            keep_params: Vec::new(),
            path_contains: None,
        };
        for param in params {
            config.keep(param);
        }
        config
    }

    /// Add a parameter to the keep-list. Returns false if it was already there.
    pub fn keep(&mut self, param: impl Into<String>) -> bool {
        let param = param.into();
        if self.keeps(&param) {
            return false;
        }
        self.keep_params.push(param);
        true
    }

    /// Remove a parameter from the keep-list.
    pub fn unkeep(&mut self, param: &str) -> bool {
        let before = self.keep_params.len();
        self.keep_params.retain(|p| p != param);
        before != self.keep_params.len()
    }

    #[inline]
    pub fn keeps(&self, param: &str) -> bool {
        self.keep_params.iter().any(|p| p == param)
    }

    /// Builder-style path gate.
    pub fn with_path_contains(mut self, path: impl Into<String>) -> Self {
        self.path_contains = Some(path.into());
        self
    }
}

fn deserialize_keep_params<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<String> = Vec::deserialize(deserializer)?;
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for param in raw {
        if !out.contains(&param) {
            out.push(param);
        }
    }
    Ok(out)
}

// =============================================================================
// Site Rules (ordered)
// =============================================================================

/// Ordered collection of site rules.
///
/// Serializes as a JSON object keyed by site fragment. Document order is kept
/// on deserialization, so the order users see in exports is the order the
/// rules are evaluated in when two fragments have the same length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteRules {
    entries: Vec<(String, SiteConfig)>,
}

impl SiteRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, site: &str) -> Option<&SiteConfig> {
        self.entries.iter().find(|(k, _)| k == site).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, site: &str) -> Option<&mut SiteConfig> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == site)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, site: &str) -> bool {
        self.get(site).is_some()
    }

    /// Insert or replace. A replaced entry keeps its position; new entries
    /// are appended. Returns the previous config if there was one.
    pub fn insert(&mut self, site: impl Into<String>, config: SiteConfig) -> Option<SiteConfig> {
        let site = site.into();
        match self.get_mut(&site) {
            Some(existing) => Some(std::mem::replace(existing, config)),
            None => {
                self.entries.push((site, config));
                None
            }
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SiteConfig)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Overlay `other` onto `self` key by key.
    pub fn overlay(&mut self, other: &SiteRules) {
        for (site, config) in other.iter() {
            self.insert(site, config.clone());
        }
    }
}

impl<K: Into<String>> FromIterator<(K, SiteConfig)> for SiteRules {
    fn from_iter<T: IntoIterator<Item = (K, SiteConfig)>>(iter: T) -> Self {
        let mut rules = SiteRules::new();
        for (site, config) in iter {
            rules.insert(site, config);
        }
        rules
    }
}

impl Serialize for SiteRules {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (site, config) in &self.entries {
            map.serialize_entry(site, config)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SiteRules {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SiteRulesVisitor;

        impl<'de> Visitor<'de> for SiteRulesVisitor {
            type Value = SiteRules;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of site fragment to site config")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<SiteRules, A::Error> {
                let mut rules = SiteRules::new();
                while let Some((site, config)) = access.next_entry::<String, SiteConfig>()? {
                    rules.insert(site, config);
                }
                Ok(rules)
            }
        }

        deserializer.deserialize_map(SiteRulesVisitor)
    }
}

// =============================================================================
// Settings
// =============================================================================

/// User configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Settings {
    #[serde(default)]
    pub ui: UiSettings,
    /// Global kill switch.
    #[serde(default = "default_true")]
    pub tracking_enabled: bool,
    #[serde(default)]
    #[ts(as = "std::collections::HashMap<String, SiteConfig>")]
    pub sites: SiteRules,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ui: UiSettings::default(),
            tracking_enabled: true,
            sites: default_sites(),
        }
    }
}

/// Built-in site rules.
pub fn default_sites() -> SiteRules {
    [
        ("google.com", SiteConfig::new(["q", "tbm", "tbs", "start", "num", "hl", "gl"])),
        ("bing.com", SiteConfig::new(["q", "first"])),
        ("duckduckgo.com", SiteConfig::new(["q", "ia", "iax"])),
        ("youtube.com", SiteConfig::new(["v", "t", "list", "index", "search_query"])),
        ("facebook.com", SiteConfig::new(["id", "story_fbid", "q"])),
        ("twitter.com", SiteConfig::new(["q", "f"])),
    ]
    .into_iter()
    .collect()
}

impl Settings {
    /// Find the site rule whose fragment occurs in `host`.
    ///
    /// The longest matching fragment wins, so `images.google.com` beats
    /// `google.com`. Equal lengths fall back to configuration order.
    pub fn match_site(&self, host: &str) -> Option<(&str, &SiteConfig)> {
        let host = host.to_ascii_lowercase();
        let mut best: Option<(&str, &SiteConfig)> = None;
        for (site, config) in self.sites.iter() {
            if site.is_empty() || !host.contains(&site.to_ascii_lowercase()) {
                continue;
            }
            match best {
                Some((current, _)) if current.len() >= site.len() => {}
                _ => best = Some((site, config)),
            }
        }
        best
    }
}

/// Partial settings as sent by `updateSettings` / `importData`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<UiSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sites: Option<SiteRules>,
}

impl From<Settings> for SettingsPatch {
    fn from(settings: Settings) -> Self {
        Self {
            ui: Some(settings.ui),
            tracking_enabled: Some(settings.tracking_enabled),
            sites: Some(settings.sites),
        }
    }
}

// =============================================================================
// Stats
// =============================================================================

/// Cumulative counters for one site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(default, rename_all = "camelCase")]
#[ts(export)]
pub struct SiteStats {
    /// Navigations with at least one parameter removed.
    pub total_cleaned: u64,
    /// Parameters removed across all navigations.
    pub params_removed: u64,
    #[ts(as = "Option<String>")]
    pub last_cleaned: Option<DateTime<Utc>>,
}

impl SiteStats {
    pub fn record(&mut self, removed: u32, at: DateTime<Utc>) {
        self.total_cleaned += 1;
        self.params_removed += u64::from(removed);
        self.last_cleaned = Some(at);
    }
}

/// Per-site counters keyed by site fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct Stats(BTreeMap<String, SiteStats>);

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zeroed entry for every site in `sites`.
    pub fn zeroed_for(sites: &SiteRules) -> Self {
        Self(
            sites
                .keys()
                .map(|site| (site.to_string(), SiteStats::default()))
                .collect(),
        )
    }

    pub fn get(&self, site: &str) -> Option<&SiteStats> {
        self.0.get(site)
    }

    pub fn contains(&self, site: &str) -> bool {
        self.0.contains_key(site)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SiteStats)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn insert(&mut self, site: impl Into<String>, stats: SiteStats) -> Option<SiteStats> {
        self.0.insert(site.into(), stats)
    }

    /// Count one cleaned navigation for `site`.
    pub fn record(&mut self, site: &str, removed: u32, at: DateTime<Utc>) {
        self.0.entry(site.to_string()).or_default().record(removed, at);
    }

    /// Zero one site's counters. Returns false if the site has no entry.
    pub fn reset_site(&mut self, site: &str) -> bool {
        match self.0.get_mut(site) {
            Some(entry) => {
                *entry = SiteStats::default();
                true
            }
            None => false,
        }
    }

    /// Add a zeroed entry for every site in `sites` that has none.
    /// Returns the number of entries added.
    pub fn reconcile(&mut self, sites: &SiteRules) -> usize {
        let mut added = 0;
        for site in sites.keys() {
            if !self.0.contains_key(site) {
                self.0.insert(site.to_string(), SiteStats::default());
                added += 1;
            }
        }
        added
    }

    /// Sum across all sites. `last_cleaned` is the most recent one.
    pub fn totals(&self) -> SiteStats {
        self.0.values().fold(SiteStats::default(), |mut acc, s| {
            acc.total_cleaned += s.total_cleaned;
            acc.params_removed += s.params_removed;
            acc.last_cleaned = match (acc.last_cleaned, s.last_cleaned) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            };
            acc
        })
    }
}

// =============================================================================
// Export / Import
// =============================================================================

/// Snapshot returned by `exportData` and written to backup files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ExportData {
    pub settings: Settings,
    pub stats: Stats,
    #[ts(as = "String")]
    pub export_date: DateTime<Utc>,
    pub version: String,
}

/// Payload accepted by `importData`. Unknown top-level keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<SettingsPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<Stats>,
}

impl From<ExportData> for ImportPayload {
    fn from(data: ExportData) -> Self {
        Self {
            settings: Some(data.settings.into()),
            stats: Some(data.stats),
        }
    }
}
