//! URL Cleaner
//!
//! Pure decision function run for every top-level navigation. It never
//! touches stats; the store applies the counters when a URL is cleaned.

use serde::Serialize;

use crate::types::Settings;
use crate::url::{parse, retain_query_params};

/// Error raised while cleaning a URL.
#[derive(Debug, thiserror::Error)]
pub enum CleanError {
    #[error("Malformed URL '{url}': {source}")]
    MalformedUrl {
        url: String,
        #[source]
        source: ::url::ParseError,
    },
}

/// A URL that had at least one parameter stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cleaned {
    /// Rewritten URL.
    pub url: String,
    /// Site fragment whose rule applied.
    pub site: String,
    /// Number of parameters removed (always > 0).
    pub removed: u32,
}

/// `{ cleanedUrl, removedCount }` as reported to the extension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanOutcome {
    pub cleaned_url: Option<String>,
    pub removed_count: u32,
}

impl From<Option<Cleaned>> for CleanOutcome {
    fn from(cleaned: Option<Cleaned>) -> Self {
        match cleaned {
            Some(c) => Self {
                cleaned_url: Some(c.url),
                removed_count: c.removed,
            },
            None => Self::default(),
        }
    }
}

/// Strip every query parameter not on the matching site's keep-list.
///
/// Returns `Ok(None)` when there is nothing to do: tracking is off, no site
/// matches, the site is disabled or its path gate is not met, or no
/// parameter was removed.
pub fn clean(url: &str, settings: &Settings) -> Result<Option<Cleaned>, CleanError> {
    if !settings.tracking_enabled {
        return Ok(None);
    }

    let mut parsed = parse(url).map_err(|source| CleanError::MalformedUrl {
        url: url.to_string(),
        source,
    })?;

    let host = match parsed.host_str() {
        Some(host) => host,
        None => return Ok(None),
    };

    let (site, config) = match settings.match_site(host) {
        Some(found) => found,
        None => return Ok(None),
    };

    if !config.enabled {
        return Ok(None);
    }

    if let Some(path) = &config.path_contains {
        if !parsed.path().contains(path.as_str()) {
            return Ok(None);
        }
    }

    let site = site.to_string();
    let removed = retain_query_params(&mut parsed, |name| config.keeps(name));
    if removed == 0 {
        return Ok(None);
    }

    Ok(Some(Cleaned {
        url: parsed.into(),
        site,
        removed,
    }))
}

/// `clean` for callers that only need the outcome. Malformed URLs are
/// logged and reported as nothing to clean.
pub fn clean_outcome(url: &str, settings: &Settings) -> CleanOutcome {
    match clean(url, settings) {
        Ok(cleaned) => cleaned.into(),
        Err(e) => {
            log::debug!("{}", e);
            CleanOutcome::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SiteConfig;

    fn settings_with(site: &str, keep: &[&str]) -> Settings {
        Settings {
            sites: [(site, SiteConfig::new(keep.iter().copied()))].into_iter().collect(),
            ..Settings::default()
        }
    }

    #[test]
    fn test_google_search_scenario() {
        let settings = settings_with("google.com", &["q"]);
        let cleaned = clean("https://www.google.com/search?q=cats&ei=abc123&oq=cats", &settings)
            .unwrap()
            .unwrap();
        assert_eq!(cleaned.url, "https://www.google.com/search?q=cats");
        assert_eq!(cleaned.removed, 2);
        assert_eq!(cleaned.site, "google.com");
    }

    #[test]
    fn test_nothing_to_strip_is_noop() {
        let settings = settings_with("bing.com", &["q"]);
        let outcome = clean_outcome("https://www.bing.com/search?q=dogs", &settings);
        assert_eq!(outcome, CleanOutcome::default());
        assert_eq!(outcome.cleaned_url, None);
        assert_eq!(outcome.removed_count, 0);
    }

    #[test]
    fn test_tracking_disabled_short_circuits() {
        let mut settings = settings_with("google.com", &["q"]);
        settings.tracking_enabled = false;
        assert_eq!(clean("https://www.google.com/search?q=a&ei=b", &settings).unwrap(), None);
        // Not even parsed when disabled.
        assert_eq!(clean("::::", &settings).unwrap(), None);
    }

    #[test]
    fn test_unknown_site_is_noop() {
        let settings = Settings::default();
        assert_eq!(clean("https://example.org/?utm_source=x", &settings).unwrap(), None);
    }

    #[test]
    fn test_disabled_site_is_noop() {
        let mut settings = settings_with("google.com", &["q"]);
        settings.sites.get_mut("google.com").unwrap().enabled = false;
        assert_eq!(clean("https://www.google.com/search?q=a&ei=b", &settings).unwrap(), None);
    }

    #[test]
    fn test_malformed_url_is_error() {
        let settings = Settings::default();
        let err = clean("http://[::1", &settings).unwrap_err();
        assert!(matches!(err, CleanError::MalformedUrl { .. }));
        assert_eq!(clean_outcome("http://[::1", &settings), CleanOutcome::default());
    }

    #[test]
    fn test_path_gate() {
        let mut settings = settings_with("google.com", &["q"]);
        let config = settings.sites.get("google.com").unwrap().clone();
        settings.sites.insert("google.com", config.with_path_contains("/search"));

        assert_eq!(clean("https://www.google.com/maps?q=x&ei=1", &settings).unwrap(), None);
        let cleaned = clean("https://www.google.com/search?q=x&ei=1", &settings).unwrap().unwrap();
        assert_eq!(cleaned.removed, 1);
    }

    #[test]
    fn test_all_params_removed() {
        let settings = settings_with("youtube.com", &["v"]);
        let cleaned = clean("https://www.youtube.com/feed?si=abc&pp=x#top", &settings).unwrap().unwrap();
        assert_eq!(cleaned.url, "https://www.youtube.com/feed#top");
        assert_eq!(cleaned.removed, 2);
    }

    #[test]
    fn test_cleaned_url_is_stable() {
        let settings = Settings::default();
        let cleaned = clean(
            "https://www.google.com/search?q=rust+lang&sxsrf=A&hl=en&ved=0",
            &settings,
        )
        .unwrap()
        .unwrap();
        assert_eq!(cleaned.url, "https://www.google.com/search?q=rust+lang&hl=en");
        assert_eq!(clean(&cleaned.url, &settings).unwrap(), None);
    }

    #[test]
    fn test_outcome_serializes_camel_case() {
        let json = serde_json::to_value(CleanOutcome {
            cleaned_url: Some("https://a.com/".into()),
            removed_count: 1,
        })
        .unwrap();
        assert_eq!(json["cleanedUrl"], "https://a.com/");
        assert_eq!(json["removedCount"], 1);
    }
}
