//! WebAssembly bindings for Tracker Remover
//!
//! The background script owns one `TrackerRemover` for its lifetime. After
//! every call that may mutate state it drains `takePendingWrites()` into
//! `chrome.storage.local.set`.

mod logger;
mod storage;

use chrono::{DateTime, Utc};
use log::LevelFilter;
use wasm_bindgen::prelude::*;
use tr_core::{
    backup_file_name as core_backup_file_name,
    clean_outcome,
    describe_last_cleaned as core_describe_last_cleaned,
    interceptor::{on_before_navigate, NavigationEvent},
    Store,
};

pub use storage::QueuedStorage;

#[wasm_bindgen(js_name = initLogging)]
pub fn init_logging(verbose: bool) {
    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };
    logger::init(level);
}

#[wasm_bindgen]
pub struct TrackerRemover {
    store: Store<QueuedStorage>,
}

#[wasm_bindgen]
impl TrackerRemover {
    /// Build from the JSON-stringified `settings` and `stats` records.
    #[wasm_bindgen(constructor)]
    pub fn new(settings_json: Option<String>, stats_json: Option<String>) -> TrackerRemover {
        let storage = QueuedStorage::seeded(settings_json, stats_json);
        TrackerRemover {
            store: Store::load(storage),
        }
    }

    /// Returns the URL to load instead, or `undefined` to let the navigation
    /// proceed.
    #[wasm_bindgen(js_name = onBeforeNavigate)]
    pub fn on_before_navigate(&mut self, url: &str, tab_id: i32, frame_id: i32) -> Option<String> {
        let event = NavigationEvent { url, tab_id, frame_id };
        on_before_navigate(&mut self.store, &event).map(|redirect| redirect.url)
    }

    /// Pure cleaning preview. Does not touch stats.
    #[wasm_bindgen(js_name = cleanUrl)]
    pub fn clean_url(&self, url: &str) -> JsValue {
        let outcome = clean_outcome(url, self.store.settings());

        let js_result = js_sys::Object::new();
        let cleaned_url = match &outcome.cleaned_url {
            Some(cleaned) => JsValue::from_str(cleaned),
            None => JsValue::NULL,
        };
        let _ = js_sys::Reflect::set(&js_result, &"cleanedUrl".into(), &cleaned_url);
        let _ = js_sys::Reflect::set(&js_result, &"removedCount".into(), &JsValue::from(outcome.removed_count));
        js_result.into()
    }

    /// Answer a popup message (JSON in, JSON out).
    #[wasm_bindgen(js_name = handleMessage)]
    pub fn handle_message(&mut self, message: &str) -> String {
        self.store.handle_message(message)
    }

    /// Pretty-printed backup document.
    #[wasm_bindgen(js_name = exportJson)]
    pub fn export_json(&self) -> Result<String, JsValue> {
        self.store
            .export_data()
            .to_pretty_json()
            .map_err(|e| JsValue::from_str(&format!("Failed to export: {}", e)))
    }

    /// Import a backup file's text. Rejects without changing anything if the
    /// text is not valid.
    #[wasm_bindgen(js_name = importJson)]
    pub fn import_json(&mut self, json: &str) -> Result<(), JsValue> {
        self.store
            .import_json(json)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// `{ settings?: string, stats?: string }` for `chrome.storage.local.set`.
    #[wasm_bindgen(js_name = takePendingWrites)]
    pub fn take_pending_writes(&mut self) -> JsValue {
        let result = js_sys::Object::new();
        for (key, value) in self.store.storage_mut().take_pending() {
            let _ = js_sys::Reflect::set(&result, &JsValue::from_str(&key), &JsValue::from_str(&value));
        }
        result.into()
    }

    #[wasm_bindgen(js_name = hasPendingWrites)]
    pub fn has_pending_writes(&self) -> bool {
        self.store.storage().has_pending()
    }
}

/// `tracker-remover-backup-<today>.json`
#[wasm_bindgen(js_name = backupFileName)]
pub fn backup_file_name() -> String {
    core_backup_file_name(Utc::now().date_naive())
}

/// Popup wording for an RFC 3339 `lastCleaned` value.
#[wasm_bindgen(js_name = describeLastCleaned)]
pub fn describe_last_cleaned(last_cleaned: Option<String>) -> String {
    let last = last_cleaned
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc));
    core_describe_last_cleaned(last, Utc::now())
}


#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    fn clean_url_reports_outcome() {
        let remover = TrackerRemover::new(None, None);
        let result = remover.clean_url("https://www.google.com/search?q=cats&ei=abc123&oq=cats");
        let removed = js_sys::Reflect::get(&result, &"removedCount".into()).unwrap();
        assert_eq!(removed.as_f64(), Some(2.0));
        let cleaned = js_sys::Reflect::get(&result, &"cleanedUrl".into()).unwrap();
        assert_eq!(cleaned.as_string().as_deref(), Some("https://www.google.com/search?q=cats"));
    }

    #[wasm_bindgen_test]
    fn import_json_rejects_garbage() {
        let mut remover = TrackerRemover::new(None, None);
        assert!(remover.import_json("{oops").is_err());
    }
}
