//! Popup <-> background message protocol
//!
//! Requests are JSON objects tagged by `action`. Every request gets exactly
//! one response, including requests that fail to parse.

use serde::{Deserialize, Serialize};

use crate::storage::KeyValueStorage;
use crate::store::Store;
use crate::types::{ExportData, ImportPayload, Settings, SettingsPatch, Stats};

/// A request from the popup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    GetSettings,
    UpdateSettings {
        settings: SettingsPatch,
    },
    ResetSettings,
    GetStats,
    ResetStats {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        site: Option<String>,
    },
    ExportData,
    ImportData {
        data: ImportPayload,
    },
}

/// The reply to a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Settings(Settings),
    SettingsChanged {
        success: bool,
        settings: Settings,
    },
    Stats(Stats),
    Export(ExportData),
    Imported {
        success: bool,
        settings: Settings,
        stats: Stats,
    },
    Error {
        success: bool,
        error: String,
    },
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            success: false,
            error: message.into(),
        }
    }
}

impl<S: KeyValueStorage> Store<S> {
    /// Dispatch one request.
    pub fn handle(&mut self, request: Request) -> Response {
        match request {
            Request::GetSettings => Response::Settings(self.settings().clone()),
            Request::UpdateSettings { settings } => Response::SettingsChanged {
                success: true,
                settings: self.update_settings(settings).clone(),
            },
            Request::ResetSettings => Response::SettingsChanged {
                success: true,
                settings: self.reset_settings().clone(),
            },
            Request::GetStats => Response::Stats(self.stats().clone()),
            Request::ResetStats { site } => Response::Stats(self.reset_stats(site.as_deref()).clone()),
            Request::ExportData => Response::Export(self.export_data()),
            Request::ImportData { data } => {
                self.import_data(data);
                Response::Imported {
                    success: true,
                    settings: self.settings().clone(),
                    stats: self.stats().clone(),
                }
            }
        }
    }

    /// Parse, dispatch and serialize a raw JSON message.
    pub fn handle_message(&mut self, message: &str) -> String {
        let response = match serde_json::from_str::<Request>(message) {
            Ok(request) => {
                log::debug!("Handling {}", action_name(&request));
                self.handle(request)
            }
            Err(e) => {
                log::warn!("Rejected message: {}", e);
                Response::error(format!("Invalid request: {}", e))
            }
        };
        encode_response(&response)
    }
}

fn action_name(request: &Request) -> &'static str {
    match request {
        Request::GetSettings => "getSettings",
        Request::UpdateSettings { .. } => "updateSettings",
        Request::ResetSettings => "resetSettings",
        Request::GetStats => "getStats",
        Request::ResetStats { .. } => "resetStats",
        Request::ExportData => "exportData",
        Request::ImportData { .. } => "importData",
    }
}

fn encode_response(response: &Response) -> String {
    match serde_json::to_string(response) {
        Ok(json) => json,
        Err(e) => {
            log::warn!("Failed to encode response: {}", e);
            r#"{"success":false,"error":"Failed to encode response"}"#.to_string()
        }
    }
}
