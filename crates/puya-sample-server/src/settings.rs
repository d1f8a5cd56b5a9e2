//! Server settings and their per-document cache

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use tower_lsp::lsp_types::Url;

/// Configuration section requested from the client
pub const SECTION: &str = "pupapyLsp";

fn default_max_number_of_problems() -> u32 {
    1000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSettings {
    #[serde(default = "default_max_number_of_problems")]
    pub max_number_of_problems: u32,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            max_number_of_problems: default_max_number_of_problems(),
        }
    }
}

impl ServerSettings {
    /// Parse a section value; anything unusable yields the defaults
    pub fn from_value(value: Option<&serde_json::Value>) -> Self {
        value
            .filter(|v| v.is_object())
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    /// The section inside a `didChangeConfiguration` settings payload
    pub fn from_change(settings: &serde_json::Value) -> Self {
        Self::from_value(settings.get(SECTION))
    }
}

/// Settings per open document, plus the fallback used when the client
/// can't answer `workspace/configuration`
#[derive(Debug, Default)]
pub struct SettingsCache {
    documents: DashMap<Url, ServerSettings>,
    global: RwLock<ServerSettings>,
}

impl SettingsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, uri: &Url) -> Option<ServerSettings> {
        self.documents.get(uri).map(|s| *s)
    }

    pub fn insert(&self, uri: Url, settings: ServerSettings) {
        self.documents.insert(uri, settings);
    }

    pub fn remove(&self, uri: &Url) {
        self.documents.remove(uri);
    }

    pub fn clear(&self) {
        self.documents.clear();
    }

    pub fn global(&self) -> ServerSettings {
        self.global.read().map(|s| *s).unwrap_or_default()
    }

    pub fn set_global(&self, settings: ServerSettings) {
        if let Ok(mut global) = self.global.write() {
            *global = settings;
        }
    }
}
