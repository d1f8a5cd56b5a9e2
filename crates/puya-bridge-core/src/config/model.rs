//! Configuration model

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Port used for the debug socket when debugging is enabled without a port
pub const DEFAULT_DEBUG_PORT: u16 = 8888;

/// Problems reported per document when nothing is configured
const DEFAULT_MAX_NUMBER_OF_PROBLEMS: u32 = 1000;

fn default_startup_timeout() -> u64 {
    30
}

fn default_shutdown_timeout() -> u64 {
    5
}

fn default_probe_timeout() -> u64 {
    30
}

/// Which language server family the bridge manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    #[default]
    Python,
    Typescript,
}

impl std::str::FromStr for ProfileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "python" | "py" => Ok(Self::Python),
            "typescript" | "ts" => Ok(Self::Typescript),
            other => Err(format!("unknown profile '{}'", other)),
        }
    }
}

/// Top-level bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Server family to launch
    #[serde(default)]
    pub profile: ProfileKind,
    /// Connect to an already running server on this local port instead of
    /// spawning one
    #[serde(default)]
    pub debug_port: Option<u16>,
    /// Seconds to wait for the `initialize` handshake
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,
    /// Seconds to wait for `shutdown` and process exit
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
    /// Seconds a single probe may run before it counts as failed
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Settings applied to every folder
    #[serde(default)]
    pub defaults: FolderSettings,
    /// Per-folder settings keyed by folder name (override `defaults`)
    #[serde(default)]
    pub folders: HashMap<String, FolderSettings>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            profile: ProfileKind::default(),
            debug_port: None,
            startup_timeout_secs: default_startup_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            probe_timeout_secs: default_probe_timeout(),
            logging: LoggingConfig::default(),
            defaults: FolderSettings::default(),
            folders: HashMap::new(),
        }
    }
}

impl BridgeConfig {
    /// Effective settings for one folder
    pub fn settings_for(&self, folder_name: &str) -> FolderSettings {
        let mut settings = self.defaults.clone();
        if let Some(specific) = self.folders.get(folder_name) {
            settings.merge(specific.clone());
        }
        settings
    }

    /// Folders (among `folder_names`) whose launch-relevant settings differ
    /// between `self` and `updated`.
    ///
    /// The profile is fixed for the registry's lifetime and is not compared.
    pub fn changed_folders<'a>(
        &self,
        updated: &BridgeConfig,
        folder_names: impl IntoIterator<Item = &'a str>,
    ) -> Vec<String> {
        let global_change = self.debug_port != updated.debug_port;

        folder_names
            .into_iter()
            .filter(|name| {
                global_change
                    || self.settings_for(name).language_server_path
                        != updated.settings_for(name).language_server_path
            })
            .map(str::to_string)
            .collect()
    }
}

/// Settings scoped to a single workspace folder
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderSettings {
    /// Path to a pre-built language server; disables probing when set
    #[serde(default)]
    pub language_server_path: Option<String>,
    /// Forwarded to the server through `workspace/configuration`
    #[serde(default)]
    pub max_number_of_problems: Option<u32>,
}

impl FolderSettings {
    pub fn with_language_server_path(mut self, path: impl Into<String>) -> Self {
        self.language_server_path = Some(path.into());
        self
    }

    pub fn max_problems(&self) -> u32 {
        self.max_number_of_problems
            .unwrap_or(DEFAULT_MAX_NUMBER_OF_PROBLEMS)
    }

    /// Override path, ignoring blank values
    pub fn override_path(&self) -> Option<&str> {
        self.language_server_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    pub fn merge(&mut self, other: FolderSettings) {
        if other.language_server_path.is_some() {
            self.language_server_path = other.language_server_path;
        }
        if other.max_number_of_problems.is_some() {
            self.max_number_of_problems = other.max_number_of_problems;
        }
    }

    /// Value returned to the server for its settings section
    pub fn to_server_settings(&self) -> serde_json::Value {
        serde_json::json!({ "maxNumberOfProblems": self.max_problems() })
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
