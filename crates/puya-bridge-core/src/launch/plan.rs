//! Everything needed to bring up one session

use super::LaunchStrategy;
use super::profile::ServerProfile;
use crate::config::{BridgeConfig, FolderSettings};
use crate::environment::RuntimeEnvironment;
use crate::workspace::WorkspaceFolder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// How the client reaches the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransportChoice {
    /// Spawn the strategy's command and speak over its stdin/stdout
    Stdio,
    /// Connect to a server already listening on a local port
    Socket { port: u16 },
}

/// Documents a session is responsible for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSelector {
    pub language: String,
    pub pattern: String,
}

/// A resolved launch for one folder
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub folder: WorkspaceFolder,
    pub strategy: LaunchStrategy,
    /// Extra environment for the server process
    pub env: HashMap<String, String>,
    pub transport: TransportChoice,
    pub initialization_options: Option<serde_json::Value>,
    pub document_selector: DocumentSelector,
    pub client_id: String,
    pub client_name: String,
    pub settings_section: String,
    pub settings: FolderSettings,
    pub startup_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl LaunchPlan {
    pub fn new(
        profile: &ServerProfile,
        config: &BridgeConfig,
        folder: &WorkspaceFolder,
        environment: &RuntimeEnvironment,
        strategy: LaunchStrategy,
    ) -> Self {
        let transport = match config.debug_port {
            Some(port) => TransportChoice::Socket { port },
            None => TransportChoice::Stdio,
        };

        Self {
            folder: folder.clone(),
            strategy,
            env: profile.child_environment(environment),
            transport,
            initialization_options: profile.initialization_options(environment),
            document_selector: DocumentSelector {
                language: profile.language_id.to_string(),
                pattern: folder.document_pattern(),
            },
            client_id: profile.client_id(folder),
            client_name: profile.client_name(folder),
            settings_section: profile.settings_section.to_string(),
            settings: config.settings_for(&folder.name),
            startup_timeout: Duration::from_secs(config.startup_timeout_secs),
            shutdown_timeout: Duration::from_secs(config.shutdown_timeout_secs),
        }
    }
}
