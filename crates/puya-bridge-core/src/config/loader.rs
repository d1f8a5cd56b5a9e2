//! File and environment configuration loading

use super::model::{BridgeConfig, DEFAULT_DEBUG_PORT, ProfileKind};
use crate::error::{BridgeError, BridgeResult};
use std::env;
use std::fs;
use std::path::Path;

/// Load configuration from a file
///
/// Supports JSON and TOML based on file extension. Returns the default
/// config if the file doesn't exist.
pub fn load_from_file(path: &Path) -> BridgeResult<BridgeConfig> {
    if !path.exists() {
        return Ok(BridgeConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|e| {
        BridgeError::config(format!("Failed to read config file: {}", e))
            .with_context(format!("Reading configuration from '{}'", path.display()))
    })?;

    let config = match path.extension().and_then(|s| s.to_str()) {
        Some("toml") => toml::from_str(&content).map_err(|e| {
            BridgeError::config(format!("Failed to parse TOML config: {}", e))
                .with_context(format!("Deserializing TOML configuration from '{}'", path.display()))
        })?,
        _ => serde_json::from_str(&content).map_err(|e| {
            BridgeError::config(format!("Failed to parse JSON config: {}", e))
                .with_context(format!("Deserializing JSON configuration from '{}'", path.display()))
        })?,
    };

    Ok(config)
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Overlay `PUYA_BRIDGE_*` environment variables onto `config`
pub fn load_from_env(mut config: BridgeConfig) -> BridgeResult<BridgeConfig> {
    if let Ok(profile) = env::var("PUYA_BRIDGE_PROFILE") {
        config.profile = profile
            .parse::<ProfileKind>()
            .map_err(|e| BridgeError::config(format!("Invalid PUYA_BRIDGE_PROFILE: {}", e)))?;
    }

    if let Ok(port) = env::var("PUYA_BRIDGE_DEBUG_PORT") {
        let port: u16 = port
            .parse()
            .map_err(|_| BridgeError::config("Invalid PUYA_BRIDGE_DEBUG_PORT value"))?;
        config.debug_port = Some(port);
    } else if let Ok(debug) = env::var("PUYA_BRIDGE_DEBUG") {
        if is_truthy(&debug) && config.debug_port.is_none() {
            config.debug_port = Some(DEFAULT_DEBUG_PORT);
        }
    }

    if let Ok(path) = env::var("PUYA_BRIDGE_LANGUAGE_SERVER_PATH") {
        config.defaults.language_server_path = Some(path);
    }

    if let Ok(level) = env::var("PUYA_BRIDGE_LOG_LEVEL") {
        config.logging.level = level;
    }

    if let Ok(secs) = env::var("PUYA_BRIDGE_STARTUP_TIMEOUT") {
        config.startup_timeout_secs = secs
            .parse()
            .map_err(|_| BridgeError::config("Invalid PUYA_BRIDGE_STARTUP_TIMEOUT value"))?;
    }

    Ok(config)
}

/// Load the file (if any) and overlay the environment
pub fn load_config(path: Option<&Path>) -> BridgeResult<BridgeConfig> {
    let config = match path {
        Some(path) => load_from_file(path)?,
        None => match dirs::config_dir() {
            Some(dir) => load_from_file(&dir.join("puya-bridge").join("config.json"))?,
            None => BridgeConfig::default(),
        },
    };
    load_from_env(config)
}
