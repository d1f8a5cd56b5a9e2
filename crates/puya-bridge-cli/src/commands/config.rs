//! Configuration management commands

use crate::console::CliConsole;
use anyhow::{Context, bail};
use colored::*;
use puya_bridge_core::config::{BridgeConfig, FolderSettings};
use std::path::Path;

/// Show the effective configuration
pub fn show(config: &BridgeConfig, source: Option<&Path>) -> anyhow::Result<()> {
    let console = CliConsole::new(true);

    console.print_header("Configuration");
    match source {
        Some(path) if path.exists() => {
            console.success(&format!("Loaded configuration from: {}", path.display()))
        }
        Some(path) => {
            console.warn(&format!("Configuration file not found: {}", path.display()));
            console.info("Using default configuration");
        }
        None => console.info("Using the user configuration directory and defaults"),
    }

    print_config(&console, config);
    Ok(())
}

/// Write a configuration file with defaults
pub async fn init(path: &Path, force: bool) -> anyhow::Result<()> {
    let console = CliConsole::new(true);

    console.print_header("Configuration Initialization");

    if path.exists() && !force {
        console.error(&format!("Configuration file already exists: {}", path.display()));
        console.info("Use --force to overwrite");
        bail!("configuration file already exists: {}", path.display());
    }

    let contents = render(&BridgeConfig::default(), path)?;
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("writing {}", path.display()))?;

    console.success(&format!("Created configuration file: {}", path.display()));
    Ok(())
}

/// Serialize in the format matching the file extension
fn render(config: &BridgeConfig, path: &Path) -> anyhow::Result<String> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::to_string_pretty(config).context("serializing TOML configuration"),
        _ => serde_json::to_string_pretty(config).context("serializing JSON configuration"),
    }
}

fn print_config(console: &CliConsole, config: &BridgeConfig) {
    console.field("Profile", &format!("{:?}", config.profile).to_lowercase());
    console.field(
        "Transport",
        &match config.debug_port {
            Some(port) => format!("socket 127.0.0.1:{}", port),
            None => "stdio".to_string(),
        },
    );
    console.field("Startup timeout", &format!("{}s", config.startup_timeout_secs));
    console.field("Shutdown timeout", &format!("{}s", config.shutdown_timeout_secs));
    console.field("Probe timeout", &format!("{}s", config.probe_timeout_secs));
    console.field(
        "Logging",
        &format!("{} ({})", config.logging.level, config.logging.format),
    );

    console.print_header("Folder Settings");
    print_folder(console, "(defaults)", &config.defaults);

    let mut names: Vec<&String> = config.folders.keys().collect();
    names.sort();
    for name in names {
        print_folder(console, name, &config.settings_for(name));
    }
}

fn print_folder(console: &CliConsole, name: &str, settings: &FolderSettings) {
    println!("{}", name.magenta().bold());
    console.field(
        "Language server path",
        settings.override_path().unwrap_or("(probe)"),
    );
    console.field("Max problems", &settings.max_problems().to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use puya_bridge_core::config::load_from_file;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_writes_loadable_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("puya-bridge.json");

        init(&path, false).await.unwrap();

        let loaded = load_from_file(&path).unwrap();
        assert_eq!(loaded.startup_timeout_secs, 30);
    }

    #[tokio::test]
    async fn test_init_writes_toml_by_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("puya-bridge.toml");

        init(&path, false).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("startup_timeout_secs = 30"));
        assert!(load_from_file(&path).is_ok());
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("puya-bridge.json");
        std::fs::write(&path, "{}").unwrap();

        assert!(init(&path, false).await.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");

        init(&path, true).await.unwrap();
        assert_ne!(std::fs::read_to_string(&path).unwrap(), "{}");
    }
}
