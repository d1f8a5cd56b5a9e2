//! Command routing logic for CLI

use crate::args::{Cli, Commands, ConfigAction};
use crate::{commands, logging};
use anyhow::Context;
use puya_bridge_core::BridgeConfig;
use puya_bridge_core::config::load_config;

/// Route CLI commands to their respective handlers
pub async fn route(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Config {
        action: ConfigAction::Init { path, force },
    } = &cli.command
    {
        return commands::config::init(path, *force).await;
    }

    let config = effective_config(&cli)?;
    logging::init(&config.logging, cli.verbose);

    match cli.command {
        Commands::Serve { folders } => commands::serve::run(config, &folders).await,
        Commands::Resolve { folder, json } => {
            commands::resolve::run(config, &folder, json, cli.verbose).await
        }
        Commands::Config { .. } => commands::config::show(&config, cli.config.as_deref()),
    }
}

/// File and environment configuration with command-line flags on top
fn effective_config(cli: &Cli) -> anyhow::Result<BridgeConfig> {
    let mut config = load_config(cli.config.as_deref()).context("loading configuration")?;
    if let Some(profile) = cli.profile {
        config.profile = profile;
    }
    if let Some(port) = cli.debug_port {
        config.debug_port = Some(port);
    }
    Ok(config)
}
