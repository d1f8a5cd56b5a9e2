//! Show how a folder's server would be launched, without launching it

use crate::console::CliConsole;
use anyhow::Context;
use puya_bridge_core::launch::TransportChoice;
use puya_bridge_core::{
    BridgeConfig, EnvironmentProvider, LaunchPlan, LaunchResolver, LaunchStrategy, ProcessProber,
    RuntimeEnvironment, ServerProfile, WorkspaceFolder, provider_for,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// What resolution found for one folder
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    EnvironmentUnavailable {
        folder: WorkspaceFolder,
    },
    StrategyUnavailable {
        folder: WorkspaceFolder,
        environment: RuntimeEnvironment,
    },
    Resolved {
        folder: WorkspaceFolder,
        environment: RuntimeEnvironment,
        strategy: LaunchStrategy,
        transport: TransportChoice,
        env: std::collections::BTreeMap<String, String>,
    },
}

pub async fn run(
    config: BridgeConfig,
    folder: &Path,
    json: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    let path = std::path::absolute(folder)
        .with_context(|| format!("resolving path {}", folder.display()))?;
    let folder = WorkspaceFolder::from_path(path);

    let profile = ServerProfile::for_kind(config.profile);
    let resolver = LaunchResolver::new(
        profile,
        Arc::new(ProcessProber::new(Duration::from_secs(config.probe_timeout_secs))),
    );
    let environments = provider_for(config.profile);

    let resolution = resolve(&config, &resolver, environments.as_ref(), folder).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&resolution)?);
    } else {
        print(&CliConsole::new(verbose), resolver.profile(), &resolution);
    }
    Ok(())
}

/// Environment lookup followed by strategy resolution
pub async fn resolve(
    config: &BridgeConfig,
    resolver: &LaunchResolver,
    environments: &dyn EnvironmentProvider,
    folder: WorkspaceFolder,
) -> Resolution {
    let environment = match environments.resolve(&folder).await {
        Some(env) if env.is_complete() => env,
        _ => return Resolution::EnvironmentUnavailable { folder },
    };

    let settings = config.settings_for(&folder.name);
    let Some(strategy) = resolver
        .resolve(&folder, &environment, settings.override_path())
        .await
    else {
        return Resolution::StrategyUnavailable {
            folder,
            environment,
        };
    };

    let plan = LaunchPlan::new(resolver.profile(), config, &folder, &environment, strategy);
    Resolution::Resolved {
        folder,
        environment,
        strategy: plan.strategy,
        transport: plan.transport,
        env: plan.env.into_iter().collect(),
    }
}

fn print(console: &CliConsole, profile: &ServerProfile, resolution: &Resolution) {
    console.print_header(profile.display_name);
    match resolution {
        Resolution::EnvironmentUnavailable { folder } => {
            console.field("Folder", &folder.to_string());
            console.warn("No active runtime environment for this folder");
        }
        Resolution::StrategyUnavailable {
            folder,
            environment,
        } => {
            console.field("Folder", &folder.to_string());
            print_environment(console, environment);
            console.error(&format!(
                "{} is not installed or not available in the current environment.",
                profile.display_name
            ));
        }
        Resolution::Resolved {
            folder,
            environment,
            strategy,
            transport,
            env,
        } => {
            console.field("Folder", &folder.to_string());
            print_environment(console, environment);
            console.field("Command", &strategy.to_string());
            console.field(
                "Transport",
                &match transport {
                    TransportChoice::Stdio => "stdio".to_string(),
                    TransportChoice::Socket { port } => format!("socket 127.0.0.1:{}", port),
                },
            );
            for (key, value) in env {
                console.detail(&format!("{}={}", key, value));
            }
            console.success("Language server can be launched");
        }
    }
}

fn print_environment(console: &CliConsole, environment: &RuntimeEnvironment) {
    let show = |p: &Option<std::path::PathBuf>| {
        p.as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string())
    };
    console.field("Environment", &show(&environment.env_path));
    console.field("Executable", &show(&environment.executable));
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use puya_bridge_core::launch::ProbeCommand;
    use puya_bridge_core::{FolderSettings, StaticEnvironmentProvider};

    struct Runnable(&'static [&'static str]);

    #[async_trait]
    impl puya_bridge_core::CommandProber for Runnable {
        async fn probe(&self, command: &ProbeCommand) -> bool {
            self.0.contains(&command.program.as_str())
        }
    }

    fn resolver(runnable: &'static [&'static str]) -> LaunchResolver {
        LaunchResolver::new(ServerProfile::python(), Arc::new(Runnable(runnable)))
    }

    fn python_env() -> StaticEnvironmentProvider {
        StaticEnvironmentProvider::new(Some(RuntimeEnvironment::new("/env", "/env/bin/python")))
    }

    #[tokio::test]
    async fn test_missing_environment() {
        let resolution = resolve(
            &BridgeConfig::default(),
            &resolver(&["/env/bin/python"]),
            &StaticEnvironmentProvider::new(None),
            WorkspaceFolder::new("app", "/work/app"),
        )
        .await;
        assert!(matches!(resolution, Resolution::EnvironmentUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_nothing_runnable() {
        let resolution = resolve(
            &BridgeConfig::default(),
            &resolver(&[]),
            &python_env(),
            WorkspaceFolder::new("app", "/work/app"),
        )
        .await;
        assert!(matches!(resolution, Resolution::StrategyUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_module_candidate_wins() {
        let resolution = resolve(
            &BridgeConfig::default(),
            &resolver(&["/env/bin/python", "puyapy-lsp"]),
            &python_env(),
            WorkspaceFolder::new("app", "/work/app"),
        )
        .await;

        let Resolution::Resolved { strategy, env, .. } = resolution else {
            panic!("expected a strategy");
        };
        assert_eq!(strategy.command, "/env/bin/python");
        assert_eq!(strategy.args(), ["-m", "puyapy.lsp"]);
        assert_eq!(env.get("VIRTUAL_ENV").map(String::as_str), Some("/env"));
    }

    #[tokio::test]
    async fn test_override_reported_as_json() {
        let mut config = BridgeConfig::default();
        config.debug_port = Some(8888);
        config.folders.insert(
            "app".to_string(),
            FolderSettings::default().with_language_server_path("/opt/puya"),
        );

        let resolution = resolve(
            &config,
            &resolver(&[]),
            &python_env(),
            WorkspaceFolder::new("app", "/work/app"),
        )
        .await;
        let value = serde_json::to_value(&resolution).unwrap();

        assert_eq!(value["status"], "resolved");
        assert_eq!(value["strategy"]["command"], "puyapy-lsp");
        assert_eq!(value["transport"]["kind"], "socket");
        assert_eq!(value["transport"]["port"], 8888);
    }
}
