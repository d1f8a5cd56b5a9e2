//! `serve`: the long-running host loop

use crate::ipc::{ChannelNotifier, HostServer, run_host_server};
use crate::signal_handler::SignalHandler;
use anyhow::Context;
use puya_bridge_core::{BridgeConfig, ExtensionHost, Notifier, SessionRegistry, WorkspaceFolder};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

pub async fn run(config: BridgeConfig, folders: &[PathBuf]) -> anyhow::Result<()> {
    let folders = workspace_folders(folders)?;
    info!(
        profile = ?config.profile,
        folders = folders.len(),
        "Serving language server sessions"
    );

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let notifier: Arc<dyn Notifier> = Arc::new(ChannelNotifier::new(event_tx.clone()));
    let registry = Arc::new(SessionRegistry::with_defaults(config, Arc::clone(&notifier)));
    let host = Arc::new(ExtensionHost::new(registry, notifier, folders));

    let mut signals = SignalHandler::start().context("installing signal handlers")?;
    let result = run_host_server(
        HostServer::new(host, event_tx),
        event_rx,
        tokio::io::stdin(),
        tokio::io::stdout(),
        signals.interrupted(),
    )
    .await;
    signals.close();
    result
}

/// Absolute workspace folders named after their last path component
fn workspace_folders(paths: &[PathBuf]) -> anyhow::Result<Vec<WorkspaceFolder>> {
    let mut folders: Vec<WorkspaceFolder> = Vec::with_capacity(paths.len());
    for path in paths {
        let folder = WorkspaceFolder::from_path(absolute(path)?);
        if folders.iter().any(|f| f.name == folder.name) {
            anyhow::bail!(
                "workspace folder name '{}' is used twice ({})",
                folder.name,
                folder.path.display()
            );
        }
        folders.push(folder);
    }
    Ok(folders)
}

fn absolute(path: &Path) -> anyhow::Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("resolving path {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folders_are_named_after_their_directory() {
        let folders =
            workspace_folders(&[PathBuf::from("/work/app"), PathBuf::from("/work/lib")]).unwrap();
        assert_eq!(folders[0].name, "app");
        assert_eq!(folders[1].path, PathBuf::from("/work/lib"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = workspace_folders(&[PathBuf::from("/a/app"), PathBuf::from("/b/app")]);
        assert!(result.is_err());
    }
}
