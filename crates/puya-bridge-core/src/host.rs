//! Editor host glue
//!
//! [`ExtensionHost`] maps editor events (documents opened, folders added or
//! removed, environment and configuration changes, the restart command) onto
//! [`SessionRegistry`] operations.

use crate::config::BridgeConfig;
use crate::error::BridgeResult;
use crate::notify::Notifier;
use crate::registry::{SessionRegistry, StartOutcome};
use crate::workspace::{WorkspaceFolder, folder_for_document};
use futures::future::join_all;
use lsp_types::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// A document the editor has open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenDocument {
    pub path: PathBuf,
    pub language_id: String,
    /// Current contents, forwarded to the server when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl OpenDocument {
    pub fn new(path: impl Into<PathBuf>, language_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            language_id: language_id.into(),
            text: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// Outcome for one folder touched by an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderOutcome {
    pub folder: String,
    #[serde(flatten)]
    pub outcome: StartOutcome,
}

pub struct ExtensionHost {
    registry: Arc<SessionRegistry>,
    notifier: Arc<dyn Notifier>,
    folders: RwLock<Vec<WorkspaceFolder>>,
}

impl ExtensionHost {
    pub fn new(
        registry: Arc<SessionRegistry>,
        notifier: Arc<dyn Notifier>,
        folders: Vec<WorkspaceFolder>,
    ) -> Self {
        Self {
            registry,
            notifier,
            folders: RwLock::new(folders),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub async fn folders(&self) -> Vec<WorkspaceFolder> {
        self.folders.read().await.clone()
    }

    /// Start sessions for the documents already open at activation
    #[instrument(skip_all, fields(documents = open_documents.len()))]
    pub async fn activate(&self, open_documents: &[OpenDocument]) -> Vec<FolderOutcome> {
        info!(profile = ?self.registry.profile().kind, "Activating language server bridge");
        let mut outcomes = Vec::new();
        for document in open_documents {
            if let Some(outcome) = self.on_document_opened(document).await {
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    /// Start a session for the document's folder if the document is relevant.
    ///
    /// Returns `None` for documents the profile doesn't handle, that live
    /// outside every workspace folder, or whose folder was removed while its
    /// session was starting.
    pub async fn on_document_opened(&self, document: &OpenDocument) -> Option<FolderOutcome> {
        let profile = self.registry.profile();
        if !profile.matches_document(&document.language_id, &document.path) {
            return None;
        }

        let Some(folder) = self.folder_for(&document.path).await else {
            debug!(path = %document.path.display(), "Document is outside every workspace folder");
            return None;
        };

        let outcome = self.registry.start_session(&folder).await;

        // The folder may have been removed while the session was starting
        if !self.is_tracked(&folder.name).await {
            if self.registry.remove_folder(&folder.name).await {
                info!(folder = %folder.name, "Stopped session for removed folder");
            }
            return None;
        }

        if outcome.is_running() {
            if let (Some(text), Ok(uri)) =
                (document.text.clone(), Url::from_file_path(&document.path))
            {
                if let Err(e) = self
                    .registry
                    .open_document(&folder.name, uri, &document.language_id, text)
                    .await
                {
                    debug!("Could not forward opened document: {}", e);
                }
            }
        }

        Some(FolderOutcome {
            folder: folder.name,
            outcome,
        })
    }

    pub async fn on_document_closed(&self, path: &Path) -> BridgeResult<bool> {
        let Some(folder) = self.folder_for(path).await else {
            return Ok(false);
        };
        match Url::from_file_path(path) {
            Ok(uri) => self.registry.close_document(&folder.name, uri).await,
            Err(()) => Ok(false),
        }
    }

    /// Track new folders. Sessions start when one of their documents opens.
    pub async fn on_folders_added(&self, added: Vec<WorkspaceFolder>) {
        let mut folders = self.folders.write().await;
        for folder in added {
            if folders.iter().any(|f| f.name == folder.name) {
                debug!(folder = %folder.name, "Folder already tracked");
                continue;
            }
            info!(folder = %folder, "Workspace folder added");
            folders.push(folder);
        }
    }

    /// Forget folders and stop their sessions
    pub async fn on_folders_removed(&self, names: &[String]) {
        self.folders
            .write()
            .await
            .retain(|f| !names.contains(&f.name));

        join_all(names.iter().map(|name| async move {
            if self.registry.remove_folder(name).await {
                info!(folder = %name, "Stopped session for removed folder");
            }
        }))
        .await;
    }

    /// The active interpreter changed.
    ///
    /// With a resource only its folder restarts; without one every folder
    /// that has a session restarts.
    pub async fn on_environment_changed(&self, resource: Option<&Path>) -> Vec<FolderOutcome> {
        let targets: Vec<WorkspaceFolder> = match resource {
            Some(path) => self.folder_for(path).await.into_iter().collect(),
            None => self.folders_with_sessions().await,
        };
        self.restart_all(targets).await
    }

    /// Apply new configuration.
    ///
    /// Running folders whose launch settings changed restart; the others get
    /// their new settings pushed to the running server.
    pub async fn on_configuration_changed(
        &self,
        mut updated: BridgeConfig,
    ) -> Vec<FolderOutcome> {
        let current = self.registry.config().await;
        if updated.profile != current.profile {
            warn!(
                current = ?current.profile,
                requested = ?updated.profile,
                "Ignoring profile change for a running bridge"
            );
            self.notifier.warn(&format!(
                "Keeping {}: switching profiles requires restarting the bridge.",
                self.registry.profile().display_name
            ));
            updated.profile = current.profile;
        }

        let running = self.folders_with_sessions().await;
        let changed =
            current.changed_folders(&updated, running.iter().map(|f| f.name.as_str()));

        self.registry.set_config(updated.clone()).await;

        let (restart, keep): (Vec<WorkspaceFolder>, Vec<WorkspaceFolder>) =
            running.into_iter().partition(|f| changed.contains(&f.name));

        join_all(keep.iter().map(|folder| {
            let before = current.settings_for(&folder.name);
            let after = updated.settings_for(&folder.name);
            async move {
                if before == after {
                    return;
                }
                match self.registry.update_settings(&folder.name, after).await {
                    Ok(true) => debug!(folder = %folder.name, "Pushed settings to server"),
                    Ok(false) => {}
                    Err(e) => warn!(folder = %folder.name, "Could not push settings: {}", e),
                }
            }
        }))
        .await;

        self.restart_all(restart).await
    }

    /// The "restart language server" command for the active document
    pub async fn restart_command(&self, active_document: Option<&Path>) -> Option<FolderOutcome> {
        let Some(path) = active_document else {
            self.notifier.error("No active editor found");
            return None;
        };
        let Some(folder) = self.folder_for(path).await else {
            self.notifier
                .error("No workspace folder found for the current file");
            return None;
        };

        let outcome = self.registry.restart_session(&folder).await;
        if outcome.is_running() {
            self.notifier.info(&format!(
                "{} restarted successfully",
                self.registry.profile().display_name
            ));
        }
        Some(FolderOutcome {
            folder: folder.name,
            outcome,
        })
    }

    /// Stop every session
    pub async fn deactivate(&self) {
        info!("Deactivating language server bridge");
        self.registry.stop_all().await;
    }

    async fn folder_for(&self, path: &Path) -> Option<WorkspaceFolder> {
        let folders = self.folders.read().await;
        folder_for_document(&folders, path).cloned()
    }

    async fn is_tracked(&self, name: &str) -> bool {
        self.folders.read().await.iter().any(|f| f.name == name)
    }

    async fn folders_with_sessions(&self) -> Vec<WorkspaceFolder> {
        let running = self.registry.folders().await;
        self.folders
            .read()
            .await
            .iter()
            .filter(|f| running.contains(&f.name))
            .cloned()
            .collect()
    }

    async fn restart_all(&self, targets: Vec<WorkspaceFolder>) -> Vec<FolderOutcome> {
        join_all(targets.into_iter().map(|folder| async move {
            let outcome = self.registry.restart_session(&folder).await;
            FolderOutcome {
                folder: folder.name,
                outcome,
            }
        }))
        .await
    }
}
