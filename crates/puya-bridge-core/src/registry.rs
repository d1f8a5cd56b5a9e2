//! Session registry
//!
//! Owns the mapping from workspace folder to its running [`ClientSession`].
//! Every folder key has its own async mutex (a "slot"); the slot is held
//! across the whole check, resolve, start and register sequence, so two
//! overlapping starts for one folder can never both register a session
//! while different folders proceed independently.

use crate::config::{BridgeConfig, FolderSettings};
use crate::environment::{self, EnvironmentProvider};
use crate::error::BridgeResult;
use crate::launch::{LaunchPlan, LaunchResolver, ProcessProber, ServerProfile};
use crate::notify::Notifier;
use crate::session::{
    ClientSession, ProcessConnector, SessionConnector, SessionId, SessionInfo,
};
use crate::workspace::WorkspaceFolder;
use dashmap::DashMap;
use futures::future::join_all;
use lsp_types::Url;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn};

type Slot = Arc<Mutex<Option<ClientSession>>>;

/// Result of a start or restart request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartOutcome {
    /// A session was already registered; nothing was done
    AlreadyRunning { session: SessionId },
    Started { session: SessionId },
    /// No complete runtime environment for the folder
    EnvironmentUnavailable,
    /// No launch candidate is runnable
    StrategyUnavailable,
    /// Spawn or handshake failed
    StartFailed { error: String },
}

impl StartOutcome {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::AlreadyRunning { .. } | Self::Started { .. })
    }

    pub fn session(&self) -> Option<SessionId> {
        match self {
            Self::AlreadyRunning { session } | Self::Started { session } => Some(*session),
            _ => None,
        }
    }
}

pub struct SessionRegistry {
    resolver: LaunchResolver,
    environments: Arc<dyn EnvironmentProvider>,
    connector: Arc<dyn SessionConnector>,
    notifier: Arc<dyn Notifier>,
    config: RwLock<BridgeConfig>,
    slots: DashMap<String, Slot>,
}

impl SessionRegistry {
    pub fn new(
        config: BridgeConfig,
        resolver: LaunchResolver,
        environments: Arc<dyn EnvironmentProvider>,
        connector: Arc<dyn SessionConnector>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            resolver,
            environments,
            connector,
            notifier,
            config: RwLock::new(config),
            slots: DashMap::new(),
        }
    }

    /// Registry wired to real processes for the configured profile
    pub fn with_defaults(config: BridgeConfig, notifier: Arc<dyn Notifier>) -> Self {
        let profile = ServerProfile::for_kind(config.profile);
        let prober = Arc::new(ProcessProber::new(Duration::from_secs(
            config.probe_timeout_secs,
        )));
        let environments = environment::provider_for(config.profile);
        let connector = Arc::new(ProcessConnector::new(Arc::clone(&notifier)));

        Self::new(
            config,
            LaunchResolver::new(profile, prober),
            environments,
            connector,
            notifier,
        )
    }

    pub fn profile(&self) -> &ServerProfile {
        self.resolver.profile()
    }

    pub async fn config(&self) -> BridgeConfig {
        self.config.read().await.clone()
    }

    /// Replace the configuration used by later starts
    pub async fn set_config(&self, config: BridgeConfig) {
        *self.config.write().await = config;
    }

    /// Start a session for `folder` unless a live one is already registered.
    ///
    /// A registered session whose server went away is replaced.
    #[instrument(skip(self), fields(folder = %folder.name))]
    pub async fn start_session(&self, folder: &WorkspaceFolder) -> StartOutcome {
        let slot = self.slot(folder.key());
        let outcome = {
            let mut guard = slot.lock().await;
            if let Some(existing) = guard.as_ref().filter(|s| s.is_alive()) {
                debug!(session = %existing.id(), "Session already running");
                StartOutcome::AlreadyRunning {
                    session: existing.id(),
                }
            } else {
                if let Some(mut lost) = guard.take() {
                    warn!(session = %lost.id(), "Language server connection lost; relaunching");
                    if let Err(e) = lost.stop().await {
                        debug!("Error stopping lost session: {}", e);
                    }
                }
                self.start_locked(folder, &mut guard).await
            }
        };
        drop(slot);
        self.prune(folder.key());
        outcome
    }

    /// Stop the folder's session if there is one, then start a fresh one
    #[instrument(skip(self), fields(folder = %folder.name))]
    pub async fn restart_session(&self, folder: &WorkspaceFolder) -> StartOutcome {
        let slot = self.slot(folder.key());
        let outcome = {
            let mut guard = slot.lock().await;
            if let Some(mut old) = guard.take() {
                info!(session = %old.id(), "Stopping session for restart");
                if let Err(e) = old.stop().await {
                    warn!("Error stopping previous session: {}", e);
                }
            }
            self.start_locked(folder, &mut guard).await
        };
        drop(slot);
        self.prune(folder.key());
        outcome
    }

    /// Stop and deregister the folder's session. Returns whether one existed.
    #[instrument(skip(self), fields(folder = %name))]
    pub async fn remove_folder(&self, name: &str) -> bool {
        let Some(slot) = self.existing_slot(name) else {
            return false;
        };
        let removed = Self::stop_slot(name, &slot).await;
        drop(slot);
        self.prune(name);
        removed
    }

    /// Stop every registered session concurrently and empty the registry.
    ///
    /// A failing stop is logged and does not prevent the others.
    #[instrument(skip(self))]
    pub async fn stop_all(&self) {
        let slots: Vec<(String, Slot)> = self
            .slots
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();

        let stopped = join_all(
            slots
                .iter()
                .map(|(name, slot)| Self::stop_slot(name, slot)),
        )
        .await
        .into_iter()
        .filter(|stopped| *stopped)
        .count();

        let names: Vec<String> = slots.into_iter().map(|(name, _)| name).collect();
        for name in &names {
            self.prune(name);
        }
        info!(stopped, "All language server sessions stopped");
    }

    /// Forward an opened document to the folder's running server
    pub async fn open_document(
        &self,
        folder: &str,
        uri: Url,
        language_id: &str,
        text: String,
    ) -> BridgeResult<bool> {
        let Some(slot) = self.existing_slot(folder) else {
            return Ok(false);
        };
        let guard = slot.lock().await;
        match guard.as_ref().and_then(|s| s.connection()) {
            Some(connection) => {
                connection.open_document(uri, language_id, text).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn close_document(&self, folder: &str, uri: Url) -> BridgeResult<bool> {
        let Some(slot) = self.existing_slot(folder) else {
            return Ok(false);
        };
        let guard = slot.lock().await;
        match guard.as_ref().and_then(|s| s.connection()) {
            Some(connection) => {
                connection.close_document(uri).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Hand new settings to the folder's running server
    pub async fn update_settings(
        &self,
        folder: &str,
        settings: FolderSettings,
    ) -> BridgeResult<bool> {
        let Some(slot) = self.existing_slot(folder) else {
            return Ok(false);
        };
        let guard = slot.lock().await;
        match guard.as_ref().and_then(|s| s.connection()) {
            Some(connection) => {
                connection.update_settings(settings).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn contains(&self, name: &str) -> bool {
        match self.existing_slot(name) {
            Some(slot) => slot.lock().await.is_some(),
            None => false,
        }
    }

    /// Names of folders with a registered session, sorted
    pub async fn folders(&self) -> Vec<String> {
        self.session_info()
            .await
            .into_iter()
            .map(|info| info.folder)
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.session_info().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of every registered session, sorted by folder
    pub async fn session_info(&self) -> Vec<SessionInfo> {
        let slots: Vec<Slot> = self.slots.iter().map(|e| Arc::clone(e.value())).collect();
        let mut infos = Vec::with_capacity(slots.len());
        for slot in slots {
            if let Some(session) = slot.lock().await.as_ref() {
                infos.push(session.info());
            }
        }
        infos.sort_by(|a, b| a.folder.cmp(&b.folder));
        infos
    }

    /// Resolve, launch and register. Caller holds the folder's slot.
    async fn start_locked(
        &self,
        folder: &WorkspaceFolder,
        slot: &mut Option<ClientSession>,
    ) -> StartOutcome {
        let profile = self.resolver.profile();

        let environment = match self.environments.resolve(folder).await {
            Some(env) if env.is_complete() => env,
            _ => {
                info!("No active runtime environment; not starting a language server");
                return StartOutcome::EnvironmentUnavailable;
            }
        };

        let config = self.config.read().await.clone();
        let settings = config.settings_for(&folder.name);

        let Some(strategy) = self
            .resolver
            .resolve(folder, &environment, settings.override_path())
            .await
        else {
            warn!("No runnable language server candidate");
            self.notifier.error(&format!(
                "{} is not installed or not available in the current environment.",
                profile.display_name
            ));
            return StartOutcome::StrategyUnavailable;
        };

        let plan = LaunchPlan::new(profile, &config, folder, &environment, strategy);
        let mut session = ClientSession::new(&plan);

        match session.start(&plan, self.connector.as_ref()).await {
            Ok(()) => {
                let id = session.id();
                *slot = Some(session);
                info!(session = %id, "Language server session registered");
                StartOutcome::Started { session: id }
            }
            Err(e) => {
                error!("Failed to start language server: {}", e);
                self.notifier
                    .error(&format!("Failed to start the {}.", profile.display_name));
                StartOutcome::StartFailed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Take and stop the slot's session. The slot is empty afterwards.
    async fn stop_slot(name: &str, slot: &Slot) -> bool {
        let mut guard = slot.lock().await;
        let Some(mut session) = guard.take() else {
            return false;
        };
        if let Err(e) = session.stop().await {
            error!(folder = %name, "Error stopping language server session: {}", e);
        }
        true
    }

    fn slot(&self, name: &str) -> Slot {
        Arc::clone(self.slots.entry(name.to_string()).or_default().value())
    }

    fn existing_slot(&self, name: &str) -> Option<Slot> {
        self.slots.get(name).map(|s| Arc::clone(s.value()))
    }

    /// Drop an empty slot nobody else is holding
    fn prune(&self, name: &str) {
        self.slots.remove_if(name, |_, slot| {
            Arc::strong_count(slot) == 1 && slot.try_lock().is_ok_and(|s| s.is_none())
        });
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.slots.len()
    }
}
