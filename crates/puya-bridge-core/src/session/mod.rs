//! Client sessions
//!
//! A [`ClientSession`] is one connection to a server process for one
//! workspace folder. It moves `Starting -> Running` when the handshake
//! succeeds and `Starting -> Stopped` when it does not; a stopped session is
//! never revived, restarts build a new one.

mod connector;

pub use connector::{LspConnection, ProcessConnector};

use crate::config::FolderSettings;
use crate::error::{BridgeError, BridgeResult};
use crate::launch::{LaunchPlan, LaunchStrategy, TransportChoice};
use crate::workspace::WorkspaceFolder;
use async_trait::async_trait;
use lsp_types::Url;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, instrument};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique, increasing session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(u64);

impl SessionId {
    fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Starting,
    Running,
    Stopped,
}

/// A live, initialized connection to a language server
#[async_trait]
pub trait ServerConnection: Send + Sync {
    /// Ask the server to exit and release the transport
    async fn shutdown(&self) -> BridgeResult<()>;

    fn is_connected(&self) -> bool;

    async fn open_document(
        &self,
        _uri: Url,
        _language_id: &str,
        _text: String,
    ) -> BridgeResult<()> {
        Ok(())
    }

    async fn close_document(&self, _uri: Url) -> BridgeResult<()> {
        Ok(())
    }

    /// New folder settings that don't need a relaunch
    async fn update_settings(&self, _settings: FolderSettings) -> BridgeResult<()> {
        Ok(())
    }

    /// Diagnostics currently reported by the server
    fn diagnostics_count(&self) -> usize {
        0
    }
}

/// Turns a launch plan into a connection
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(&self, plan: &LaunchPlan) -> BridgeResult<Arc<dyn ServerConnection>>;
}

pub struct ClientSession {
    id: SessionId,
    folder: WorkspaceFolder,
    strategy: LaunchStrategy,
    transport: TransportChoice,
    state: SessionState,
    connection: Option<Arc<dyn ServerConnection>>,
}

impl ClientSession {
    pub fn new(plan: &LaunchPlan) -> Self {
        Self {
            id: SessionId::next(),
            folder: plan.folder.clone(),
            strategy: plan.strategy.clone(),
            transport: plan.transport,
            state: SessionState::Starting,
            connection: None,
        }
    }

    /// Launch and initialize the server described by `plan`
    #[instrument(skip_all, fields(folder = %self.folder.name, session = %self.id))]
    pub async fn start(
        &mut self,
        plan: &LaunchPlan,
        connector: &dyn SessionConnector,
    ) -> BridgeResult<()> {
        if self.state != SessionState::Starting {
            return Err(BridgeError::other(format!(
                "Session {} cannot start from state {:?}",
                self.id, self.state
            )));
        }

        match connector.connect(plan).await {
            Ok(connection) => {
                self.connection = Some(connection);
                self.state = SessionState::Running;
                info!(command = %self.strategy, "Language server session running");
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Stopped;
                Err(e)
            }
        }
    }

    /// Stop the session. It is `Stopped` afterwards even if the server
    /// did not shut down cleanly.
    #[instrument(skip_all, fields(folder = %self.folder.name, session = %self.id))]
    pub async fn stop(&mut self) -> BridgeResult<()> {
        self.state = SessionState::Stopped;
        let Some(connection) = self.connection.take() else {
            return Ok(());
        };
        debug!("Stopping language server session");
        connection
            .shutdown()
            .await
            .map_err(|e| e.with_context(format!("stopping session for '{}'", self.folder.name)))
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn folder(&self) -> &WorkspaceFolder {
        &self.folder
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn strategy(&self) -> &LaunchStrategy {
        &self.strategy
    }

    /// Running with a live connection. A crashed server leaves the session
    /// `Running` but disconnected.
    pub fn is_alive(&self) -> bool {
        self.state == SessionState::Running
            && self.connection.as_ref().is_some_and(|c| c.is_connected())
    }

    pub fn connection(&self) -> Option<&Arc<dyn ServerConnection>> {
        self.connection.as_ref()
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            folder: self.folder.name.clone(),
            id: self.id,
            state: self.state,
            command: self.strategy.to_string(),
            transport: self.transport,
            connected: self.connection.as_ref().is_some_and(|c| c.is_connected()),
            diagnostics: self
                .connection
                .as_ref()
                .map(|c| c.diagnostics_count())
                .unwrap_or(0),
        }
    }
}

/// Snapshot of a registered session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub folder: String,
    pub id: SessionId,
    pub state: SessionState,
    pub command: String,
    pub transport: TransportChoice,
    pub connected: bool,
    pub diagnostics: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::environment::RuntimeEnvironment;
    use crate::launch::ServerProfile;
    use std::sync::atomic::AtomicBool;

    struct FakeConnection {
        fail_shutdown: bool,
        shut_down: AtomicBool,
    }

    #[async_trait]
    impl ServerConnection for FakeConnection {
        async fn shutdown(&self) -> BridgeResult<()> {
            self.shut_down.store(true, Ordering::SeqCst);
            if self.fail_shutdown {
                Err(BridgeError::timeout(5))
            } else {
                Ok(())
            }
        }

        fn is_connected(&self) -> bool {
            !self.shut_down.load(Ordering::SeqCst)
        }
    }

    struct FakeConnector {
        fail_connect: bool,
        fail_shutdown: bool,
    }

    #[async_trait]
    impl SessionConnector for FakeConnector {
        async fn connect(&self, _plan: &LaunchPlan) -> BridgeResult<Arc<dyn ServerConnection>> {
            if self.fail_connect {
                return Err(BridgeError::spawn("puyapy-lsp", "not found"));
            }
            Ok(Arc::new(FakeConnection {
                fail_shutdown: self.fail_shutdown,
                shut_down: AtomicBool::new(false),
            }))
        }
    }

    fn plan() -> LaunchPlan {
        LaunchPlan::new(
            &ServerProfile::python(),
            &BridgeConfig::default(),
            &WorkspaceFolder::new("app", "/w/app"),
            &RuntimeEnvironment::new("/env", "/env/bin/python"),
            LaunchStrategy::command("puyapy-lsp"),
        )
    }

    #[tokio::test]
    async fn test_start_success_runs() {
        let plan = plan();
        let mut session = ClientSession::new(&plan);
        assert_eq!(session.state(), SessionState::Starting);

        let connector = FakeConnector { fail_connect: false, fail_shutdown: false };
        session.start(&plan, &connector).await.unwrap();
        assert_eq!(session.state(), SessionState::Running);
        assert!(session.info().connected);
        assert!(session.is_alive());

        session.stop().await.unwrap();
        assert!(!session.is_alive());
    }

    #[tokio::test]
    async fn test_start_failure_stops() {
        let plan = plan();
        let mut session = ClientSession::new(&plan);
        let connector = FakeConnector { fail_connect: true, fail_shutdown: false };

        assert!(session.start(&plan, &connector).await.is_err());
        assert_eq!(session.state(), SessionState::Stopped);
        // A stopped session is never restarted in place
        assert!(session.start(&plan, &connector).await.is_err());
    }

    #[tokio::test]
    async fn test_stop_marks_stopped_even_on_error() {
        let plan = plan();
        let mut session = ClientSession::new(&plan);
        let connector = FakeConnector { fail_connect: false, fail_shutdown: true };
        session.start(&plan, &connector).await.unwrap();

        let err = session.stop().await.unwrap_err();
        assert_eq!(err.context(), Some("stopping session for 'app'"));
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(session.connection().is_none());
    }

    #[test]
    fn test_session_ids_increase() {
        let plan = plan();
        let a = ClientSession::new(&plan);
        let b = ClientSession::new(&plan);
        assert!(b.id() > a.id());
    }
}
