//! Fakes for the registry's capability traits

#![allow(dead_code)]

use async_trait::async_trait;
use puya_bridge_core::error::{BridgeError, BridgeResult};
use puya_bridge_core::launch::{
    CommandProber, LaunchPlan, LaunchResolver, ProbeCommand, ServerProfile,
};
use puya_bridge_core::notify::RecordingNotifier;
use puya_bridge_core::session::{ServerConnection, SessionConnector};
use puya_bridge_core::{
    BridgeConfig, EnvironmentProvider, FolderSettings, RuntimeEnvironment, SessionRegistry,
    WorkspaceFolder,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Environment provider answering after an optional delay
pub struct FakeEnvironment {
    pub environment: Mutex<Option<RuntimeEnvironment>>,
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl FakeEnvironment {
    pub fn python() -> Arc<Self> {
        Self::with(Some(RuntimeEnvironment::new("/env", "/env/bin/python")), Duration::ZERO)
    }

    pub fn with(environment: Option<RuntimeEnvironment>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            environment: Mutex::new(environment),
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set(&self, environment: Option<RuntimeEnvironment>) {
        *self.environment.lock().unwrap() = environment;
    }
}

#[async_trait]
impl EnvironmentProvider for FakeEnvironment {
    async fn resolve(&self, _folder: &WorkspaceFolder) -> Option<RuntimeEnvironment> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.environment.lock().unwrap().clone()
    }
}

/// Succeeds for programs in `runnable`, records every probe
pub struct FakeProber {
    runnable: Mutex<Vec<String>>,
    calls: Mutex<Vec<ProbeCommand>>,
}

impl FakeProber {
    pub fn new(runnable: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            runnable: Mutex::new(runnable.iter().map(|s| s.to_string()).collect()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<ProbeCommand> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_runnable(&self, runnable: &[&str]) {
        *self.runnable.lock().unwrap() = runnable.iter().map(|s| s.to_string()).collect();
    }
}

#[async_trait]
impl CommandProber for FakeProber {
    async fn probe(&self, command: &ProbeCommand) -> bool {
        self.calls.lock().unwrap().push(command.clone());
        self.runnable.lock().unwrap().contains(&command.program)
    }
}

/// Connector recording what happened, in order
#[derive(Default)]
pub struct FakeConnector {
    pub plans: Mutex<Vec<LaunchPlan>>,
    /// "connect:<folder>", "stop:<folder>" and "settings:<folder>:<max>" entries
    pub events: Arc<Mutex<Vec<String>>>,
    connections: Mutex<Vec<Arc<FakeConnection>>>,
    pub fail_connect: AtomicBool,
    /// Folders whose shutdown returns an error
    pub failing_shutdown: Mutex<HashSet<String>>,
    pub connect_delay: Mutex<Duration>,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn connects(&self) -> usize {
        self.plans.lock().unwrap().len()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn last_plan(&self) -> Option<LaunchPlan> {
        self.plans.lock().unwrap().last().cloned()
    }

    /// Drop the newest connection for `folder` as if its server died
    pub fn crash(&self, folder: &str) {
        let connections = self.connections.lock().unwrap();
        if let Some(connection) = connections.iter().rev().find(|c| c.folder == folder) {
            connection.closed.store(true, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl SessionConnector for FakeConnector {
    async fn connect(&self, plan: &LaunchPlan) -> BridgeResult<Arc<dyn ServerConnection>> {
        let delay = *self.connect_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.plans.lock().unwrap().push(plan.clone());
        self.events
            .lock()
            .unwrap()
            .push(format!("connect:{}", plan.folder.name));

        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(BridgeError::spawn(
                plan.strategy.command.clone(),
                "No such file or directory",
            ));
        }

        let fail_shutdown = self
            .failing_shutdown
            .lock()
            .unwrap()
            .contains(&plan.folder.name);
        let connection = Arc::new(FakeConnection {
            folder: plan.folder.name.clone(),
            events: Arc::clone(&self.events),
            fail_shutdown,
            closed: AtomicBool::new(false),
        });
        self.connections.lock().unwrap().push(Arc::clone(&connection));
        Ok(connection)
    }
}

pub struct FakeConnection {
    folder: String,
    events: Arc<Mutex<Vec<String>>>,
    fail_shutdown: bool,
    closed: AtomicBool,
}

#[async_trait]
impl ServerConnection for FakeConnection {
    async fn shutdown(&self) -> BridgeResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.events.lock().unwrap().push(format!("stop:{}", self.folder));
        if self.fail_shutdown {
            Err(BridgeError::timeout(5))
        } else {
            Ok(())
        }
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    async fn update_settings(&self, settings: FolderSettings) -> BridgeResult<()> {
        self.events.lock().unwrap().push(format!(
            "settings:{}:{}",
            self.folder,
            settings.max_problems()
        ));
        Ok(())
    }
}

pub struct Harness {
    pub registry: Arc<SessionRegistry>,
    pub environment: Arc<FakeEnvironment>,
    pub prober: Arc<FakeProber>,
    pub connector: Arc<FakeConnector>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new(
        config: BridgeConfig,
        environment: Arc<FakeEnvironment>,
        prober: Arc<FakeProber>,
    ) -> Self {
        let connector = FakeConnector::new();
        let notifier = Arc::new(RecordingNotifier::new());
        let registry = Arc::new(SessionRegistry::new(
            config,
            LaunchResolver::new(ServerProfile::python(), prober.clone()),
            environment.clone(),
            connector.clone(),
            notifier.clone(),
        ));
        Self {
            registry,
            environment,
            prober,
            connector,
            notifier,
        }
    }

    /// Python profile where the module candidate is runnable
    pub fn python() -> Self {
        Self::new(
            BridgeConfig::default(),
            FakeEnvironment::python(),
            FakeProber::new(&["/env/bin/python", "puyapy-lsp"]),
        )
    }
}

pub fn folder(name: &str) -> WorkspaceFolder {
    WorkspaceFolder::new(name, format!("/work/{}", name))
}
