//! Core of puya-bridge
//!
//! Manages one language server session per workspace folder:
//! - [`launch`] decides how a server is started (user override, then probed
//!   candidates)
//! - [`registry`] keeps at most one session per folder and serializes
//!   start, restart and stop per folder
//! - [`client`], [`transport`] and [`protocol`] speak LSP to the server over
//!   stdio or a debug socket
//! - [`host`] maps editor events onto registry operations

pub mod client;
pub mod config;
pub mod environment;
pub mod error;
pub mod host;
pub mod launch;
pub mod notify;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod transport;
pub mod workspace;

pub use config::{BridgeConfig, FolderSettings, ProfileKind};
pub use environment::{
    EnvironmentProvider, PythonEnvironmentProvider, RuntimeEnvironment, StaticEnvironmentProvider,
    provider_for,
};
pub use error::{BridgeError, BridgeResult};
pub use host::{ExtensionHost, FolderOutcome, OpenDocument};
pub use launch::{
    CommandProber, LaunchPlan, LaunchResolver, LaunchStrategy, ProbeCommand, ProcessProber,
    ServerProfile, TransportChoice,
};
pub use notify::{Notifier, Severity, TracingNotifier};
pub use registry::{SessionRegistry, StartOutcome};
pub use session::{
    ServerConnection, SessionConnector, SessionId, SessionInfo, SessionState,
};
pub use workspace::WorkspaceFolder;
