//! JSON-Lines host protocol
//!
//! ```text
//! ┌─────────────────┐    stdin (JSON-Lines)    ┌──────────────────┐
//! │  Editor shim    │ ──────────────────────► │  puya-bridge     │
//! │  (host events)  │                          │  (session owner) │
//! │                 │ ◄────────────────────── │                  │
//! └─────────────────┘    stdout (JSON-Lines)   └──────────────────┘
//! ```
//!
//! - **Requests** (stdin): `activate`, `document_opened`, `document_closed`,
//!   `folders_added`, `folders_removed`, `environment_changed`,
//!   `configuration_changed`, `restart`, `status`, `ping`, `shutdown`
//! - **Events** (stdout): `ready`, `outcomes`, `ack`, `message`, `status`,
//!   `pong`, `error`, `stopped`

pub mod notifier;
pub mod protocol;
pub mod server;

pub use notifier::ChannelNotifier;
pub use server::{HostServer, run_host_server};
