//! Bridge configuration
//!
//! Configuration is read from a JSON or TOML file (chosen by extension) and
//! then overlaid with `PUYA_BRIDGE_*` environment variables.

mod loader;
mod model;

pub use loader::{load_config, load_from_env, load_from_file};
pub use model::{
    BridgeConfig, DEFAULT_DEBUG_PORT, FolderSettings, LoggingConfig, ProfileKind,
};
