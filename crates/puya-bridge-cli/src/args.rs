//! CLI argument definitions using clap
//!
//! - puya-bridge serve --folder <path>...   # JSON-Lines host loop on stdio
//! - puya-bridge resolve <folder>           # Print the launch strategy
//! - puya-bridge config show|init           # Configuration utilities

use clap::{Parser, Subcommand};
use puya_bridge_core::ProfileKind;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "puya-bridge")]
#[command(about = "Per-folder language server sessions for Algorand Python and TypeScript")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (JSON or TOML)
    #[arg(long, global = true, env = "PUYA_BRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Server family to manage
    #[arg(long, global = true)]
    pub profile: Option<ProfileKind>,

    /// Connect to a server already listening on this local port
    #[arg(long, global = true)]
    pub debug_port: Option<u16>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve editor events from stdin, write outcomes to stdout
    #[command(verbatim_doc_comment)]
    Serve {
        /// Workspace folder; repeat for multi-root workspaces
        #[arg(long = "folder", value_name = "PATH")]
        folders: Vec<PathBuf>,
    },

    /// Resolve how the server would be launched for a folder
    #[command(verbatim_doc_comment)]
    Resolve {
        /// Workspace folder to resolve for
        folder: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration files
    #[command(verbatim_doc_comment)]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Display the effective configuration
    Show,

    /// Create a new configuration file with defaults
    Init {
        /// Path for the new configuration file
        #[arg(default_value = "puya-bridge.json")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
