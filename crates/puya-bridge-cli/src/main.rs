//! puya-bridge command line host
//!
//! `serve` runs the JSON-Lines host loop an editor shim talks to;
//! `resolve` and `config` are one-shot utilities.

#![allow(clippy::module_name_repetitions)]

mod args;
mod commands;
mod console;
mod ipc;
mod logging;
mod router;
mod signal_handler;

use args::Cli;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    router::route(cli).await
}
