//! Sample Algorand Python language server
//!
//! - Flags `list(` calls, which Algorand Python does not support
//! - Offers a quick fix replacing them with `arc4.Array(`
//! - Serves two static completion items
//!
//! Speaks LSP over stdio, or over a local socket with `--listen <port>`
//! for debugging with an attached bridge.

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tower_lsp::{LspService, Server};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod backend;
mod completion;
mod diagnostics;
mod settings;

use backend::SampleBackend;

#[derive(Parser, Debug)]
#[command(name = "puya-sample-lsp", version, about = "Sample Algorand Python language server")]
struct Args {
    /// Serve one client on 127.0.0.1:<port> instead of stdio
    #[arg(long, value_name = "PORT")]
    listen: Option<u16>,

    /// Use stdio (the default; accepted for client compatibility)
    #[arg(long, conflicts_with = "listen")]
    stdio: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let (service, socket) = LspService::new(SampleBackend::new);

    match args.listen {
        Some(port) => {
            let listener = TcpListener::bind(("127.0.0.1", port))
                .await
                .with_context(|| format!("binding 127.0.0.1:{}", port))?;
            info!(port, "Waiting for a client");
            let (stream, peer) = listener.accept().await.context("accepting client")?;
            info!(%peer, "Client connected");
            let (read, write) = tokio::io::split(stream);
            Server::new(read, write, socket).serve(service).await;
        }
        None => {
            info!(explicit = args.stdio, "Serving on stdio");
            Server::new(tokio::io::stdin(), tokio::io::stdout(), socket)
                .serve(service)
                .await;
        }
    }
    Ok(())
}
