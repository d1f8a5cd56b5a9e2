//! Host server: reads editor events, drives the [`ExtensionHost`], writes
//! outcome events.
//!
//! Requests are handled on their own tasks so a slow server start for one
//! folder doesn't hold up events for another. The registry serializes
//! operations on the same folder.

use super::protocol::{
    ActivateParams, ConfigurationChangedParams, DocumentClosedParams, EnvironmentChangedParams,
    FoldersAddedParams, FoldersRemovedParams, HostEvent, HostRequest, RestartParams,
};
use puya_bridge_core::{ExtensionHost, OpenDocument, WorkspaceFolder};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Dispatches host requests to the extension host
pub struct HostServer {
    host: Arc<ExtensionHost>,
    event_tx: mpsc::UnboundedSender<HostEvent>,
}

impl HostServer {
    pub fn new(host: Arc<ExtensionHost>, event_tx: mpsc::UnboundedSender<HostEvent>) -> Self {
        Self { host, event_tx }
    }

    pub fn host(&self) -> &Arc<ExtensionHost> {
        &self.host
    }

    fn send_event(&self, event: HostEvent) {
        let _ = self.event_tx.send(event);
    }

    fn decode<T: DeserializeOwned>(&self, request: &HostRequest) -> Option<T> {
        match request.params() {
            Ok(params) => Some(params),
            Err(e) => {
                self.send_event(HostEvent::error(
                    "invalid_params",
                    format!("Invalid {} parameters: {}", request.method(), e),
                ));
                None
            }
        }
    }

    fn outcomes(&self, method: &str, results: Vec<puya_bridge_core::FolderOutcome>) {
        self.send_event(HostEvent::Outcomes {
            method: method.to_string(),
            results,
        });
    }

    fn ack(&self, method: &str) {
        self.send_event(HostEvent::Ack {
            method: method.to_string(),
        });
    }

    /// Process a single request
    pub async fn process_request(&self, request: HostRequest) {
        let method = request.method().to_string();
        debug!(method = %method, "Host request");

        match method.as_str() {
            "ping" => self.send_event(HostEvent::Pong),
            "status" => {
                let sessions = self.host.registry().session_info().await;
                self.send_event(HostEvent::Status { sessions });
            }
            "activate" => {
                if let Some(params) = self.decode::<ActivateParams>(&request) {
                    let results = self.host.activate(&params.documents).await;
                    self.outcomes(&method, results);
                }
            }
            "document_opened" => {
                if let Some(document) = self.decode::<OpenDocument>(&request) {
                    let results = self.host.on_document_opened(&document).await;
                    self.outcomes(&method, results.into_iter().collect());
                }
            }
            "document_closed" => {
                if let Some(params) = self.decode::<DocumentClosedParams>(&request) {
                    match self.host.on_document_closed(&params.path).await {
                        Ok(_) => self.ack(&method),
                        Err(e) => self.send_event(HostEvent::error(e.error_code(), e.to_string())),
                    }
                }
            }
            "folders_added" => {
                if let Some(params) = self.decode::<FoldersAddedParams>(&request) {
                    let folders: Vec<WorkspaceFolder> =
                        params.folders.into_iter().map(Into::into).collect();
                    self.host.on_folders_added(folders).await;
                    self.ack(&method);
                }
            }
            "folders_removed" => {
                if let Some(params) = self.decode::<FoldersRemovedParams>(&request) {
                    self.host.on_folders_removed(&params.names).await;
                    self.ack(&method);
                }
            }
            "environment_changed" => {
                if let Some(params) = self.decode::<EnvironmentChangedParams>(&request) {
                    let results = self
                        .host
                        .on_environment_changed(params.resource.as_deref())
                        .await;
                    self.outcomes(&method, results);
                }
            }
            "configuration_changed" => {
                if let Some(params) = self.decode::<ConfigurationChangedParams>(&request) {
                    let results = self.host.on_configuration_changed(params.config).await;
                    self.outcomes(&method, results);
                }
            }
            "restart" => {
                if let Some(params) = self.decode::<RestartParams>(&request) {
                    let results = self.host.restart_command(params.document.as_deref()).await;
                    self.outcomes(&method, results.into_iter().collect());
                }
            }
            unknown => self.send_event(HostEvent::error(
                "unknown_method",
                format!("Unknown method: {}", unknown),
            )),
        }
    }
}

/// Event writer that runs in a separate task.
///
/// Ends after the terminal event or once every sender is gone.
async fn run_event_writer<W>(mut event_rx: mpsc::UnboundedReceiver<HostEvent>, mut output: W)
where
    W: AsyncWrite + Unpin,
{
    while let Some(event) = event_rx.recv().await {
        let line = event.to_json_line();
        if output.write_all(line.as_bytes()).await.is_err() || output.flush().await.is_err() {
            warn!("Host output closed");
            break;
        }
        if event.is_terminal() {
            break;
        }
    }
    let _ = output.shutdown().await;
}

/// Why the request loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    /// `shutdown` request or end of input; in-flight requests finish first
    Graceful,
    /// Signal; in-flight requests are abandoned
    Interrupted,
}

/// Run the host loop until end of input, a `shutdown` request or
/// `interrupt` resolves. Every session is stopped before returning.
pub async fn run_host_server<R, W, I>(
    server: HostServer,
    event_rx: mpsc::UnboundedReceiver<HostEvent>,
    input: R,
    output: W,
    interrupt: I,
) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
    I: Future<Output = ()>,
{
    let server = Arc::new(server);
    let writer = tokio::spawn(run_event_writer(event_rx, output));

    let folders = server
        .host()
        .folders()
        .await
        .into_iter()
        .map(|f| f.name)
        .collect();
    server.send_event(HostEvent::Ready {
        version: env!("CARGO_PKG_VERSION").to_string(),
        profile: server.host().registry().profile().kind,
        folders,
    });

    let mut lines = BufReader::new(input).lines();
    let mut tasks = JoinSet::new();
    tokio::pin!(interrupt);

    let exit = loop {
        tokio::select! {
            _ = &mut interrupt => {
                info!("Interrupted, stopping language servers");
                break Exit::Interrupted;
            }
            // Reap finished requests so the set doesn't grow unbounded
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    warn!("Request task failed: {}", e);
                }
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match HostRequest::from_json_line(&line) {
                    Ok(request) if request.method() == "shutdown" => break Exit::Graceful,
                    Ok(request) => {
                        let server = Arc::clone(&server);
                        tasks.spawn(async move { server.process_request(request).await });
                    }
                    Err(e) => server.send_event(HostEvent::error(
                        "parse_error",
                        format!("Failed to parse request: {}", e),
                    )),
                },
                Ok(None) => {
                    debug!("Host input closed");
                    break Exit::Graceful;
                }
                Err(e) => {
                    warn!("Failed to read host input: {}", e);
                    break Exit::Graceful;
                }
            }
        }
    };

    match exit {
        Exit::Graceful => while tasks.join_next().await.is_some() {},
        Exit::Interrupted => tasks.shutdown().await,
    }

    server.host().deactivate().await;
    server.send_event(HostEvent::Stopped);
    writer.await?;
    Ok(())
}
