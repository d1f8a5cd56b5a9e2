//! Real connections: spawn or dial the server, then run the LSP handshake

use super::{ServerConnection, SessionConnector};
use crate::client::{ClientContext, LanguageClient};
use crate::config::FolderSettings;
use crate::error::BridgeResult;
use crate::launch::{LaunchPlan, TransportChoice};
use crate::notify::Notifier;
use crate::transport::{FramedTransport, LspTransport};
use async_trait::async_trait;
use lsp_types::Url;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Connects over the transport chosen in the plan
pub struct ProcessConnector {
    notifier: Arc<dyn Notifier>,
}

impl ProcessConnector {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl SessionConnector for ProcessConnector {
    async fn connect(&self, plan: &LaunchPlan) -> BridgeResult<Arc<dyn ServerConnection>> {
        let transport: Arc<dyn LspTransport> = match plan.transport {
            TransportChoice::Stdio => Arc::new(FramedTransport::spawn_stdio(plan).await?),
            TransportChoice::Socket { port } => {
                Arc::new(FramedTransport::connect_socket(port, plan.shutdown_timeout).await?)
            }
        };

        let context = ClientContext::new(
            plan.folder.clone(),
            plan.settings_section.clone(),
            plan.settings.clone(),
            Arc::clone(&self.notifier),
        );
        let connection = LspConnection::establish(transport, context, plan).await?;
        Ok(Arc::new(connection))
    }
}

/// An initialized [`LanguageClient`]
pub struct LspConnection {
    client: LanguageClient,
    shutdown_timeout: Duration,
}

impl LspConnection {
    /// Run the handshake over `transport`. The transport is closed when it fails.
    pub async fn establish(
        transport: Arc<dyn LspTransport>,
        context: ClientContext,
        plan: &LaunchPlan,
    ) -> BridgeResult<Self> {
        let client = LanguageClient::new(transport, context);
        if let Err(e) = client.initialize(plan).await {
            if let Err(close_err) = client.close().await {
                debug!("Error closing failed connection: {}", close_err);
            }
            return Err(e);
        }
        Ok(Self {
            client,
            shutdown_timeout: plan.shutdown_timeout,
        })
    }

    pub fn client(&self) -> &LanguageClient {
        &self.client
    }
}

#[async_trait]
impl ServerConnection for LspConnection {
    async fn shutdown(&self) -> BridgeResult<()> {
        self.client.shutdown(self.shutdown_timeout).await.inspect_err(|e| {
            warn!("Language server did not shut down cleanly: {}", e);
        })
    }

    fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    async fn open_document(&self, uri: Url, language_id: &str, text: String) -> BridgeResult<()> {
        self.client.did_open(uri, language_id, 1, text).await
    }

    async fn close_document(&self, uri: Url) -> BridgeResult<()> {
        self.client.did_close(uri).await
    }

    async fn update_settings(&self, settings: FolderSettings) -> BridgeResult<()> {
        self.client.update_settings(settings).await
    }

    fn diagnostics_count(&self) -> usize {
        self.client.context().diagnostics_total()
    }
}
