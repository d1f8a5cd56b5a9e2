//! Language client for one workspace folder
//!
//! # Features
//! - `initialize` handshake scoped to the folder
//! - Concurrent requests with per-request timeout
//! - Answers the server's own requests (`workspace/configuration` and friends)
//! - Pushes settings changes with `workspace/didChangeConfiguration`
//! - Graceful `shutdown` + `exit` with a bounded wait

mod handlers;
mod receiver;

pub use handlers::ClientContext;

use crate::config::FolderSettings;
use crate::error::{BridgeError, BridgeResult};
use crate::launch::LaunchPlan;
use crate::protocol::{LspMessage, LspNotification, LspRequest, RequestId, methods};
use crate::transport::LspTransport;
use lsp_types::{
    ClientCapabilities, ClientInfo, DidChangeConfigurationParams, DidCloseTextDocumentParams,
    DidOpenTextDocumentParams, InitializeParams, InitializeResult,
    PublishDiagnosticsClientCapabilities, ServerInfo, TextDocumentClientCapabilities,
    TextDocumentIdentifier, TextDocumentItem, Url, WindowClientCapabilities,
    WorkspaceClientCapabilities,
};
use receiver::PendingRequests;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{RwLock, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

pub struct LanguageClient {
    transport: Arc<dyn LspTransport>,
    context: Arc<ClientContext>,
    pending: PendingRequests,
    request_id: AtomicI64,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
    server_info: RwLock<Option<ServerInfo>>,
    initialized: AtomicBool,
    receiver_handle: Mutex<Option<JoinHandle<()>>>,
}

impl LanguageClient {
    pub fn new(transport: Arc<dyn LspTransport>, context: ClientContext) -> Self {
        let context = Arc::new(context);
        let pending: PendingRequests = Arc::new(Mutex::new(HashMap::new()));
        let running = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();

        let receiver_handle = tokio::spawn(receiver::message_receiver(
            Arc::clone(&transport),
            Arc::clone(&context),
            Arc::clone(&pending),
            Arc::clone(&running),
            cancel.clone(),
        ));

        Self {
            transport,
            context,
            pending,
            request_id: AtomicI64::new(1),
            running,
            cancel,
            server_info: RwLock::new(None),
            initialized: AtomicBool::new(false),
            receiver_handle: Mutex::new(Some(receiver_handle)),
        }
    }

    pub fn context(&self) -> &ClientContext {
        &self.context
    }

    /// Perform the `initialize` / `initialized` handshake for the plan's folder
    #[instrument(skip(self, plan), fields(folder = %plan.folder.name), level = "debug")]
    pub async fn initialize(&self, plan: &LaunchPlan) -> BridgeResult<InitializeResult> {
        if self.initialized.load(Ordering::SeqCst) {
            return Err(BridgeError::protocol("Client already initialized"));
        }

        let root_uri = plan.folder.uri();
        let workspace_folders = root_uri.clone().map(|uri| {
            vec![lsp_types::WorkspaceFolder {
                uri,
                name: plan.folder.name.clone(),
            }]
        });

        #[allow(deprecated)]
        let params = InitializeParams {
            process_id: Some(std::process::id()),
            root_uri,
            initialization_options: plan.initialization_options.clone(),
            capabilities: client_capabilities(),
            workspace_folders,
            client_info: Some(ClientInfo {
                name: plan.client_name.clone(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            ..Default::default()
        };

        let result: InitializeResult = self
            .call_with_timeout(
                methods::INITIALIZE,
                Some(serde_json::to_value(params)?),
                plan.startup_timeout,
            )
            .await
            .map_err(|e| e.with_context(format!("initializing {}", plan.client_id)))?;

        *self.server_info.write().await = result.server_info.clone();
        self.notify(methods::INITIALIZED, Some(serde_json::json!({})))
            .await?;
        self.initialized.store(true, Ordering::SeqCst);

        debug!(
            server = ?result.server_info.as_ref().map(|i| i.name.as_str()),
            "Language server initialized"
        );
        Ok(result)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub async fn server_info(&self) -> Option<ServerInfo> {
        self.server_info.read().await.clone()
    }

    pub async fn did_open(
        &self,
        uri: Url,
        language_id: &str,
        version: i32,
        text: String,
    ) -> BridgeResult<()> {
        let params = DidOpenTextDocumentParams {
            text_document: TextDocumentItem {
                uri,
                language_id: language_id.to_string(),
                version,
                text,
            },
        };
        self.notify(methods::DID_OPEN, Some(serde_json::to_value(params)?))
            .await
    }

    pub async fn did_close(&self, uri: Url) -> BridgeResult<()> {
        let params = DidCloseTextDocumentParams {
            text_document: TextDocumentIdentifier { uri },
        };
        self.notify(methods::DID_CLOSE, Some(serde_json::to_value(params)?))
            .await
    }

    /// Swap the folder settings and tell the server they changed
    pub async fn update_settings(&self, settings: FolderSettings) -> BridgeResult<()> {
        self.context.set_settings(settings);
        self.did_change_configuration(self.context.change_payload())
            .await
    }

    pub async fn did_change_configuration(&self, settings: Value) -> BridgeResult<()> {
        let params = DidChangeConfigurationParams { settings };
        self.notify(
            methods::DID_CHANGE_CONFIGURATION,
            Some(serde_json::to_value(params)?),
        )
        .await
    }

    /// `shutdown` request then `exit` notification, each bounded by `limit`.
    ///
    /// The transport is closed afterwards whether or not the server answered.
    #[instrument(skip(self), fields(folder = %self.context.folder.name), level = "debug")]
    pub async fn shutdown(&self, limit: Duration) -> BridgeResult<()> {
        let result = if self.running.load(Ordering::SeqCst) {
            match self
                .call_with_timeout::<Value>(methods::SHUTDOWN, None, limit)
                .await
            {
                Ok(_) => self.notify(methods::EXIT, None).await,
                Err(e) => Err(e),
            }
        } else {
            Err(BridgeError::NotRunning)
        };

        self.close().await?;
        result
    }

    /// Stop the receiver and close the transport
    pub async fn close(&self) -> BridgeResult<()> {
        self.running.store(false, Ordering::SeqCst);
        self.cancel.cancel();

        self.transport.close().await?;

        let handle = {
            let mut guard = self
                .receiver_handle
                .lock()
                .map_err(|_| BridgeError::other("receiver handle lock poisoned"))?;
            guard.take()
        };
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        self.initialized.store(false, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.running.load(Ordering::SeqCst) && self.transport.is_connected()
    }

    async fn call_with_timeout<T>(
        &self,
        method: &str,
        params: Option<Value>,
        limit: Duration,
    ) -> BridgeResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let id = RequestId::Number(self.request_id.fetch_add(1, Ordering::SeqCst));

        let mut request = LspRequest::new(id.clone(), method);
        if let Some(p) = params {
            request = request.with_params(p);
        }

        let (response_sender, response_receiver) = oneshot::channel();
        self.pending
            .lock()
            .map_err(|_| BridgeError::other("pending request lock poisoned"))?
            .insert(id.clone(), response_sender);

        if let Err(e) = self.transport.send(LspMessage::Request(request)).await {
            self.forget(&id);
            return Err(e);
        }

        let response = match timeout(limit, response_receiver).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                return Err(BridgeError::transport("Connection closed before response")
                    .with_context(method.to_string()));
            }
            Err(_) => {
                self.forget(&id);
                return Err(BridgeError::timeout(limit.as_secs()).with_context(method.to_string()));
            }
        };

        match response.into_result() {
            Ok(value) => serde_json::from_value(value).map_err(BridgeError::from),
            Err(e) => Err(BridgeError::server(e.code, e.message)),
        }
    }

    /// Send a notification (no response expected)
    pub async fn notify(&self, method: &str, params: Option<Value>) -> BridgeResult<()> {
        let mut notification = LspNotification::new(method);
        if let Some(p) = params {
            notification = notification.with_params(p);
        }
        self.transport
            .send(LspMessage::Notification(notification))
            .await
    }

    fn forget(&self, id: &RequestId) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(id);
        }
    }
}

impl Drop for LanguageClient {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.cancel.cancel();
        if let Ok(mut guard) = self.receiver_handle.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

fn client_capabilities() -> ClientCapabilities {
    ClientCapabilities {
        workspace: Some(WorkspaceClientCapabilities {
            configuration: Some(true),
            workspace_folders: Some(true),
            ..Default::default()
        }),
        text_document: Some(TextDocumentClientCapabilities {
            publish_diagnostics: Some(PublishDiagnosticsClientCapabilities::default()),
            ..Default::default()
        }),
        window: Some(WindowClientCapabilities {
            work_done_progress: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_advertise_configuration() {
        let caps = client_capabilities();
        let json = serde_json::to_value(&caps).unwrap();
        assert_eq!(json["workspace"]["configuration"], true);
        assert_eq!(json["workspace"]["workspaceFolders"], true);
        assert!(json["textDocument"]["publishDiagnostics"].is_object());
    }
}
