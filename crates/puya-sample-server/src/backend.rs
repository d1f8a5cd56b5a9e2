//! LSP backend for the sample Algorand Python server

use crate::completion;
use crate::diagnostics;
use crate::settings::{SECTION, ServerSettings, SettingsCache};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};
use tracing::{debug, warn};

pub struct SampleBackend {
    /// LSP client for sending notifications
    client: Client,
    /// Open documents, full text
    documents: DashMap<Url, String>,
    settings: SettingsCache,
    has_configuration_capability: AtomicBool,
    has_workspace_folder_capability: AtomicBool,
}

impl SampleBackend {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            documents: DashMap::new(),
            settings: SettingsCache::new(),
            has_configuration_capability: AtomicBool::new(false),
            has_workspace_folder_capability: AtomicBool::new(false),
        }
    }

    fn pulls_configuration(&self) -> bool {
        self.has_configuration_capability.load(Ordering::Relaxed)
    }

    /// Settings for a document, asking the client on a cache miss
    async fn document_settings(&self, uri: &Url) -> ServerSettings {
        if !self.pulls_configuration() {
            return self.settings.global();
        }
        if let Some(cached) = self.settings.get(uri) {
            return cached;
        }

        let item = ConfigurationItem {
            scope_uri: Some(uri.clone()),
            section: Some(SECTION.to_string()),
        };
        let settings = match self.client.configuration(vec![item]).await {
            Ok(values) => ServerSettings::from_value(values.first()),
            Err(e) => {
                warn!("workspace/configuration failed: {}", e);
                ServerSettings::default()
            }
        };
        self.settings.insert(uri.clone(), settings);
        settings
    }

    async fn validate_and_publish(&self, uri: Url, version: Option<i32>) {
        let Some(text) = self.documents.get(&uri).map(|t| t.clone()) else {
            return;
        };
        let settings = self.document_settings(&uri).await;
        let diagnostics = diagnostics::validate(&text, settings.max_number_of_problems);
        debug!(uri = %uri, count = diagnostics.len(), "Publishing diagnostics");
        self.client.publish_diagnostics(uri, diagnostics, version).await;
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for SampleBackend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let workspace = params.capabilities.workspace.as_ref();
        let configuration = workspace.and_then(|w| w.configuration).unwrap_or(false);
        let workspace_folders = workspace.and_then(|w| w.workspace_folders).unwrap_or(false);
        self.has_configuration_capability
            .store(configuration, Ordering::Relaxed);
        self.has_workspace_folder_capability
            .store(workspace_folders, Ordering::Relaxed);

        let workspace = workspace_folders.then(|| WorkspaceServerCapabilities {
            workspace_folders: Some(WorkspaceFoldersServerCapabilities {
                supported: Some(true),
                change_notifications: None,
            }),
            file_operations: None,
        });

        Ok(InitializeResult {
            server_info: Some(ServerInfo {
                name: "puya-sample-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                completion_provider: Some(CompletionOptions {
                    resolve_provider: Some(true),
                    ..Default::default()
                }),
                code_action_provider: Some(CodeActionProviderCapability::Options(
                    CodeActionOptions {
                        code_action_kinds: Some(vec![CodeActionKind::QUICKFIX]),
                        resolve_provider: Some(false),
                        ..Default::default()
                    },
                )),
                workspace,
                ..Default::default()
            },
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        if self.pulls_configuration() {
            let registration = Registration {
                id: "puya-sample-configuration".to_string(),
                method: "workspace/didChangeConfiguration".to_string(),
                register_options: None,
            };
            if let Err(e) = self.client.register_capability(vec![registration]).await {
                warn!("Failed to register for configuration changes: {}", e);
            }
        }
        self.client
            .log_message(MessageType::INFO, "Algorand Python sample server initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let document = params.text_document;
        self.documents.insert(document.uri.clone(), document.text);
        self.validate_and_publish(document.uri, Some(document.version))
            .await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        // Full sync: the last change holds the whole document
        let Some(change) = params.content_changes.into_iter().last() else {
            return;
        };
        self.documents.insert(uri.clone(), change.text);
        self.validate_and_publish(uri, Some(params.text_document.version))
            .await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.documents.remove(&uri);
        self.settings.remove(&uri);
        self.client.publish_diagnostics(uri, vec![], None).await;
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        if self.pulls_configuration() {
            self.settings.clear();
        } else {
            self.settings
                .set_global(ServerSettings::from_change(&params.settings));
        }

        // maxNumberOfProblems may have changed
        let open: Vec<Url> = self.documents.iter().map(|e| e.key().clone()).collect();
        for uri in open {
            self.validate_and_publish(uri, None).await;
        }
    }

    async fn did_change_workspace_folders(&self, _params: DidChangeWorkspaceFoldersParams) {
        if self.has_workspace_folder_capability.load(Ordering::Relaxed) {
            self.client
                .log_message(MessageType::LOG, "Workspace folder change event received.")
                .await;
        }
    }

    async fn did_change_watched_files(&self, _params: DidChangeWatchedFilesParams) {
        self.client
            .log_message(MessageType::LOG, "We received a file change event")
            .await;
    }

    async fn completion(&self, _params: CompletionParams) -> Result<Option<CompletionResponse>> {
        Ok(Some(CompletionResponse::Array(completion::items())))
    }

    async fn completion_resolve(&self, item: CompletionItem) -> Result<CompletionItem> {
        Ok(completion::resolve(item))
    }

    async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        let uri = params.text_document.uri;
        if !self.documents.contains_key(&uri) {
            return Ok(Some(Vec::new()));
        }
        Ok(Some(diagnostics::quick_fixes(
            &uri,
            &params.context.diagnostics,
        )))
    }
}
