//! Handling of server-initiated requests and notifications

use crate::config::FolderSettings;
use crate::notify::{Notifier, Severity};
use crate::protocol::{LspNotification, LspRequest, LspResponse, RpcError, methods};
use crate::workspace::WorkspaceFolder;
use dashmap::DashMap;
use lsp_types::{
    ConfigurationParams, LogMessageParams, MessageType, PublishDiagnosticsParams,
    ShowMessageParams, ShowMessageRequestParams, Url,
};
use serde_json::{Value, json};
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info, trace, warn};

/// What the client knows about the folder it serves
pub struct ClientContext {
    pub folder: WorkspaceFolder,
    /// Section name the server asks for via `workspace/configuration`
    pub settings_section: String,
    settings: RwLock<FolderSettings>,
    pub notifier: Arc<dyn Notifier>,
    /// Diagnostic count per document, from `publishDiagnostics`
    pub diagnostics: DashMap<Url, usize>,
}

impl ClientContext {
    pub fn new(
        folder: WorkspaceFolder,
        settings_section: impl Into<String>,
        settings: FolderSettings,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            folder,
            settings_section: settings_section.into(),
            settings: RwLock::new(settings),
            notifier,
            diagnostics: DashMap::new(),
        }
    }

    pub fn settings(&self) -> FolderSettings {
        self.settings
            .read()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Replace the settings served to later `workspace/configuration` requests
    pub fn set_settings(&self, settings: FolderSettings) {
        if let Ok(mut current) = self.settings.write() {
            *current = settings;
        }
    }

    /// The `settings` payload of `workspace/didChangeConfiguration`
    pub fn change_payload(&self) -> Value {
        let mut payload = serde_json::Map::new();
        payload.insert(
            self.settings_section.clone(),
            self.settings().to_server_settings(),
        );
        Value::Object(payload)
    }

    /// Answer a request sent by the server
    pub fn handle_request(&self, request: LspRequest) -> LspResponse {
        let id = request.id.clone();
        debug!(folder = %self.folder.name, method = %request.method, "Server request");

        match request.method.as_str() {
            methods::WORKSPACE_CONFIGURATION => {
                match serde_json::from_value::<ConfigurationParams>(
                    request.params.unwrap_or(Value::Null),
                ) {
                    Ok(params) => LspResponse::success(id, self.configuration(&params)),
                    Err(e) => LspResponse::error(
                        id,
                        RpcError::new(
                            crate::protocol::error_codes::INVALID_REQUEST,
                            format!("Invalid configuration params: {}", e),
                        ),
                    ),
                }
            }
            methods::WORKSPACE_FOLDERS => {
                let folders = match self.folder.uri() {
                    Some(uri) => json!([{ "uri": uri, "name": self.folder.name }]),
                    None => Value::Null,
                };
                LspResponse::success(id, folders)
            }
            methods::SHOW_MESSAGE_REQUEST => {
                if let Some(params) = request
                    .params
                    .and_then(|p| serde_json::from_value::<ShowMessageRequestParams>(p).ok())
                {
                    self.notifier
                        .notify(severity_of(params.typ), &params.message);
                }
                LspResponse::success(id, Value::Null)
            }
            methods::REGISTER_CAPABILITY
            | methods::UNREGISTER_CAPABILITY
            | methods::WORK_DONE_PROGRESS_CREATE
            | methods::DIAGNOSTIC_REFRESH => LspResponse::success(id, Value::Null),
            other => {
                warn!(folder = %self.folder.name, method = other, "Unhandled server request");
                LspResponse::error(id, RpcError::method_not_found(other))
            }
        }
    }

    /// Values for each requested configuration item, in order
    fn configuration(&self, params: &ConfigurationParams) -> Value {
        let settings = self.settings().to_server_settings();
        let items = params
            .items
            .iter()
            .map(|item| match item.section.as_deref() {
                None => {
                    let mut scoped = serde_json::Map::new();
                    scoped.insert(self.settings_section.clone(), settings.clone());
                    Value::Object(scoped)
                }
                Some(section) if section == self.settings_section => settings.clone(),
                Some(section) => section
                    .strip_prefix(self.settings_section.as_str())
                    .and_then(|rest| rest.strip_prefix('.'))
                    .and_then(|key| settings.get(key).cloned())
                    .unwrap_or(Value::Null),
            })
            .collect();
        Value::Array(items)
    }

    pub fn handle_notification(&self, notification: LspNotification) {
        let folder = self.folder.name.as_str();
        let params = notification.params.unwrap_or(Value::Null);

        match notification.method.as_str() {
            methods::LOG_MESSAGE => match serde_json::from_value::<LogMessageParams>(params) {
                Ok(p) if p.typ == MessageType::ERROR => error!(folder, "{}", p.message),
                Ok(p) if p.typ == MessageType::WARNING => warn!(folder, "{}", p.message),
                Ok(p) if p.typ == MessageType::INFO => info!(folder, "{}", p.message),
                Ok(p) => debug!(folder, "{}", p.message),
                Err(e) => debug!(folder, "Malformed logMessage: {}", e),
            },
            methods::SHOW_MESSAGE => {
                if let Ok(p) = serde_json::from_value::<ShowMessageParams>(params) {
                    self.notifier.notify(severity_of(p.typ), &p.message);
                }
            }
            methods::PUBLISH_DIAGNOSTICS => {
                match serde_json::from_value::<PublishDiagnosticsParams>(params) {
                    Ok(p) => {
                        debug!(
                            folder,
                            uri = %p.uri,
                            count = p.diagnostics.len(),
                            "Diagnostics published"
                        );
                        if p.diagnostics.is_empty() {
                            self.diagnostics.remove(&p.uri);
                        } else {
                            self.diagnostics.insert(p.uri, p.diagnostics.len());
                        }
                    }
                    Err(e) => debug!(folder, "Malformed publishDiagnostics: {}", e),
                }
            }
            methods::PROGRESS => trace!(folder, "Progress notification"),
            other => debug!(folder, method = other, "Ignoring server notification"),
        }
    }

    pub fn diagnostics_total(&self) -> usize {
        self.diagnostics.iter().map(|e| *e.value()).sum()
    }
}

fn severity_of(typ: MessageType) -> Severity {
    if typ == MessageType::ERROR {
        Severity::Error
    } else if typ == MessageType::WARNING {
        Severity::Warning
    } else {
        Severity::Info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::protocol::{RequestId, error_codes};

    fn context(notifier: Arc<RecordingNotifier>) -> ClientContext {
        ClientContext::new(
            WorkspaceFolder::new("app", "/w/app"),
            "pupapyLsp",
            FolderSettings {
                max_number_of_problems: Some(25),
                ..Default::default()
            },
            notifier,
        )
    }

    #[test]
    fn test_configuration_request_returns_section() {
        let ctx = context(Arc::new(RecordingNotifier::new()));
        let request = LspRequest::new(1i64, methods::WORKSPACE_CONFIGURATION).with_params(json!({
            "items": [
                { "scopeUri": "file:///w/app/contract.py", "section": "pupapyLsp" },
                { "section": "pupapyLsp.maxNumberOfProblems" },
                { "section": "editor" }
            ]
        }));

        let result = ctx.handle_request(request).into_result().unwrap();
        assert_eq!(result[0]["maxNumberOfProblems"], 25);
        assert_eq!(result[1], 25);
        assert_eq!(result[2], Value::Null);
    }

    #[test]
    fn test_updated_settings_are_served() {
        let ctx = context(Arc::new(RecordingNotifier::new()));
        ctx.set_settings(FolderSettings {
            max_number_of_problems: Some(3),
            ..Default::default()
        });

        let request = LspRequest::new(3i64, methods::WORKSPACE_CONFIGURATION)
            .with_params(json!({ "items": [{ "section": "pupapyLsp" }] }));
        let result = ctx.handle_request(request).into_result().unwrap();
        assert_eq!(result[0]["maxNumberOfProblems"], 3);
        assert_eq!(
            ctx.change_payload(),
            json!({ "pupapyLsp": { "maxNumberOfProblems": 3 } })
        );
    }

    #[test]
    fn test_capability_registration_is_acknowledged() {
        let ctx = context(Arc::new(RecordingNotifier::new()));
        let response = ctx.handle_request(
            LspRequest::new("r1", methods::REGISTER_CAPABILITY)
                .with_params(json!({ "registrations": [] })),
        );
        assert_eq!(response.id, RequestId::from("r1"));
        assert_eq!(response.into_result().unwrap(), Value::Null);
    }

    #[test]
    fn test_unknown_request_is_method_not_found() {
        let ctx = context(Arc::new(RecordingNotifier::new()));
        let err = ctx
            .handle_request(LspRequest::new(2i64, "custom/thing"))
            .into_result()
            .unwrap_err();
        assert_eq!(err.code, error_codes::METHOD_NOT_FOUND);
    }

    #[test]
    fn test_diagnostics_are_counted_and_cleared() {
        let ctx = context(Arc::new(RecordingNotifier::new()));
        let diag = json!({
            "range": {
                "start": { "line": 0, "character": 0 },
                "end": { "line": 0, "character": 5 }
            },
            "message": "Python list isn't supported in Algorand Python"
        });

        ctx.handle_notification(LspNotification::new(methods::PUBLISH_DIAGNOSTICS).with_params(
            json!({ "uri": "file:///w/app/a.py", "diagnostics": [diag.clone(), diag] }),
        ));
        assert_eq!(ctx.diagnostics_total(), 2);

        ctx.handle_notification(LspNotification::new(methods::PUBLISH_DIAGNOSTICS).with_params(
            json!({ "uri": "file:///w/app/a.py", "diagnostics": [] }),
        ));
        assert_eq!(ctx.diagnostics_total(), 0);
    }

    #[test]
    fn test_show_message_reaches_user() {
        let notifier = Arc::new(RecordingNotifier::new());
        let ctx = context(notifier.clone());
        ctx.handle_notification(
            LspNotification::new(methods::SHOW_MESSAGE)
                .with_params(json!({ "type": 1, "message": "compiler crashed" })),
        );
        assert_eq!(notifier.errors(), vec!["compiler crashed".to_string()]);
    }
}
