//! Host protocol definitions
//!
//! Uses JSON-Lines in both directions: one request object per stdin line,
//! one event object per stdout line.

use puya_bridge_core::notify::Severity;
use puya_bridge_core::{
    BridgeConfig, FolderOutcome, OpenDocument, ProfileKind, SessionInfo, WorkspaceFolder,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Editor event forwarded by the host shim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostRequest {
    /// The method name
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl HostRequest {
    /// Parse request from JSON line
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Decode params; a missing params field reads as an empty object
    pub fn params<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        if self.params.is_null() {
            serde_json::from_value(serde_json::Value::Object(Default::default()))
        } else {
            serde_json::from_value(self.params.clone())
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivateParams {
    /// Documents already open when the extension activates
    #[serde(default)]
    pub documents: Vec<OpenDocument>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentClosedParams {
    pub path: PathBuf,
}

/// A folder as sent by the shim; the name defaults to the last path component
#[derive(Debug, Clone, Deserialize)]
pub struct FolderRef {
    pub path: PathBuf,
    #[serde(default)]
    pub name: Option<String>,
}

impl From<FolderRef> for WorkspaceFolder {
    fn from(folder: FolderRef) -> Self {
        match folder.name {
            Some(name) => WorkspaceFolder::new(name, folder.path),
            None => WorkspaceFolder::from_path(folder.path),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FoldersAddedParams {
    pub folders: Vec<FolderRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FoldersRemovedParams {
    pub names: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvironmentChangedParams {
    /// Document or folder the change applies to; absent means all folders
    #[serde(default)]
    pub resource: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigurationChangedParams {
    pub config: BridgeConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RestartParams {
    /// The active editor's document
    #[serde(default)]
    pub document: Option<PathBuf>,
}

/// Event written to stdout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HostEvent {
    /// Backend is ready
    #[serde(rename = "ready")]
    Ready {
        version: String,
        profile: ProfileKind,
        folders: Vec<String>,
    },

    /// Pong response to ping
    #[serde(rename = "pong")]
    Pong,

    /// Per-folder results of a start or restart
    #[serde(rename = "outcomes")]
    Outcomes {
        method: String,
        results: Vec<FolderOutcome>,
    },

    /// Request handled, nothing to report
    #[serde(rename = "ack")]
    Ack { method: String },

    /// Message for the user
    #[serde(rename = "message")]
    Message { severity: Severity, message: String },

    /// Registered sessions
    #[serde(rename = "status")]
    Status { sessions: Vec<SessionInfo> },

    #[serde(rename = "error")]
    Error { code: String, message: String },

    /// All sessions are stopped; last event of the stream
    #[serde(rename = "stopped")]
    Stopped,
}

impl HostEvent {
    /// Serialize as one line, newline included
    pub fn to_json_line(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => format!("{}\n", json),
            Err(e) => format!(
                "{{\"type\":\"error\",\"code\":\"serialization\",\"message\":{:?}}}\n",
                e.to_string()
            ),
        }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_without_params() {
        let request = HostRequest::from_json_line("{\"method\":\"restart\"}\n").unwrap();
        assert_eq!(request.method(), "restart");
        let params: RestartParams = request.params().unwrap();
        assert!(params.document.is_none());
    }

    #[test]
    fn test_document_opened_params() {
        let request = HostRequest::from_json_line(
            r#"{"method":"document_opened","params":{"path":"/w/app/a.py","languageId":"python","text":"x = 1"}}"#,
        )
        .unwrap();
        let document: OpenDocument = request.params().unwrap();
        assert_eq!(document.language_id, "python");
        assert_eq!(document.text.as_deref(), Some("x = 1"));
    }

    #[test]
    fn test_folder_ref_names() {
        let named: WorkspaceFolder = FolderRef {
            path: PathBuf::from("/w/app"),
            name: Some("main".to_string()),
        }
        .into();
        let unnamed: WorkspaceFolder = FolderRef {
            path: PathBuf::from("/w/app"),
            name: None,
        }
        .into();
        assert_eq!(named.name, "main");
        assert_eq!(unnamed.name, "app");
    }

    #[test]
    fn test_event_lines_are_tagged() {
        let line = HostEvent::Message {
            severity: Severity::Error,
            message: "No active editor found".to_string(),
        }
        .to_json_line();
        assert!(line.ends_with('\n'));

        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "message");
        assert_eq!(value["severity"], "error");
    }
}
