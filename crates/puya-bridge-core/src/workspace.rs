//! Workspace folders and document-to-folder resolution

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Placeholder accepted in user-configured paths
pub const WORKSPACE_FOLDER_PLACEHOLDER: &str = "${workspaceFolder}";

/// A root directory the editor treats as one project context.
///
/// Sessions are keyed by [`WorkspaceFolder::name`]; names are assumed to be
/// unique across the open folders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkspaceFolder {
    pub name: String,
    pub path: PathBuf,
}

impl WorkspaceFolder {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Build a folder named after the last component of its path
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { name, path }
    }

    pub fn key(&self) -> &str {
        &self.name
    }

    pub fn contains(&self, document: &Path) -> bool {
        document.starts_with(&self.path)
    }

    /// Glob pattern selecting every file inside this folder
    pub fn document_pattern(&self) -> String {
        format!("{}/**/*", self.path.display())
    }

    /// `file://` URI of the folder root
    pub fn uri(&self) -> Option<lsp_types::Url> {
        lsp_types::Url::from_directory_path(&self.path).ok()
    }

    /// Substitute `${workspaceFolder}` and expand `~` in a user-supplied path
    pub fn resolve_placeholder(&self, raw: &str) -> PathBuf {
        let substituted = raw.replace(
            WORKSPACE_FOLDER_PLACEHOLDER,
            &self.path.display().to_string(),
        );
        let expanded = shellexpand::tilde(&substituted);
        PathBuf::from(expanded.as_ref())
    }
}

impl std::fmt::Display for WorkspaceFolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.path.display())
    }
}

/// Find the folder owning `document`. Nested roots resolve to the deepest one.
pub fn folder_for_document<'a>(
    folders: &'a [WorkspaceFolder],
    document: &Path,
) -> Option<&'a WorkspaceFolder> {
    folders
        .iter()
        .filter(|f| f.contains(document))
        .max_by_key(|f| f.path.components().count())
}
