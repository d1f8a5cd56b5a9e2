//! Runtime environment resolution
//!
//! The registry asks an [`EnvironmentProvider`] which interpreter and
//! package root belong to a workspace folder before it decides how to
//! launch a server for it.

mod python;

pub use python::PythonEnvironmentProvider;

use crate::config::ProfileKind;
use crate::workspace::WorkspaceFolder;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Resolved execution environment for a folder.
///
/// Either field may be missing; a launch needs both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeEnvironment {
    /// Environment root (e.g. `sys.prefix` of a virtualenv)
    pub env_path: Option<PathBuf>,
    /// Interpreter executable
    pub executable: Option<PathBuf>,
    /// Provider-specific identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl RuntimeEnvironment {
    pub fn new(env_path: impl Into<PathBuf>, executable: impl Into<PathBuf>) -> Self {
        Self {
            env_path: Some(env_path.into()),
            executable: Some(executable.into()),
            id: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.env_path.is_some() && self.executable.is_some()
    }
}

/// Resolves the active runtime for a folder
#[async_trait]
pub trait EnvironmentProvider: Send + Sync {
    /// `None` means there is no active environment for this folder
    async fn resolve(&self, folder: &WorkspaceFolder) -> Option<RuntimeEnvironment>;
}

/// Environment provider used for a server family outside of tests
pub fn provider_for(kind: ProfileKind) -> Arc<dyn EnvironmentProvider> {
    match kind {
        ProfileKind::Python => Arc::new(PythonEnvironmentProvider::new()),
        ProfileKind::Typescript => Arc::new(StaticEnvironmentProvider::folder_root("npx")),
    }
}

/// Provider returning the same answer for every folder.
///
/// Used for server families that don't run inside a project interpreter,
/// where the folder itself stands in for the environment root.
#[derive(Debug, Clone, Default)]
pub struct StaticEnvironmentProvider {
    environment: Option<RuntimeEnvironment>,
    use_folder_root: bool,
}

impl StaticEnvironmentProvider {
    pub fn new(environment: Option<RuntimeEnvironment>) -> Self {
        Self {
            environment,
            use_folder_root: false,
        }
    }

    /// Resolve every folder to itself, with `executable` as the runtime
    pub fn folder_root(executable: impl Into<PathBuf>) -> Self {
        Self {
            environment: Some(RuntimeEnvironment {
                env_path: None,
                executable: Some(executable.into()),
                id: None,
            }),
            use_folder_root: true,
        }
    }
}

#[async_trait]
impl EnvironmentProvider for StaticEnvironmentProvider {
    async fn resolve(&self, folder: &WorkspaceFolder) -> Option<RuntimeEnvironment> {
        let mut environment = self.environment.clone()?;
        if self.use_folder_root {
            environment.env_path = Some(folder.path.clone());
        }
        Some(environment)
    }
}
