//! Python environment discovery

use super::{EnvironmentProvider, RuntimeEnvironment};
use crate::workspace::WorkspaceFolder;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

const VENV_DIR_NAMES: &[&str] = &[".venv", "venv"];
const PATH_INTERPRETERS: &[&str] = &["python3", "python"];
const SYS_QUERY: &str = "import sys; print(sys.executable); print(sys.prefix)";

/// Finds the interpreter a folder's code runs under.
///
/// Lookup order: an activated virtualenv (`VIRTUAL_ENV`), a `.venv` or
/// `venv` directory at the folder root, then the first interpreter on
/// `PATH`, whose `sys.prefix` becomes the environment root.
#[derive(Debug, Clone)]
pub struct PythonEnvironmentProvider {
    active_virtual_env: Option<PathBuf>,
    search_path: bool,
    query_timeout: Duration,
}

impl Default for PythonEnvironmentProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl PythonEnvironmentProvider {
    /// Provider honouring the current process's `VIRTUAL_ENV`
    pub fn new() -> Self {
        Self {
            active_virtual_env: std::env::var_os("VIRTUAL_ENV").map(PathBuf::from),
            search_path: true,
            query_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_virtual_env(mut self, env: Option<PathBuf>) -> Self {
        self.active_virtual_env = env;
        self
    }

    /// Disable the `PATH` fallback
    pub fn without_path_search(mut self) -> Self {
        self.search_path = false;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    fn venv_interpreter(env_root: &Path) -> Option<PathBuf> {
        let candidates: &[&str] = if cfg!(windows) {
            &["Scripts/python.exe"]
        } else {
            &["bin/python", "bin/python3"]
        };
        candidates
            .iter()
            .map(|rel| env_root.join(rel))
            .find(|p| p.exists())
    }

    fn from_venv(env_root: &Path) -> RuntimeEnvironment {
        RuntimeEnvironment {
            env_path: Some(env_root.to_path_buf()),
            executable: Self::venv_interpreter(env_root),
            id: Some(env_root.display().to_string()),
        }
    }

    fn folder_venv(folder: &WorkspaceFolder) -> Option<PathBuf> {
        VENV_DIR_NAMES
            .iter()
            .map(|name| folder.path.join(name))
            .find(|dir| dir.join("pyvenv.cfg").is_file())
    }

    async fn query_interpreter(&self, interpreter: &str) -> Option<RuntimeEnvironment> {
        let output = Command::new(interpreter)
            .args(["-c", SYS_QUERY])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.query_timeout, output).await {
            Ok(Ok(output)) if output.status.success() => output,
            Ok(Ok(_)) | Ok(Err(_)) => return None,
            Err(_) => {
                warn!(interpreter, "Interpreter query timed out");
                return None;
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut lines = stdout.lines().map(str::trim).filter(|l| !l.is_empty());
        let executable = lines.next().map(PathBuf::from);
        let prefix = lines.next().map(PathBuf::from);

        Some(RuntimeEnvironment {
            env_path: prefix,
            executable,
            id: Some(interpreter.to_string()),
        })
    }
}

#[async_trait]
impl EnvironmentProvider for PythonEnvironmentProvider {
    async fn resolve(&self, folder: &WorkspaceFolder) -> Option<RuntimeEnvironment> {
        if let Some(active) = self.active_virtual_env.as_ref().filter(|p| p.is_dir()) {
            debug!(folder = %folder.name, env = %active.display(), "Using active virtualenv");
            return Some(Self::from_venv(active));
        }

        if let Some(venv) = Self::folder_venv(folder) {
            debug!(folder = %folder.name, env = %venv.display(), "Using folder virtualenv");
            return Some(Self::from_venv(&venv));
        }

        if !self.search_path {
            return None;
        }

        for interpreter in PATH_INTERPRETERS {
            if let Some(env) = self.query_interpreter(interpreter).await {
                debug!(folder = %folder.name, interpreter, "Using interpreter from PATH");
                return Some(env);
            }
        }

        None
    }
}
