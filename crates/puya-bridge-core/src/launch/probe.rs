//! Runnability probes
//!
//! A probe is a short trial execution of a launch candidate. Only the exit
//! status matters; output is discarded.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument};

/// A command line to trial-run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment for the probe process
    pub env: HashMap<String, String>,
    pub cwd: Option<PathBuf>,
}

impl ProbeCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Shell-like rendering, for logs
    pub fn display_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| {
                if part.contains(' ') {
                    format!("\"{}\"", part)
                } else {
                    part.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Answers "can this command be executed successfully right now"
#[async_trait]
pub trait CommandProber: Send + Sync {
    async fn probe(&self, command: &ProbeCommand) -> bool;
}

/// Prober that spawns real child processes
#[derive(Debug, Clone)]
pub struct ProcessProber {
    timeout: Duration,
}

impl Default for ProcessProber {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl ProcessProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandProber for ProcessProber {
    #[instrument(skip(self), fields(command = %command.display_line()), level = "debug")]
    async fn probe(&self, command: &ProbeCommand) -> bool {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(cwd) = &command.cwd {
            cmd.current_dir(cwd);
        }

        let status = match cmd.spawn() {
            Ok(mut child) => tokio::time::timeout(self.timeout, child.wait()).await,
            Err(e) => {
                debug!("Probe could not be spawned: {}", e);
                return false;
            }
        };

        match status {
            Ok(Ok(status)) => {
                debug!(code = ?status.code(), "Probe finished");
                status.success()
            }
            Ok(Err(e)) => {
                debug!("Probe wait failed: {}", e);
                false
            }
            Err(_) => {
                debug!("Probe timed out after {:?}", self.timeout);
                false
            }
        }
    }
}
