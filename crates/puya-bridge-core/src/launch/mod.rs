//! Launch strategy resolution
//!
//! Decides how a language server gets started for a folder:
//! - a user override path short-circuits everything and runs the profile's
//!   well-known command from that directory
//! - otherwise each candidate of the [`ServerProfile`] is probed in order and
//!   the first one that exits successfully is used for the real launch

mod plan;
mod probe;
mod profile;
mod resolver;

pub use plan::{DocumentSelector, LaunchPlan, TransportChoice};
pub use probe::{CommandProber, ProbeCommand, ProcessProber};
pub use profile::{CandidateProgram, LaunchCandidate, ServerProfile};
pub use resolver::LaunchResolver;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How to invoke the server process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchStrategy {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
}

impl LaunchStrategy {
    pub fn command(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: None,
            cwd: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        self.args = if args.is_empty() { None } else { Some(args) };
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn args(&self) -> &[String] {
        self.args.as_deref().unwrap_or(&[])
    }
}

impl std::fmt::Display for LaunchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.command)?;
        for arg in self.args() {
            write!(f, " {}", arg)?;
        }
        if let Some(cwd) = &self.cwd {
            write!(f, " (in {})", cwd.display())?;
        }
        Ok(())
    }
}
