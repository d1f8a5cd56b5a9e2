//! Server profiles: which documents a server handles and how to find it

use super::probe::ProbeCommand;
use crate::config::ProfileKind;
use crate::environment::RuntimeEnvironment;
use crate::workspace::WorkspaceFolder;
use std::collections::HashMap;
use std::path::Path;

/// Program a candidate runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateProgram {
    /// The resolved runtime's interpreter
    RuntimeExecutable,
    /// A command looked up on `PATH`
    Named(&'static str),
}

/// One way the server may be installed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCandidate {
    pub program: CandidateProgram,
    /// Arguments for the real launch
    pub launch_args: &'static [&'static str],
    /// Arguments for the trial run
    pub probe_args: &'static [&'static str],
    /// Run the probe with the environment marker variable set
    pub probe_in_environment: bool,
    /// Launch (and probe) from the workspace folder
    pub run_in_folder: bool,
}

impl LaunchCandidate {
    /// Program path for this candidate, if the environment provides it
    pub fn program_path(&self, environment: &RuntimeEnvironment) -> Option<String> {
        match &self.program {
            CandidateProgram::RuntimeExecutable => environment
                .executable
                .as_ref()
                .map(|p| p.display().to_string()),
            CandidateProgram::Named(name) => Some((*name).to_string()),
        }
    }

    pub fn probe_command(
        &self,
        folder: &WorkspaceFolder,
        environment: &RuntimeEnvironment,
        marker_variable: Option<&str>,
    ) -> Option<ProbeCommand> {
        let mut command = ProbeCommand::new(self.program_path(environment)?)
            .with_args(self.probe_args.iter().copied());
        if self.probe_in_environment {
            if let (Some(var), Some(env_path)) = (marker_variable, environment.env_path.as_ref()) {
                command = command.with_env(var, env_path.display().to_string());
            }
        }
        if self.run_in_folder {
            command = command.with_cwd(&folder.path);
        }
        Some(command)
    }
}

/// Everything the bridge knows about one server family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerProfile {
    pub kind: ProfileKind,
    /// Human readable server name, used in messages
    pub display_name: &'static str,
    /// Prefix of the per-folder client id
    pub client_id_prefix: &'static str,
    pub language_id: &'static str,
    /// Only documents whose path ends with this suffix are handled
    pub document_suffix: Option<&'static str>,
    /// Command used when the user configured an override path
    pub override_command: &'static str,
    pub override_args: &'static [&'static str],
    /// Probed in order
    pub candidates: Vec<LaunchCandidate>,
    /// Variable pointing the server at its package set
    pub environment_marker: Option<&'static str>,
    /// Section the server asks for through `workspace/configuration`
    pub settings_section: &'static str,
}

impl ServerProfile {
    pub fn python() -> Self {
        Self {
            kind: ProfileKind::Python,
            display_name: "Algorand Python Language Server",
            client_id_prefix: "puyapy",
            language_id: "python",
            document_suffix: None,
            override_command: "puyapy-lsp",
            override_args: &[],
            candidates: vec![
                LaunchCandidate {
                    program: CandidateProgram::RuntimeExecutable,
                    launch_args: &["-m", "puyapy.lsp"],
                    probe_args: &["-m", "puyapy.lsp", "--version"],
                    probe_in_environment: true,
                    run_in_folder: false,
                },
                LaunchCandidate {
                    program: CandidateProgram::Named("puyapy-lsp"),
                    launch_args: &[],
                    probe_args: &["--version"],
                    probe_in_environment: false,
                    run_in_folder: false,
                },
            ],
            environment_marker: Some("VIRTUAL_ENV"),
            settings_section: "pupapyLsp",
        }
    }

    pub fn typescript() -> Self {
        Self {
            kind: ProfileKind::Typescript,
            display_name: "Algorand TypeScript Language Server",
            client_id_prefix: "puyats",
            language_id: "typescript",
            document_suffix: Some("algo.ts"),
            override_command: "npx",
            override_args: &["run-language-server"],
            candidates: vec![LaunchCandidate {
                program: CandidateProgram::Named("npx"),
                launch_args: &["run-language-server"],
                probe_args: &["-v"],
                probe_in_environment: false,
                run_in_folder: true,
            }],
            environment_marker: None,
            settings_section: "puyatsLsp",
        }
    }

    pub fn for_kind(kind: ProfileKind) -> Self {
        match kind {
            ProfileKind::Python => Self::python(),
            ProfileKind::Typescript => Self::typescript(),
        }
    }

    /// Whether an opened document should start a session for its folder
    pub fn matches_document(&self, language_id: &str, path: &Path) -> bool {
        if language_id != self.language_id {
            return false;
        }
        match self.document_suffix {
            Some(suffix) => path.to_string_lossy().ends_with(suffix),
            None => true,
        }
    }

    /// Environment block passed to the spawned server
    pub fn child_environment(&self, environment: &RuntimeEnvironment) -> HashMap<String, String> {
        let mut env = HashMap::new();
        if let (Some(var), Some(path)) = (self.environment_marker, environment.env_path.as_ref()) {
            env.insert(var.to_string(), path.display().to_string());
        }
        env.insert("NO_COLOR".to_string(), "1".to_string());
        if self.kind == ProfileKind::Python {
            env.insert("PYTHONUTF8".to_string(), "1".to_string());
        }
        env
    }

    /// `initializationOptions` sent with `initialize`
    pub fn initialization_options(
        &self,
        environment: &RuntimeEnvironment,
    ) -> Option<serde_json::Value> {
        match (self.kind, environment.env_path.as_ref()) {
            (ProfileKind::Python, Some(prefix)) => Some(serde_json::json!({
                "analysisPrefix": prefix.display().to_string(),
            })),
            _ => None,
        }
    }

    pub fn client_id(&self, folder: &WorkspaceFolder) -> String {
        format!("{}-{}", self.client_id_prefix, folder.name)
    }

    pub fn client_name(&self, folder: &WorkspaceFolder) -> String {
        format!("{} - {}", self.display_name, folder.name)
    }
}
