//! Launch strategy resolver

use super::LaunchStrategy;
use super::probe::CommandProber;
use super::profile::ServerProfile;
use crate::environment::RuntimeEnvironment;
use crate::workspace::WorkspaceFolder;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Picks the command a server is launched with
pub struct LaunchResolver {
    profile: ServerProfile,
    prober: Arc<dyn CommandProber>,
}

impl LaunchResolver {
    pub fn new(profile: ServerProfile, prober: Arc<dyn CommandProber>) -> Self {
        Self { profile, prober }
    }

    pub fn profile(&self) -> &ServerProfile {
        &self.profile
    }

    /// Resolve a strategy for `folder`.
    ///
    /// `None` means no candidate is runnable in this environment; callers
    /// report it and try again on a later event.
    #[instrument(skip(self, environment), fields(folder = %folder.name), level = "debug")]
    pub async fn resolve(
        &self,
        folder: &WorkspaceFolder,
        environment: &RuntimeEnvironment,
        user_override_path: Option<&str>,
    ) -> Option<LaunchStrategy> {
        if let Some(raw) = user_override_path.map(str::trim).filter(|p| !p.is_empty()) {
            let cwd = folder.resolve_placeholder(raw);
            info!(path = %cwd.display(), "Using configured language server path");
            return Some(
                LaunchStrategy::command(self.profile.override_command)
                    .with_args(self.profile.override_args.iter().copied())
                    .with_cwd(cwd),
            );
        }

        for candidate in &self.profile.candidates {
            let Some(probe) =
                candidate.probe_command(folder, environment, self.profile.environment_marker)
            else {
                debug!(program = ?candidate.program, "Candidate not applicable to environment");
                continue;
            };

            if self.prober.probe(&probe).await {
                info!(command = %probe.display_line(), "Language server candidate is runnable");
                let mut strategy = LaunchStrategy::command(probe.program)
                    .with_args(candidate.launch_args.iter().copied());
                if candidate.run_in_folder {
                    strategy = strategy.with_cwd(&folder.path);
                }
                return Some(strategy);
            }

            debug!(command = %probe.display_line(), "Language server candidate failed probe");
        }

        None
    }
}
