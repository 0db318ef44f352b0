//! Linters and scanners run against a repository clone

use super::Provider;
use crate::artifact::ArtifactEmitter;
use crate::clone::CloneManager;
use crate::config::ToolsConfig;
use crate::sandbox::{ToolCommand, ToolOutput, ToolStatus};
use crate::types::{Badge, BadgeColor, Project};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// External analysis tools
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    SuperLinter,
    Bandit,
    Pycodestyle,
    Shhgit,
}

impl Tool {
    pub const ALL: [Self; 4] = [Self::SuperLinter, Self::Bandit, Self::Pycodestyle, Self::Shhgit];

    pub fn key(self) -> &'static str {
        match self {
            Self::SuperLinter => "superlint",
            Self::Bandit => "bandit",
            Self::Pycodestyle => "pycodestyle",
            Self::Shhgit => "shhgit",
        }
    }

    /// Badge label and artifact file name
    fn label(self) -> &'static str {
        match self {
            Self::SuperLinter => "super-linter",
            other => other.key(),
        }
    }

    fn homepage(self) -> &'static str {
        match self {
            Self::SuperLinter => "https://github.com/github/super-linter",
            Self::Bandit => "https://pypi.org/project/bandit/",
            Self::Pycodestyle => "https://pypi.org/project/pycodestyle/",
            Self::Shhgit => "https://github.com/eth0izzle/shhgit",
        }
    }

    fn command(self, config: &ToolsConfig, clone: &Path) -> ToolCommand {
        let timeout = config.timeout();
        match self {
            Self::SuperLinter => ToolCommand::new(&config.superlinter, clone, timeout)
                .env("RUN_LOCAL", "true")
                .env("DEFAULT_WORKSPACE", clone.to_string_lossy()),
            Self::Bandit => ToolCommand::new(&config.bandit, clone, timeout)
                .arg("-r")
                .arg(clone),
            Self::Pycodestyle => ToolCommand::new(&config.pycodestyle, clone, timeout).arg(clone),
            Self::Shhgit => ToolCommand::new(&config.shhgit, clone, timeout)
                .arg("--config-path")
                .arg(&config.shhgit_config_path)
                .arg("--local")
                .arg(clone),
        }
    }

    /// Sanitized findings. super-linter reports on stderr and its report is
    /// kept even when linting passes.
    fn report(self, output: &ToolOutput) -> Option<String> {
        match self {
            Self::SuperLinter => Some(output.stderr_report()),
            _ if output.status.is_success() => None,
            _ => Some(output.report()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolProvider {
    tool: Tool,
    config: ToolsConfig,
    clones: Arc<CloneManager>,
    artifacts: ArtifactEmitter,
}

impl ToolProvider {
    pub fn new(tool: Tool, config: ToolsConfig, clones: Arc<CloneManager>, artifacts: ArtifactEmitter) -> Self {
        Self {
            tool,
            config,
            clones,
            artifacts,
        }
    }

    async fn badge_for(&self, project: &Project, output: &ToolOutput) -> Badge {
        let label = self.tool.label();

        let (log, log_error) = match self.tool.report(output) {
            Some(report) => match self.artifacts.write_log(project, label, report.as_bytes()).await {
                Ok(path) => (Some(path), None),
                Err(e) => {
                    warn!("Failed to write {} log for {}: {}", label, project.url, e);
                    (None, Some(e.to_string()))
                }
            },
            None => (None, None),
        };
        let link = log.as_deref().unwrap_or(self.tool.homepage());

        let (value, color, error) = match &output.status {
            ToolStatus::Success => ("valid", BadgeColor::BrightGreen, log_error),
            ToolStatus::Failed(_) => ("invalid", BadgeColor::Red, log_error),
            ToolStatus::TimedOut => ("timeout", BadgeColor::Red, log_error),
            ToolStatus::LaunchFailed(e) => ("invalid", BadgeColor::Red, Some(e.clone())),
        };

        self.artifacts
            .emit(project, label, label, value, color, link, error)
            .await
    }
}

#[async_trait]
impl Provider for ToolProvider {
    async fn badge(&self, project: &Project) -> Option<Badge> {
        let clone = match self.clones.ensure_clone(project).await {
            Ok(path) => path,
            Err(e) => return Some(self.artifacts.error_badge(project, self.tool.key(), e).await),
        };

        let output = self.tool.command(&self.config, &clone).run().await;
        info!("{} on {}: {:?}", self.tool.label(), project.url, output.status);
        Some(self.badge_for(project, &output).await)
    }
}
