//! Configuration for remote access, scheduling and external tools

use crate::error::{DashboardError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_GITHUB_API: &str = "https://api.github.com";

/// Main configuration for a dashboard run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Hoster API and clone configuration
    pub network: NetworkConfig,
    /// Fan-out scheduling limits
    pub scheduler: SchedulerConfig,
    /// External analysis tools
    pub tools: ToolsConfig,
    /// Root directory for generated artifacts
    pub output_dir: PathBuf,
}

/// Network configuration for API calls and clones
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// GitHub API token; GitHub badges are only registered when set
    pub github_token: Option<String>,
    /// GitLab API token; GitLab badges are only registered when set
    pub gitlab_token: Option<String>,
    /// Base URL of the GitHub REST API
    pub github_api_url: String,
    /// Base URL of the GitLab REST API. When unset, `https://<hoster>/api/v4`
    /// is derived per project so self-hosted instances work.
    pub gitlab_api_url: Option<String>,
    /// Skip TLS certificate verification for API calls and clones
    pub insecure_tls: bool,
}

/// Limits for the fan-out scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Global deadline after which the run stops waiting for results
    pub deadline_secs: u64,
    /// Maximum number of badge computations in flight. `None` runs every
    /// scheduled unit at once.
    pub max_concurrency: Option<usize>,
}

/// Program locations and limits for sandboxed analysis tools
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Per-invocation timeout in seconds
    pub timeout_secs: u64,
    pub superlinter: PathBuf,
    pub bandit: PathBuf,
    pub pycodestyle: PathBuf,
    pub shhgit: PathBuf,
    /// Directory holding the shhgit signature configuration
    pub shhgit_config_path: PathBuf,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            github_token: non_empty_env("GITHUB_ACCESS_TOKEN"),
            gitlab_token: non_empty_env("GITLAB_ACCESS_TOKEN"),
            github_api_url: DEFAULT_GITHUB_API.to_string(),
            gitlab_api_url: None,
            insecure_tls: false,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            deadline_secs: 600, // 10 minutes
            max_concurrency: None,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300, // 5 minutes
            superlinter: PathBuf::from("/action/lib/linter.sh"),
            bandit: PathBuf::from("bandit"),
            pycodestyle: PathBuf::from("pycodestyle"),
            shhgit: PathBuf::from("shhgit"),
            shhgit_config_path: PathBuf::from("/shhgit"),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

impl NetworkConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SchedulerConfig {
    /// Get deadline as Duration
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_concurrency == Some(0) {
            return Err("max_concurrency must be at least 1".to_string());
        }
        Ok(())
    }
}

impl ToolsConfig {
    /// Get tool timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl DashboardConfig {
    /// Create a new builder for DashboardConfig
    pub fn builder() -> DashboardConfigBuilder {
        DashboardConfigBuilder::default()
    }

    /// Load settings from a TOML file; absent keys keep their defaults
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DashboardConfig = toml::from_str(&content)?;
        config.scheduler.validate().map_err(DashboardError::config)?;
        Ok(config)
    }

    /// Directory that receives the `badges/` tree
    pub fn artifact_root(&self) -> PathBuf {
        if self.output_dir.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            self.output_dir.clone()
        }
    }
}

/// Builder for DashboardConfig
#[derive(Default)]
pub struct DashboardConfigBuilder {
    network: Option<NetworkConfig>,
    scheduler: Option<SchedulerConfig>,
    tools: Option<ToolsConfig>,
    output_dir: Option<PathBuf>,
}

impl DashboardConfigBuilder {
    pub fn network(mut self, network: NetworkConfig) -> Self {
        self.network = Some(network);
        self
    }

    pub fn scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn tools(mut self, tools: ToolsConfig) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn build(self) -> DashboardConfig {
        DashboardConfig {
            network: self.network.unwrap_or_default(),
            scheduler: self.scheduler.unwrap_or_default(),
            tools: self.tools.unwrap_or_default(),
            output_dir: self.output_dir.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DashboardConfig::default();
        assert_eq!(config.scheduler.deadline(), Duration::from_secs(600));
        assert_eq!(config.tools.timeout(), Duration::from_secs(300));
        assert_eq!(config.scheduler.max_concurrency, None);
        assert!(!config.network.insecure_tls);
        assert_eq!(config.artifact_root(), PathBuf::from("."));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: DashboardConfig = toml::from_str(
            r#"
output_dir = "public"

[scheduler]
deadline_secs = 30

[tools]
bandit = "/usr/local/bin/bandit"
"#,
        )
        .unwrap();

        assert_eq!(config.output_dir, PathBuf::from("public"));
        assert_eq!(config.scheduler.deadline_secs, 30);
        assert_eq!(config.tools.bandit, PathBuf::from("/usr/local/bin/bandit"));
        assert_eq!(config.tools.timeout_secs, 300);
        assert_eq!(config.network.github_api_url, DEFAULT_GITHUB_API);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let scheduler = SchedulerConfig {
            max_concurrency: Some(0),
            ..SchedulerConfig::default()
        };
        assert!(scheduler.validate().is_err());
    }

    #[test]
    fn test_builder() {
        let config = DashboardConfig::builder()
            .output_dir("out")
            .scheduler(SchedulerConfig {
                deadline_secs: 5,
                max_concurrency: Some(4),
            })
            .build();
        assert_eq!(config.artifact_root(), PathBuf::from("out"));
        assert_eq!(config.scheduler.max_concurrency, Some(4));
    }
}
