//! Badge providers and the registry that maps badge names to them
//!
//! A provider computes one badge kind for one project. Returning `None` means
//! the badge does not apply to the project; every failure is turned into a
//! badge carrying the error, so providers never abort a run.

mod files;
mod github;
mod gitlab;
mod template;
mod tools;

pub use files::{FileCheck, FileCheckProvider};
pub use github::{GitHubBadge, GitHubProvider};
pub use gitlab::{GitLabBadge, GitLabProvider};
pub use template::{render_template, Condition, Icon, TemplateProvider};
pub use tools::{Tool, ToolProvider};

use crate::artifact::ArtifactEmitter;
use crate::clone::{CloneManager, RepositoryFetcher};
use crate::config::DashboardConfig;
use crate::error::Result;
use crate::metadata::{GitHubClient, GitLabClient};
use crate::types::{Badge, BadgeColor, Project};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Computes one badge kind
#[async_trait]
pub trait Provider: Send + Sync {
    async fn badge(&self, project: &Project) -> Option<Badge>;
}

/// Badge name to provider mapping.
///
/// Filled once during setup and then shared read-only by the scheduler.
/// Registering a name twice replaces the earlier provider.
#[derive(Default)]
pub struct Registry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.providers.keys().collect();
        names.sort();
        f.debug_struct("Registry").field("providers", &names).finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, provider: impl Provider + 'static) {
        let name = name.into();
        if self.providers.insert(name.clone(), Arc::new(provider)).is_some() {
            debug!("Provider {} replaced", name);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Registry with the full badge catalogue.
    ///
    /// Hoster badges are only available when a token for that hoster is
    /// configured. Clones for filesystem and tool badges are made through
    /// `fetcher`.
    pub fn with_defaults(config: &DashboardConfig, fetcher: Arc<dyn RepositoryFetcher>) -> Result<Self> {
        let artifacts = ArtifactEmitter::new(config.artifact_root());
        let clones = Arc::new(CloneManager::new(fetcher));
        let mut registry = Self::new();

        registry.register_static(&artifacts);
        registry.register_azure(&artifacts);
        registry.register_files(&artifacts, &clones);
        registry.register_tools(&artifacts, &clones, config);

        if config.network.github_token.is_some() {
            let client = Arc::new(GitHubClient::new(&config.network)?);
            registry.register_github(&artifacts, &client);
        } else {
            info!("GitHub token not defined. GitHub badges will not be available.");
        }

        if config.network.gitlab_token.is_some() {
            let client = Arc::new(GitLabClient::new(&config.network)?);
            registry.register_gitlab(&artifacts, &client);
        } else {
            info!("GitLab token not defined. GitLab badges will not be available.");
        }

        debug!("Registered {} providers", registry.len());
        Ok(registry)
    }

    fn register_template(
        &mut self,
        artifacts: &ArtifactEmitter,
        name: &str,
        image: &str,
        link: &str,
        condition: Option<Condition>,
    ) {
        self.register(
            name,
            TemplateProvider::new(name, image, link, condition, artifacts.clone()),
        );
    }

    fn register_static(&mut self, artifacts: &ArtifactEmitter) {
        self.register("icon", Icon);
        self.register_template(
            artifacts,
            "travis",
            "https://travis-ci.org/{{.Namespace}}/{{.Name}}.svg?branch=master",
            "https://travis-ci.org/{{.Namespace}}/{{.Name}}",
            None,
        );
        self.register_template(
            artifacts,
            "gocover",
            "http://gocover.io/_badge/{{.Hoster}}/{{.Namespace}}/{{.Name}}",
            "https://gocover.io/{{.Hoster}}/{{.Namespace}}/{{.Name}}",
            None,
        );
        self.register_template(
            artifacts,
            "codecov",
            "https://codecov.io/gh/{{.Namespace}}/{{.Name}}/branch/master/graph/badge.svg",
            "https://codecov.io/gh/{{.Namespace}}/{{.Name}}",
            None,
        );
        self.register_template(
            artifacts,
            "goreportcard",
            "https://goreportcard.com/badge/{{.GoImportPath}}",
            "https://goreportcard.com/report/{{.GoImportPath}}",
            None,
        );
        self.register_template(
            artifacts,
            "godoc",
            "https://godoc.org/{{.GoImportPath}}?status.svg",
            "https://godoc.org/{{.GoImportPath}}",
            None,
        );
    }

    fn register_azure(&mut self, artifacts: &ArtifactEmitter) {
        self.register_template(
            artifacts,
            "azure-pipeline",
            "https://img.shields.io/azure-devops/build/{{.AzureOrganization}}/{{.AzureProject}}/{{.AzureDefinitionID}}",
            "https://dev.azure.com/{{.AzureOrganization}}/{{.AzureProject}}/_build?definitionId={{.AzureDefinitionID}}&_a=summary",
            Some(Project::is_azure),
        );
        self.register_template(
            artifacts,
            "azure-coverage",
            "https://img.shields.io/azure-devops/coverage/{{.AzureOrganization}}/{{.AzureProject}}/{{.AzureDefinitionID}}",
            "{{.URL}}",
            Some(Project::is_azure),
        );
    }

    fn register_files(&mut self, artifacts: &ArtifactEmitter, clones: &Arc<CloneManager>) {
        for check in [FileCheck::Readme, FileCheck::Gitignore] {
            self.register(
                check.key(),
                FileCheckProvider::new(check, Arc::clone(clones), artifacts.clone()),
            );
        }
    }

    fn register_tools(&mut self, artifacts: &ArtifactEmitter, clones: &Arc<CloneManager>, config: &DashboardConfig) {
        for tool in Tool::ALL {
            self.register(
                tool.key(),
                ToolProvider::new(tool, config.tools.clone(), Arc::clone(clones), artifacts.clone()),
            );
        }
    }

    fn register_github(&mut self, artifacts: &ArtifactEmitter, client: &Arc<GitHubClient>) {
        self.register_template(
            artifacts,
            "github-pipeline",
            "{{.URL}}/workflows/{{.Workflow}}/badge.svg",
            "{{.URL}}/actions",
            Some(Project::is_github),
        );
        self.register_template(
            artifacts,
            "github-sloc",
            "https://sloc.xyz/github/{{.Namespace}}/{{.Name}}/",
            "{{.URL}}",
            Some(Project::is_github),
        );
        for kind in GitHubBadge::ALL {
            self.register(
                kind.key(),
                GitHubProvider::new(kind, Arc::clone(client), artifacts.clone()),
            );
        }
    }

    fn register_gitlab(&mut self, artifacts: &ArtifactEmitter, client: &Arc<GitLabClient>) {
        self.register_template(
            artifacts,
            "gitlab-coverage",
            "{{.URL}}/badges/master/coverage.svg",
            "{{.URL}}/-/jobs/artifacts/master/file/coverage.html?job=unittests",
            Some(Project::is_gitlab),
        );
        self.register_template(
            artifacts,
            "gitlab-pipeline",
            "{{.URL}}/badges/master/pipeline.svg",
            "{{.URL}}/pipelines",
            Some(Project::is_gitlab),
        );
        for kind in GitLabBadge::ALL {
            self.register(
                kind.key(),
                GitLabProvider::new(kind, Arc::clone(client), artifacts.clone()),
            );
        }
    }
}

/// Color for the time since the last activity
pub(crate) fn activity_color(last_activity: DateTime<Utc>, now: DateTime<Utc>) -> BadgeColor {
    let days = now.signed_duration_since(last_activity).num_days();
    match days {
        d if d < 30 => BadgeColor::BrightGreen,
        d if d < 60 => BadgeColor::Green,
        d if d < 185 => BadgeColor::YellowGreen,
        d if d < 365 => BadgeColor::Yellow,
        d if d < 730 => BadgeColor::Orange,
        _ => BadgeColor::Red,
    }
}

/// Color for a repository size counted in units of `unit_bytes` bytes
pub(crate) fn size_color(size: u64, unit_bytes: u64) -> BadgeColor {
    let megabyte = 1024 * 1024 / unit_bytes;
    match size {
        s if s > megabyte * 100 => BadgeColor::Red,
        s if s > megabyte * 50 => BadgeColor::Orange,
        s if s > megabyte * 10 => BadgeColor::Yellow,
        s if s > megabyte * 5 => BadgeColor::YellowGreen,
        s if s > megabyte => BadgeColor::Green,
        _ => BadgeColor::BrightGreen,
    }
}

/// Healthy when nothing is open
pub(crate) fn open_items_color(count: u64) -> BadgeColor {
    if count > 0 {
        BadgeColor::Yellow
    } else {
        BadgeColor::BrightGreen
    }
}

pub(crate) fn branch_color(count: u64) -> BadgeColor {
    match count {
        0 | 1 => BadgeColor::BrightGreen,
        2 => BadgeColor::Green,
        _ => BadgeColor::Yellow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    struct Fixed(&'static str);

    #[async_trait]
    impl Provider for Fixed {
        async fn badge(&self, _project: &Project) -> Option<Badge> {
            Some(Badge::linked(self.0, self.0))
        }
    }

    #[tokio::test]
    async fn test_register_overwrites() {
        let mut registry = Registry::new();
        registry.register("x", Fixed("first"));
        registry.register("x", Fixed("second"));

        assert_eq!(registry.len(), 1);
        let badge = registry.lookup("x").unwrap().badge(&Project::default()).await.unwrap();
        assert_eq!(badge.url, "second");
        assert!(registry.lookup("missing").is_none());
    }

    #[test]
    fn test_hoster_badges_need_token() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = DashboardConfig::builder().output_dir(dir.path()).build();
        config.network.github_token = None;
        config.network.gitlab_token = Some("glpat".to_string());

        let fetcher: Arc<dyn RepositoryFetcher> = Arc::new(crate::clone::GitCli::new(false));
        let registry = Registry::with_defaults(&config, fetcher).unwrap();

        assert!(registry.contains("readme"));
        assert!(registry.contains("superlint"));
        assert!(registry.contains("azure-pipeline"));
        assert!(registry.contains("gitlab-mergerequests"));
        assert!(!registry.contains("github-stars"));
        assert!(!registry.contains("github-pipeline"));
    }

    #[test]
    fn test_activity_color_buckets() {
        let now = Utc::now();
        let at = |days| now - Duration::days(days);
        assert_eq!(activity_color(at(1), now), BadgeColor::BrightGreen);
        assert_eq!(activity_color(at(45), now), BadgeColor::Green);
        assert_eq!(activity_color(at(100), now), BadgeColor::YellowGreen);
        assert_eq!(activity_color(at(200), now), BadgeColor::Yellow);
        assert_eq!(activity_color(at(400), now), BadgeColor::Orange);
        assert_eq!(activity_color(at(800), now), BadgeColor::Red);
    }

    #[test]
    fn test_size_color_units() {
        // GitHub reports kilobytes
        assert_eq!(size_color(1024, 1024), BadgeColor::BrightGreen);
        assert_eq!(size_color(1025, 1024), BadgeColor::Green);
        assert_eq!(size_color(60 * 1024, 1024), BadgeColor::Orange);
        // GitLab reports bytes
        assert_eq!(size_color(6 * 1024 * 1024, 1), BadgeColor::YellowGreen);
        assert_eq!(size_color(101 * 1024 * 1024, 1), BadgeColor::Red);
    }

    #[test]
    fn test_count_colors() {
        assert_eq!(open_items_color(0), BadgeColor::BrightGreen);
        assert_eq!(open_items_color(3), BadgeColor::Yellow);
        assert_eq!(branch_color(1), BadgeColor::BrightGreen);
        assert_eq!(branch_color(2), BadgeColor::Green);
        assert_eq!(branch_color(9), BadgeColor::Yellow);
    }
}
