//! Badges computed from the GitHub API

use super::{activity_color, branch_color, open_items_color, size_color, Provider, TemplateProvider};
use crate::artifact::ArtifactEmitter;
use crate::format;
use crate::metadata::{GitHubClient, GitHubRepository};
use crate::types::{Badge, BadgeColor, Project};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

const COMMITS_SINCE_IMAGE: &str = "https://img.shields.io/github/commits-since/{{.Namespace}}/{{.Name}}/latest";

/// GitHub badge kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GitHubBadge {
    Branches,
    Forks,
    Issues,
    LastCommit,
    License,
    NewCommits,
    PullRequests,
    Size,
    Stars,
    Version,
    Visibility,
    Watchers,
}

impl GitHubBadge {
    pub const ALL: [Self; 12] = [
        Self::Branches,
        Self::Forks,
        Self::Issues,
        Self::LastCommit,
        Self::License,
        Self::NewCommits,
        Self::PullRequests,
        Self::Size,
        Self::Stars,
        Self::Version,
        Self::Visibility,
        Self::Watchers,
    ];

    /// Registry name
    pub fn key(self) -> &'static str {
        match self {
            Self::Branches => "github-branches",
            Self::Forks => "github-forks",
            Self::Issues => "github-issues",
            Self::LastCommit => "github-lastcommit",
            Self::License => "github-license",
            Self::NewCommits => "github-newcommits",
            Self::PullRequests => "github-pullrequests",
            Self::Size => "github-size",
            Self::Stars => "github-stars",
            Self::Version => "github-version",
            Self::Visibility => "github-visibility",
            Self::Watchers => "github-watchers",
        }
    }
}

/// One GitHub badge kind backed by the shared client
#[derive(Debug, Clone)]
pub struct GitHubProvider {
    kind: GitHubBadge,
    client: Arc<GitHubClient>,
    artifacts: ArtifactEmitter,
}

impl GitHubProvider {
    pub fn new(kind: GitHubBadge, client: Arc<GitHubClient>, artifacts: ArtifactEmitter) -> Self {
        Self {
            kind,
            client,
            artifacts,
        }
    }

    async fn pull_requests(&self, project: &Project) -> Badge {
        let link = format!("{}/pulls", project.url);
        match self.client.open_pull_requests(project).await {
            Ok(count) => self.artifacts.emit(
                project,
                "pullrequests",
                "pull requests",
                &count.to_string(),
                open_items_color(count),
                &link,
                None,
            )
            .await,
            Err(e) => self.artifacts.emit(
                project,
                "pullrequests",
                "pull requests",
                "Error",
                BadgeColor::Red,
                &link,
                Some(e.to_string()),
            )
            .await,
        }
    }

    async fn branches(&self, project: &Project) -> Badge {
        let link = format!("{}/branches", project.url);
        match self.client.branch_count(project).await {
            // A repository always has its default branch
            Ok(count) => self.artifacts.emit(
                project,
                "branches",
                "branches",
                &count.max(1).to_string(),
                branch_color(count),
                &link,
                None,
            )
            .await,
            Err(e) => self.artifacts.emit(
                project,
                "branches",
                "branches",
                "Error",
                BadgeColor::LightGrey,
                &link,
                Some(e.to_string()),
            )
            .await,
        }
    }

    /// Latest tag; `None` when the repository has no tags
    async fn version(&self, project: &Project) -> Option<Badge> {
        let link = format!("{}/releases", project.url);
        match self.client.latest_tag(project).await {
            Ok(Some(tag)) => Some(
                self.artifacts
                    .emit(project, "tag", "tag", &tag, BadgeColor::Blue, &link, None)
                    .await,
            ),
            Ok(None) => None,
            Err(e) => Some(self.tag_error(project, e).await),
        }
    }

    /// Commits since the latest tag, rendered by shields.io
    async fn new_commits(&self, project: &Project) -> Option<Badge> {
        match self.client.latest_tag(project).await {
            Ok(Some(_)) => {
                let template = TemplateProvider::new(
                    self.kind.key(),
                    COMMITS_SINCE_IMAGE,
                    "{{.URL}}",
                    None,
                    self.artifacts.clone(),
                );
                Some(template.render(project).await)
            }
            Ok(None) => None,
            Err(e) => Some(self.tag_error(project, e).await),
        }
    }

    async fn tag_error(&self, project: &Project, error: impl ToString) -> Badge {
        let error = error.to_string();
        self.artifacts
            .emit(
                project,
                "tag",
                "tag",
                "Error",
                BadgeColor::LightGrey,
                &format!("{}/releases", project.url),
                Some(error),
            )
            .await
    }

    async fn issues(&self, project: &Project, repo: &GitHubRepository) -> Badge {
        if !repo.has_issues {
            return self.artifacts.emit(
                project,
                "issues",
                "issues",
                "disabled",
                BadgeColor::LightGrey,
                &project.url,
                None,
            )
            .await;
        }

        let pull_requests = match self.client.open_pull_requests(project).await {
            Ok(count) => count,
            Err(e) => {
                return self.artifacts.emit(
                    project,
                    "issues",
                    "issues",
                    "Error",
                    BadgeColor::Red,
                    &format!("{}/pulls", project.url),
                    Some(e.to_string()),
                )
                .await
            }
        };

        // GitHub counts open pull requests as issues
        let count = repo.open_issues.saturating_sub(pull_requests);
        self.artifacts.emit(
            project,
            "issues",
            "issues",
            &count.to_string(),
            open_items_color(count),
            &format!("{}/issues", project.url),
            None,
        )
        .await
    }

    /// Cached repository description, or the error badge to show instead
    async fn repository(&self, project: &Project) -> Result<GitHubRepository, Badge> {
        match self.client.repository(project).await {
            Ok(repo) => Ok(repo),
            Err(e) => Err(self.artifacts.error_badge(project, "github", e).await),
        }
    }

    /// Badges that only need the repository description
    async fn describe(&self, project: &Project, repo: &GitHubRepository) -> Option<Badge> {
        let (file, label, value, color, link) = match self.kind {
            GitHubBadge::LastCommit => (
                "lastcommit",
                "last commit",
                format::relative_time(repo.updated_at, Utc::now()),
                activity_color(repo.updated_at, Utc::now()),
                project.url.clone(),
            ),
            GitHubBadge::Stars => (
                "stars",
                "stars",
                repo.stars.to_string(),
                BadgeColor::Blue,
                format!("{}/stargazers", project.url),
            ),
            GitHubBadge::Forks => (
                "fork",
                "Fork",
                repo.forks.to_string(),
                BadgeColor::Blue,
                format!("{}/network/members", project.url),
            ),
            GitHubBadge::Watchers => (
                "watchers",
                "watchers",
                repo.watchers.to_string(),
                BadgeColor::Blue,
                project.url.clone(),
            ),
            GitHubBadge::Size => (
                "reposize",
                "repo size",
                format::bytes(repo.size_kb.saturating_mul(1024)),
                size_color(repo.size_kb, 1024),
                project.url.clone(),
            ),
            GitHubBadge::Visibility => {
                let (mut text, mut color) = if repo.is_private {
                    ("private".to_string(), BadgeColor::Yellow)
                } else {
                    ("public".to_string(), BadgeColor::Green)
                };
                if repo.is_archived {
                    text.push_str(" archived");
                    color = BadgeColor::LightGrey;
                }
                ("visibility", "visibility", text, color, project.url.clone())
            }
            GitHubBadge::License => {
                let (value, color) = license_face(repo.license.as_deref());
                ("license", "license", value.to_string(), color, project.url.clone())
            }
            GitHubBadge::Branches
            | GitHubBadge::Issues
            | GitHubBadge::NewCommits
            | GitHubBadge::PullRequests
            | GitHubBadge::Version => return None,
        };

        Some(
            self.artifacts
                .emit(project, file, label, &value, color, &link, None)
                .await,
        )
    }
}

/// Value and color of the license badge
fn license_face(license: Option<&str>) -> (&str, BadgeColor) {
    match license {
        None => ("no License", BadgeColor::Red),
        Some("NOASSERTION") => ("not recognized", BadgeColor::LightGrey),
        Some(id) if spdx::license_id(id).is_none() => ("not recognized", BadgeColor::LightGrey),
        Some(id) => (id, BadgeColor::Blue),
    }
}

#[async_trait]
impl Provider for GitHubProvider {
    async fn badge(&self, project: &Project) -> Option<Badge> {
        if !project.is_github() {
            return None;
        }

        match self.kind {
            GitHubBadge::PullRequests => Some(self.pull_requests(project).await),
            GitHubBadge::Branches => Some(self.branches(project).await),
            GitHubBadge::Version => self.version(project).await,
            GitHubBadge::NewCommits => self.new_commits(project).await,
            GitHubBadge::Issues => match self.repository(project).await {
                Ok(repo) => Some(self.issues(project, &repo).await),
                Err(badge) => Some(badge),
            },
            _ => match self.repository(project).await {
                Ok(repo) => self.describe(project, &repo).await,
                Err(badge) => Some(badge),
            },
        }
    }
}
