//! Badges computed from the GitLab API

use super::{activity_color, branch_color, open_items_color, size_color, Provider};
use crate::artifact::ArtifactEmitter;
use crate::format;
use crate::metadata::{GitLabClient, GitLabProject};
use crate::types::{Badge, BadgeColor, Project};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// GitLab badge kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GitLabBadge {
    Branches,
    Forks,
    Issues,
    LastCommit,
    MergeRequests,
    Size,
    Stars,
    Version,
    Visibility,
}

impl GitLabBadge {
    pub const ALL: [Self; 9] = [
        Self::Branches,
        Self::Forks,
        Self::Issues,
        Self::LastCommit,
        Self::MergeRequests,
        Self::Size,
        Self::Stars,
        Self::Version,
        Self::Visibility,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Branches => "gitlab-branches",
            Self::Forks => "gitlab-forks",
            Self::Issues => "gitlab-issues",
            Self::LastCommit => "gitlab-lastcommit",
            Self::MergeRequests => "gitlab-mergerequests",
            Self::Size => "gitlab-size",
            Self::Stars => "gitlab-stars",
            Self::Version => "gitlab-version",
            Self::Visibility => "gitlab-visibility",
        }
    }

    /// Image file name below the project's artifact directory
    fn file(self) -> &'static str {
        match self {
            Self::Branches => "branches",
            Self::Forks => "fork",
            Self::Issues => "issues",
            Self::LastCommit => "last",
            Self::MergeRequests => "mergerequests",
            Self::Size => "reposize",
            Self::Stars => "stars",
            Self::Version => "tag",
            Self::Visibility => "visibility",
        }
    }
}

/// One GitLab badge kind backed by the shared client
#[derive(Debug, Clone)]
pub struct GitLabProvider {
    kind: GitLabBadge,
    client: Arc<GitLabClient>,
    artifacts: ArtifactEmitter,
}

impl GitLabProvider {
    pub fn new(kind: GitLabBadge, client: Arc<GitLabClient>, artifacts: ArtifactEmitter) -> Self {
        Self {
            kind,
            client,
            artifacts,
        }
    }

    async fn emit(&self, project: &Project, label: &str, value: &str, color: BadgeColor, link: &str) -> Badge {
        self.artifacts
            .emit(project, self.kind.file(), label, value, color, link, None)
            .await
    }

    async fn error(&self, project: &Project, error: impl ToString) -> Badge {
        let error = error.to_string();
        self.artifacts.error_badge(project, self.kind.file(), error).await
    }

    async fn merge_requests(&self, project: &Project) -> Badge {
        match self.client.open_merge_requests(project).await {
            Ok(count) => self.emit(
                project,
                "merge requests",
                &count.to_string(),
                open_items_color(count),
                &format!("{}/-/merge_requests", project.url),
            )
            .await,
            Err(e) => self.error(project, e).await,
        }
    }

    async fn branches(&self, project: &Project) -> Badge {
        match self.client.branch_count(project).await {
            Ok(count) => self.emit(
                project,
                "branches",
                &count.to_string(),
                branch_color(count),
                &format!("{}/-/branches", project.url),
            )
            .await,
            Err(e) => self.error(project, e).await,
        }
    }

    async fn version(&self, project: &Project) -> Option<Badge> {
        match self.client.latest_tag(project).await {
            Ok(Some(tag)) => Some(self.emit(
                project,
                "tag",
                &tag,
                BadgeColor::Blue,
                &format!("{}/-/tags", project.url),
            )
            .await),
            Ok(None) => None,
            Err(e) => Some(self.error(project, e).await),
        }
    }

    /// Badges that only need the project description
    async fn describe(&self, project: &Project, remote: &GitLabProject) -> Option<Badge> {
        let (label, value, color, link) = match self.kind {
            GitLabBadge::Issues => (
                "issues",
                remote.open_issues.to_string(),
                open_items_color(remote.open_issues),
                format!("{}/-/issues", project.url),
            ),
            GitLabBadge::LastCommit => (
                "last commit",
                format::relative_time(remote.last_activity_at, Utc::now()),
                activity_color(remote.last_activity_at, Utc::now()),
                format!("{}/-/commits", project.url),
            ),
            GitLabBadge::Stars => (
                "stars",
                remote.stars.to_string(),
                BadgeColor::Blue,
                format!("{}/-/starrers", project.url),
            ),
            GitLabBadge::Forks => (
                "Fork",
                remote.forks.to_string(),
                BadgeColor::Blue,
                format!("{}/-/forks", project.url),
            ),
            GitLabBadge::Visibility => {
                let color = match remote.visibility.as_str() {
                    "private" => BadgeColor::Yellow,
                    "public" => BadgeColor::Green,
                    _ => BadgeColor::Blue,
                };
                ("visibility", remote.visibility.clone(), color, project.url.clone())
            }
            GitLabBadge::Size => (
                "repo size",
                format::bytes(remote.repository_size),
                size_color(remote.repository_size, 1),
                project.url.clone(),
            ),
            GitLabBadge::Branches | GitLabBadge::MergeRequests | GitLabBadge::Version => return None,
        };
        Some(self.emit(project, label, &value, color, &link).await)
    }
}

#[async_trait]
impl Provider for GitLabProvider {
    async fn badge(&self, project: &Project) -> Option<Badge> {
        if !project.is_gitlab() {
            return None;
        }

        match self.kind {
            GitLabBadge::MergeRequests => Some(self.merge_requests(project).await),
            GitLabBadge::Branches => Some(self.branches(project).await),
            GitLabBadge::Version => self.version(project).await,
            _ => match self.client.project(project).await {
                Ok(remote) => self.describe(project, &remote).await,
                Err(e) => Some(self.error(project, e).await),
            },
        }
    }
}
