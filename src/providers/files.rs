//! Presence checks on a repository clone

use super::Provider;
use crate::artifact::ArtifactEmitter;
use crate::clone::CloneManager;
use crate::types::{Badge, BadgeColor, Project};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Files a repository is expected to contain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCheck {
    /// `README` or `README.md`
    Readme,
    Gitignore,
}

impl FileCheck {
    pub fn key(self) -> &'static str {
        match self {
            Self::Readme => "readme",
            Self::Gitignore => "gitignore",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Readme => "Readme",
            Self::Gitignore => ".gitignore",
        }
    }

    fn candidates(self) -> &'static [&'static str] {
        match self {
            Self::Readme => &["README", "README.md"],
            Self::Gitignore => &[".gitignore"],
        }
    }

    async fn is_satisfied(self, clone: &Path) -> bool {
        for name in self.candidates() {
            if tokio::fs::metadata(clone.join(name)).await.is_ok() {
                return true;
            }
        }
        false
    }
}

#[derive(Debug, Clone)]
pub struct FileCheckProvider {
    check: FileCheck,
    clones: Arc<CloneManager>,
    artifacts: ArtifactEmitter,
}

impl FileCheckProvider {
    pub fn new(check: FileCheck, clones: Arc<CloneManager>, artifacts: ArtifactEmitter) -> Self {
        Self {
            check,
            clones,
            artifacts,
        }
    }
}

#[async_trait]
impl Provider for FileCheckProvider {
    async fn badge(&self, project: &Project) -> Option<Badge> {
        let key = self.check.key();
        let clone = match self.clones.ensure_clone(project).await {
            Ok(path) => path,
            Err(e) => return Some(self.artifacts.error_badge(project, key, e).await),
        };

        let (value, color) = if self.check.is_satisfied(&clone).await {
            ("exists", BadgeColor::BrightGreen)
        } else {
            ("missing", BadgeColor::Red)
        };
        Some(
            self.artifacts
                .emit(project, key, self.check.label(), value, color, &project.url, None)
                .await,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clone::RepositoryFetcher;
    use crate::error::{DashboardError, Result};

    /// Produces a checkout containing only the given files
    struct StaticFetcher(Option<&'static [&'static str]>);

    #[async_trait]
    impl RepositoryFetcher for StaticFetcher {
        async fn fetch(&self, project: &Project, destination: &Path) -> Result<()> {
            let files = self
                .0
                .ok_or_else(|| DashboardError::clone_failed(&project.url, "could not read Username"))?;
            for file in files {
                std::fs::write(destination.join(file), "")?;
            }
            Ok(())
        }
    }

    fn project() -> Project {
        Project {
            hoster: "github.com".to_string(),
            namespace: "acme".to_string(),
            name: "widget".to_string(),
            url: "https://github.com/acme/widget".to_string(),
            ..Project::default()
        }
    }

    fn provider(check: FileCheck, files: Option<&'static [&'static str]>, root: &Path) -> FileCheckProvider {
        let clones = Arc::new(CloneManager::new(Arc::new(StaticFetcher(files))));
        FileCheckProvider::new(check, clones, ArtifactEmitter::new(root))
    }

    #[tokio::test]
    async fn test_plain_readme_counts() {
        let dir = tempfile::tempdir().unwrap();
        let badge = provider(FileCheck::Readme, Some(&["README"]), dir.path())
            .badge(&project())
            .await
            .unwrap();

        let face = badge.face.unwrap();
        assert_eq!((face.label.as_str(), face.value.as_str()), ("Readme", "exists"));
        assert_eq!(badge.url, "badges/github.com/widget/readme.svg");
    }

    #[tokio::test]
    async fn test_missing_gitignore() {
        let dir = tempfile::tempdir().unwrap();
        let badge = provider(FileCheck::Gitignore, Some(&["README.md"]), dir.path())
            .badge(&project())
            .await
            .unwrap();

        let face = badge.face.unwrap();
        assert_eq!((face.value.as_str(), face.color), ("missing", BadgeColor::Red));
    }

    #[tokio::test]
    async fn test_clone_failure_is_error_badge() {
        let dir = tempfile::tempdir().unwrap();
        let badge = provider(FileCheck::Readme, None, dir.path())
            .badge(&project())
            .await
            .unwrap();

        assert!(badge.is_error());
        assert!(badge.error.unwrap().contains("could not read Username"));
    }
}
