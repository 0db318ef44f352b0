//! Layout parsing and project URL normalization

use crate::config::NetworkConfig;
use crate::error::{DashboardError, Result};
use crate::types::{Layout, Project};
use std::path::Path;
use tracing::{debug, warn};
use url::Url;

/// Read and parse a YAML layout file.
///
/// This is the one failure that aborts a run: nothing is scheduled when the
/// layout cannot be read.
pub fn load_layout(path: &Path) -> Result<Layout> {
    if !path.exists() {
        return Err(DashboardError::parse(format!(
            "layout file not found at {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    parse_layout(&content)
}

/// Parse a YAML layout document
pub fn parse_layout(yaml: &str) -> Result<Layout> {
    let layout: Layout = serde_yaml::from_str(yaml)?;
    Ok(layout)
}

/// Normalize every project of the layout in place.
///
/// A project whose URL does not parse is logged and left as-is; its badges
/// then see no hoster and report inapplicable or error.
pub fn normalize_layout(layout: &mut Layout, network: &NetworkConfig) {
    for category in &mut layout.categories {
        for project in &mut category.projects {
            if let Err(e) = project.normalize(network) {
                warn!("Skipping normalization of {:?}: {}", project.url, e);
            }
        }
    }
}

impl Project {
    /// Derive hoster, namespace and name from the URL and assign the hoster's
    /// access token when the project has none of its own.
    pub fn normalize(&mut self, network: &NetworkConfig) -> Result<()> {
        let parsed = Url::parse(&self.url)
            .map_err(|e| DashboardError::parse(format!("Invalid project URL {}: {}", self.url, e)))?;

        let host = parsed
            .host_str()
            .ok_or_else(|| DashboardError::parse(format!("Project URL has no host: {}", self.url)))?;

        let (namespace, name) = split_repository_path(parsed.path())
            .ok_or_else(|| DashboardError::parse(format!("Project URL has no repository path: {}", self.url)))?;

        self.hoster = host.to_string();
        self.namespace = namespace;
        self.name = name;

        if self.go_import_path.is_empty() {
            self.go_import_path = format!("{}/{}/{}", self.hoster, self.namespace, self.name);
        }

        if self.token.is_none() {
            self.token = if self.is_github() {
                network.github_token.clone()
            } else if self.is_gitlab() {
                network.gitlab_token.clone()
            } else {
                None
            };
        }

        debug!("Normalized {} as {}/{}", self.url, self.namespace, self.name);
        Ok(())
    }
}

/// Split `/group/sub/repo` into (`group/sub`, `repo`)
fn split_repository_path(path: &str) -> Option<(String, String)> {
    let path = path.trim_end_matches('/');
    let (dir, name) = path.rsplit_once('/')?;
    if name.is_empty() {
        return None;
    }
    Some((dir.trim_start_matches('/').to_string(), name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network() -> NetworkConfig {
        NetworkConfig {
            github_token: Some("gh-token".to_string()),
            gitlab_token: Some("gl-token".to_string()),
            ..NetworkConfig::default()
        }
    }

    #[test]
    fn test_split_repository_path() {
        let test_cases = vec![
            ("/acme/widget", ("acme", "widget")),
            ("/acme/widget/", ("acme", "widget")),
            ("/group/subgroup/project", ("group/subgroup", "project")),
            ("/widget", ("", "widget")),
        ];

        for (path, expected) in test_cases {
            let result = split_repository_path(path).unwrap();
            assert_eq!(result, (expected.0.to_string(), expected.1.to_string()));
        }

        assert!(split_repository_path("/").is_none());
        assert!(split_repository_path("").is_none());
    }

    #[test]
    fn test_normalize_github_project() {
        let mut project = Project {
            url: "https://github.com/acme/widget".to_string(),
            ..Project::default()
        };
        project.normalize(&network()).unwrap();

        assert_eq!(project.hoster, "github.com");
        assert_eq!(project.namespace, "acme");
        assert_eq!(project.name, "widget");
        assert_eq!(project.go_import_path, "github.com/acme/widget");
        assert_eq!(project.token.as_deref(), Some("gh-token"));
    }

    #[test]
    fn test_normalize_self_hosted_gitlab_keeps_own_token() {
        let mut project = Project {
            url: "https://git.example.org/team/tools/app".to_string(),
            is_gitlab: true,
            token: Some("own".to_string()),
            go_import_path: "example.org/app".to_string(),
            ..Project::default()
        };
        project.normalize(&network()).unwrap();

        assert_eq!(project.hoster, "git.example.org");
        assert_eq!(project.namespace, "team/tools");
        assert_eq!(project.go_import_path, "example.org/app");
        assert_eq!(project.token.as_deref(), Some("own"));
    }

    #[test]
    fn test_normalize_unknown_hoster_gets_no_token() {
        let mut project = Project {
            url: "https://bitbucket.org/acme/widget".to_string(),
            ..Project::default()
        };
        project.normalize(&network()).unwrap();
        assert!(project.token.is_none());
    }

    #[test]
    fn test_normalize_invalid_url() {
        let mut project = Project {
            url: "not a url".to_string(),
            ..Project::default()
        };
        assert!(project.normalize(&network()).is_err());
        assert!(project.hoster.is_empty());
    }

    #[test]
    fn test_parse_layout_rejects_malformed_yaml() {
        assert!(parse_layout("table: [unterminated").is_err());
    }

    #[test]
    fn test_load_layout_missing_file() {
        let err = load_layout(Path::new("/definitely/not/here.yml")).unwrap_err();
        assert!(matches!(err, DashboardError::ParseError(_)));
    }
}
