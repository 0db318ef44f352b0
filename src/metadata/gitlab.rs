//! GitLab REST API client with per-project caching

use crate::cache::SingleFlight;
use crate::config::NetworkConfig;
use crate::error::{DashboardError, Result, SharedError};
use crate::types::Project;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Project description as used by the GitLab badges
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitLabProject {
    pub path_with_namespace: String,
    pub stars: u64,
    pub forks: u64,
    pub open_issues: u64,
    /// `public`, `internal` or `private`
    pub visibility: String,
    /// Repository size in bytes, when statistics are visible to the token
    pub repository_size: u64,
    pub last_activity_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct GitLabProjectResponse {
    path_with_namespace: String,
    #[serde(default)]
    star_count: u64,
    #[serde(default)]
    forks_count: u64,
    #[serde(default)]
    open_issues_count: u64,
    #[serde(default)]
    visibility: String,
    last_activity_at: String,
    statistics: Option<GitLabStatistics>,
}

#[derive(Debug, Deserialize)]
struct GitLabStatistics {
    #[serde(default)]
    repository_size: u64,
}

#[derive(Debug, Deserialize)]
struct GitLabTag {
    name: String,
}

/// GitLab API access shared by all GitLab providers.
///
/// Works against gitlab.com and self-hosted instances: unless an API URL is
/// configured, requests go to `https://<hoster>/api/v4`.
#[derive(Debug)]
pub struct GitLabClient {
    client: Client,
    api_url: Option<String>,
    projects: SingleFlight<GitLabProject>,
    merge_requests: SingleFlight<u64>,
}

impl GitLabClient {
    pub fn new(config: &NetworkConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            api_url: config
                .gitlab_api_url
                .as_ref()
                .map(|url| url.trim_end_matches('/').to_string()),
            projects: SingleFlight::new(),
            merge_requests: SingleFlight::new(),
        })
    }

    /// Cached project description, including statistics
    pub async fn project(&self, project: &Project) -> std::result::Result<GitLabProject, SharedError> {
        self.projects
            .get_or_fetch(&project.url, || self.fetch_project(project))
            .await
    }

    /// Cached number of opened merge requests
    pub async fn open_merge_requests(&self, project: &Project) -> std::result::Result<u64, SharedError> {
        self.merge_requests
            .get_or_fetch(&project.url, || async {
                let url = format!("{}/merge_requests?state=opened&per_page=1", self.project_url(project));
                self.count_items(&url).await
            })
            .await
    }

    /// Number of branches
    pub async fn branch_count(&self, project: &Project) -> Result<u64> {
        let url = format!("{}/repository/branches?per_page=1", self.project_url(project));
        self.count_items(&url).await
    }

    /// Name of the most recent tag, if the project has any
    pub async fn latest_tag(&self, project: &Project) -> Result<Option<String>> {
        let url = format!("{}/repository/tags?per_page=1", self.project_url(project));
        let tags: Vec<GitLabTag> = self.get(&url).await?.json().await?;
        Ok(tags.into_iter().next().map(|tag| tag.name))
    }

    fn project_url(&self, project: &Project) -> String {
        let base = match &self.api_url {
            Some(url) => url.clone(),
            None => format!("https://{}/api/v4", project.hoster),
        };
        // URL-encode the project path
        format!("{}/projects/{}", base, urlencoding::encode(&project.full_path()))
    }

    async fn fetch_project(&self, project: &Project) -> Result<GitLabProject> {
        debug!("Fetching GitLab metadata for {}", project.full_path());

        let url = format!("{}?statistics=true", self.project_url(project));
        let response: GitLabProjectResponse = self.get(&url).await?.json().await?;
        let last_activity_at = parse_gitlab_datetime(&response.last_activity_at)?;

        Ok(GitLabProject {
            path_with_namespace: response.path_with_namespace,
            stars: response.star_count,
            forks: response.forks_count,
            open_issues: response.open_issues_count,
            visibility: response.visibility,
            repository_size: response.statistics.map(|s| s.repository_size).unwrap_or(0),
            last_activity_at,
        })
    }

    /// Item count of a listing from the `X-Total` header, falling back to the
    /// number of returned items
    async fn count_items(&self, url: &str) -> Result<u64> {
        let response = self.get(url).await?;

        let total = response
            .headers()
            .get("x-total")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok());
        if let Some(total) = total {
            return Ok(total);
        }

        let items: Vec<serde_json::Value> = response.json().await?;
        Ok(items.len() as u64)
    }

    async fn get(&self, url: &str) -> Result<Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DashboardError::network(format!("GitLab request failed: {}", e)))?;

        if !response.status().is_success() {
            if response.status().as_u16() == 404 {
                return Err(DashboardError::api("GitLab", "Project not found"));
            }
            if response.status().as_u16() == 429 {
                return Err(DashboardError::RateLimitExceeded {
                    service: "GitLab".to_string(),
                    retry_after: None,
                });
            }
            return Err(DashboardError::api(
                "GitLab",
                format!("HTTP {}", response.status()),
            ));
        }

        Ok(response)
    }
}

/// Build HTTP client with GitLab authentication if available
fn build_client(config: &NetworkConfig) -> Result<Client> {
    let mut builder = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.timeout())
        .danger_accept_invalid_certs(config.insecure_tls);

    if let Some(token) = &config.gitlab_token {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "PRIVATE-TOKEN",
            token
                .parse()
                .map_err(|_| DashboardError::config("GitLab token contains invalid header characters"))?,
        );
        builder = builder.default_headers(headers);
    }

    builder
        .build()
        .map_err(|e| DashboardError::network(format!("Failed to build HTTP client: {}", e)))
}

/// Parse GitLab datetime format (ISO 8601)
fn parse_gitlab_datetime(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DashboardError::parse(format!("Invalid GitLab datetime: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> Project {
        Project {
            hoster: "gitlab.com".to_string(),
            namespace: "group/sub".to_string(),
            name: "app".to_string(),
            url: "https://gitlab.com/group/sub/app".to_string(),
            ..Project::default()
        }
    }

    fn client_for(server: &mockito::Server) -> GitLabClient {
        let config = NetworkConfig {
            gitlab_token: Some("test-token".to_string()),
            gitlab_api_url: Some(server.url()),
            ..NetworkConfig::default()
        };
        GitLabClient::new(&config).unwrap()
    }

    #[test]
    fn test_default_api_url_follows_hoster() {
        let client = GitLabClient::new(&NetworkConfig {
            gitlab_api_url: None,
            ..NetworkConfig::default()
        })
        .unwrap();

        let mut self_hosted = project();
        self_hosted.hoster = "git.example.org".to_string();
        assert_eq!(
            client.project_url(&self_hosted),
            "https://git.example.org/api/v4/projects/group%2Fsub%2Fapp"
        );
    }

    #[tokio::test]
    async fn test_project_is_fetched_once() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/projects/group%2Fsub%2Fapp?statistics=true")
            .match_header("private-token", "test-token")
            .with_status(200)
            .with_body(
                r#"{"path_with_namespace":"group/sub/app","star_count":7,"forks_count":1,
                    "open_issues_count":0,"visibility":"internal",
                    "last_activity_at":"2024-05-06T07:08:09.000Z",
                    "statistics":{"repository_size":3145728}}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server);
        let first = client.project(&project()).await.unwrap();
        let second = client.project(&project()).await.unwrap();

        assert_eq!(first.stars, 7);
        assert_eq!(second.repository_size, 3_145_728);
        assert_eq!(first.visibility, "internal");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_merge_request_count_from_total_header() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/projects/group%2Fsub%2Fapp/merge_requests?state=opened&per_page=1")
            .with_status(200)
            .with_header("x-total", "4")
            .with_body("[{}]")
            .create_async()
            .await;

        let client = client_for(&server);
        assert_eq!(client.open_merge_requests(&project()).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_latest_tag() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/projects/group%2Fsub%2Fapp/repository/tags?per_page=1")
            .with_status(200)
            .with_body(r#"[{"name":"v1.2.3"}]"#)
            .create_async()
            .await;

        let client = client_for(&server);
        assert_eq!(client.latest_tag(&project()).await.unwrap().as_deref(), Some("v1.2.3"));
    }
}
