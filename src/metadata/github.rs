//! GitHub REST API client with per-repository caching

use crate::cache::SingleFlight;
use crate::config::NetworkConfig;
use crate::error::{DashboardError, Result, SharedError};
use crate::types::Project;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Repository description as used by the GitHub badges
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRepository {
    pub full_name: String,
    pub stars: u64,
    pub forks: u64,
    pub watchers: u64,
    /// Open issues including open pull requests, as GitHub counts them
    pub open_issues: u64,
    pub has_issues: bool,
    pub is_private: bool,
    pub is_archived: bool,
    /// Repository size in kilobytes
    pub size_kb: u64,
    /// SPDX id of the detected license, if any
    pub license: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct GitHubRepo {
    full_name: String,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
    #[serde(default)]
    subscribers_count: u64,
    #[serde(default)]
    open_issues_count: u64,
    #[serde(default = "default_true")]
    has_issues: bool,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    size: u64,
    license: Option<GitHubLicense>,
    updated_at: String,
}

#[derive(Debug, Deserialize)]
struct GitHubLicense {
    spdx_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubTag {
    name: String,
}

fn default_true() -> bool {
    true
}

/// GitHub API access shared by all GitHub providers.
///
/// Repository descriptions and open pull request counts are fetched at most
/// once per project URL.
#[derive(Debug)]
pub struct GitHubClient {
    client: Client,
    api_url: String,
    repositories: SingleFlight<GitHubRepository>,
    pull_requests: SingleFlight<u64>,
}

impl GitHubClient {
    pub fn new(config: &NetworkConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            api_url: config.github_api_url.trim_end_matches('/').to_string(),
            repositories: SingleFlight::new(),
            pull_requests: SingleFlight::new(),
        })
    }

    /// Cached repository description
    pub async fn repository(&self, project: &Project) -> std::result::Result<GitHubRepository, SharedError> {
        self.repositories
            .get_or_fetch(&project.url, || self.fetch_repository(project))
            .await
    }

    /// Cached number of open pull requests
    pub async fn open_pull_requests(&self, project: &Project) -> std::result::Result<u64, SharedError> {
        self.pull_requests
            .get_or_fetch(&project.url, || async {
                let url = format!("{}/pulls?per_page=1", self.repo_url(project));
                self.count_items(&url).await
            })
            .await
    }

    /// Number of branches
    pub async fn branch_count(&self, project: &Project) -> Result<u64> {
        let url = format!("{}/branches?per_page=1", self.repo_url(project));
        self.count_items(&url).await
    }

    /// Name of the most recent tag, if the repository has any
    pub async fn latest_tag(&self, project: &Project) -> Result<Option<String>> {
        let url = format!("{}/tags?per_page=1", self.repo_url(project));
        let tags: Vec<GitHubTag> = self.get(&url).await?.json().await?;
        Ok(tags.into_iter().next().map(|tag| tag.name))
    }

    fn repo_url(&self, project: &Project) -> String {
        format!("{}/repos/{}/{}", self.api_url, project.namespace, project.name)
    }

    async fn fetch_repository(&self, project: &Project) -> Result<GitHubRepository> {
        debug!("Fetching GitHub metadata for {}/{}", project.namespace, project.name);

        let repo: GitHubRepo = self.get(&self.repo_url(project)).await?.json().await?;
        let updated_at = parse_github_datetime(&repo.updated_at)?;

        Ok(GitHubRepository {
            full_name: repo.full_name,
            stars: repo.stargazers_count,
            forks: repo.forks_count,
            watchers: repo.subscribers_count,
            open_issues: repo.open_issues_count,
            has_issues: repo.has_issues,
            is_private: repo.private,
            is_archived: repo.archived,
            size_kb: repo.size,
            license: repo.license.map(|l| l.spdx_id.unwrap_or_else(|| "NOASSERTION".to_string())),
            updated_at,
        })
    }

    /// Item count of a listing requested with `per_page=1`: the last page
    /// number from the Link header, or the number of returned items when
    /// everything fit on one page.
    async fn count_items(&self, url: &str) -> Result<u64> {
        let response = self.get(url).await?;

        let last_page = response
            .headers()
            .get("link")
            .and_then(|v| v.to_str().ok())
            .and_then(extract_last_page);
        if let Some(last_page) = last_page {
            return Ok(last_page);
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
            .map_err(|e| DashboardError::network(format!("GitHub request failed: {}", e)))?;
        check_status(response)
    }
}

/// Map error statuses to dashboard errors
fn check_status(response: Response) -> Result<Response> {
    let status = response.status();

    if status.as_u16() == 403 || status.as_u16() == 429 {
        let retry_after = response
            .headers()
            .get("x-ratelimit-reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<i64>().ok())
            .map(|reset| Duration::from_secs(reset.saturating_sub(Utc::now().timestamp()).max(0) as u64));

        return Err(DashboardError::RateLimitExceeded {
            service: "GitHub".to_string(),
            retry_after,
        });
    }

    if status.as_u16() == 404 {
        return Err(DashboardError::api("GitHub", "Repository not found"));
    }

    if !status.is_success() {
        return Err(DashboardError::api("GitHub", format!("HTTP {}", status)));
    }

    Ok(response)
}

/// Build HTTP client with GitHub authentication if available
fn build_client(config: &NetworkConfig) -> Result<Client> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("application/vnd.github.v3+json"),
    );

    if let Some(token) = &config.github_token {
        let value = format!("token {}", token)
            .parse()
            .map_err(|_| DashboardError::config("GitHub token contains invalid header characters"))?;
        headers.insert(reqwest::header::AUTHORIZATION, value);
    }

    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.timeout())
        .danger_accept_invalid_certs(config.insecure_tls)
        .default_headers(headers)
        .build()
        .map_err(|e| DashboardError::network(format!("Failed to build HTTP client: {}", e)))
}

/// Extract last page number from Link header
fn extract_last_page(link_header: &str) -> Option<u64> {
    for link in link_header.split(',') {
        if link.contains("rel=\"last\"") {
            // The page number is the last `page=` query value inside <...>
            if let Some(page_str) = link
                .rsplit("page=")
                .next()
                .and_then(|s| s.split(['>', '&']).next())
            {
                return page_str.parse().ok();
            }
        }
    }
    None
}

/// Parse GitHub datetime format
fn parse_github_datetime(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DashboardError::parse(format!("Invalid GitHub datetime: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> Project {
        Project {
            hoster: "github.com".to_string(),
            namespace: "acme".to_string(),
            name: "widget".to_string(),
            url: "https://github.com/acme/widget".to_string(),
            ..Project::default()
        }
    }

    fn client_for(server: &mockito::Server) -> GitHubClient {
        let config = NetworkConfig {
            github_token: Some("test-token".to_string()),
            github_api_url: server.url(),
            ..NetworkConfig::default()
        };
        GitHubClient::new(&config).unwrap()
    }

    #[test]
    fn test_extract_last_page() {
        let link_header = r#"<https://api.github.com/repos/rust-lang/rust/contributors?page=2>; rel="next", <https://api.github.com/repos/rust-lang/rust/contributors?page=50>; rel="last""#;
        assert_eq!(extract_last_page(link_header), Some(50));

        let per_page_first = r#"<https://api.github.com/repositories/1/pulls?per_page=1&page=7>; rel="last""#;
        assert_eq!(extract_last_page(per_page_first), Some(7));

        assert_eq!(extract_last_page(r#"<https://x?page=2>; rel="next""#), None);
    }

    #[tokio::test]
    async fn test_repository_is_fetched_once() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/acme/widget")
            .match_header("authorization", "token test-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"full_name":"acme/widget","stargazers_count":42,"forks_count":3,
                    "subscribers_count":5,"open_issues_count":4,"has_issues":true,
                    "private":false,"archived":false,"size":2048,
                    "license":{"spdx_id":"MIT"},"updated_at":"2024-01-02T03:04:05Z"}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server);
        let first = client.repository(&project()).await.unwrap();
        let second = client.repository(&project()).await.unwrap();

        assert_eq!(first.stars, 42);
        assert_eq!(second.license.as_deref(), Some("MIT"));
        assert_eq!(first.size_kb, 2048);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_pull_request_count_from_link_header() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/acme/widget/pulls?per_page=1")
            .with_status(200)
            .with_header(
                "link",
                r#"<https://api.github.com/repositories/1/pulls?per_page=1&page=2>; rel="next", <https://api.github.com/repositories/1/pulls?per_page=1&page=9>; rel="last""#,
            )
            .with_body("[{}]")
            .create_async()
            .await;

        let client = client_for(&server);
        assert_eq!(client.open_pull_requests(&project()).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_count_without_link_header_uses_items() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/acme/widget/branches?per_page=1")
            .with_status(200)
            .with_body(r#"[{"name":"main"}]"#)
            .create_async()
            .await;

        let client = client_for(&server);
        assert_eq!(client.branch_count(&project()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_latest_tag_empty() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/acme/widget/tags?per_page=1")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = client_for(&server);
        assert_eq!(client.latest_tag(&project()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_not_found_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/acme/widget")
            .with_status(404)
            .create_async()
            .await;

        let client = client_for(&server);
        let error = client.repository(&project()).await.unwrap_err();
        assert!(matches!(*error, DashboardError::ApiError { .. }));
    }
}
