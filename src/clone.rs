//! Repository clones shared by every badge that inspects repository contents

use crate::cache::SingleFlight;
use crate::error::{DashboardError, Result, SharedError};
use crate::types::Project;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info};
use url::Url;

const CLONE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Something that can place a copy of a project's default branch at a path
#[async_trait]
pub trait RepositoryFetcher: Send + Sync {
    /// Populate the empty directory `destination` with the repository
    async fn fetch(&self, project: &Project, destination: &Path) -> Result<()>;
}

/// Clones with the `git` command line client
#[derive(Debug, Clone)]
pub struct GitCli {
    insecure_tls: bool,
    timeout: Duration,
}

impl GitCli {
    pub fn new(insecure_tls: bool) -> Self {
        Self {
            insecure_tls,
            timeout: CLONE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl RepositoryFetcher for GitCli {
    async fn fetch(&self, project: &Project, destination: &Path) -> Result<()> {
        let remote = authenticated_url(&project.url, project.token.as_deref())?;
        let destination = destination
            .to_str()
            .ok_or_else(|| DashboardError::clone_failed(&project.url, "invalid UTF-8 in clone path"))?;

        let mut command = Command::new("git");
        if self.insecure_tls {
            command.args(["-c", "http.sslVerify=false"]);
        }
        command
            .args(["clone", "--depth", "1", "--single-branch", "--quiet"])
            .arg(remote.as_str())
            .arg(destination)
            // Missing credentials must fail instead of prompting.
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|e| DashboardError::clone_failed(&project.url, format!("could not spawn git: {}", e)))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(DashboardError::clone_failed(&project.url, e.to_string())),
            Err(_) => {
                return Err(DashboardError::clone_failed(
                    &project.url,
                    format!("timed out after {} seconds", self.timeout.as_secs()),
                ))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = match project.token.as_deref() {
                Some(token) if !token.is_empty() => stderr.replace(token, "***"),
                _ => stderr.into_owned(),
            };
            return Err(DashboardError::clone_failed(&project.url, stderr.trim()));
        }

        Ok(())
    }
}

/// Embed the access token as basic-auth password. The user name is ignored by
/// the hosters but must not be empty.
fn authenticated_url(url: &str, token: Option<&str>) -> Result<Url> {
    let mut parsed = Url::parse(url).map_err(|e| DashboardError::clone_failed(url, e.to_string()))?;

    if let Some(token) = token.filter(|t| !t.is_empty()) {
        if matches!(parsed.scheme(), "http" | "https") {
            parsed
                .set_username("oauth2")
                .and_then(|_| parsed.set_password(Some(token)))
                .map_err(|_| DashboardError::clone_failed(url, "URL cannot carry credentials"))?;
        }
    }

    Ok(parsed)
}

/// Clones each project at most once per run and hands out the local path
pub struct CloneManager {
    fetcher: Arc<dyn RepositoryFetcher>,
    clones: SingleFlight<PathBuf>,
    /// Keeps clone directories alive until the manager is dropped
    workspaces: Mutex<Vec<TempDir>>,
}

impl std::fmt::Debug for CloneManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloneManager")
            .field("clones", &self.clones.len())
            .finish()
    }
}

impl CloneManager {
    pub fn new(fetcher: Arc<dyn RepositoryFetcher>) -> Self {
        Self {
            fetcher,
            clones: SingleFlight::new(),
            workspaces: Mutex::new(Vec::new()),
        }
    }

    /// Local path of the project's clone, cloning on first use
    pub async fn ensure_clone(&self, project: &Project) -> std::result::Result<PathBuf, SharedError> {
        self.clones
            .get_or_fetch(&project.url, || self.clone_into_workspace(project))
            .await
    }

    async fn clone_into_workspace(&self, project: &Project) -> Result<PathBuf> {
        let workspace = tokio::task::spawn_blocking(|| tempfile::Builder::new().prefix("git").tempdir())
            .await
            .map_err(|e| DashboardError::clone_failed(&project.url, e.to_string()))??;
        info!("Cloning {}", project.url);

        // Dropping the workspace on failure removes the partial clone.
        self.fetcher.fetch(project, workspace.path()).await?;

        let path = workspace.path().to_path_buf();
        debug!("Cloned {} into {}", project.url, path.display());
        self.workspaces
            .lock()
            .map_err(|_| DashboardError::clone_failed(&project.url, "workspace registry poisoned"))?
            .push(workspace);
        Ok(path)
    }
}
