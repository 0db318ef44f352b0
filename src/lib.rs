//! # project_dashboard
//!
//! Badge computation for a status dashboard covering a portfolio of
//! repositories:
//! - **Hosting metadata**: stars, issues, pull requests, license and activity
//!   from the GitHub and GitLab APIs, fetched once per repository
//! - **Repository checks**: README and `.gitignore` presence on a shallow clone
//! - **External tools**: super-linter, bandit, pycodestyle and shhgit run with
//!   a timeout against the clone
//! - **Artifacts**: SVG badges and tool logs below `badges/<hoster>/<project>/`
//!
//! ## Quick Start
//!
//! ```no_run
//! use project_dashboard::{
//!     load_layout, normalize_layout, render_markdown, run_dashboard, DashboardConfig, GitCli, Registry,
//! };
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = DashboardConfig::default();
//! let mut layout = load_layout(Path::new("dashboard.yml"))?;
//! normalize_layout(&mut layout, &config.network);
//!
//! let registry = Registry::with_defaults(&config, Arc::new(GitCli::new(config.network.insecure_tls)))?;
//! let report = run_dashboard(&layout, &registry, &config.scheduler).await;
//! println!("{}", render_markdown(&layout, &report));
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - One concurrent unit of work per (project, badge) pair under a global deadline
//! - Single-flight caches so each repository is fetched and cloned at most once
//! - Per-project enable/disable overrides of column defaults
//! - Failures become error badges instead of aborting the run

mod artifact;
mod cache;
mod clone;
mod config;
mod error;
mod format;
mod metadata;
mod parser;
pub mod providers;
mod render;
mod sandbox;
mod scheduler;
mod types;

// Re-export public API
pub use artifact::ArtifactEmitter;
pub use cache::SingleFlight;
pub use clone::{CloneManager, GitCli, RepositoryFetcher};
pub use config::{DashboardConfig, DashboardConfigBuilder, NetworkConfig, SchedulerConfig, ToolsConfig};
pub use error::{DashboardError, Result, SharedError};
pub use metadata::{GitHubClient, GitHubRepository, GitLabClient, GitLabProject};
pub use parser::{load_layout, normalize_layout, parse_layout};
pub use providers::{Provider, Registry};
pub use render::{render_markdown, write_index};
pub use sandbox::{sanitize, ToolCommand, ToolOutput, ToolStatus};
pub use scheduler::{effective_badges, run_dashboard, ResultTable};
pub use types::{
    Badge, BadgeColor, BadgeFace, Category, Column, DashboardReport, Layout, Project, ReportSummary, ResultKey,
};
