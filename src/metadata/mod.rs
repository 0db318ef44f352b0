//! Cached clients for the hosting APIs

pub mod github;
pub mod gitlab;

pub use github::{GitHubClient, GitHubRepository};
pub use gitlab::{GitLabClient, GitLabProject};
