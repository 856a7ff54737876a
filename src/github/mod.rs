//! GitHub API operations using octocrab.

pub mod auth;
pub mod client;

pub use auth::discover_token;
pub use client::{GitHubClient, parse_remote_url};

use async_trait::async_trait;

use crate::error::GitHubError;

/// Capability surface for the GitHub side of the pr workflow.
///
/// This abstraction allows swapping in a fake for tests.
#[async_trait]
pub trait GitHubBackend: Send + Sync {
    /// Open a pull request from `head` into `base` and return its web URL.
    async fn create_pull_request(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<String, GitHubError>;
}
