//! Pull request creation via octocrab.

use std::time::Duration;

use async_trait::async_trait;
use octocrab::Octocrab;
use tracing::info;

use crate::error::GitHubError;

use super::{GitHubBackend, auth};

/// octocrab-backed client bound to one owner/repo pair.
pub struct GitHubClient {
    octocrab: Octocrab,
    owner: String,
    repo: String,
    timeout: Duration,
}

impl GitHubClient {
    /// Build a client for the repository behind an origin remote URL.
    ///
    /// Discovers a token, parses owner/repo out of the URL, and talks to
    /// api.github.com.
    pub fn from_remote(remote_url: &str, timeout: Duration) -> Result<Self, GitHubError> {
        let token = auth::discover_token()?;
        let (owner, repo) = parse_remote_url(remote_url)?;
        let octocrab = Octocrab::builder()
            .personal_token(token)
            .build()
            .map_err(|e| GitHubError::CreatePullRequest(Box::new(e)))?;
        Ok(GitHubClient {
            octocrab,
            owner,
            repo,
            timeout,
        })
    }

    /// Build against a pre-configured octocrab instance.
    ///
    /// This allows dependency injection for testing with mock servers.
    pub fn with_client(octocrab: Octocrab, owner: &str, repo: &str, timeout: Duration) -> Self {
        GitHubClient {
            octocrab,
            owner: owner.to_string(),
            repo: repo.to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl GitHubBackend for GitHubClient {
    async fn create_pull_request(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<String, GitHubError> {
        let pulls = self.octocrab.pulls(&self.owner, &self.repo);
        let request = pulls.create(title, head, base).body(body).send();

        let pr = match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result.map_err(|e| GitHubError::CreatePullRequest(Box::new(e)))?,
            Err(_) => return Err(GitHubError::Timeout(self.timeout.as_secs())),
        };

        let url = pr
            .html_url
            .map(|u| u.to_string())
            .ok_or(GitHubError::MissingPullRequestUrl)?;
        info!(%url, "created pull request");
        Ok(url)
    }
}

/// Extract owner and repo from a git remote URL.
///
/// Accepts both `git@github.com:owner/repo.git` and
/// `https://github.com/owner/repo` forms.
pub fn parse_remote_url(url: &str) -> Result<(String, String), GitHubError> {
    let invalid = || GitHubError::InvalidRepositoryUrl(url.to_string());

    if let Some(path) = url.strip_prefix("git@github.com:") {
        return parse_owner_repo_path(path).ok_or_else(invalid);
    }
    if url.contains("github.com/") {
        let path = url.split("github.com/").nth(1).ok_or_else(invalid)?;
        return parse_owner_repo_path(path).ok_or_else(invalid);
    }
    Err(invalid())
}

fn parse_owner_repo_path(path: &str) -> Option<(String, String)> {
    let path = path.strip_suffix(".git").unwrap_or(path);
    let mut parts = path.split('/');
    let owner = parts.next().filter(|s| !s.is_empty())?;
    let repo = parts.next().filter(|s| !s.is_empty())?;
    Some((owner.to_string(), repo.to_string()))
}
