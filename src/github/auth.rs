//! GitHub token discovery.
//!
//! Order:
//! 1. The gh CLI, when it reports an authenticated session
//! 2. The GITHUB_TOKEN environment variable
//! 3. The GH_TOKEN environment variable

use std::env;
use std::process::Command;

use crate::error::GitHubError;

/// Find a usable GitHub token, or fail with guidance.
pub fn discover_token() -> Result<String, GitHubError> {
    if let Some(token) = token_from_gh_cli() {
        return Ok(token);
    }
    if let Some(token) = token_from_env() {
        return Ok(token);
    }
    Err(GitHubError::AuthenticationFailed)
}

/// Ask the gh CLI for its token, if gh is installed and logged in.
fn token_from_gh_cli() -> Option<String> {
    let status = Command::new("gh").args(["auth", "status"]).output().ok()?;
    if !status.status.success() {
        return None;
    }

    let output = Command::new("gh").args(["auth", "token"]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() { None } else { Some(token) }
}

fn token_from_env() -> Option<String> {
    for var in ["GITHUB_TOKEN", "GH_TOKEN"] {
        if let Ok(token) = env::var(var) {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_env_token_prefers_github_token() {
        temp_env::with_vars(
            [("GITHUB_TOKEN", Some("tok-a")), ("GH_TOKEN", Some("tok-b"))],
            || {
                assert_eq!(token_from_env().as_deref(), Some("tok-a"));
            },
        );
    }

    #[test]
    #[serial]
    fn test_env_token_falls_back_to_gh_token() {
        temp_env::with_vars(
            [("GITHUB_TOKEN", None::<&str>), ("GH_TOKEN", Some("tok-b"))],
            || {
                assert_eq!(token_from_env().as_deref(), Some("tok-b"));
            },
        );
    }

    #[test]
    #[serial]
    fn test_env_token_ignores_blank_values() {
        temp_env::with_vars(
            [("GITHUB_TOKEN", Some("   ")), ("GH_TOKEN", None::<&str>)],
            || {
                assert_eq!(token_from_env(), None);
            },
        );
    }
}
