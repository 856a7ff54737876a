//! Git capability: the trait the workflow talks to and its git2-backed
//! implementation.

pub mod local;

pub use local::LocalGit;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::changeset::RawChange;
use crate::error::GitError;

/// One commit in the range a pull request ships. Serialized as JSON into
/// the PR-description prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitInfo {
    /// Abbreviated hash.
    pub hash: String,
    pub summary: String,
    pub timestamp: DateTime<Utc>,
}

/// Local git operations the workflow needs.
///
/// Methods take `&self` so fakes can use interior mutability.
pub trait GitBackend {
    /// Pending changes: staged, unstaged, and untracked files. Staged
    /// entries come first so deduplication keeps the staged version of a
    /// doubly-changed path.
    fn changes(&self) -> Result<Vec<RawChange>, GitError>;

    /// Stage the given repo-relative paths, deletions included.
    fn stage(&self, paths: &[String]) -> Result<(), GitError>;

    /// Commit the index to HEAD; returns the abbreviated commit hash.
    fn commit(&self, message: &str) -> Result<String, GitError>;

    fn current_branch(&self) -> Result<String, GitError>;

    /// The repository's default branch, or `None` when neither origin/HEAD
    /// nor a local or remote main/master exists.
    fn default_branch(&self) -> Result<Option<String>, GitError>;

    fn branch_exists(&self, name: &str) -> Result<bool, GitError>;

    /// Create `name` at HEAD and check it out.
    fn create_branch(&self, name: &str) -> Result<(), GitError>;

    /// Push `branch` to origin, setting the upstream.
    fn push(&self, branch: &str) -> Result<(), GitError>;

    /// Commits on HEAD that `base` does not have, oldest first.
    fn commits_since(&self, base: &str) -> Result<Vec<CommitInfo>, GitError>;
}
