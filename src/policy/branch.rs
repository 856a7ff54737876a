//! Branch-requirement decision and slug collision resolution.

use tracing::debug;

use crate::error::GitError;
use crate::git::GitBackend;

/// Bound on collision-suffix probing before giving up.
const MAX_SUFFIX_ATTEMPTS: u32 = 100;

/// Whether the workflow must move to a new branch before committing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchDecision {
    pub must_create_branch: bool,
}

/// A new branch is required when the current branch is the default branch
/// or appears in the protected list. An undetectable default branch never
/// forces a branch on its own.
pub fn decide(current: &str, default: Option<&str>, protected: &[String]) -> BranchDecision {
    let must_create_branch =
        default.is_some_and(|d| d == current) || protected.iter().any(|b| b == current);
    BranchDecision { must_create_branch }
}

/// Resolve `slug` against existing branches, appending `-2`, `-3`, and so
/// on until a free name is found.
pub fn unique_branch_name(git: &dyn GitBackend, slug: &str) -> Result<String, GitError> {
    if !git.branch_exists(slug)? {
        return Ok(slug.to_string());
    }
    for n in 2..=MAX_SUFFIX_ATTEMPTS {
        let candidate = format!("{slug}-{n}");
        if !git.branch_exists(&candidate)? {
            debug!("branch '{slug}' already exists, using '{candidate}'");
            return Ok(candidate);
        }
    }
    Err(GitError::BranchNameExhausted {
        slug: slug.to_string(),
        attempts: MAX_SUFFIX_ATTEMPTS,
    })
}
