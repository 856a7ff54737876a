//! Error types for autoflow modules using thiserror.

use thiserror::Error;

/// Errors from the git capability.
#[derive(Error, Debug)]
pub enum GitError {
    #[error("failed to open repository: {0}")]
    OpenRepository(#[source] git2::Error),

    #[error("failed to read working tree changes: {0}")]
    ReadChanges(#[source] git2::Error),

    #[error("failed to stage '{path}': {source}")]
    Stage {
        path: String,
        #[source]
        source: git2::Error,
    },

    #[error("failed to update the git index: {0}")]
    Index(#[source] git2::Error),

    #[error("failed to create commit: {0}")]
    Commit(#[source] git2::Error),

    #[error("git config error (missing user.name or user.email): {0}")]
    Config(#[source] git2::Error),

    #[error("failed to create branch '{name}': {source}")]
    CreateBranch {
        name: String,
        #[source]
        source: git2::Error,
    },

    #[error("failed to look up branch '{name}': {source}")]
    LookupBranch {
        name: String,
        #[source]
        source: git2::Error,
    },

    #[error("HEAD is detached; check out a branch before running flow")]
    DetachedHead,

    #[error("could not determine the current branch: {0}")]
    CurrentBranch(#[source] git2::Error),

    #[error("could not determine the default branch (no origin/HEAD and no main/master)")]
    NoDefaultBranch,

    #[error("no free branch name derived from '{slug}' after {attempts} attempts")]
    BranchNameExhausted { slug: String, attempts: u32 },

    #[error("failed to walk commit history: {0}")]
    Revwalk(#[source] git2::Error),

    #[error("git push failed: {0}")]
    Push(String),
}

/// Errors from the GitHub capability.
#[derive(Error, Debug)]
pub enum GitHubError {
    #[error(
        "GitHub authentication failed: no valid auth found. Run 'gh auth login' or set GITHUB_TOKEN"
    )]
    AuthenticationFailed,

    #[error("failed to create pull request: {0}")]
    CreatePullRequest(#[source] Box<octocrab::Error>),

    #[error("pull request creation timed out after {0} seconds")]
    Timeout(u64),

    #[error("could not parse a GitHub owner/repo from remote '{0}'")]
    InvalidRepositoryUrl(String),

    #[error("no 'origin' remote configured")]
    NoOriginRemote,

    #[error("created pull request but the API returned no URL")]
    MissingPullRequestUrl,
}

/// Errors from the model capability.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model CLI '{0}' not found in PATH")]
    NotInstalled(String),

    #[error("failed to spawn model process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("model call timed out after {0} seconds")]
    Timeout(u64),

    #[error("model CLI exited with code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("model returned an empty response")]
    EmptyResponse,
}

/// A model response the parser could not repair into a structured result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedResponse {
    #[error("response was empty after stripping fences and quotes")]
    Empty,

    #[error("branch name normalized to an empty slug (raw: '{raw}')")]
    EmptySlug { raw: String },

    #[error("pull request description has no body")]
    MissingPrBody,
}

/// Top-level workflow error; carries the exit-code mapping for the CLI.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("not inside a git working tree: {0}")]
    Repo(#[source] GitError),

    #[error("no changes detected: nothing staged, modified, or untracked")]
    EmptyChange,

    #[error("model call failed after {attempts} attempt(s): {source}")]
    ModelCall {
        attempts: u32,
        #[source]
        source: ModelError,
    },

    #[error("could not repair model response: {0}")]
    MalformedResponse(#[source] MalformedResponse),

    #[error("git operation failed: {0}")]
    GitOperation(#[source] GitError),

    #[error("pull request creation failed: {0}")]
    GitHubApi(#[source] GitHubError),

    #[error("aborted by user")]
    Cancelled,
}

impl FlowError {
    /// Process exit code for this failure.
    ///
    /// 2 = nothing to do, 3 = model failure, 4 = git failure,
    /// 5 = GitHub API failure, 1 = user abort.
    pub fn exit_code(&self) -> u8 {
        match self {
            FlowError::EmptyChange => 2,
            FlowError::ModelCall { .. } | FlowError::MalformedResponse(_) => 3,
            FlowError::Repo(_) | FlowError::GitOperation(_) => 4,
            FlowError::GitHubApi(_) => 5,
            FlowError::Cancelled => 1,
        }
    }
}
