//! autoflow - A CLI assistant that drafts commit messages, branch names, and
//! pull requests from your working tree with an LLM.
//!
//! # Overview
//!
//! autoflow reads the pending changes in a git working tree, asks a model to
//! draft a conventional-commit message (plus a branch name and PR description
//! when needed), and then performs the corresponding git/GitHub operations:
//! stage, branch, commit, push, open PR.

pub mod changeset;
pub mod config;
pub mod error;
pub mod git;
pub mod github;
pub mod model;
pub mod policy;
pub mod prompt;
pub mod response;
pub mod workflow;

// Re-export commonly used types
pub use changeset::{ChangeSet, FileChange, FileStatus, RawChange};
pub use config::FlowConfig;
pub use error::{FlowError, GitError, GitHubError, MalformedResponse, ModelError};
pub use git::{CommitInfo, GitBackend, LocalGit};
pub use github::{GitHubBackend, GitHubClient};
pub use model::{CliModel, ModelClient};
pub use prompt::{GenerationKind, GenerationRequest};
pub use response::GenerationResult;
pub use workflow::{Phase, Preview, RetryPolicy, Workflow, WorkflowState};
