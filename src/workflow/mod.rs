//! The state machine that sequences collection, generation, and git/GitHub
//! side effects for the commit and pr flows.

pub mod retry;

pub use retry::RetryPolicy;

use dialoguer::Confirm;
use tracing::debug;

use crate::changeset::{self, ChangeSet};
use crate::config::FlowConfig;
use crate::error::{FlowError, GitError, MalformedResponse};
use crate::git::GitBackend;
use crate::github::GitHubBackend;
use crate::model::ModelClient;
use crate::policy::{self, ExclusionSet};
use crate::prompt::{self, GenerationKind, GenerationRequest};
use crate::response::{self, GenerationResult};

/// Phases of a single run. The machine never moves backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Staged,
    MessageGenerated,
    BranchEnsured,
    Committed,
    PrCreated,
    Failed,
}

/// Snapshot of one invocation's progress, for reporting and for tests to
/// assert on intermediate phases rather than just exit codes.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    pub phase: Phase,
    pub visited: Vec<Phase>,
    pub change_set: Option<ChangeSet>,
    pub commit_message: Option<String>,
    pub commit_hash: Option<String>,
    pub branch_slug: Option<String>,
    pub pr_description: Option<String>,
    pub pr_url: Option<String>,
    pub last_error: Option<String>,
}

impl WorkflowState {
    fn new() -> Self {
        WorkflowState {
            phase: Phase::Init,
            visited: vec![Phase::Init],
            change_set: None,
            commit_message: None,
            commit_hash: None,
            branch_slug: None,
            pr_description: None,
            pr_url: None,
            last_error: None,
        }
    }
}

/// What a dry run would do, with no side effects performed.
#[derive(Debug)]
pub struct Preview {
    pub change_set: ChangeSet,
    pub commit_message: String,
    pub branch_name: Option<String>,
}

/// Orchestrates one invocation against injected git/model capabilities.
///
/// The GitHub capability is only needed by the pr flow and is passed to
/// `run_pr` directly.
pub struct Workflow<'a, G, M> {
    git: &'a G,
    model: &'a M,
    config: &'a FlowConfig,
    exclusions: ExclusionSet,
    state: WorkflowState,
}

impl<'a, G: GitBackend, M: ModelClient> Workflow<'a, G, M> {
    pub fn new(git: &'a G, model: &'a M, config: &'a FlowConfig) -> Self {
        Workflow {
            git,
            model,
            config,
            exclusions: ExclusionSet::compile(&config.exclude_patterns),
            state: WorkflowState::new(),
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    /// Init through Committed.
    pub async fn run_commit(&mut self) -> Result<(), FlowError> {
        let result = self.commit_phases().await;
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// The full flow through PrCreated.
    ///
    /// A commit and branch already applied when a later step fails are
    /// preserved; the caller reports the partial success from the state.
    pub async fn run_pr(&mut self, github: &dyn GitHubBackend) -> Result<(), FlowError> {
        let result = self.pr_phases(github).await;
        if let Err(e) = &result {
            self.fail(e);
        }
        result
    }

    /// Collect, classify, and draft without staging, branching, or
    /// committing.
    pub async fn run_preview(&self) -> Result<Preview, FlowError> {
        let raw = self.git.changes().map_err(FlowError::Repo)?;
        let change_set = policy::classify(
            changeset::collect(raw, self.config.diff_budget)?,
            &self.exclusions,
        );

        let (summary, message) = self.draft_message(&change_set).await?;
        let branch_name = if self.branch_required()? {
            let slug = self.draft_slug(&change_set, &summary).await?;
            Some(policy::unique_branch_name(self.git, &slug).map_err(FlowError::GitOperation)?)
        } else {
            None
        };

        println!();
        println!("Dry run:");
        println!(
            "  Would stage {} file(s)",
            change_set.paths_to_stage().len()
        );
        if let Some(name) = &branch_name {
            println!("  Would create branch '{name}'");
        }
        println!("  Commit message:");
        for line in message.lines() {
            println!("    {line}");
        }
        println!();
        println!("Dry run complete. No changes made.");

        Ok(Preview {
            change_set,
            commit_message: message,
            branch_name,
        })
    }

    // ── Phases ──

    async fn commit_phases(&mut self) -> Result<ChangeSet, FlowError> {
        let change_set = self.stage_changes()?;

        let (summary, message) = self.draft_message(&change_set).await?;
        println!("  [DONE] Drafted message: {summary}");
        self.state.commit_message = Some(message.clone());
        self.advance(Phase::MessageGenerated);

        self.confirm_proceed(&message)?;
        self.ensure_branch(&change_set, &summary).await?;

        let hash = self.git.commit(&message).map_err(FlowError::GitOperation)?;
        println!("  [DONE] Created commit {hash}");
        self.state.commit_hash = Some(hash);
        self.advance(Phase::Committed);
        Ok(change_set)
    }

    async fn pr_phases(&mut self, github: &dyn GitHubBackend) -> Result<(), FlowError> {
        let change_set = self.commit_phases().await?;

        let branch = self.git.current_branch().map_err(FlowError::GitOperation)?;
        self.git.push(&branch).map_err(FlowError::GitOperation)?;
        println!("  [DONE] Pushed '{branch}' to origin");

        let base = self
            .git
            .default_branch()
            .map_err(FlowError::GitOperation)?
            .ok_or(FlowError::GitOperation(GitError::NoDefaultBranch))?;

        let commits = self
            .git
            .commits_since(&base)
            .map_err(FlowError::GitOperation)?;
        let digest = serde_json::to_string_pretty(&commits).unwrap_or_else(|_| "[]".to_string());
        let request = GenerationRequest {
            kind: GenerationKind::PrDescription,
            change_set: &change_set,
            extra_context: Some(digest),
        };
        let GenerationResult::PrDescription { title, body } = self.generate(&request).await? else {
            return Err(FlowError::MalformedResponse(MalformedResponse::Empty));
        };

        let url = github
            .create_pull_request(&branch, &base, &title, &body)
            .await
            .map_err(FlowError::GitHubApi)?;
        println!("  [DONE] Opened pull request: {url}");
        self.state.pr_description = Some(render_message(&title, Some(&body)));
        self.state.pr_url = Some(url);
        self.advance(Phase::PrCreated);
        Ok(())
    }

    fn stage_changes(&mut self) -> Result<ChangeSet, FlowError> {
        let raw = self.git.changes().map_err(FlowError::Repo)?;
        let change_set = policy::classify(
            changeset::collect(raw, self.config.diff_budget)?,
            &self.exclusions,
        );

        let paths = change_set.paths_to_stage();
        if !paths.is_empty() {
            self.git.stage(&paths).map_err(FlowError::GitOperation)?;
        }
        println!("  [DONE] Staged {} file(s)", paths.len());
        self.state.change_set = Some(change_set.clone());
        self.advance(Phase::Staged);
        Ok(change_set)
    }

    async fn ensure_branch(
        &mut self,
        change_set: &ChangeSet,
        summary: &str,
    ) -> Result<(), FlowError> {
        if !self.branch_required()? {
            debug!("current branch is not protected, committing in place");
            return Ok(());
        }

        let slug = self.draft_slug(change_set, summary).await?;
        let name = policy::unique_branch_name(self.git, &slug).map_err(FlowError::GitOperation)?;
        self.git.create_branch(&name).map_err(FlowError::GitOperation)?;
        println!("  [DONE] Created branch '{name}'");
        self.state.branch_slug = Some(name);
        self.advance(Phase::BranchEnsured);
        Ok(())
    }

    fn branch_required(&self) -> Result<bool, FlowError> {
        let current = self.git.current_branch().map_err(FlowError::GitOperation)?;
        let default = self.git.default_branch().map_err(FlowError::GitOperation)?;
        let decision = policy::decide(
            &current,
            default.as_deref(),
            &self.config.protected_branches,
        );
        Ok(decision.must_create_branch)
    }

    fn confirm_proceed(&self, message: &str) -> Result<(), FlowError> {
        if !self.config.confirm {
            return Ok(());
        }
        println!();
        println!("Commit message:");
        for line in message.lines() {
            println!("  {line}");
        }
        println!();
        let confirmed = Confirm::new()
            .with_prompt("Proceed?")
            .default(true)
            .interact()
            .map_err(|_| FlowError::Cancelled)?;
        if !confirmed {
            return Err(FlowError::Cancelled);
        }
        Ok(())
    }

    // ── Generation ──

    async fn draft_message(&self, change_set: &ChangeSet) -> Result<(String, String), FlowError> {
        let request = GenerationRequest {
            kind: GenerationKind::CommitMessage,
            change_set,
            extra_context: None,
        };
        let GenerationResult::CommitMessage { summary, body } = self.generate(&request).await?
        else {
            return Err(FlowError::MalformedResponse(MalformedResponse::Empty));
        };
        let message = render_message(&summary, body.as_deref());
        Ok((summary, message))
    }

    async fn draft_slug(&self, change_set: &ChangeSet, summary: &str) -> Result<String, FlowError> {
        let request = GenerationRequest {
            kind: GenerationKind::BranchName,
            change_set,
            extra_context: Some(summary.to_string()),
        };
        let GenerationResult::BranchName { slug } = self.generate(&request).await? else {
            return Err(FlowError::MalformedResponse(MalformedResponse::Empty));
        };
        Ok(slug)
    }

    /// One generation round: build the prompt, call the model under the
    /// retry policy, parse. A malformed response earns exactly one stricter
    /// re-prompt before the parse failure becomes fatal.
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<GenerationResult, FlowError> {
        let prompt = prompt::build(request);
        debug!(kind = ?request.kind, bytes = prompt.len(), "built prompt");
        let raw = self.complete_with_retry(&prompt).await?;

        match response::parse(request.kind, &raw, self.config.slug_max_len) {
            Ok(result) => Ok(result),
            Err(first_err) => {
                debug!(error = %first_err, "response did not parse, re-prompting with strict format");
                let strict = prompt::build_strict(request);
                let raw = self.complete_with_retry(&strict).await?;
                response::parse(request.kind, &raw, self.config.slug_max_len)
                    .map_err(FlowError::MalformedResponse)
            }
        }
    }

    async fn complete_with_retry(&self, prompt: &str) -> Result<String, FlowError> {
        self.config
            .retry_policy()
            .run(|| async { self.model.complete(prompt, &self.config.model).await })
            .await
    }

    fn advance(&mut self, phase: Phase) {
        debug!(from = ?self.state.phase, to = ?phase, "phase transition");
        self.state.phase = phase;
        self.state.visited.push(phase);
    }

    fn fail(&mut self, error: &FlowError) {
        self.state.last_error = Some(error.to_string());
        self.advance(Phase::Failed);
    }
}

fn render_message(summary: &str, body: Option<&str>) -> String {
    match body {
        Some(body) => format!("{summary}\n\n{body}"),
        None => summary.to_string(),
    }
}
