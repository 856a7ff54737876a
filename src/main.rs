//! flow - CLI entry point.

use std::path::Path;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use autoflow::config::FlowConfig;
use autoflow::error::{FlowError, GitHubError};
use autoflow::git::LocalGit;
use autoflow::github::GitHubClient;
use autoflow::model::CliModel;
use autoflow::workflow::{Phase, Workflow};

/// Draft commit messages, branch names, and PRs from your working tree.
#[derive(Parser, Debug)]
#[command(name = "flow")]
#[command(about = "Draft commit messages, branch names, and PRs from your working tree")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Preview without staging, branching, or committing
    #[arg(long, global = true)]
    dry_run: bool,

    /// Ask before the commit is created
    #[arg(long, global = true)]
    confirm: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stage eligible changes and commit with a generated message (default)
    Commit,
    /// Commit, push, and open a pull request
    Pr,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = FlowConfig::from_env();
    config.confirm = config.confirm || cli.confirm;
    init_tracing(config.verbose || cli.verbose);

    if let Err(e) = run(&cli, &config).await {
        eprintln!("  [FAIL] {e}");
        std::process::exit(i32::from(e.exit_code()));
    }
}

async fn run(cli: &Cli, config: &FlowConfig) -> Result<(), FlowError> {
    let git = LocalGit::discover(Path::new(".")).map_err(FlowError::Repo)?;
    let model = CliModel::new(config.model_timeout);
    let mut workflow = Workflow::new(&git, &model, config);

    if cli.dry_run {
        workflow.run_preview().await?;
        return Ok(());
    }

    match cli.command {
        None | Some(Command::Commit) => workflow.run_commit().await,
        Some(Command::Pr) => {
            // Resolve GitHub access before any side effect so an auth or
            // remote problem surfaces while the tree is still untouched.
            let url = git
                .origin_url()
                .ok_or(FlowError::GitHubApi(GitHubError::NoOriginRemote))?;
            let github = GitHubClient::from_remote(&url, config.github_timeout)
                .map_err(FlowError::GitHubApi)?;

            let result = workflow.run_pr(&github).await;
            if result.is_err() {
                report_partial_success(workflow.state());
            }
            result
        }
    }
}

/// When the pr flow dies after the commit landed, say so: the commit and
/// branch are intentionally left in place.
fn report_partial_success(state: &autoflow::workflow::WorkflowState) {
    if !state.visited.contains(&Phase::Committed) {
        return;
    }
    eprintln!();
    match (&state.commit_hash, &state.branch_slug) {
        (Some(hash), Some(branch)) => {
            eprintln!("Commit {hash} on branch '{branch}' was created and is kept.");
        }
        (Some(hash), None) => {
            eprintln!("Commit {hash} was created and is kept.");
        }
        _ => {}
    }
    eprintln!("Fix the issue above and re-run 'flow pr' to open the pull request.");
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
