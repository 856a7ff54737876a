//! Prompt construction for commit messages, branch names, and PR descriptions.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;

use crate::changeset::{ChangeSet, FileStatus};

/// What the model is being asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationKind {
    CommitMessage,
    BranchName,
    PrDescription,
}

/// One generation request; `build` turns this into prompt text.
///
/// `extra_context` carries the already-generated commit subject for
/// branch-name requests and the JSON commit digest for PR descriptions.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub kind: GenerationKind,
    pub change_set: &'a ChangeSet,
    pub extra_context: Option<String>,
}

/// Build the prompt for a request. Pure: identical requests produce
/// byte-identical prompts.
pub fn build(request: &GenerationRequest<'_>) -> String {
    match request.kind {
        GenerationKind::CommitMessage => build_commit_message(request),
        GenerationKind::BranchName => build_branch_name(request),
        GenerationKind::PrDescription => build_pr_description(request),
    }
}

/// Build the prompt with a stricter output-format reminder appended.
///
/// Used exactly once, after a response the parser could not repair.
pub fn build_strict(request: &GenerationRequest<'_>) -> String {
    let mut prompt = build(request);
    let format_line = match request.kind {
        GenerationKind::CommitMessage => {
            "the subject line first, then (only if a body was requested) one blank line and the body"
        }
        GenerationKind::BranchName => "one single line containing only the branch name",
        GenerationKind::PrDescription => "the title line, one blank line, then the markdown body",
    };
    let _ = write!(
        prompt,
        "\n\n## STRICT OUTPUT REMINDER\n\
         Your previous response could not be parsed. Respond with EXACTLY {format_line}. \
         No code fences, no surrounding quotes, no commentary before or after."
    );
    prompt
}

fn build_commit_message(request: &GenerationRequest<'_>) -> String {
    let files_section = files_section(request.change_set);
    let diff_section = diff_section(request.change_set);
    let truncation_note = truncation_note(request.change_set);

    let body_section = if logical_concerns(request.change_set) > 1 {
        r#"## Body Rules
This change touches more than one area, so add a body after a blank line.
- Explain WHY the change was made, not a list of edits (the diff already shows WHAT)
- Wrap lines at 72 characters"#
    } else {
        r#"## Body Rules
This is a focused change. Respond with the subject line only, no body."#
    };

    format!(
        r#"You are generating a Git commit message following the Conventional Commits specification.

## Changed Files
{files_section}

## Diff
{diff_section}{truncation_note}

## Subject Line Rules (STRICT)
- Format: `type(scope): description`
- Type: one of feat, fix, build, chore, ci, docs, style, refactor, perf, test
- Description: imperative mood ("add", "fix", "remove"), lowercase after the colon, no period at the end
- HARD LIMIT: the entire subject line MUST be 72 characters or fewer

{body_section}

## Output Format
Plain text only. First line is the subject. No JSON, no code fences, no surrounding quotes."#
    )
}

fn build_branch_name(request: &GenerationRequest<'_>) -> String {
    let files_section = files_section(request.change_set);
    let subject_section = match &request.extra_context {
        Some(subject) => format!("## Commit Subject\n{subject}\n\n"),
        None => String::new(),
    };

    format!(
        r#"You are naming a short-lived Git branch for the change below.

{subject_section}## Changed Files
{files_section}

## Branch Name Rules (STRICT)
- A single line, lowercase kebab-case
- Allowed characters: a-z, 0-9, '-', '_', '/'
- Optionally prefix with the change type and a slash, e.g. `fix/` or `feat/`
- Keep it short: a few words that match the commit subject
- No quotes, no prose, no trailing punctuation

## Output Format
Respond with the branch name only, on a single line."#
    )
}

fn build_pr_description(request: &GenerationRequest<'_>) -> String {
    let files_section = files_section(request.change_set);
    let digest = request
        .extra_context
        .as_deref()
        .unwrap_or("[]");

    format!(
        r#"You are writing a GitHub pull request description.

## Commits Being Shipped (JSON, oldest first)
{digest}

## Files Touched by the Latest Commit
{files_section}

## Description Rules (STRICT)
- First line: the PR title, 72 characters or fewer, imperative mood
- Then one blank line, then a markdown body
- The body must cover EVERY commit listed above, not only the latest one
- Group related commits into short sections or bullet lists

## Output Format
Plain text. Title on the first line, blank line, markdown body. Do not wrap the whole response in a code fence."#
    )
}

/// `- path (Status)` listing, with `old -> new` for renames.
fn files_section(change_set: &ChangeSet) -> String {
    change_set
        .files
        .iter()
        .map(|f| match (&f.status, &f.old_path) {
            (FileStatus::Renamed, Some(old)) => {
                format!("- {} -> {} ({})", old, f.path, f.status)
            }
            _ => format!("- {} ({})", f.path, f.status),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Per-file fenced diff bodies.
fn diff_section(change_set: &ChangeSet) -> String {
    change_set
        .files
        .iter()
        .map(|f| format!("### {} ({})\n```\n{}\n```", f.path, f.status, f.diff_text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn truncation_note(change_set: &ChangeSet) -> &'static str {
    if change_set.truncated {
        "\n\nNote: the diff was truncated due to size. Focus on the visible changes."
    } else {
        ""
    }
}

/// Distinct parent directories among the changed paths. A change set touching
/// a single directory is treated as one logical concern.
fn logical_concerns(change_set: &ChangeSet) -> usize {
    let mut dirs: BTreeSet<String> = BTreeSet::new();
    for file in &change_set.files {
        let parent = Path::new(&file.path)
            .parent()
            .and_then(|p| p.to_str())
            .unwrap_or("");
        dirs.insert(parent.to_string());
    }
    dirs.len()
}
