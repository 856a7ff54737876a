//! Change-set normalization and diff byte-budget enforcement.

use std::fmt;

use tracing::{debug, warn};

use crate::error::FlowError;

/// Marker appended to diff bodies cut by the byte budget.
pub const TRUNCATION_MARKER: &str = "[truncated]";

/// Body substituted for binary files.
pub const BINARY_PLACEHOLDER: &str = "(binary file)";

/// Status of a changed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Added => write!(f, "Added"),
            FileStatus::Modified => write!(f, "Modified"),
            FileStatus::Deleted => write!(f, "Deleted"),
            FileStatus::Renamed => write!(f, "Renamed"),
        }
    }
}

/// A changed file as the git capability reports it, before normalization.
#[derive(Debug, Clone)]
pub struct RawChange {
    pub path: String,
    /// Old path for renamed files (None for non-rename changes).
    pub old_path: Option<String>,
    pub status: FileStatus,
    pub diff_text: String,
    pub is_binary: bool,
}

/// A changed file after normalization and staging classification.
#[derive(Debug, Clone)]
pub struct FileChange {
    pub path: String,
    pub old_path: Option<String>,
    pub status: FileStatus,
    pub diff_text: String,
    /// Set by the staging policy; excluded files are shown to the model
    /// but skipped by auto-staging.
    pub is_excluded: bool,
}

/// All pending changes for one invocation, ordered by path.
#[derive(Debug, Clone)]
pub struct ChangeSet {
    pub files: Vec<FileChange>,
    pub truncated: bool,
}

impl ChangeSet {
    /// Paths eligible for automatic staging.
    pub fn paths_to_stage(&self) -> Vec<String> {
        self.files
            .iter()
            .filter(|f| !f.is_excluded)
            .map(|f| f.path.clone())
            .collect()
    }

    /// Total bytes of diff text across all files.
    pub fn total_diff_bytes(&self) -> usize {
        self.files.iter().map(|f| f.diff_text.len()).sum()
    }
}

/// Normalize raw changes into a [`ChangeSet`] bounded by `budget` bytes.
///
/// Entries are sorted by path and deduplicated with the first occurrence
/// winning, so callers that report staged entries before unstaged ones get
/// staged precedence. Binary bodies become [`BINARY_PLACEHOLDER`]. When the
/// combined diff exceeds the budget, each file keeps a share proportional to
/// its original size, cut at a char boundary with [`TRUNCATION_MARKER`]
/// appended; the marker itself is not counted against the budget. Paths are
/// never dropped from the listing.
pub fn collect(raw: Vec<RawChange>, budget: usize) -> Result<ChangeSet, FlowError> {
    if raw.is_empty() {
        return Err(FlowError::EmptyChange);
    }

    let mut files: Vec<FileChange> = raw
        .into_iter()
        .map(|change| FileChange {
            diff_text: if change.is_binary {
                BINARY_PLACEHOLDER.to_string()
            } else {
                change.diff_text
            },
            path: change.path,
            old_path: change.old_path,
            status: change.status,
            is_excluded: false,
        })
        .collect();

    files.sort_by(|a, b| a.path.cmp(&b.path));
    files.dedup_by(|a, b| a.path == b.path);

    let total: usize = files.iter().map(|f| f.diff_text.len()).sum();
    let mut truncated = false;
    if total > budget {
        warn!("diff is {total} bytes, truncating to fit the {budget} byte budget");
        for file in &mut files {
            let share = file.diff_text.len() * budget / total;
            if file.diff_text.len() > share {
                file.diff_text = cut_at_char_boundary(&file.diff_text, share);
            }
        }
        truncated = true;
    }

    debug!(
        files = files.len(),
        bytes = files.iter().map(|f| f.diff_text.len()).sum::<usize>(),
        truncated,
        "collected change set"
    );

    Ok(ChangeSet { files, truncated })
}

/// Cut `text` to at most `limit` bytes on a char boundary and append the
/// truncation marker.
fn cut_at_char_boundary(text: &str, limit: usize) -> String {
    let mut cut = limit.min(text.len());
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}\n{}", &text[..cut], TRUNCATION_MARKER)
}
