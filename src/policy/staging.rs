//! Exclusion of lock files and generated artifacts from automatic staging.

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::warn;

use crate::changeset::ChangeSet;

/// Compiled glob patterns for paths that are never auto-staged.
///
/// A pattern matches either the full repo-relative path or the bare file
/// name, so `Cargo.lock` covers lock files in subdirectories while
/// `target/**` covers whole trees.
#[derive(Debug, Clone)]
pub struct ExclusionSet {
    set: GlobSet,
}

impl ExclusionSet {
    /// Compile `patterns`, skipping invalid globs with a warning.
    pub fn compile(patterns: &[String]) -> Self {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => warn!("skipping invalid exclude pattern '{pattern}': {e}"),
            }
        }
        let set = match builder.build() {
            Ok(set) => set,
            Err(e) => {
                warn!("failed to compile exclude patterns, excluding nothing: {e}");
                GlobSet::empty()
            }
        };
        ExclusionSet { set }
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        if self.set.is_match(path) {
            return true;
        }
        match Path::new(path).file_name() {
            Some(name) => self.set.is_match(name),
            None => false,
        }
    }
}

/// Mark files matching the exclusion set.
///
/// Excluded files stay in the change set (and in the diff shown to the
/// model) and are only skipped by auto-staging. Idempotent.
pub fn classify(mut change_set: ChangeSet, exclusions: &ExclusionSet) -> ChangeSet {
    for file in &mut change_set.files {
        file.is_excluded = exclusions.is_excluded(&file.path);
    }
    change_set
}
