//! git2-backed implementation of the git capability.
//!
//! Everything runs through libgit2 except `push`, which shells out to the
//! system `git` binary so the user's credential helpers and SSH agent are
//! inherited.

use std::path::Path;
use std::process::Command;

use chrono::{TimeZone, Utc};
use git2::{BranchType, Delta, Diff, DiffOptions, ErrorCode, Oid, Patch, Repository, Tree};
use tracing::debug;

use crate::changeset::{FileStatus, RawChange};
use crate::error::GitError;

use super::{CommitInfo, GitBackend};

pub struct LocalGit {
    repo: Repository,
}

impl LocalGit {
    /// Open the repository containing `path`, searching parent directories.
    pub fn discover(path: &Path) -> Result<Self, GitError> {
        let repo = Repository::discover(path).map_err(GitError::OpenRepository)?;
        Ok(LocalGit { repo })
    }

    /// URL of the `origin` remote, when one is configured.
    pub fn origin_url(&self) -> Option<String> {
        self.repo
            .find_remote("origin")
            .ok()
            .and_then(|r| r.url().map(str::to_string))
    }

    /// Resolve the HEAD tree, treating an unborn branch as "no tree yet".
    fn head_tree(&self) -> Result<Option<Tree<'_>>, GitError> {
        let head_ref = match self.repo.head() {
            Ok(r) => r,
            Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
                return Ok(None);
            }
            Err(e) => return Err(GitError::ReadChanges(e)),
        };
        let tree = head_ref.peel_to_tree().map_err(GitError::ReadChanges)?;
        Ok(Some(tree))
    }
}

impl GitBackend for LocalGit {
    fn changes(&self) -> Result<Vec<RawChange>, GitError> {
        let head_tree = self.head_tree()?;

        let mut staged = self
            .repo
            .diff_tree_to_index(head_tree.as_ref(), None, None)
            .map_err(GitError::ReadChanges)?;
        staged.find_similar(None).map_err(GitError::ReadChanges)?;

        let mut opts = DiffOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .show_untracked_content(true);
        let unstaged = self
            .repo
            .diff_index_to_workdir(None, Some(&mut opts))
            .map_err(GitError::ReadChanges)?;

        let mut raw = Vec::new();
        append_changes(&staged, &mut raw)?;
        append_changes(&unstaged, &mut raw)?;
        debug!(count = raw.len(), "enumerated working tree changes");
        Ok(raw)
    }

    fn stage(&self, paths: &[String]) -> Result<(), GitError> {
        let mut index = self.repo.index().map_err(GitError::Index)?;
        for path in paths {
            let on_disk = self
                .repo
                .workdir()
                .map(|w| w.join(path).exists())
                .unwrap_or(false);
            let result = if on_disk {
                index.add_path(Path::new(path))
            } else {
                index.remove_path(Path::new(path))
            };
            result.map_err(|e| GitError::Stage {
                path: path.clone(),
                source: e,
            })?;
        }
        index.write().map_err(GitError::Index)?;
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<String, GitError> {
        let mut index = self.repo.index().map_err(GitError::Index)?;
        let tree_id = index.write_tree().map_err(GitError::Commit)?;
        let tree = self.repo.find_tree(tree_id).map_err(GitError::Commit)?;
        let sig = self.repo.signature().map_err(GitError::Config)?;

        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit().map_err(GitError::Commit)?),
            Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
                None
            }
            Err(e) => return Err(GitError::Commit(e)),
        };
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .map_err(GitError::Commit)?;
        debug!("created commit {oid}");
        Ok(short_hash(oid))
    }

    fn current_branch(&self) -> Result<String, GitError> {
        match self.repo.head() {
            Ok(head) => {
                if !head.is_branch() {
                    return Err(GitError::DetachedHead);
                }
                head.shorthand()
                    .map(|s| s.to_string())
                    .ok_or(GitError::DetachedHead)
            }
            // An unborn branch still has a name via HEAD's symbolic target.
            Err(e) if e.code() == ErrorCode::UnbornBranch => {
                let head = self
                    .repo
                    .find_reference("HEAD")
                    .map_err(GitError::CurrentBranch)?;
                let target = head.symbolic_target().ok_or(GitError::DetachedHead)?;
                Ok(target
                    .strip_prefix("refs/heads/")
                    .unwrap_or(target)
                    .to_string())
            }
            Err(e) => Err(GitError::CurrentBranch(e)),
        }
    }

    fn default_branch(&self) -> Result<Option<String>, GitError> {
        if let Ok(reference) = self.repo.find_reference("refs/remotes/origin/HEAD")
            && let Some(target) = reference.symbolic_target()
            && let Some(name) = target.strip_prefix("refs/remotes/origin/")
        {
            return Ok(Some(name.to_string()));
        }
        for candidate in ["main", "master"] {
            if self.repo.find_branch(candidate, BranchType::Local).is_ok()
                || self
                    .repo
                    .find_branch(&format!("origin/{candidate}"), BranchType::Remote)
                    .is_ok()
            {
                return Ok(Some(candidate.to_string()));
            }
        }
        Ok(None)
    }

    fn branch_exists(&self, name: &str) -> Result<bool, GitError> {
        match self.repo.find_branch(name, BranchType::Local) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(false),
            Err(e) => Err(GitError::LookupBranch {
                name: name.to_string(),
                source: e,
            }),
        }
    }

    fn create_branch(&self, name: &str) -> Result<(), GitError> {
        let wrap = |e: git2::Error| GitError::CreateBranch {
            name: name.to_string(),
            source: e,
        };
        let head = self.repo.head().and_then(|h| h.peel_to_commit()).map_err(wrap)?;
        self.repo.branch(name, &head, false).map_err(wrap)?;
        self.repo.set_head(&format!("refs/heads/{name}")).map_err(wrap)?;
        debug!("created and checked out branch '{name}'");
        Ok(())
    }

    fn push(&self, branch: &str) -> Result<(), GitError> {
        let workdir = self
            .repo
            .workdir()
            .ok_or_else(|| GitError::Push("repository has no working tree".to_string()))?;
        let output = Command::new("git")
            .args(["push", "--set-upstream", "origin", branch])
            .current_dir(workdir)
            .output()
            .map_err(|e| GitError::Push(format!("failed to run git push: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitError::Push(stderr.trim().to_string()));
        }
        Ok(())
    }

    fn commits_since(&self, base: &str) -> Result<Vec<CommitInfo>, GitError> {
        let head = self
            .repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(GitError::Revwalk)?;
        // The base may only exist as a remote-tracking ref.
        let base_commit = self
            .repo
            .revparse_single(base)
            .or_else(|_| self.repo.revparse_single(&format!("origin/{base}")))
            .and_then(|o| o.peel_to_commit())
            .map_err(GitError::Revwalk)?;

        let mut revwalk = self.repo.revwalk().map_err(GitError::Revwalk)?;
        revwalk.push(head.id()).map_err(GitError::Revwalk)?;
        revwalk.hide(base_commit.id()).map_err(GitError::Revwalk)?;

        let mut commits = Vec::new();
        for oid in revwalk {
            let oid = oid.map_err(GitError::Revwalk)?;
            let commit = self.repo.find_commit(oid).map_err(GitError::Revwalk)?;
            let timestamp = Utc
                .timestamp_opt(commit.time().seconds(), 0)
                .single()
                .unwrap_or_else(Utc::now);
            commits.push(CommitInfo {
                hash: short_hash(commit.id()),
                summary: commit.summary().unwrap_or("").to_string(),
                timestamp,
            });
        }
        commits.reverse();
        Ok(commits)
    }
}

/// Collect per-file raw changes from a diff.
fn append_changes(diff: &Diff<'_>, out: &mut Vec<RawChange>) -> Result<(), GitError> {
    for idx in 0..diff.deltas().len() {
        let Some(delta) = diff.get_delta(idx) else {
            continue;
        };
        let status = match delta.status() {
            Delta::Added | Delta::Untracked => FileStatus::Added,
            Delta::Modified => FileStatus::Modified,
            Delta::Deleted => FileStatus::Deleted,
            Delta::Renamed => FileStatus::Renamed,
            _ => FileStatus::Modified,
        };

        let new_path = delta
            .new_file()
            .path()
            .map(|p| p.to_string_lossy().to_string());
        let old_path = delta
            .old_file()
            .path()
            .map(|p| p.to_string_lossy().to_string());
        let (path, old_path) = match status {
            FileStatus::Renamed => {
                let path = new_path.clone().or_else(|| old_path.clone()).unwrap_or_default();
                (path, old_path)
            }
            _ => (new_path.or(old_path).unwrap_or_default(), None),
        };
        if path.is_empty() {
            continue;
        }

        // libgit2 renders binary entries as a "Binary files differ" note
        // with no hunks; those get a placeholder body downstream.
        let (diff_text, is_binary) = match Patch::from_diff(diff, idx)
            .map_err(GitError::ReadChanges)?
        {
            Some(mut patch) => {
                let buf = patch.to_buf().map_err(GitError::ReadChanges)?;
                let text = String::from_utf8_lossy(&buf).to_string();
                if patch.num_hunks() == 0 && text.contains("Binary files") {
                    (String::new(), true)
                } else {
                    (text, false)
                }
            }
            None => (String::new(), true),
        };

        out.push(RawChange {
            path,
            old_path,
            status,
            diff_text,
            is_binary,
        });
    }
    Ok(())
}

fn short_hash(oid: Oid) -> String {
    let full = oid.to_string();
    full[..full.len().min(7)].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_repo() -> (TempDir, LocalGit) {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = git2::RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(dir.path(), &opts).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Test User").unwrap();
        config.set_str("user.email", "test@test.com").unwrap();
        (dir, LocalGit { repo })
    }

    fn initial_commit(git: &LocalGit) {
        let sig = git2::Signature::now("Test User", "test@test.com").unwrap();
        let tree_id = git.repo.index().unwrap().write_tree().unwrap();
        let tree = git.repo.find_tree(tree_id).unwrap();
        git.repo
            .commit(Some("HEAD"), &sig, &sig, "init", &tree, &[])
            .unwrap();
    }

    fn write_file(dir: &TempDir, name: &str, content: &str) {
        std::fs::write(dir.path().join(name), content).unwrap();
    }

    #[test]
    fn test_discover_outside_a_repo_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = LocalGit::discover(dir.path());
        assert!(matches!(result, Err(GitError::OpenRepository(_))));
    }

    #[test]
    fn test_changes_includes_untracked_content() {
        let (dir, git) = test_repo();
        initial_commit(&git);
        write_file(&dir, "new.txt", "hello world\n");

        let raw = git.changes().unwrap();
        let entry = raw.iter().find(|c| c.path == "new.txt").unwrap();
        assert_eq!(entry.status, FileStatus::Added);
        assert!(entry.diff_text.contains("hello world"));
        assert!(!entry.is_binary);
    }

    #[test]
    fn test_changes_flags_binary_files() {
        let (dir, git) = test_repo();
        initial_commit(&git);
        std::fs::write(dir.path().join("image.bin"), [0u8, 159, 146, 150]).unwrap();

        let raw = git.changes().unwrap();
        let entry = raw.iter().find(|c| c.path == "image.bin").unwrap();
        assert!(entry.is_binary);
    }

    #[test]
    fn test_changes_lists_staged_entry_first() {
        let (dir, git) = test_repo();
        write_file(&dir, "file.txt", "original\n");
        git.stage(&["file.txt".to_string()]).unwrap();
        git.commit("init").unwrap();

        write_file(&dir, "file.txt", "staged\n");
        git.stage(&["file.txt".to_string()]).unwrap();
        write_file(&dir, "file.txt", "unstaged\n");

        let raw = git.changes().unwrap();
        let first = raw.iter().find(|c| c.path == "file.txt").unwrap();
        assert!(first.diff_text.contains("+staged"));
    }

    #[test]
    fn test_changes_empty_repo_before_first_commit() {
        let (dir, git) = test_repo();
        write_file(&dir, "new.txt", "hello\n");
        let raw = git.changes().unwrap();
        assert!(raw.iter().any(|c| c.path == "new.txt"));
    }

    #[test]
    fn test_stage_is_scoped_to_given_paths() {
        let (dir, git) = test_repo();
        initial_commit(&git);
        write_file(&dir, "a.txt", "a\n");
        write_file(&dir, "b.txt", "b\n");

        git.stage(&["a.txt".to_string()]).unwrap();

        let index = git.repo.index().unwrap();
        assert!(index.get_path(Path::new("a.txt"), 0).is_some());
        assert!(index.get_path(Path::new("b.txt"), 0).is_none());
    }

    #[test]
    fn test_stage_records_deletions() {
        let (dir, git) = test_repo();
        write_file(&dir, "doomed.txt", "bye\n");
        git.stage(&["doomed.txt".to_string()]).unwrap();
        git.commit("add doomed").unwrap();

        std::fs::remove_file(dir.path().join("doomed.txt")).unwrap();
        git.stage(&["doomed.txt".to_string()]).unwrap();

        let index = git.repo.index().unwrap();
        assert!(index.get_path(Path::new("doomed.txt"), 0).is_none());
    }

    #[test]
    fn test_commit_returns_short_hash() {
        let (dir, git) = test_repo();
        write_file(&dir, "f.txt", "x\n");
        git.stage(&["f.txt".to_string()]).unwrap();

        let hash = git.commit("feat: add f").unwrap();
        assert_eq!(hash.len(), 7);

        let head = git.repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(head.message().unwrap(), "feat: add f");
        assert!(head.id().to_string().starts_with(&hash));
    }

    #[test]
    fn test_current_branch_names_head() {
        let (_dir, git) = test_repo();
        initial_commit(&git);
        assert_eq!(git.current_branch().unwrap(), "main");
    }

    #[test]
    fn test_current_branch_on_unborn_head() {
        let (_dir, git) = test_repo();
        assert_eq!(git.current_branch().unwrap(), "main");
    }

    #[test]
    fn test_default_branch_falls_back_to_local_main() {
        let (_dir, git) = test_repo();
        initial_commit(&git);
        assert_eq!(git.default_branch().unwrap(), Some("main".to_string()));
    }

    #[test]
    fn test_default_branch_none_when_nothing_matches() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = git2::RepositoryInitOptions::new();
        opts.initial_head("trunk");
        let repo = Repository::init_opts(dir.path(), &opts).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "T").unwrap();
        config.set_str("user.email", "t@t.com").unwrap();
        let git = LocalGit { repo };
        initial_commit(&git);

        assert_eq!(git.default_branch().unwrap(), None);
    }

    #[test]
    fn test_origin_url_reads_configured_remote() {
        let (_dir, git) = test_repo();
        assert_eq!(git.origin_url(), None);

        git.repo
            .remote("origin", "https://github.com/acme/widget.git")
            .unwrap();
        assert_eq!(
            git.origin_url().as_deref(),
            Some("https://github.com/acme/widget.git")
        );
    }

    #[test]
    fn test_create_branch_switches_head() {
        let (_dir, git) = test_repo();
        initial_commit(&git);

        assert!(!git.branch_exists("feature/x").unwrap());
        git.create_branch("feature/x").unwrap();
        assert!(git.branch_exists("feature/x").unwrap());
        assert_eq!(git.current_branch().unwrap(), "feature/x");
    }

    #[test]
    fn test_commits_since_lists_branch_commits_oldest_first() {
        let (dir, git) = test_repo();
        initial_commit(&git);
        git.create_branch("feature/pr").unwrap();

        write_file(&dir, "one.txt", "1\n");
        git.stage(&["one.txt".to_string()]).unwrap();
        git.commit("feat: one").unwrap();
        write_file(&dir, "two.txt", "2\n");
        git.stage(&["two.txt".to_string()]).unwrap();
        git.commit("feat: two").unwrap();

        let commits = git.commits_since("main").unwrap();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].summary, "feat: one");
        assert_eq!(commits[1].summary, "feat: two");
        assert_eq!(commits[0].hash.len(), 7);
    }
}
