//! Repository statistics from git.
//!
//! Counts are derived by shelling out to `git` in the file's directory. Any
//! failure (no git binary, not a repository, non-UTF-8 output) yields zero.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::trace;

/// Version-control statistics used to enrich keystroke sessions.
#[async_trait]
pub trait RepoInfoProvider: Send + Sync {
    /// Distinct authors in the repository containing `file`.
    async fn contributor_count(&self, file: &str) -> u64;

    /// Number of tracked files in `project_dir`.
    async fn repo_file_count(&self, project_dir: &str) -> u64;

    /// Distinct authors who touched `file`.
    async fn file_contributor_count(&self, file: &str) -> u64;
}

/// [`RepoInfoProvider`] that runs the `git` CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitRepoInfo;

impl GitRepoInfo {
    async fn git_lines(dir: &Path, args: &[&str]) -> Option<Vec<String>> {
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            trace!(dir = %dir.display(), ?args, "git command failed");
            return None;
        }
        let stdout = String::from_utf8(output.stdout).ok()?;
        Some(
            stdout
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    fn parent_dir(file: &str) -> Option<&Path> {
        Path::new(file).parent().filter(|p| p.is_dir())
    }
}

/// Number of distinct, non-empty lines.
fn distinct(lines: Vec<String>) -> u64 {
    lines.into_iter().collect::<HashSet<_>>().len() as u64
}

#[async_trait]
impl RepoInfoProvider for GitRepoInfo {
    async fn contributor_count(&self, file: &str) -> u64 {
        let Some(dir) = Self::parent_dir(file) else {
            return 0;
        };
        Self::git_lines(dir, &["log", "--format=%ae"])
            .await
            .map_or(0, distinct)
    }

    async fn repo_file_count(&self, project_dir: &str) -> u64 {
        let dir = Path::new(project_dir);
        if !dir.is_dir() {
            return 0;
        }
        Self::git_lines(dir, &["ls-files"])
            .await
            .map_or(0, |files| files.len() as u64)
    }

    async fn file_contributor_count(&self, file: &str) -> u64 {
        let Some(dir) = Self::parent_dir(file) else {
            return 0;
        };
        Self::git_lines(dir, &["log", "--format=%ae", "--", file])
            .await
            .map_or(0, distinct)
    }
}
