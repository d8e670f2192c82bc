//! C2: Worktree Manager.
//!
//! Materializes an arbitrary commit into a disposable checkout. Shells out
//! to the `git` CLI rather than an embedded git library: the CLI enforces
//! working-tree safety around checkout that a library binding would have to
//! reimplement, and worktree/sparse-checkout support is more reliably
//! consistent across platforms in practice.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tokio::process::Command;
use tracing::{info, warn};

use crate::errors::{CoreError, CoreResult};

pub struct CreatedWorktree {
    pub worktree_path: PathBuf,
    pub resolved_commit: String,
    _guard: TempDir,
}

async fn run_git(repo: &Path, args: &[&str]) -> CoreResult<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .output()
        .await
        .map_err(|e| CoreError::VcsFailure(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        return Err(CoreError::VcsFailure(format!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Resolve `ref` to a full commit hash.
pub async fn resolve_commit(repo: &Path, git_ref: &str) -> CoreResult<String> {
    let r = if git_ref.is_empty() { "HEAD" } else { git_ref };
    run_git(repo, &["rev-parse", r])
        .await
        .map_err(|_| CoreError::VcsFailure(format!("unknown ref: {r}")))
}

/// The branch `HEAD` is on, via `symbolic-ref`. Empty string on detached
/// HEAD, resolving the Open Question noted in §9/SPEC_FULL.md §11.
pub async fn current_branch(repo: &Path) -> String {
    run_git(repo, &["symbolic-ref", "--short", "HEAD"])
        .await
        .unwrap_or_default()
}

/// True iff `git_ref` is empty, `"HEAD"`, or resolves to the same commit as
/// `HEAD`.
pub async fn is_head_commit(repo: &Path, git_ref: &str) -> CoreResult<bool> {
    if git_ref.is_empty() || git_ref.eq_ignore_ascii_case("head") {
        return Ok(true);
    }
    let head = resolve_commit(repo, "HEAD").await?;
    let target = resolve_commit(repo, git_ref).await?;
    Ok(head == target)
}

/// Allocate a fresh directory and check out `git_ref` there via
/// `git worktree add --detach`.
pub async fn create_worktree(repo: &Path, git_ref: &str) -> CoreResult<CreatedWorktree> {
    let resolved = resolve_commit(repo, git_ref).await?;

    let guard = TempDir::new().map_err(CoreError::Io)?;
    let worktree_path = guard.path().to_path_buf();
    // TempDir::new() already created the directory; `worktree add` needs to
    // create it itself, so remove the empty dir first.
    std::fs::remove_dir(&worktree_path).ok();

    run_git(
        repo,
        &[
            "worktree",
            "add",
            "--detach",
            worktree_path.to_str().ok_or_else(|| {
                CoreError::VcsFailure("worktree path is not valid UTF-8".to_string())
            })?,
            &resolved,
        ],
    )
    .await?;

    info!(commit = %resolved, path = %worktree_path.display(), "created worktree");

    Ok(CreatedWorktree {
        worktree_path,
        resolved_commit: resolved,
        _guard: guard,
    })
}

/// Idempotent worktree removal. Failures are logged and suppressed: the
/// filesystem may hold brief locks on some platforms, and a leaked worktree
/// directory is a cleanup nuisance, not a correctness problem for the
/// caller's in-flight operation.
pub async fn remove_worktree(repo: &Path, worktree_path: &Path) {
    match run_git(
        repo,
        &[
            "worktree",
            "remove",
            "--force",
            &worktree_path.to_string_lossy(),
        ],
    )
    .await
    {
        Ok(_) => info!(path = %worktree_path.display(), "removed worktree"),
        Err(e) => warn!(path = %worktree_path.display(), error = %e, "worktree removal failed, ignoring"),
    }
    let _ = std::fs::remove_dir_all(worktree_path);
}
