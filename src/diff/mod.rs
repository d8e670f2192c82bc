//! C3: Diff Analyzer.
//!
//! Given a commit range, produces the list of [`ChangedFunction`]s plus the
//! raw list of changed files, per §4.3.

pub mod goparse;
pub mod hunks;

use std::collections::HashSet;
use std::path::Path;

use tokio::process::Command;
use tracing::warn;

use crate::errors::{CoreError, CoreResult};
use crate::model::changed_function::{ChangeType, ChangedFunction};
use crate::model::project::ExcludePatterns;

#[derive(Debug, Clone, Default)]
pub struct DiffAnalysisResult {
    pub changed_functions: Vec<ChangedFunction>,
    pub changed_files: Vec<String>,
    pub warnings: Vec<String>,
}

/// Normalize an empty range to the default `HEAD~1..HEAD`, per §4.3 and
/// §9's Open Question (this silently misbehaves on a repo's first commit;
/// that failure surfaces as a `VcsFailure`, not a panic, per SPEC_FULL §13).
pub fn normalize_range(commit_range: &str) -> String {
    if commit_range.trim().is_empty() {
        "HEAD~1..HEAD".to_string()
    } else {
        commit_range.trim().to_string()
    }
}

fn split_range(range: &str) -> CoreResult<(String, String)> {
    range
        .split_once("..")
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .ok_or_else(|| CoreError::InvalidArgument(format!("malformed commit range: {range}")))
}

async fn run_git(repo: &Path, args: &[&str]) -> CoreResult<std::process::Output> {
    Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .output()
        .await
        .map_err(|e| CoreError::VcsFailure(format!("failed to run git: {e}")))
}

async fn changed_files(repo: &Path, old: &str, new: &str) -> CoreResult<Vec<String>> {
    let output = run_git(repo, &["diff", "--name-only", &format!("{old}..{new}")]).await?;
    if !output.status.success() {
        return Err(CoreError::VcsFailure(format!(
            "git diff {old}..{new} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

async fn file_at_commit(repo: &Path, commit: &str, file: &str) -> Option<String> {
    let output = run_git(repo, &["show", &format!("{commit}:{file}")])
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).to_string())
}

/// The "new" side of a commit range (e.g. `HEAD` in `HEAD~1..HEAD`),
/// normalizing an empty range first. Used by `FullAnalysis` (§6) to know
/// which commit's call graph an impact query should run against.
pub fn commit_range_new_side(commit_range: &str) -> CoreResult<String> {
    let range = normalize_range(commit_range);
    let (_, new) = split_range(&range)?;
    Ok(new)
}

/// Run the C3 pipeline over `commit_range` (see §4.3's algorithm).
pub async fn analyze(
    repo: &Path,
    commit_range: &str,
    exclude: &ExcludePatterns,
) -> CoreResult<DiffAnalysisResult> {
    let range = normalize_range(commit_range);
    let (old, new) = split_range(&range)?;

    let files = changed_files(repo, &old, &new).await?;
    let mut warnings = Vec::new();
    let mut changed_functions = Vec::new();
    let mut kept_files = Vec::new();

    for file in &files {
        if exclude.matches(file) {
            continue;
        }
        if !file.ends_with(".go") {
            continue;
        }
        kept_files.push(file.clone());

        let old_text = file_at_commit(repo, &old, file).await;
        let new_text = file_at_commit(repo, &new, file).await;

        let old_source = old_text.as_deref().and_then(|t| goparse::parse_source(t, file));
        let new_source = new_text.as_deref().and_then(|t| goparse::parse_source(t, file));

        if old_text.is_some() && old_source.is_none() {
            warnings.push(format!("failed to parse old version of {file}, skipping"));
        }
        if new_text.is_some() && new_source.is_none() {
            warnings.push(format!("failed to parse new version of {file}, skipping"));
        }

        let old_funcs = old_source.map(|s| goparse::index_by_canonical_name(&s.functions).into_iter().map(|(k, v)| (k, v.clone())).collect::<std::collections::HashMap<_, _>>()).unwrap_or_default();
        let new_funcs = new_source.map(|s| goparse::index_by_canonical_name(&s.functions).into_iter().map(|(k, v)| (k, v.clone())).collect::<std::collections::HashMap<_, _>>()).unwrap_or_default();

        let all_names: HashSet<&String> = old_funcs.keys().chain(new_funcs.keys()).collect();

        let line_changes = match (old_text.as_deref(), new_text.as_deref()) {
            (Some(o), Some(n)) => Some(hunks::line_changes(o, n)),
            _ => None,
        };

        for name in all_names {
            let in_old = old_funcs.get(name);
            let in_new = new_funcs.get(name);

            match (in_old, in_new) {
                (None, Some(f)) => changed_functions.push(build_changed(
                    f,
                    ChangeType::Added,
                    0,
                    f.line_end.saturating_sub(f.line_start) + 1,
                )),
                (Some(f), None) => changed_functions.push(build_changed(
                    f,
                    ChangeType::Deleted,
                    f.line_end.saturating_sub(f.line_start) + 1,
                    0,
                )),
                (Some(old_f), Some(new_f)) => {
                    let (added, removed) = match &line_changes {
                        Some(lc) => (
                            hunks::count_in_range(&lc.inserted_new_lines, new_f.line_start, new_f.line_end),
                            hunks::count_in_range(&lc.deleted_old_lines, old_f.line_start, old_f.line_end),
                        ),
                        None => (0, 0),
                    };
                    if added > 0 || removed > 0 {
                        changed_functions.push(build_changed(new_f, ChangeType::Modified, removed, added));
                    }
                }
                (None, None) => unreachable!(),
            }
        }
    }

    if !warnings.is_empty() {
        for w in &warnings {
            warn!("{w}");
        }
    }

    Ok(DiffAnalysisResult {
        changed_functions,
        changed_files: kept_files,
        warnings,
    })
}

fn build_changed(
    f: &goparse::GoFunction,
    change_type: ChangeType,
    lines_removed: u32,
    lines_added: u32,
) -> ChangedFunction {
    ChangedFunction {
        name: f.func_name.clone(),
        full_name: f.canonical_name(),
        package: f.package.clone(),
        file: f.file.clone(),
        line_start: f.line_start,
        line_end: f.line_end,
        change_type,
        lines_added,
        lines_removed,
    }
}
