//! C8's pipeline body: C1 → C2 → C4 → C5 → C6, shared by the synchronous
//! `Generate` and the asynchronous `GenerateAsync`/`GenerateWithConfigAsync`
//! entry points in [`super::GenerationService`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::CoreConfig;
use crate::entrypoints;
use crate::errors::{CoreError, CoreResult};
use crate::manager;
use crate::model::call_graph::{Algorithm, CallGraphMetadata};
use crate::model::project::{ExcludePatterns, Project};
use crate::ssa::{self, EntryPointRequest};
use crate::store;
use crate::worktree;

/// Overrides accepted by `GenerateWithConfigAsync` (§6); `None` means "use
/// the project's stored configuration".
#[derive(Debug, Clone, Default)]
pub struct GenerationOverrides {
    pub entry_points: Option<Vec<String>>,
    pub exclude: Option<ExcludePatterns>,
    pub algorithm: Option<Algorithm>,
    pub integration_test_dir: Option<String>,
    pub integration_test_tag: Option<String>,
}

pub struct GenerationRequest {
    pub project: Project,
    pub project_path: PathBuf,
    pub commit: String,
    pub overrides: GenerationOverrides,
}

/// Map C4's internal `0..=100` progress onto the outer `20..=80` band, per
/// §4.8's progress milestones table, so the task's overall progress stays
/// monotonic across phases.
fn map_ssa_band(inner_percent: u8) -> u8 {
    20 + ((inner_percent as u32 * 60) / 100) as u8
}

/// When the module root is a subdirectory of the requested path (the
/// monorepo case from C1's path reconciliation), rewrite client-supplied
/// entry-point specs to be relative to the module root instead of the
/// originally requested path.
fn reconcile_entry_points(raw: &[String], project_path: &Path, module_root: &Path) -> Vec<String> {
    if module_root == project_path {
        return raw.to_vec();
    }
    let Ok(rel) = module_root.strip_prefix(project_path) else {
        return raw.to_vec();
    };
    let rel = rel.to_string_lossy().replace('\\', "/");
    if rel.is_empty() {
        return raw.to_vec();
    }
    let prefix = format!("{rel}/");
    raw.iter()
        .map(|spec| {
            if spec == "*" {
                spec.clone()
            } else {
                spec.strip_prefix(prefix.as_str()).map(str::to_string).unwrap_or_else(|| spec.clone())
            }
        })
        .collect()
}

/// Run the full generation pipeline. `progress` is invoked with percent in
/// `0..=100` and a human message; `cancel` is polled at the one coarse
/// suspension point available to this reimplementation (around the SSA
/// phase, §4.4/§5) and checked before every later phase so a cancellation
/// requested during SSA or during the DB write phases is honored promptly.
pub async fn run(
    req: GenerationRequest,
    config: &CoreConfig,
    progress: impl Fn(u8, &str) + Send + Sync + Clone + 'static,
    cancel: CancellationToken,
) -> CoreResult<CallGraphMetadata> {
    let start = Instant::now();

    progress(5, "task created");
    progress(10, "loading project configuration");

    let validation = entrypoints::validate_module(&req.project_path)?;
    let module_root = validation.module_root_dir.clone();
    let module_path = validation.module_path.clone();

    let raw_entry_points = req
        .overrides
        .entry_points
        .clone()
        .unwrap_or_else(|| req.project.entry_points.clone());
    let entry_points = reconcile_entry_points(&raw_entry_points, &req.project_path, &module_root);
    let entry_request = EntryPointRequest::from_raw(&entry_points)?;

    let exclude = req.overrides.exclude.clone().unwrap_or_else(|| req.project.exclude.clone());
    let algorithm = req.overrides.algorithm.unwrap_or(req.project.algorithm);

    if cancel.is_cancelled() {
        return Err(CoreError::Cancelled);
    }

    let is_head = worktree::is_head_commit(&req.project_path, &req.commit).await?;
    progress(10, "creating worktree");

    let mut worktree_guard = None;
    let (effective_repo, effective_root, resolved_commit) = if is_head {
        let resolved = worktree::resolve_commit(&req.project_path, &req.commit).await?;
        (req.project_path.clone(), module_root.clone(), resolved)
    } else {
        let wt = worktree::create_worktree(&req.project_path, &req.commit).await?;
        let module_rel = module_root.strip_prefix(&req.project_path).unwrap_or(Path::new("")).to_path_buf();
        let effective_root = wt.worktree_path.join(&module_rel);
        let resolved = wt.resolved_commit.clone();
        worktree_guard = Some(wt);
        (req.project_path.clone(), effective_root, resolved)
    };
    let active_tree = worktree_guard
        .as_ref()
        .map(|wt| wt.worktree_path.clone())
        .unwrap_or_else(|| req.project_path.clone());

    let branch = worktree::current_branch(&active_tree).await;
    progress(15, "commit resolved");

    if cancel.is_cancelled() {
        cleanup_worktree(&effective_repo, worktree_guard).await;
        return Err(CoreError::Cancelled);
    }

    progress(20, "SSA load started");

    let ssa_progress = progress.clone();
    let analyze_root = effective_root.clone();
    let analyze_module_path = module_path.clone();
    let analyze_fut = tokio::task::spawn_blocking(move || {
        ssa::analyze(
            &analyze_root,
            &analyze_module_path,
            &exclude,
            algorithm,
            &entry_request,
            &HashSet::new(),
            &move |inner, msg| ssa_progress(map_ssa_band(inner), msg),
        )
    });

    let ssa_output = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            cleanup_worktree(&effective_repo, worktree_guard).await;
            return Err(CoreError::Cancelled);
        }
        joined = analyze_fut => {
            match joined {
                Ok(Ok(out)) => out,
                Ok(Err(e)) => {
                    cleanup_worktree(&effective_repo, worktree_guard).await;
                    return Err(e);
                }
                Err(join_err) => {
                    cleanup_worktree(&effective_repo, worktree_guard).await;
                    return Err(CoreError::Internal(format!("SSA analyzer task panicked: {join_err}")));
                }
            }
        }
    };

    if cancel.is_cancelled() {
        cleanup_worktree(&effective_repo, worktree_guard).await;
        return Err(CoreError::Cancelled);
    }

    progress(80, "initializing database");
    let db_path = manager::get_commit_db_path(&config.data_root, &req.project.id, &resolved_commit);
    let db = store::open(&db_path).await?;

    progress(85, "writing nodes");
    store::write::write_call_graph(&db, &ssa_output.nodes, &ssa_output.edges).await?;

    progress(90, "writing metadata");
    store::write::write_metadata(&db, "commit", &resolved_commit).await?;
    store::write::write_metadata(&db, "algorithm", ssa_output.actual_algorithm.as_str()).await?;
    store::write::write_metadata(&db, "module_path", &module_path).await?;
    let created_at = Utc::now();
    store::write::write_metadata(&db, "created_at", &created_at.to_rfc3339()).await?;
    progress(95, "metadata written");

    let metadata = CallGraphMetadata {
        commit: resolved_commit,
        branch,
        algorithm,
        actual_algorithm: ssa_output.actual_algorithm,
        fallback: ssa_output.fallback,
        fallback_reason: ssa_output.fallback_reason,
        func_count: ssa_output.nodes.len(),
        edge_count: ssa_output.edges.len(),
        db_path: db_path.display().to_string(),
        created_at,
        generation_time_ms: start.elapsed().as_millis() as u64,
    };

    manager::save_call_graph(
        &config.data_root,
        &req.project.id,
        &req.project.name,
        req.project.remote_url.clone(),
        &metadata,
    )?;

    progress(98, "cleaning up worktree");
    cleanup_worktree(&effective_repo, worktree_guard).await;

    info!(
        commit = %metadata.commit,
        algorithm = %metadata.actual_algorithm,
        func_count = metadata.func_count,
        edge_count = metadata.edge_count,
        "generation complete"
    );

    Ok(metadata)
}

async fn cleanup_worktree(repo: &Path, worktree: Option<worktree::CreatedWorktree>) {
    if let Some(wt) = worktree {
        worktree::remove_worktree(repo, &wt.worktree_path).await;
    }
}

/// Classify a [`CoreError`] into the `(error_code, suggestion, details)`
/// triple stored on a failed [`crate::model::task::GenerationTask`] (§4.8
/// step 7, §7's propagation policy).
pub fn classify_failure(err: &CoreError) -> (String, Option<String>, Option<String>) {
    (
        err.error_code().to_string(),
        err.suggestion().map(str::to_string),
        err.details().map(str::to_string),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_ssa_band_into_20_80_window() {
        assert_eq!(map_ssa_band(0), 20);
        assert_eq!(map_ssa_band(100), 80);
        assert_eq!(map_ssa_band(50), 50);
    }

    #[test]
    fn reconciles_entry_points_relative_to_monorepo_module_root() {
        let project_path = Path::new("/repo");
        let module_root = Path::new("/repo/backend");
        let raw = vec!["backend/cmd/server/main.go:main".to_string(), "*".to_string()];
        let out = reconcile_entry_points(&raw, project_path, module_root);
        assert_eq!(out[0], "cmd/server/main.go:main");
        assert_eq!(out[1], "*");
    }

    #[test]
    fn leaves_entry_points_unchanged_when_module_root_matches() {
        let p = Path::new("/repo");
        let raw = vec!["main.go:main".to_string()];
        assert_eq!(reconcile_entry_points(&raw, p, p), raw);
    }
}
