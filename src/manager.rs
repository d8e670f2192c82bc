//! C6: Call-Graph Manager.
//!
//! Owns the on-disk layout of per-project, per-commit call graphs: where a
//! commit's database lives, which commit is "latest", and the retention
//! policy that prunes old ones. Nothing here touches SQL directly (that is
//! [`crate::store`]'s job) — this module is pure filesystem/JSON
//! bookkeeping, the same split the teacher draws between its pack storage
//! (bytes on disk) and its protocol/metadata layers (JSON over the wire).
//!
//! # Layout
//!
//! ```text
//! <data_root>/<project_id>/
//!   commits/<full_commit>/graph.db
//!   commits/<full_commit>/meta.json
//!   latest.json
//!   index.json
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{CoreError, CoreResult};
use crate::model::call_graph::CallGraphMetadata;

/// `latest.json` contents: metadata of the most recent successful
/// generation plus the identity fields needed to recognize the project
/// without a separate lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestPointer {
    pub project_id: String,
    pub project_name: String,
    pub remote_url: Option<String>,
    #[serde(flatten)]
    pub metadata: CallGraphMetadata,
}

/// One entry of `index.json`: every commit this project has ever generated
/// a graph for, oldest first as written, but callers should treat order as
/// insertion order rather than chronological guarantee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub commit: String,
    pub created_at: DateTime<Utc>,
}

fn project_dir(data_root: &Path, project_id: &str) -> PathBuf {
    data_root.join(project_id)
}

fn commit_dir(data_root: &Path, project_id: &str, commit: &str) -> PathBuf {
    project_dir(data_root, project_id).join("commits").join(commit)
}

/// Pure function of `(project_id, commit)` — no I/O, so callers (C8, C7) can
/// compute it before deciding whether a generation is even necessary.
pub fn get_commit_db_path(data_root: &Path, project_id: &str, commit: &str) -> PathBuf {
    commit_dir(data_root, project_id, commit).join("graph.db")
}

fn meta_path(data_root: &Path, project_id: &str, commit: &str) -> PathBuf {
    commit_dir(data_root, project_id, commit).join("meta.json")
}

fn latest_path(data_root: &Path, project_id: &str) -> PathBuf {
    project_dir(data_root, project_id).join("latest.json")
}

fn index_path(data_root: &Path, project_id: &str) -> PathBuf {
    project_dir(data_root, project_id).join("index.json")
}

fn read_index(data_root: &Path, project_id: &str) -> CoreResult<Vec<IndexEntry>> {
    let path = index_path(data_root, project_id);
    if !path.is_file() {
        return Ok(Vec::new());
    }
    let contents = std::fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn write_index(data_root: &Path, project_id: &str, entries: &[IndexEntry]) -> CoreResult<()> {
    let path = index_path(data_root, project_id);
    std::fs::write(&path, serde_json::to_string_pretty(entries)?)?;
    Ok(())
}

/// Persist a successfully generated call graph: write `meta.json` for this
/// commit, append (or move-to-end) its `index.json` entry, then rewrite
/// `latest.json` last. Ordering matches §5's "`latest.json` is updated
/// last" guarantee.
pub fn save_call_graph(
    data_root: &Path,
    project_id: &str,
    project_name: &str,
    remote_url: Option<String>,
    metadata: &CallGraphMetadata,
) -> CoreResult<()> {
    let dir = commit_dir(data_root, project_id, &metadata.commit);
    std::fs::create_dir_all(&dir)?;

    let meta_json = serde_json::to_string_pretty(metadata)?;
    std::fs::write(meta_path(data_root, project_id, &metadata.commit), meta_json)?;

    let mut entries = read_index(data_root, project_id)?;
    entries.retain(|e| e.commit != metadata.commit);
    entries.push(IndexEntry {
        commit: metadata.commit.clone(),
        created_at: metadata.created_at,
    });
    write_index(data_root, project_id, &entries)?;

    let latest = LatestPointer {
        project_id: project_id.to_string(),
        project_name: project_name.to_string(),
        remote_url,
        metadata: metadata.clone(),
    };
    std::fs::write(
        latest_path(data_root, project_id),
        serde_json::to_string_pretty(&latest)?,
    )?;

    info!(project_id, commit = %metadata.commit, "saved call graph");
    Ok(())
}

pub fn load_latest(data_root: &Path, project_id: &str) -> CoreResult<Option<LatestPointer>> {
    let path = latest_path(data_root, project_id);
    if !path.is_file() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)?;
    Ok(Some(serde_json::from_str(&contents)?))
}

pub fn load_commit_metadata(
    data_root: &Path,
    project_id: &str,
    commit: &str,
) -> CoreResult<Option<CallGraphMetadata>> {
    let path = meta_path(data_root, project_id, commit);
    if !path.is_file() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)?;
    Ok(Some(serde_json::from_str(&contents)?))
}

pub fn list_commits(data_root: &Path, project_id: &str) -> CoreResult<Vec<IndexEntry>> {
    read_index(data_root, project_id)
}

/// Status snapshot for `CheckStatus` (§6) / `GetCallGraphStatus` (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallGraphStatus {
    pub exists: bool,
    pub up_to_date: bool,
    pub current_commit: Option<String>,
    pub head_commit: String,
    pub commits_behind: u32,
    pub project_registered: bool,
    pub db_path: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub func_count: Option<usize>,
    pub valid_go_module: bool,
    pub go_module_error: Option<String>,
}

/// Build a [`CallGraphStatus`] from the latest recorded generation and the
/// resolved HEAD commit. `commits_behind` is computed by walking
/// `git rev-list --count <current>..<head>`; the caller supplies that count
/// since C6 itself has no VCS access (that's C2's job).
pub fn call_graph_status(
    data_root: &Path,
    project_id: Option<&str>,
    head_commit: String,
    commits_behind: u32,
    valid_go_module: bool,
    go_module_error: Option<String>,
) -> CoreResult<CallGraphStatus> {
    let Some(project_id) = project_id else {
        return Ok(CallGraphStatus {
            exists: false,
            up_to_date: false,
            current_commit: None,
            head_commit,
            commits_behind: 0,
            project_registered: false,
            db_path: None,
            created_at: None,
            func_count: None,
            valid_go_module,
            go_module_error,
        });
    };

    let latest = load_latest(data_root, project_id)?;
    match latest {
        Some(l) => Ok(CallGraphStatus {
            exists: true,
            up_to_date: l.metadata.commit == head_commit,
            current_commit: Some(l.metadata.commit.clone()),
            head_commit,
            commits_behind,
            project_registered: true,
            db_path: Some(l.metadata.db_path.clone()),
            created_at: Some(l.metadata.created_at),
            func_count: Some(l.metadata.func_count),
            valid_go_module,
            go_module_error,
        }),
        None => Ok(CallGraphStatus {
            exists: false,
            up_to_date: false,
            current_commit: None,
            head_commit,
            commits_behind,
            project_registered: true,
            db_path: None,
            created_at: None,
            func_count: None,
            valid_go_module,
            go_module_error,
        }),
    }
}

/// Retention policy (SPEC_FULL §11): keep the newest `max_count` commits by
/// `created_at`, and drop anything older than `max_age_days` regardless of
/// count — the union of the two constraints determines what survives.
/// Deletes the commit's entire directory (DB + `meta.json`) and rewrites
/// `index.json`; never touches `latest.json`'s target commit even if it
/// would otherwise be pruned, since that would orphan the "current" graph.
pub fn clean_old_versions(
    data_root: &Path,
    project_id: &str,
    max_count: usize,
    max_age_days: i64,
) -> CoreResult<Vec<String>> {
    let mut entries = read_index(data_root, project_id)?;
    entries.sort_by_key(|e| e.created_at);

    let latest_commit = load_latest(data_root, project_id)?.map(|l| l.metadata.commit);
    let now = Utc::now();
    let cutoff = now - chrono::Duration::days(max_age_days);

    let keep_newest: std::collections::HashSet<String> = entries
        .iter()
        .rev()
        .take(max_count)
        .map(|e| e.commit.clone())
        .collect();

    let mut removed = Vec::new();
    let mut survivors = Vec::new();
    for entry in entries {
        let protect = Some(&entry.commit) == latest_commit.as_ref();
        let keep = protect || keep_newest.contains(&entry.commit) || entry.created_at >= cutoff;
        if keep {
            survivors.push(entry);
        } else {
            let dir = commit_dir(data_root, project_id, &entry.commit);
            std::fs::remove_dir_all(&dir).ok();
            removed.push(entry.commit);
        }
    }

    write_index(data_root, project_id, &survivors)?;
    if !removed.is_empty() {
        info!(project_id, count = removed.len(), "cleaned old call graph versions");
    }
    Ok(removed)
}

/// Delete a single commit's graph entirely (nodes and edges go with the
/// file, per §3's "Deleting a commit removes all its nodes and edges
/// atomically (file-level delete)").
pub fn delete_commit(data_root: &Path, project_id: &str, commit: &str) -> CoreResult<()> {
    let dir = commit_dir(data_root, project_id, commit);
    std::fs::remove_dir_all(&dir).or_else(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Ok(())
        } else {
            Err(CoreError::Io(e))
        }
    })?;

    let mut entries = read_index(data_root, project_id)?;
    entries.retain(|e| e.commit != commit);
    write_index(data_root, project_id, &entries)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::call_graph::Algorithm;
    use tempfile::tempdir;

    fn meta(commit: &str, created_at: DateTime<Utc>) -> CallGraphMetadata {
        CallGraphMetadata {
            commit: commit.to_string(),
            branch: "main".to_string(),
            algorithm: Algorithm::Rta,
            actual_algorithm: Algorithm::Rta,
            fallback: false,
            fallback_reason: None,
            func_count: 2,
            edge_count: 1,
            db_path: "graph.db".to_string(),
            created_at,
            generation_time_ms: 10,
        }
    }

    #[test]
    fn save_and_load_roundtrips_latest_and_status() {
        let dir = tempdir().unwrap();
        let m = meta("abc123", Utc::now());
        save_call_graph(dir.path(), "proj1", "My Project", None, &m).unwrap();

        let latest = load_latest(dir.path(), "proj1").unwrap().unwrap();
        assert_eq!(latest.metadata.commit, "abc123");

        let status = call_graph_status(dir.path(), Some("proj1"), "abc123".to_string(), 0, true, None).unwrap();
        assert!(status.up_to_date);
        assert!(status.exists);

        let status_behind =
            call_graph_status(dir.path(), Some("proj1"), "def456".to_string(), 3, true, None).unwrap();
        assert!(!status_behind.up_to_date);
        assert_eq!(status_behind.commits_behind, 3);
    }

    #[test]
    fn status_for_unregistered_project_reports_not_registered() {
        let dir = tempdir().unwrap();
        let status = call_graph_status(dir.path(), None, "abc".to_string(), 0, true, None).unwrap();
        assert!(!status.project_registered);
        assert!(!status.exists);
    }

    #[test]
    fn clean_old_versions_keeps_latest_and_newest_count() {
        let dir = tempdir().unwrap();
        let old = Utc::now() - chrono::Duration::days(200);
        for (i, commit) in ["c1", "c2", "c3"].iter().enumerate() {
            let created = if i == 0 { old } else { Utc::now() };
            save_call_graph(dir.path(), "proj1", "P", None, &meta(commit, created)).unwrap();
        }
        // c3 is latest; c1 is old and not within the newest-1 window.
        let removed = clean_old_versions(dir.path(), "proj1", 1, 90).unwrap();
        assert!(removed.contains(&"c1".to_string()));
        assert!(!removed.contains(&"c3".to_string()));

        let remaining = list_commits(dir.path(), "proj1").unwrap();
        assert!(remaining.iter().any(|e| e.commit == "c3"));
        assert!(!remaining.iter().any(|e| e.commit == "c1"));
    }

    #[test]
    fn delete_commit_removes_directory_and_index_entry() {
        let dir = tempdir().unwrap();
        save_call_graph(dir.path(), "proj1", "P", None, &meta("c1", Utc::now())).unwrap();
        let db_path = get_commit_db_path(dir.path(), "proj1", "c1");
        std::fs::create_dir_all(db_path.parent().unwrap()).unwrap();
        std::fs::write(&db_path, b"fake").unwrap();

        delete_commit(dir.path(), "proj1", "c1").unwrap();
        assert!(!db_path.exists());
        assert!(list_commits(dir.path(), "proj1").unwrap().is_empty());
    }
}
