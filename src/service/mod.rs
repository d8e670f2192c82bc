//! C8: Generation Service — the orchestration component.
//!
//! Exposes the external service surface of §6 (minus HTTP/JSON transport,
//! which is explicitly out of scope). [`GenerationService`] owns the task
//! registry and a handle to the config; it is generic over the project
//! store collaborator via [`crate::project_store::ProjectStore`] so the
//! embedding application can back it with its own database.

pub mod generation;
pub mod registry;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::error;
use uuid::Uuid;

use crate::config::CoreConfig;
use crate::diff::{self, DiffAnalysisResult};
use crate::entrypoints;
use crate::errors::{CoreError, CoreResult};
use crate::impact::{self, ImpactAnalysisResult};
use crate::manager::{self, CallGraphStatus};
use crate::model::call_graph::{Algorithm, CallGraphMetadata};
use crate::model::project::{ExcludePatterns, Project};
use crate::model::task::{GenerationTask, TaskStatus};
use crate::project_store::ProjectStore;
use crate::store;
use crate::worktree;

use generation::{GenerationOverrides, GenerationRequest};
use registry::TaskRegistry;

#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub metadata: CallGraphMetadata,
}

#[derive(Debug, Clone, Default)]
pub struct FullAnalysisResult {
    pub diff: DiffAnalysisResult,
    pub impact: ImpactAnalysisResult,
}

pub struct GenerationService {
    config: CoreConfig,
    registry: TaskRegistry,
    projects: Arc<dyn ProjectStore>,
}

impl GenerationService {
    pub fn new(config: CoreConfig, projects: Arc<dyn ProjectStore>) -> Self {
        GenerationService {
            config,
            registry: TaskRegistry::new(),
            projects,
        }
    }

    fn path_key(path: &Path) -> String {
        path.display().to_string()
    }

    /// `CheckStatus` (§6): never fails except on I/O; a module C1 rejects
    /// is reported as `valid_go_module = false` rather than propagated as
    /// an error, since a status check describes a tree, it doesn't gate on
    /// it being buildable.
    pub async fn check_status(&self, project_path: &Path, commit: &str) -> CoreResult<CallGraphStatus> {
        let (valid_go_module, go_module_error) = match entrypoints::validate_module(project_path) {
            Ok(_) => (true, None),
            Err(CoreError::ModuleInvalid { reason, .. }) => (false, Some(reason.to_string())),
            Err(e) => (false, Some(e.to_string())),
        };

        let target_ref = if commit.is_empty() { "HEAD" } else { commit };
        let head_commit = worktree::resolve_commit(project_path, target_ref).await.unwrap_or_default();

        let project = self.projects.find_by_path(&Self::path_key(project_path)).await?;
        let commits_behind = match &project {
            Some(p) => match manager::load_latest(&self.config.data_root, &p.id)? {
                Some(latest) => commits_behind(project_path, &latest.metadata.commit, &head_commit).await,
                None => 0,
            },
            None => 0,
        };

        manager::call_graph_status(
            &self.config.data_root,
            project.as_ref().map(|p| p.id.as_str()),
            head_commit,
            commits_behind,
            valid_go_module,
            go_module_error,
        )
    }

    /// `Generate` (§6): synchronous; requires the project to already be
    /// registered.
    pub async fn generate(&self, project_path: &Path, commit: &str) -> CoreResult<GenerateResponse> {
        let project = self.require_project(project_path).await?;
        let req = GenerationRequest {
            project,
            project_path: project_path.to_path_buf(),
            commit: commit.to_string(),
            overrides: GenerationOverrides::default(),
        };
        let metadata = generation::run(req, &self.config, |_, _| {}, CancellationToken::new()).await?;
        Ok(GenerateResponse { metadata })
    }

    /// `GenerateAsync` (§6): requires prior registration, returns
    /// immediately with a task id.
    pub async fn generate_async(&self, project_path: &Path, commit: &str) -> CoreResult<(Uuid, TaskStatus)> {
        let project = self.require_project(project_path).await?;
        self.spawn_generation(
            project,
            project_path.to_path_buf(),
            commit.to_string(),
            GenerationOverrides::default(),
            false,
        )
        .await
    }

    /// `GenerateWithConfigAsync` (§6): accepts explicit overrides and
    /// registers the project on success if it wasn't already registered.
    #[allow(clippy::too_many_arguments)]
    pub async fn generate_with_config_async(
        &self,
        project_path: &Path,
        entry_points: Vec<String>,
        exclude: Option<ExcludePatterns>,
        algorithm: Option<Algorithm>,
        commit: &str,
        integration_test_dir: Option<String>,
        integration_test_tag: Option<String>,
    ) -> CoreResult<(Uuid, TaskStatus)> {
        let existing = self.projects.find_by_path(&Self::path_key(project_path)).await?;
        let project = match existing {
            Some(p) => p,
            None => {
                self.build_project_descriptor(project_path, entry_points.clone(), exclude.clone(), algorithm.unwrap_or_default())
                    .await?
            }
        };

        let overrides = GenerationOverrides {
            entry_points: Some(entry_points),
            exclude,
            algorithm,
            integration_test_dir,
            integration_test_tag,
        };

        self.spawn_generation(project, project_path.to_path_buf(), commit.to_string(), overrides, true)
            .await
    }

    /// `GetTaskProgress` (§6): a read-only copy of the task.
    pub async fn get_task_progress(&self, task_id: Uuid) -> CoreResult<GenerationTask> {
        self.registry
            .get(task_id)
            .await
            .ok_or_else(|| CoreError::InvalidArgument(format!("unknown task: {task_id}")))
    }

    /// Cooperative cancellation (§5): moves the task toward `failed` with
    /// kind `Cancelled`. A no-op for unknown or already-terminal tasks.
    pub async fn cancel_task(&self, task_id: Uuid) {
        self.registry.cancel(task_id).await;
    }

    /// `AnalyzeDiff` (§6).
    pub async fn analyze_diff(&self, project_path: &Path, commit_range: &str) -> CoreResult<DiffAnalysisResult> {
        let exclude = self
            .projects
            .find_by_path(&Self::path_key(project_path))
            .await?
            .map(|p| p.exclude)
            .unwrap_or_default();
        diff::analyze(project_path, commit_range, &exclude).await
    }

    /// `QueryImpact` (§6). `commit` empty or `"HEAD"` resolves to the
    /// project's latest recorded generation.
    pub async fn query_impact(
        &self,
        project_path: &Path,
        functions: &[String],
        depth: u32,
        commit: &str,
    ) -> CoreResult<ImpactAnalysisResult> {
        let project = self.require_project(project_path).await?;
        let resolved_commit = self.resolve_query_commit(project_path, &project.id, commit).await?;

        let db_path = manager::get_commit_db_path(&self.config.data_root, &project.id, &resolved_commit);
        if !db_path.is_file() {
            return Err(CoreError::StorageFailed(format!(
                "no call graph has been generated for commit {resolved_commit}"
            )));
        }
        let db = store::open(&db_path).await?;
        let bounded_depth = depth.min(self.config.max_impact_depth);
        impact::query_impact(&db, functions, bounded_depth).await
    }

    /// `FullAnalysis` (§6): short-circuits to an empty impact result when
    /// the diff yields no changed functions.
    pub async fn full_analysis(
        &self,
        project_path: &Path,
        commit_range: &str,
        depth: u32,
    ) -> CoreResult<FullAnalysisResult> {
        let diff_result = self.analyze_diff(project_path, commit_range).await?;
        if diff_result.changed_functions.is_empty() {
            return Ok(FullAnalysisResult {
                diff: diff_result,
                impact: ImpactAnalysisResult::default(),
            });
        }

        let names: Vec<String> = diff_result
            .changed_functions
            .iter()
            .map(|f| f.full_name.clone())
            .collect();
        let target_commit = diff::commit_range_new_side(commit_range)?;
        let impact_result = self.query_impact(project_path, &names, depth, &target_commit).await?;

        Ok(FullAnalysisResult {
            diff: diff_result,
            impact: impact_result,
        })
    }

    async fn require_project(&self, project_path: &Path) -> CoreResult<Project> {
        self.projects
            .find_by_path(&Self::path_key(project_path))
            .await?
            .ok_or_else(|| CoreError::ProjectNotRegistered(Self::path_key(project_path)))
    }

    async fn resolve_query_commit(&self, project_path: &Path, project_id: &str, commit: &str) -> CoreResult<String> {
        if !commit.is_empty() && !commit.eq_ignore_ascii_case("head") {
            return Ok(commit.to_string());
        }
        match manager::load_latest(&self.config.data_root, project_id)? {
            Some(latest) => Ok(latest.metadata.commit),
            None => worktree::resolve_commit(project_path, "HEAD").await,
        }
    }

    async fn build_project_descriptor(
        &self,
        project_path: &Path,
        entry_points: Vec<String>,
        exclude: Option<ExcludePatterns>,
        algorithm: Algorithm,
    ) -> CoreResult<Project> {
        let remote = entrypoints::get_remote_url(project_path).await?;
        let id = remote.clone().unwrap_or_else(|| Self::path_key(project_path));
        let name = project_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| id.clone());

        Ok(Project {
            id,
            name,
            remote_url: remote,
            local_paths: vec![Self::path_key(project_path)],
            entry_points,
            exclude: exclude.unwrap_or_default(),
            algorithm,
            integration_test_dir: None,
            integration_test_tag: None,
        })
    }

    /// Register a task, launch the pipeline on a detached `tokio::spawn`
    /// (decoupling it from the caller's own cancellation, per §4.8 step 5),
    /// and translate its outcome into registry transitions. The pipeline
    /// itself runs inside a *nested* `tokio::spawn` so a panic inside it
    /// surfaces as a `JoinError` here rather than unwinding into this task
    /// (§5 "Panic isolation").
    async fn spawn_generation(
        &self,
        project: Project,
        project_path: PathBuf,
        commit: String,
        overrides: GenerationOverrides,
        register_on_success: bool,
    ) -> CoreResult<(Uuid, TaskStatus)> {
        let task = GenerationTask::new(project.id.clone(), Self::path_key(&project_path), commit.clone());
        let task_id = task.task_id;
        let status = task.status;
        let cancel = self.registry.create(task).await;

        let registry = self.registry.clone();
        let config = self.config.clone();
        let projects = self.projects.clone();

        tokio::spawn(async move {
            let req = GenerationRequest {
                project: project.clone(),
                project_path,
                commit,
                overrides,
            };

            let progress_registry = registry.clone();
            let progress_cb = move |pct: u8, msg: &str| {
                let reg = progress_registry.clone();
                let msg = msg.to_string();
                tokio::spawn(async move { reg.set_progress(task_id, pct, msg).await });
            };

            let pipeline_cancel = cancel.clone();
            let pipeline = tokio::spawn(async move { generation::run(req, &config, progress_cb, pipeline_cancel).await });

            match pipeline.await {
                Ok(Ok(metadata)) => {
                    if register_on_success {
                        if let Err(e) = projects.save(&project).await {
                            error!(error = %e, "failed to persist project descriptor after successful generation");
                        }
                    }
                    registry.complete(task_id, metadata).await;
                }
                Ok(Err(e)) => {
                    let (code, suggestion, details) = generation::classify_failure(&e);
                    registry.fail(task_id, e.to_string(), code, suggestion, details).await;
                }
                Err(join_err) => {
                    if join_err.is_cancelled() {
                        registry.fail(task_id, "cancelled", "CANCELLED", None, None).await;
                    } else {
                        error!(error = %join_err, "generation task panicked");
                        registry
                            .fail(task_id, format!("panic: {join_err}"), "INTERNAL", None, None)
                            .await;
                    }
                }
            }
        });

        Ok((task_id, status))
    }
}

async fn commits_behind(project_path: &Path, current: &str, head: &str) -> u32 {
    if current == head {
        return 0;
    }
    let output = tokio::process::Command::new("git")
        .arg("-C")
        .arg(project_path)
        .args(["rev-list", "--count", &format!("{current}..{head}")])
        .output()
        .await;
    match output {
        Ok(o) if o.status.success() => String::from_utf8_lossy(&o.stdout).trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project_store::InMemoryProjectStore;
    use tempfile::tempdir;

    #[tokio::test]
    async fn generate_without_registration_is_rejected() {
        let dir = tempdir().unwrap();
        let config = CoreConfig {
            data_root: dir.path().join("data"),
            ..CoreConfig::default()
        };
        let service = GenerationService::new(config, Arc::new(InMemoryProjectStore::new()));

        let err = service.generate(dir.path(), "HEAD").await.unwrap_err();
        assert!(matches!(err, CoreError::ProjectNotRegistered(_)));
    }

    #[tokio::test]
    async fn query_impact_without_generated_graph_is_storage_failed() {
        let dir = tempdir().unwrap();
        let config = CoreConfig {
            data_root: dir.path().join("data"),
            ..CoreConfig::default()
        };
        let projects = Arc::new(InMemoryProjectStore::new());
        let project = Project {
            id: "proj1".to_string(),
            name: "demo".to_string(),
            remote_url: None,
            local_paths: vec![GenerationService::path_key(dir.path())],
            entry_points: vec!["main.go:main".to_string()],
            exclude: ExcludePatterns::default(),
            algorithm: Algorithm::Rta,
            integration_test_dir: None,
            integration_test_tag: None,
        };
        projects.save(&project).await.unwrap();

        let service = GenerationService::new(config, projects);
        let err = service
            .query_impact(dir.path(), &["pkg.Foo".to_string()], 2, "deadbeef")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::StorageFailed(_)));
    }

    #[tokio::test]
    async fn full_analysis_short_circuits_on_empty_diff() {
        let dir = tempdir().unwrap();
        std::process::Command::new("git").arg("init").arg("-q").current_dir(dir.path()).status().unwrap();
        std::process::Command::new("git")
            .args(["config", "user.email", "t@example.com"])
            .current_dir(dir.path())
            .status()
            .unwrap();
        std::process::Command::new("git")
            .args(["config", "user.name", "t"])
            .current_dir(dir.path())
            .status()
            .unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        std::process::Command::new("git").args(["add", "."]).current_dir(dir.path()).status().unwrap();
        std::process::Command::new("git")
            .args(["commit", "-q", "-m", "one"])
            .current_dir(dir.path())
            .status()
            .unwrap();
        std::fs::write(dir.path().join("a.txt"), "y").unwrap();
        std::process::Command::new("git").args(["add", "."]).current_dir(dir.path()).status().unwrap();
        std::process::Command::new("git")
            .args(["commit", "-q", "-m", "two"])
            .current_dir(dir.path())
            .status()
            .unwrap();

        let config = CoreConfig {
            data_root: dir.path().join("data"),
            ..CoreConfig::default()
        };
        let service = GenerationService::new(config, Arc::new(InMemoryProjectStore::new()));
        let result = service.full_analysis(dir.path(), "HEAD~1..HEAD", 3).await.unwrap();
        assert!(result.diff.changed_functions.is_empty());
        assert_eq!(result.impact.summary.total_affected, 0);
    }
}
