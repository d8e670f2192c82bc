//! In-process task registry (§3 "GenerationTask" ownership, §5 "Shared
//! resource policy").
//!
//! A single reader-writer lock guards the map from [`Uuid`] to
//! [`GenerationTask`]: progress queries take the read lock, every mutation
//! (create, update, terminate) takes the write lock. This module is the
//! only place that is allowed to mutate a task after creation — it is what
//! enforces progress monotonicity and terminal immutability (testable
//! properties 5 and 6 in §8), not [`GenerationTask`] itself.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::model::call_graph::CallGraphMetadata;
use crate::model::task::{GenerationTask, TaskStatus};

#[derive(Clone, Default)]
pub struct TaskRegistry {
    inner: Arc<RwLock<HashMap<Uuid, Entry>>>,
}

struct Entry {
    task: GenerationTask,
    cancel: CancellationToken,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a brand-new `pending` task and its cancellation handle.
    pub async fn create(&self, task: GenerationTask) -> CancellationToken {
        let cancel = CancellationToken::new();
        let id = task.task_id;
        self.inner.write().await.insert(
            id,
            Entry {
                task,
                cancel: cancel.clone(),
            },
        );
        cancel
    }

    pub async fn get(&self, task_id: Uuid) -> Option<GenerationTask> {
        self.inner.read().await.get(&task_id).map(|e| e.task.clone())
    }

    /// Request cancellation of a running task. A no-op if the task is
    /// already terminal or unknown.
    pub async fn cancel(&self, task_id: Uuid) {
        let guard = self.inner.read().await;
        if let Some(entry) = guard.get(&task_id) {
            if !entry.task.status.is_terminal() {
                entry.cancel.cancel();
            }
        }
    }

    pub async fn cancellation_token(&self, task_id: Uuid) -> Option<CancellationToken> {
        self.inner.read().await.get(&task_id).map(|e| e.cancel.clone())
    }

    /// Move a task to `running` and update its progress/message. Ignored
    /// (logged at debug via caller) if the task is already terminal —
    /// terminal states never transition again, per §3's lifecycle note.
    pub async fn set_progress(&self, task_id: Uuid, progress: u8, message: impl Into<String>) {
        let mut guard = self.inner.write().await;
        if let Some(entry) = guard.get_mut(&task_id) {
            if entry.task.status.is_terminal() {
                return;
            }
            entry.task.status = TaskStatus::Running;
            // Progress is monotonic non-decreasing; never let a late/racy
            // update move it backwards.
            entry.task.progress = entry.task.progress.max(progress);
            entry.task.message = message.into();
        }
    }

    pub async fn complete(&self, task_id: Uuid, result: CallGraphMetadata) {
        let mut guard = self.inner.write().await;
        if let Some(entry) = guard.get_mut(&task_id) {
            if entry.task.status.is_terminal() {
                return;
            }
            entry.task.status = TaskStatus::Completed;
            entry.task.progress = 100;
            entry.task.message = "generation complete".to_string();
            entry.task.result = Some(result);
            entry.task.completed_at = Some(Utc::now());
        }
    }

    pub async fn fail(
        &self,
        task_id: Uuid,
        error: impl Into<String>,
        error_code: impl Into<String>,
        suggestion: Option<String>,
        details: Option<String>,
    ) {
        let mut guard = self.inner.write().await;
        if let Some(entry) = guard.get_mut(&task_id) {
            if entry.task.status.is_terminal() {
                return;
            }
            entry.task.status = TaskStatus::Failed;
            entry.task.error = Some(error.into());
            entry.task.error_code = Some(error_code.into());
            entry.task.suggestion = suggestion;
            entry.task.details = details;
            entry.task.completed_at = Some(Utc::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> CallGraphMetadata {
        CallGraphMetadata {
            commit: "abc".to_string(),
            branch: "main".to_string(),
            algorithm: crate::model::call_graph::Algorithm::Rta,
            actual_algorithm: crate::model::call_graph::Algorithm::Rta,
            fallback: false,
            fallback_reason: None,
            func_count: 1,
            edge_count: 0,
            db_path: "graph.db".to_string(),
            created_at: Utc::now(),
            generation_time_ms: 1,
        }
    }

    #[tokio::test]
    async fn progress_is_monotonic_and_terminal_is_immutable() {
        let registry = TaskRegistry::new();
        let task = GenerationTask::new("p".into(), "/path".into(), "HEAD".into());
        let id = task.task_id;
        registry.create(task).await;

        registry.set_progress(id, 20, "loading").await;
        registry.set_progress(id, 10, "late update").await; // must not move backwards
        let t = registry.get(id).await.unwrap();
        assert_eq!(t.progress, 20);

        registry.complete(id, metadata()).await;
        let t = registry.get(id).await.unwrap();
        assert_eq!(t.progress, 100);
        assert!(t.completed_at.is_some());

        // Further mutation after terminal is a no-op.
        registry.set_progress(id, 50, "ignored").await;
        registry.fail(id, "ignored", "IGNORED", None, None).await;
        let t = registry.get(id).await.unwrap();
        assert_eq!(t.progress, 100);
        assert!(t.error.is_none());
    }

    #[tokio::test]
    async fn cancel_triggers_the_tasks_token() {
        let registry = TaskRegistry::new();
        let task = GenerationTask::new("p".into(), "/path".into(), "HEAD".into());
        let id = task.task_id;
        let token = registry.create(task).await;
        assert!(!token.is_cancelled());

        registry.cancel(id).await;
        assert!(token.is_cancelled());
    }
}
