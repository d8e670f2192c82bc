//! Generation task: the unit of work tracked by C8's in-process registry.
//!
//! # Status transitions
//!
//! ```text
//! pending ──▶ running ──▶ completed
//!                 │
//!                 └──────▶ failed
//! ```
//!
//! `progress` is monotonic non-decreasing while `pending`/`running`. Once a
//! task reaches `completed` or `failed` it is terminal: `completed_at` is
//! set and no further transition is accepted (enforced by
//! [`crate::service::registry::TaskRegistry`], not by this type itself,
//! which is a plain data holder).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::call_graph::CallGraphMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationTask {
    pub task_id: Uuid,
    pub project_id: String,
    pub project_path: String,
    pub commit: String,
    pub status: TaskStatus,
    /// `0..=100`, monotonic non-decreasing until terminal.
    pub progress: u8,
    pub message: String,
    pub result: Option<CallGraphMetadata>,
    pub error: Option<String>,
    pub error_code: Option<String>,
    pub suggestion: Option<String>,
    pub details: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl GenerationTask {
    pub fn new(project_id: String, project_path: String, commit: String) -> Self {
        GenerationTask {
            task_id: Uuid::new_v4(),
            project_id,
            project_path,
            commit,
            status: TaskStatus::Pending,
            progress: 0,
            message: "task created".to_string(),
            result: None,
            error: None,
            error_code: None,
            suggestion: None,
            details: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_starts_pending_at_zero_progress() {
        let t = GenerationTask::new("proj".into(), "/path".into(), "HEAD".into());
        assert_eq!(t.status, TaskStatus::Pending);
        assert_eq!(t.progress, 0);
        assert!(!t.status.is_terminal());
    }

    #[test]
    fn terminal_statuses() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
    }
}
