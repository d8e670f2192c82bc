//! The external project store collaborator (§1 "explicitly out of scope":
//! "project-configuration persistence beyond what the core reads").
//!
//! The core never owns project rows — it only reads a [`Project`]
//! descriptor before generation and writes one back on a project's first
//! successful generation (§4.8 step "on success, persist the project
//! descriptor"). [`ProjectStore`] is the seam: production embeddings
//! implement it against their own database; [`InMemoryProjectStore`] is the
//! trivial implementation used by this crate's own tests and by any
//! embedder that doesn't need cross-process persistence.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::errors::CoreResult;
use crate::model::project::Project;

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn find_by_path(&self, path: &str) -> CoreResult<Option<Project>>;
    async fn find_by_id(&self, id: &str) -> CoreResult<Option<Project>>;
    async fn save(&self, project: &Project) -> CoreResult<()>;
}

/// A process-local, non-persistent [`ProjectStore`]. Good enough for
/// embedding scenarios that re-register projects per process, and for this
/// crate's own integration tests.
#[derive(Default)]
pub struct InMemoryProjectStore {
    by_path: DashMap<String, String>, // path -> project id
    by_id: DashMap<String, Project>,
}

impl InMemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectStore for InMemoryProjectStore {
    async fn find_by_path(&self, path: &str) -> CoreResult<Option<Project>> {
        let Some(id) = self.by_path.get(path).map(|v| v.clone()) else {
            return Ok(None);
        };
        Ok(self.by_id.get(&id).map(|p| p.clone()))
    }

    async fn find_by_id(&self, id: &str) -> CoreResult<Option<Project>> {
        Ok(self.by_id.get(id).map(|p| p.clone()))
    }

    async fn save(&self, project: &Project) -> CoreResult<()> {
        for path in &project.local_paths {
            self.by_path.insert(path.clone(), project.id.clone());
        }
        self.by_id.insert(project.id.clone(), project.clone());
        Ok(())
    }
}
