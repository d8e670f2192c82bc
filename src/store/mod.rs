//! C5: Call-Graph Repository.
//!
//! One SQLite file per (project, commit), opened through sea-orm's raw
//! [`sea_orm::Statement`] execution path rather than an entity/ORM layer —
//! the schema is small and every query here is either a hand-written
//! recursive CTE or a straightforward upsert, neither of which benefits from
//! `DeriveEntityModel`.

pub mod read;
pub mod schema;
pub mod write;

use std::path::Path;

use sea_orm::{Database, DatabaseConnection};

use crate::errors::{CoreError, CoreResult};

/// Open (creating if absent) the call-graph database at `db_path`,
/// ensuring the schema exists.
pub async fn open(db_path: &Path) -> CoreResult<DatabaseConnection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let url = format!("sqlite://{}?mode=rwc", db_path.display());
    let db = Database::connect(&url)
        .await
        .map_err(|e| CoreError::StorageFailed(format!("failed to open {}: {e}", db_path.display())))?;
    schema::ensure_schema(&db).await?;
    Ok(db)
}
