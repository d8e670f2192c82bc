//! Logical schema for one call-graph database file, per §4.5.
//!
//! One file per (project, commit); [`crate::manager`] owns the path. DDL is
//! applied with raw SQL via [`sea_orm::Statement`] rather than a migration
//! crate — there is exactly one schema version, created fresh for every new
//! commit DB, so a migrations framework would be ceremony without benefit.

use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement};

use crate::errors::CoreResult;

const DDL: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS func_nodes (
        id              INTEGER PRIMARY KEY,
        full_name       TEXT NOT NULL UNIQUE,
        canonical_name  TEXT NOT NULL,
        package         TEXT NOT NULL,
        func_name       TEXT NOT NULL,
        file_path       TEXT NOT NULL,
        line_start      INTEGER NOT NULL,
        line_end        INTEGER NOT NULL,
        is_exported     INTEGER NOT NULL,
        created_at      TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS func_edges (
        id              INTEGER PRIMARY KEY,
        caller_id       INTEGER NOT NULL REFERENCES func_nodes(id),
        callee_id       INTEGER NOT NULL REFERENCES func_nodes(id),
        call_site_file  TEXT NOT NULL,
        call_site_line  INTEGER NOT NULL,
        UNIQUE(caller_id, callee_id, call_site_line)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS metadata (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_func_nodes_package ON func_nodes(package)",
    "CREATE INDEX IF NOT EXISTS idx_func_nodes_file_path ON func_nodes(file_path)",
    "CREATE INDEX IF NOT EXISTS idx_func_nodes_canonical_name ON func_nodes(canonical_name)",
    "CREATE INDEX IF NOT EXISTS idx_func_edges_caller_id ON func_edges(caller_id)",
    "CREATE INDEX IF NOT EXISTS idx_func_edges_callee_id ON func_edges(callee_id)",
];

/// Apply the schema to a freshly-opened connection. Idempotent.
pub async fn ensure_schema(db: &DatabaseConnection) -> CoreResult<()> {
    for stmt in DDL {
        db.execute(Statement::from_string(DbBackend::Sqlite, stmt.to_string()))
            .await?;
    }
    Ok(())
}
