//! Bulk write path (§4.5 "Write contract"): nodes upserted by `full_name`,
//! edges inserted-or-ignored on their uniqueness triple, all inside a single
//! transaction. Nodes are always written before edges, since C4 assigns
//! edge `caller_id`/`callee_id` against node IDs it minted itself.

use chrono::Utc;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement, TransactionTrait, Value};

use crate::errors::CoreResult;
use crate::model::func_edge::FuncEdge;
use crate::model::func_node::FuncNode;

/// Write `nodes` then `edges` inside one transaction. Re-ingesting the same
/// commit (same node `full_name`s, same edge triples) is idempotent.
pub async fn write_call_graph(
    db: &DatabaseConnection,
    nodes: &[FuncNode],
    edges: &[FuncEdge],
) -> CoreResult<()> {
    let txn = db.begin().await?;
    let now = Utc::now().to_rfc3339();

    for node in nodes {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Sqlite,
            r#"INSERT INTO func_nodes
                (id, full_name, canonical_name, package, func_name, file_path, line_start, line_end, is_exported, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(full_name) DO UPDATE SET
                 canonical_name = excluded.canonical_name,
                 package        = excluded.package,
                 func_name      = excluded.func_name,
                 file_path      = excluded.file_path,
                 line_start     = excluded.line_start,
                 line_end       = excluded.line_end,
                 is_exported    = excluded.is_exported"#,
            [
                Value::BigInt(Some(node.id)),
                Value::String(Some(Box::new(node.full_name.clone()))),
                Value::String(Some(Box::new(node.canonical_name.clone()))),
                Value::String(Some(Box::new(node.package.clone()))),
                Value::String(Some(Box::new(node.func_name.clone()))),
                Value::String(Some(Box::new(node.file_path.clone()))),
                Value::BigInt(Some(node.line_start as i64)),
                Value::BigInt(Some(node.line_end as i64)),
                Value::BigInt(Some(node.is_exported as i64)),
                Value::String(Some(Box::new(now.clone()))),
            ],
        );
        txn.execute(stmt).await?;
    }

    for edge in edges {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Sqlite,
            r#"INSERT OR IGNORE INTO func_edges
                (id, caller_id, callee_id, call_site_file, call_site_line)
               VALUES (?, ?, ?, ?, ?)"#,
            [
                Value::BigInt(Some(edge.id)),
                Value::BigInt(Some(edge.caller_id)),
                Value::BigInt(Some(edge.callee_id)),
                Value::String(Some(Box::new(edge.call_site_file.clone()))),
                Value::BigInt(Some(edge.call_site_line as i64)),
            ],
        );
        txn.execute(stmt).await?;
    }

    txn.commit().await?;
    Ok(())
}

/// Write a single `metadata` key/value pair (insert-or-replace).
pub async fn write_metadata(db: &DatabaseConnection, key: &str, value: &str) -> CoreResult<()> {
    let stmt = Statement::from_sql_and_values(
        DbBackend::Sqlite,
        "INSERT INTO metadata (key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [
            Value::String(Some(Box::new(key.to_string()))),
            Value::String(Some(Box::new(value.to_string()))),
        ],
    );
    db.execute(stmt).await?;
    Ok(())
}
