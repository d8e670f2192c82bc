//! Read operations (§4.5 "Read operations (the interesting ones)").

use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement, Value};
use serde::{Deserialize, Serialize};

use crate::errors::CoreResult;
use crate::model::func_node::FuncNode;

/// One row of a `GetCallersWithDepth`/`GetCalleesWithDepth` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReachabilityRow {
    pub function: String,
    pub display_name: String,
    pub package: String,
    pub file: String,
    pub line: i32,
    pub depth: i32,
}

/// Match `names` against either `full_name` or `canonical_name`, deduplicated
/// by node `id`. This is the mechanism that lets C3's canonical names
/// resolve against C4's SSA-derived names (see §9 "Cross-form naming").
pub async fn get_func_nodes_by_full_names(
    db: &DatabaseConnection,
    names: &[String],
) -> CoreResult<Vec<FuncNode>> {
    if names.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = names.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
    let sql = format!(
        "SELECT id, full_name, canonical_name, package, func_name, file_path, line_start, line_end, is_exported
           FROM func_nodes
          WHERE full_name IN ({placeholders}) OR canonical_name IN ({placeholders})"
    );

    let values: Vec<Value> = names
        .iter()
        .cloned()
        .map(|n| Value::String(Some(Box::new(n))))
        .chain(names.iter().cloned().map(|n| Value::String(Some(Box::new(n)))))
        .collect();

    let stmt = Statement::from_sql_and_values(DbBackend::Sqlite, sql, values);
    let rows = db.query_all(stmt).await?;

    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for row in rows {
        let id: i64 = row.try_get("", "id")?;
        if !seen.insert(id) {
            continue;
        }
        out.push(FuncNode {
            id,
            full_name: row.try_get("", "full_name")?,
            canonical_name: row.try_get("", "canonical_name")?,
            package: row.try_get("", "package")?,
            func_name: row.try_get("", "func_name")?,
            file_path: row.try_get("", "file_path")?,
            line_start: row.try_get::<i64>("", "line_start")? as u32,
            line_end: row.try_get::<i64>("", "line_end")? as u32,
            is_exported: row.try_get::<i64>("", "is_exported")? != 0,
        });
    }
    Ok(out)
}

/// Bounded reverse BFS over `func_edges`: direct callers of `seed_ids` at
/// depth 1, then callers of callers, up to `max_depth`. Distinct by
/// `(full_name, line)`, ordered by `(depth, full_name)`.
pub async fn get_callers_with_depth(
    db: &DatabaseConnection,
    seed_ids: &[i64],
    max_depth: u32,
) -> CoreResult<Vec<ReachabilityRow>> {
    reachability(db, seed_ids, max_depth, Direction::Callers).await
}

/// Symmetric forward traversal: callees of `seed_ids`.
pub async fn get_callees_with_depth(
    db: &DatabaseConnection,
    seed_ids: &[i64],
    max_depth: u32,
) -> CoreResult<Vec<ReachabilityRow>> {
    reachability(db, seed_ids, max_depth, Direction::Callees).await
}

enum Direction {
    Callers,
    Callees,
}

async fn reachability(
    db: &DatabaseConnection,
    seed_ids: &[i64],
    max_depth: u32,
    direction: Direction,
) -> CoreResult<Vec<ReachabilityRow>> {
    if seed_ids.is_empty() || max_depth == 0 {
        return Ok(Vec::new());
    }

    let (join_col, other_col) = match direction {
        Direction::Callers => ("callee_id", "caller_id"),
        Direction::Callees => ("caller_id", "callee_id"),
    };

    let seed_placeholders = seed_ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
    let sql = format!(
        r#"WITH RECURSIVE reach(node_id, depth) AS (
               SELECT e.{other_col}, 1
                 FROM func_edges e
                WHERE e.{join_col} IN ({seed_placeholders})
               UNION
               SELECT e.{other_col}, r.depth + 1
                 FROM func_edges e
                 JOIN reach r ON e.{join_col} = r.node_id
                WHERE r.depth < ?
           )
           SELECT DISTINCT n.full_name AS function,
                  n.canonical_name AS display_name,
                  n.package AS package,
                  n.file_path AS file,
                  n.line_start AS line,
                  MIN(r.depth) AS depth
             FROM reach r
             JOIN func_nodes n ON n.id = r.node_id
            GROUP BY n.full_name, n.line_start
            ORDER BY depth, function"#
    );

    let mut values: Vec<Value> = seed_ids.iter().map(|&id| Value::BigInt(Some(id))).collect();
    values.push(Value::BigInt(Some(max_depth as i64)));

    let stmt = Statement::from_sql_and_values(DbBackend::Sqlite, sql, values);
    let rows = db.query_all(stmt).await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(ReachabilityRow {
            function: row.try_get("", "function")?,
            display_name: row.try_get("", "display_name")?,
            package: row.try_get("", "package")?,
            file: row.try_get("", "file")?,
            line: row.try_get::<i64>("", "line")? as i32,
            depth: row.try_get::<i64>("", "depth")? as i32,
        });
    }
    Ok(out)
}

/// `SearchFunctions`' mode selector, per §4.5 / SPEC_FULL §11.
#[derive(Debug, Clone)]
pub enum SearchMode {
    FileAndLine { file: String, line: u32 },
    File { file: String },
    ExactName { name: String },
    PackageAndShortName { package: String, short_name: String },
    FuzzyShortName { query: String },
}

pub async fn search_functions(
    db: &DatabaseConnection,
    mode: &SearchMode,
) -> CoreResult<Vec<FuncNode>> {
    let (sql, values): (&str, Vec<Value>) = match mode {
        SearchMode::FileAndLine { file, line } => (
            "SELECT id, full_name, canonical_name, package, func_name, file_path, line_start, line_end, is_exported
               FROM func_nodes WHERE file_path = ? AND line_start <= ? AND line_end >= ?",
            vec![
                Value::String(Some(Box::new(file.clone()))),
                Value::BigInt(Some(*line as i64)),
                Value::BigInt(Some(*line as i64)),
            ],
        ),
        SearchMode::File { file } => (
            "SELECT id, full_name, canonical_name, package, func_name, file_path, line_start, line_end, is_exported
               FROM func_nodes WHERE file_path = ? ORDER BY line_start",
            vec![Value::String(Some(Box::new(file.clone())))],
        ),
        SearchMode::ExactName { name } => (
            "SELECT id, full_name, canonical_name, package, func_name, file_path, line_start, line_end, is_exported
               FROM func_nodes WHERE full_name = ? OR canonical_name = ?",
            vec![
                Value::String(Some(Box::new(name.clone()))),
                Value::String(Some(Box::new(name.clone()))),
            ],
        ),
        SearchMode::PackageAndShortName { package, short_name } => (
            "SELECT id, full_name, canonical_name, package, func_name, file_path, line_start, line_end, is_exported
               FROM func_nodes WHERE package = ? AND func_name = ?",
            vec![
                Value::String(Some(Box::new(package.clone()))),
                Value::String(Some(Box::new(short_name.clone()))),
            ],
        ),
        SearchMode::FuzzyShortName { query } => (
            "SELECT id, full_name, canonical_name, package, func_name, file_path, line_start, line_end, is_exported
               FROM func_nodes WHERE func_name LIKE ? ORDER BY func_name LIMIT 100",
            vec![Value::String(Some(Box::new(format!("%{query}%"))))],
        ),
    };

    let stmt = Statement::from_sql_and_values(DbBackend::Sqlite, sql, values);
    let rows = db.query_all(stmt).await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(FuncNode {
            id: row.try_get("", "id")?,
            full_name: row.try_get("", "full_name")?,
            canonical_name: row.try_get("", "canonical_name")?,
            package: row.try_get("", "package")?,
            func_name: row.try_get("", "func_name")?,
            file_path: row.try_get("", "file_path")?,
            line_start: row.try_get::<i64>("", "line_start")? as u32,
            line_end: row.try_get::<i64>("", "line_end")? as u32,
            is_exported: row.try_get::<i64>("", "is_exported")? != 0,
        });
    }
    Ok(out)
}
