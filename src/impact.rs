//! C7: Impact Analyzer.
//!
//! Given a set of changed functions and a commit's call-graph database,
//! answers "which functions are transitively affected, and how deep" by
//! resolving names to node IDs (cross-form, via [`crate::store::read`]) and
//! running the bounded reverse-reachability query.

use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use crate::errors::CoreResult;
use crate::store::read::{self, ReachabilityRow};

/// One caller of a seed function, at a given depth. Mirrors
/// [`ReachabilityRow`] but scoped to a single seed's result set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerRef {
    pub function: String,
    pub display_name: String,
    pub package: String,
    pub file: String,
    pub line: i32,
    pub depth: i32,
}

impl From<ReachabilityRow> for CallerRef {
    fn from(r: ReachabilityRow) -> Self {
        CallerRef {
            function: r.function,
            display_name: r.display_name,
            package: r.package,
            file: r.file,
            line: r.line,
            depth: r.depth,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionImpact {
    pub function: String,
    pub display_name: String,
    pub file: String,
    pub callers: Vec<CallerRef>,
    pub total_callers: usize,
    pub max_depth_reached: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ImpactSummary {
    pub functions_analyzed: usize,
    pub total_affected: usize,
    pub affected_files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ImpactAnalysisResult {
    pub impacts: Vec<FunctionImpact>,
    pub unresolved: Vec<String>,
    pub summary: ImpactSummary,
}

/// Run §4.7's algorithm: resolve `full_names` to node IDs (cross-form),
/// collect warnings for anything that doesn't resolve, then run a bounded
/// reverse BFS per resolved seed so each [`FunctionImpact`] is attributed to
/// its own function.
///
/// Depth 0 means "only the seed functions themselves": [`FunctionImpact::callers`]
/// is empty for every seed and no reachability query is issued, per §4.7's
/// depth policy.
pub async fn query_impact(
    db: &DatabaseConnection,
    full_names: &[String],
    depth: u32,
) -> CoreResult<ImpactAnalysisResult> {
    if full_names.is_empty() {
        return Ok(ImpactAnalysisResult::default());
    }

    let nodes = read::get_func_nodes_by_full_names(db, full_names).await?;

    let mut unresolved = Vec::new();
    for name in full_names {
        let found = nodes
            .iter()
            .any(|n| &n.full_name == name || &n.canonical_name == name);
        if !found {
            unresolved.push(name.clone());
        }
    }

    if nodes.is_empty() {
        return Ok(ImpactAnalysisResult {
            impacts: Vec::new(),
            unresolved,
            summary: ImpactSummary {
                functions_analyzed: 0,
                total_affected: 0,
                affected_files: Vec::new(),
            },
        });
    }

    // `get_callers_with_depth` returns callers for the union of seeds
    // without attributing them back to a specific seed, so impact is
    // derived per seed by running the same bounded BFS from each
    // individually.
    let mut impacts = Vec::with_capacity(nodes.len());
    let mut affected_files = std::collections::BTreeSet::new();
    let mut affected_union = std::collections::HashSet::new();

    for seed in &nodes {
        let callers = if depth == 0 {
            Vec::new()
        } else {
            read::get_callers_with_depth(db, &[seed.id], depth).await?
        };

        let max_depth_reached = callers.iter().map(|c| c.depth).max().unwrap_or(0);
        for c in &callers {
            affected_files.insert(c.file.clone());
            affected_union.insert((c.function.clone(), c.line));
        }

        impacts.push(FunctionImpact {
            function: seed.full_name.clone(),
            display_name: seed.canonical_name.clone(),
            file: seed.file_path.clone(),
            total_callers: callers.len(),
            max_depth_reached,
            callers: callers.into_iter().map(CallerRef::from).collect(),
        });
    }

    Ok(ImpactAnalysisResult {
        summary: ImpactSummary {
            functions_analyzed: nodes.len(),
            total_affected: affected_union.len(),
            affected_files: affected_files.into_iter().collect(),
        },
        impacts,
        unresolved,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::func_edge::FuncEdge;
    use crate::model::func_node::FuncNode;
    use crate::store;
    use tempfile::tempdir;

    fn node(id: i64, name: &str) -> FuncNode {
        FuncNode {
            id,
            full_name: format!("example.com/pkg.{name}"),
            canonical_name: format!("pkg.{name}"),
            package: "pkg".to_string(),
            func_name: name.to_string(),
            file_path: "main.go".to_string(),
            line_start: 1,
            line_end: 3,
            is_exported: true,
        }
    }

    fn edge(id: i64, caller: i64, callee: i64) -> FuncEdge {
        FuncEdge {
            id,
            caller_id: caller,
            callee_id: callee,
            call_site_file: "main.go".to_string(),
            call_site_line: 10,
        }
    }

    #[tokio::test]
    async fn empty_functions_yields_empty_result() {
        let dir = tempdir().unwrap();
        let db = store::open(&dir.path().join("g.db")).await.unwrap();
        let result = query_impact(&db, &[], 3).await.unwrap();
        assert_eq!(result.summary.total_affected, 0);
        assert!(result.impacts.is_empty());
    }

    #[tokio::test]
    async fn depth_zero_returns_no_callers() {
        let dir = tempdir().unwrap();
        let db = store::open(&dir.path().join("g.db")).await.unwrap();
        let nodes = vec![node(1, "main"), node(2, "helper")];
        let edges = vec![edge(1, 1, 2)];
        store::write::write_call_graph(&db, &nodes, &edges).await.unwrap();

        let result = query_impact(&db, &["pkg.helper".to_string()], 0).await.unwrap();
        assert_eq!(result.impacts.len(), 1);
        assert!(result.impacts[0].callers.is_empty());
    }

    #[tokio::test]
    async fn cross_form_name_resolves_and_finds_callers() {
        let dir = tempdir().unwrap();
        let db = store::open(&dir.path().join("g.db")).await.unwrap();
        let nodes = vec![node(1, "main"), node(2, "helper")];
        let edges = vec![edge(1, 1, 2)];
        store::write::write_call_graph(&db, &nodes, &edges).await.unwrap();

        // Query using the canonical form, matching what C3 would emit.
        let result = query_impact(&db, &["pkg.helper".to_string()], 2).await.unwrap();
        assert!(result.unresolved.is_empty());
        assert_eq!(result.impacts.len(), 1);
        assert_eq!(result.impacts[0].total_callers, 1);
        assert_eq!(result.impacts[0].callers[0].display_name, "pkg.main");
        assert_eq!(result.summary.total_affected, 1);
    }

    #[tokio::test]
    async fn unresolved_names_are_reported_but_do_not_abort() {
        let dir = tempdir().unwrap();
        let db = store::open(&dir.path().join("g.db")).await.unwrap();
        let nodes = vec![node(1, "main"), node(2, "helper")];
        store::write::write_call_graph(&db, &nodes, &[]).await.unwrap();

        let result = query_impact(
            &db,
            &["pkg.helper".to_string(), "pkg.nonexistent".to_string()],
            2,
        )
        .await
        .unwrap();
        assert_eq!(result.unresolved, vec!["pkg.nonexistent".to_string()]);
        assert_eq!(result.impacts.len(), 1);
    }

    #[tokio::test]
    async fn combined_seed_query_returns_callers_across_the_union() {
        let dir = tempdir().unwrap();
        let db = store::open(&dir.path().join("g.db")).await.unwrap();
        // main -> a, main -> b: a shared caller across two seeds.
        let nodes = vec![node(1, "main"), node(2, "a"), node(3, "b")];
        let edges = vec![edge(1, 1, 2), edge(2, 1, 3)];
        store::write::write_call_graph(&db, &nodes, &edges).await.unwrap();

        let callers = read::get_callers_with_depth(&db, &[2, 3], 2).await.unwrap();
        let names: std::collections::HashSet<&str> =
            callers.iter().map(|c| c.display_name.as_str()).collect();
        assert_eq!(names.len(), 1);
        assert!(names.contains("pkg.main"));
    }

    #[tokio::test]
    async fn depth_cap_limits_chain_traversal() {
        let dir = tempdir().unwrap();
        let db = store::open(&dir.path().join("g.db")).await.unwrap();
        // a -> b -> c -> d -> e
        let nodes = vec![
            node(1, "a"),
            node(2, "b"),
            node(3, "c"),
            node(4, "d"),
            node(5, "e"),
        ];
        let edges = vec![edge(1, 1, 2), edge(2, 2, 3), edge(3, 3, 4), edge(4, 4, 5)];
        store::write::write_call_graph(&db, &nodes, &edges).await.unwrap();

        let result = query_impact(&db, &["pkg.e".to_string()], 2).await.unwrap();
        let impact = &result.impacts[0];
        assert_eq!(impact.total_callers, 2);
        let names: std::collections::HashSet<&str> =
            impact.callers.iter().map(|c| c.display_name.as_str()).collect();
        assert!(names.contains("pkg.d"));
        assert!(names.contains("pkg.c"));
        assert!(!names.contains("pkg.b"));
    }
}
