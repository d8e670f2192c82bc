//! C4: SSA Analyzer.
//!
//! Loads a module, resolves its entry points, and runs one of
//! Static/CHA/RTA/VTA to produce a call graph, falling back to a less
//! precise algorithm on failure per §4.4 step 6's fallback chain
//! (VTA → RTA → CHA → Static).

pub mod builder;
pub mod loader;
pub mod types;

use std::collections::HashSet;
use std::path::Path;

use crate::entrypoints::{self, CandidateType};
use crate::errors::{CoreError, CoreResult};
use crate::model::call_graph::Algorithm;
use crate::model::func_edge::FuncEdge;
use crate::model::func_node::FuncNode;
use crate::model::project::ExcludePatterns;
use crate::ssa::loader::ProgressFn;
use crate::ssa::types::ProgramModel;

/// Output of one successful [`analyze`] run.
pub struct SsaOutput {
    pub nodes: Vec<FuncNode>,
    pub edges: Vec<FuncEdge>,
    pub actual_algorithm: Algorithm,
    pub fallback: bool,
    pub fallback_reason: Option<String>,
}

/// Entry points requested by the caller: either a named list (`file`,
/// `function`) or the `*` "all exported functions" sentinel. §4.4's rule
/// that the two forms are mutually exclusive is enforced in [`resolve_entry_points`].
#[derive(Debug, Clone, Default)]
pub struct EntryPointRequest {
    pub named: Vec<(String, String)>,
    pub all_exported: bool,
}

impl EntryPointRequest {
    pub fn from_raw(raw: &[String]) -> CoreResult<Self> {
        let all_exported = raw.iter().any(|r| r == "*");
        let named: Vec<(String, String)> = raw
            .iter()
            .filter(|r| *r != "*")
            .filter_map(|r| r.split_once(':').map(|(f, n)| (f.to_string(), n.to_string())))
            .collect();

        if all_exported && !named.is_empty() {
            return Err(CoreError::InvalidArgument(
                "entry points: '*' cannot be combined with named entry points".to_string(),
            ));
        }
        Ok(Self { named, all_exported })
    }
}

/// Resolve a request into concrete program-model node IDs. When empty and
/// no `*` sentinel was given, this falls back to scanning for `cmd`/`root`
/// candidates via [`entrypoints::scan_entry_points`], taking the
/// recommended one; if none is recommended, every exported function is
/// used (the same behavior as an explicit `*`).
fn resolve_entry_points(
    module_root: &Path,
    program: &ProgramModel,
    request: &EntryPointRequest,
) -> CoreResult<Vec<i64>> {
    if request.all_exported {
        return Ok(all_exported_ids(program));
    }

    if !request.named.is_empty() {
        let mut ids = Vec::new();
        for (file, func_name) in &request.named {
            let found = program.find_by_file_and_name(file, func_name).ok_or_else(|| {
                CoreError::EntryPointNotFound(vec![format!("{file}:{func_name}")])
            })?;
            ids.push(found.id);
        }
        return Ok(ids);
    }

    let candidates = entrypoints::scan_entry_points(module_root)?;
    let recommended = candidates.iter().find(|c| c.recommended);
    match recommended {
        Some(c) if c.candidate_type != CandidateType::AllExported => {
            match program.find_by_file_and_name(&c.file, &c.function) {
                Some(found) => Ok(vec![found.id]),
                None => Ok(all_exported_ids(program)),
            }
        }
        _ => Ok(all_exported_ids(program)),
    }
}

fn all_exported_ids(program: &ProgramModel) -> Vec<i64> {
    program
        .functions
        .iter()
        .filter(|f| f.func.is_exported)
        .map(|f| f.id)
        .collect()
}

fn to_func_nodes(program: &ProgramModel) -> Vec<FuncNode> {
    program
        .functions
        .iter()
        .map(|pf| {
            let full_name = match &pf.func.receiver {
                Some(r) => format!(
                    "{}/{}.(*{r}).{}",
                    program.module_path, pf.func.package, pf.func.func_name
                ),
                None => format!(
                    "{}/{}.{}",
                    program.module_path, pf.func.package, pf.func.func_name
                ),
            };
            let canonical_name = pf.func.canonical_name();
            FuncNode {
                id: pf.id,
                full_name,
                canonical_name,
                package: pf.func.package.clone(),
                func_name: pf.func.func_name.clone(),
                file_path: pf.func.file.clone(),
                line_start: pf.func.line_start,
                line_end: pf.func.line_end,
                is_exported: pf.func.is_exported,
            }
        })
        .collect()
}

fn restrict_to_reachable(
    nodes: Vec<FuncNode>,
    edges: &[FuncEdge],
    entry_ids: &[i64],
) -> Vec<FuncNode> {
    let mut adjacency: std::collections::HashMap<i64, Vec<i64>> = std::collections::HashMap::new();
    for e in edges {
        adjacency.entry(e.caller_id).or_default().push(e.callee_id);
    }
    let mut reachable: HashSet<i64> = entry_ids.iter().copied().collect();
    let mut frontier: Vec<i64> = entry_ids.to_vec();
    while let Some(id) = frontier.pop() {
        if let Some(callees) = adjacency.get(&id) {
            for &callee in callees {
                if reachable.insert(callee) {
                    frontier.push(callee);
                }
            }
        }
    }
    nodes.into_iter().filter(|n| reachable.contains(&n.id)).collect()
}

/// Run the full C4 pipeline: load, resolve entry points, run `algorithm`
/// with fallback on failure. `fail_algorithms` is a test-only injection
/// hook (see `SPEC_FULL.md` §13) forcing specific algorithms to fail so the
/// fallback chain can be exercised deterministically.
pub fn analyze(
    module_root: &Path,
    module_path: &str,
    exclude: &ExcludePatterns,
    requested: Algorithm,
    entry_request: &EntryPointRequest,
    fail_algorithms: &HashSet<Algorithm>,
    progress: &ProgressFn,
) -> CoreResult<SsaOutput> {
    let program = loader::load_module(module_root, module_path, exclude, progress)?;

    progress(10, "Resolving entry points...");
    let entry_ids = resolve_entry_points(module_root, &program, entry_request)?;
    if entry_ids.is_empty() {
        return Err(CoreError::EntryPointNotFound(vec![
            "no entry points resolved (no exported functions found)".to_string(),
        ]));
    }
    progress(15, "Resolving entry points... done");

    let mut current = Some(requested);
    let mut fallback = false;
    let mut fallback_reason = None;

    while let Some(algorithm) = current {
        progress(20, &format!("Running {algorithm}..."));

        if fail_algorithms.contains(&algorithm) {
            let reason = format!("{algorithm} injected failure for testing");
            fallback_reason = Some(reason);
            fallback = true;
            current = algorithm.fallback();
            continue;
        }

        let edges = builder::build_edges(&program, &entry_ids, algorithm);
        let nodes = to_func_nodes(&program);
        let nodes = restrict_to_reachable(nodes, &edges, &entry_ids);

        progress(95, "Finalizing call graph...");

        return Ok(SsaOutput {
            nodes,
            edges,
            actual_algorithm: algorithm,
            fallback,
            fallback_reason,
        });
    }

    Err(CoreError::AlgorithmFailed(crate::errors::AlgorithmFailure {
        algorithm: requested,
        reason: fallback_reason.unwrap_or_else(|| "all algorithms in the fallback chain failed".to_string()),
        suggestion: "retry with a smaller entry-point set, or request Static explicitly".to_string(),
        details: format!("requested: {requested}"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SRC: &str = "package main\n\nfunc helper() {}\n\nfunc main() {\n\thelper()\n}\n";

    #[test]
    fn named_and_sentinel_entry_points_are_exclusive() {
        let raw = vec!["*".to_string(), "main.go:main".to_string()];
        assert!(EntryPointRequest::from_raw(&raw).is_err());
    }

    #[test]
    fn analyzes_trivial_program_end_to_end() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("main.go"), SRC).unwrap();

        let request = EntryPointRequest::from_raw(&["main.go:main".to_string()]).unwrap();
        let out = analyze(
            dir.path(),
            "example.com/foo",
            &ExcludePatterns::default(),
            Algorithm::Rta,
            &request,
            &HashSet::new(),
            &|_, _| {},
        )
        .unwrap();

        assert_eq!(out.actual_algorithm, Algorithm::Rta);
        assert!(!out.fallback);
        assert_eq!(out.edges.len(), 1);
        assert_eq!(out.nodes.len(), 2);
    }

    #[test]
    fn falls_back_when_requested_algorithm_fails() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("main.go"), SRC).unwrap();

        let request = EntryPointRequest::from_raw(&["main.go:main".to_string()]).unwrap();
        let mut failing = HashSet::new();
        failing.insert(Algorithm::Vta);

        let out = analyze(
            dir.path(),
            "example.com/foo",
            &ExcludePatterns::default(),
            Algorithm::Vta,
            &request,
            &failing,
            &|_, _| {},
        )
        .unwrap();

        assert_eq!(out.actual_algorithm, Algorithm::Rta);
        assert!(out.fallback);
        assert!(out.fallback_reason.is_some());
    }
}
