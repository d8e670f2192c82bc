//! Module loading: discover `.go` files under the module root, parse each
//! syntactically (§4.4 step 1-2), and merge into one [`ProgramModel`].
//!
//! There is no real type-checker here (see `DESIGN.md` for why this
//! reimplementation forgoes shelling out to a Go toolchain); "type-check"
//! in §4.4 step 2 is represented by the requirement that every loaded file
//! parses to a `package` declaration. A file that doesn't even parse that
//! far is treated as `TypeCheckFailed` only if it prevents *any* package
//! from loading — otherwise (the common case) it is skipped with a
//! warning, mirroring C3's "syntactic failure on a file is non-fatal".

use std::collections::HashMap;
use std::path::Path;

use rayon::prelude::*;

use crate::diff::goparse;
use crate::errors::{CoreError, CoreResult};
use crate::model::project::ExcludePatterns;
use crate::ssa::types::{ProgramFunction, ProgramInterface, ProgramModel};

pub type ProgressFn = dyn Fn(u8, &str) + Send + Sync;

/// Discover and parse every `.go` file reachable from `module_root`,
/// skipping `exclude` matches, and assign each function a stable,
/// monotonically increasing node ID in file-then-declaration order.
pub fn load_module(
    module_root: &Path,
    module_path: &str,
    exclude: &ExcludePatterns,
    progress: &ProgressFn,
) -> CoreResult<ProgramModel> {
    progress(0, "Loading packages...");

    let files: Vec<std::path::PathBuf> = ignore::WalkBuilder::new(module_root)
        .hidden(false)
        .git_ignore(true)
        .build()
        .flatten()
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("go"))
        .filter(|p| {
            let rel = p
                .strip_prefix(module_root)
                .unwrap_or(p)
                .to_string_lossy()
                .replace('\\', "/");
            !exclude.matches(&rel)
        })
        .collect();

    if files.is_empty() {
        return Err(CoreError::LoadFailed(format!(
            "no Go source files found under {}",
            module_root.display()
        )));
    }

    let parsed: Vec<(String, goparse::GoSource)> = files
        .par_iter()
        .filter_map(|path| {
            let rel = path
                .strip_prefix(module_root)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");
            let contents = std::fs::read_to_string(path).ok()?;
            goparse::parse_source(&contents, &rel).map(|src| (rel, src))
        })
        .collect();

    if parsed.is_empty() {
        return Err(CoreError::TypeCheckFailed(
            "no source file in the module parsed successfully".to_string(),
        ));
    }

    progress(10, "Loading packages... done");

    let mut functions = Vec::new();
    let mut interfaces = Vec::new();
    let mut method_sets: HashMap<String, Vec<String>> = HashMap::new();
    let mut instantiated_types = Vec::new();
    let mut next_id: i64 = 1;

    for (_rel, src) in &parsed {
        for f in &src.functions {
            functions.push(ProgramFunction {
                id: next_id,
                func: f.clone(),
            });
            next_id += 1;
            if let Some(recv) = &f.receiver {
                method_sets
                    .entry(recv.clone())
                    .or_default()
                    .push(f.func_name.clone());
            }
        }
        for i in &src.interfaces {
            interfaces.push(ProgramInterface {
                name: i.name.clone(),
                methods: i.methods.clone(),
            });
        }
        instantiated_types.extend(src.instantiated_types.iter().cloned());
    }

    instantiated_types.sort();
    instantiated_types.dedup();

    Ok(ProgramModel {
        module_path: module_path.to_string(),
        functions,
        interfaces,
        method_sets,
        instantiated_types,
    })
}
