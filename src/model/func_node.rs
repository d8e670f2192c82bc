//! A function as a call-graph node.
//!
//! Every node carries two names: `full_name` (SSA-form, unique per DB — the
//! *structural* identity C4 produces) and `canonical_name` (the short form
//! C3's syntactic parser produces). Both are indexed; lookups must accept
//! either, which is the mechanism that lets a diff-derived name resolve
//! against an SSA-derived one (see §9 "Cross-form naming").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncNode {
    /// Assigned by C4 before insertion so edges can reference IDs ahead of
    /// the node rows existing in the store.
    pub id: i64,
    pub full_name: String,
    pub canonical_name: String,
    pub package: String,
    pub func_name: String,
    pub file_path: String,
    pub line_start: u32,
    pub line_end: u32,
    pub is_exported: bool,
}

impl FuncNode {
    /// Recompute the canonical form (`pkg.Receiver.Func` with pointer
    /// markers stripped) the same way C3 does, so C4's emitted node
    /// populates both indexed columns consistently. `full_name` is assumed
    /// SSA-form: `<module/path/pkg>.(*Receiver).Method` or
    /// `<module/path/pkg>.Func`.
    pub fn canonical_from_full_name(full_name: &str, package_short: &str) -> String {
        // Strip the module-path prefix, keep only the short package name.
        let after_pkg = match full_name.rfind(package_short) {
            Some(idx) => &full_name[idx..],
            None => full_name,
        };
        after_pkg.replace("(*", "").replace(')', "").to_string()
    }
}
