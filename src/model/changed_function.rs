//! Output of C3 (Diff Analyzer): one entry per function touched by a commit
//! range.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFunction {
    /// Short name, e.g. `Helper`.
    pub name: String,
    /// Canonical form, e.g. `pkg.T.Helper`, matching [`super::func_node::FuncNode::canonical_name`].
    pub full_name: String,
    pub package: String,
    pub file: String,
    pub line_start: u32,
    pub line_end: u32,
    pub change_type: ChangeType,
    pub lines_added: u32,
    pub lines_removed: u32,
}
