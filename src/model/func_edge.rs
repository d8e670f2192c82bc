//! A "may call" relation between two [`super::func_node::FuncNode`]s.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncEdge {
    pub id: i64,
    pub caller_id: i64,
    pub callee_id: i64,
    pub call_site_file: String,
    pub call_site_line: u32,
}
