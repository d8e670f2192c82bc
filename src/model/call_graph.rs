//! Per-commit call-graph metadata and the [`Algorithm`] selector.
//!
//! # Fallback chain
//!
//! ```text
//! VTA ──▶ RTA ──▶ CHA ──▶ Static
//! ```
//!
//! [`Algorithm::fallback`] returns the next, strictly less precise algorithm
//! in this chain; `Static` has no fallback. C4 starts retrying one step
//! below the *configured* algorithm on failure, never re-attempting the
//! configured one.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Static,
    Cha,
    Rta,
    Vta,
}

impl Algorithm {
    /// Next less-precise algorithm in the fallback chain, or `None` for
    /// `Static`.
    pub fn fallback(self) -> Option<Algorithm> {
        match self {
            Algorithm::Vta => Some(Algorithm::Rta),
            Algorithm::Rta => Some(Algorithm::Cha),
            Algorithm::Cha => Some(Algorithm::Static),
            Algorithm::Static => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Static => "static",
            Algorithm::Cha => "cha",
            Algorithm::Rta => "rta",
            Algorithm::Vta => "vta",
        }
    }
}

impl Default for Algorithm {
    fn default() -> Self {
        Algorithm::Rta
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "static" => Ok(Algorithm::Static),
            "cha" => Ok(Algorithm::Cha),
            "rta" => Ok(Algorithm::Rta),
            "vta" => Ok(Algorithm::Vta),
            other => Err(format!("unknown algorithm: {other}")),
        }
    }
}

/// Metadata recorded for one (project, commit) call graph. Written by C8,
/// read by C6/C7.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallGraphMetadata {
    pub commit: String,
    pub branch: String,
    pub algorithm: Algorithm,
    pub actual_algorithm: Algorithm,
    pub fallback: bool,
    pub fallback_reason: Option<String>,
    pub func_count: usize,
    pub edge_count: usize,
    pub db_path: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub generation_time_ms: u64,
}
