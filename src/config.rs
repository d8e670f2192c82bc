//! Crate-wide configuration and tracing setup.
//!
//! Mirrors the teacher's `PackConfig`/`LfsConfig` pattern: a plain
//! `Serialize`/`Deserialize` struct with a `Default` impl, owned by the
//! caller rather than read from the environment. Embedding applications
//! construct a [`CoreConfig`], override what they need, and pass it into
//! [`crate::service::GenerationService::new`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::model::call_graph::Algorithm;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    pub default_algorithm: Algorithm,
    pub default_impact_depth: u32,
    pub max_impact_depth: u32,
    pub retention_max_count: usize,
    pub retention_max_age_days: i64,
    /// Root of the per-platform data directory under which project graphs
    /// are stored (see C6's on-disk layout). Defaults to the OS user-data
    /// directory joined with `callgraph-core`.
    pub data_root: PathBuf,
}

impl Default for CoreConfig {
    fn default() -> Self {
        let data_root = dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("callgraph-core");
        CoreConfig {
            default_algorithm: Algorithm::Rta,
            default_impact_depth: 3,
            max_impact_depth: 32,
            retention_max_count: 20,
            retention_max_age_days: 90,
            data_root,
        }
    }
}

/// Install a `tracing_subscriber::fmt` subscriber honoring `RUST_LOG`.
/// Safe to call more than once; subsequent calls are no-ops (the global
/// subscriber can only be set once per process).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_depths() {
        let cfg = CoreConfig::default();
        assert_eq!(cfg.default_algorithm, Algorithm::Rta);
        assert!(cfg.default_impact_depth <= cfg.max_impact_depth);
    }
}
