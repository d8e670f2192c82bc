//! Error taxonomy for the call-graph core.
//!
//! A single [`CoreError`] enum is used across all components (C1-C8). Each
//! variant carries enough context to build an `error_code`/`suggestion`/
//! `details` triple for a [`crate::model::task::GenerationTask`] without the
//! caller having to re-parse a message string. Variants mirror the taxonomy
//! in the design document: `InvalidArgument`, `ModuleInvalid`,
//! `ProjectNotRegistered`, `VCSFailure`, `LoadFailed`, `TypeCheckFailed`,
//! `EntryPointNotFound`, `AlgorithmFailed`, `StorageFailed`, `Cancelled`,
//! `Internal`.

use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

/// Reason a module manifest failed validation (C1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleInvalidReason {
    NoManifest,
    UnreadableManifest,
    MalformedManifest,
}

impl std::fmt::Display for ModuleInvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ModuleInvalidReason::NoManifest => "no module manifest found",
            ModuleInvalidReason::UnreadableManifest => "module manifest could not be read",
            ModuleInvalidReason::MalformedManifest => "module manifest is malformed",
        };
        f.write_str(s)
    }
}

/// Structured detail carried by `AlgorithmFailed`, matching §4.4's fallback
/// contract: the algorithm that was attempted last, the underlying reason,
/// a human suggestion, and free-form details for logging.
#[derive(Debug, Clone)]
pub struct AlgorithmFailure {
    pub algorithm: crate::model::call_graph::Algorithm,
    pub reason: String,
    pub suggestion: String,
    pub details: String,
}

#[derive(Error, Debug)]
pub enum CoreError {
    /// Missing entry points, malformed commit range, or mutually exclusive
    /// entry-point specs (`*` combined with named specs).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// C1 validation failed.
    #[error("module invalid: {reason} at {path}")]
    ModuleInvalid {
        path: String,
        reason: ModuleInvalidReason,
    },

    /// No project descriptor exists for the given path or remote URL.
    #[error("project not registered: {0}")]
    ProjectNotRegistered(String),

    /// Worktree creation, commit resolution, or diff enumeration failed.
    #[error("vcs failure: {0}")]
    VcsFailure(String),

    /// C4 could not load/type-check the module.
    #[error("load failed: {0}")]
    LoadFailed(String),

    #[error("type check failed: {0}")]
    TypeCheckFailed(String),

    /// None of the given entry-point specs resolved to a function.
    #[error("entry point(s) not found: {0:?}")]
    EntryPointNotFound(Vec<String>),

    /// Every algorithm in the fallback chain failed.
    #[error("algorithm failed: {0} ({reason})", reason = .0.reason)]
    AlgorithmFailed(AlgorithmFailure),

    /// C5/C6 I/O or schema violation.
    #[error("storage failed: {0}")]
    StorageFailed(String),

    /// Cooperative cancellation observed mid-operation.
    #[error("cancelled")]
    Cancelled,

    /// Recovered panic; stack trace goes to logs only, not here.
    #[error("internal error: {0}")]
    Internal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Db(#[from] sea_orm::DbErr),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Stable machine-readable code for `GenerationTask.error_code`.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::InvalidArgument(_) => "INVALID_ARGUMENT",
            CoreError::ModuleInvalid { .. } => "MODULE_INVALID",
            CoreError::ProjectNotRegistered(_) => "PROJECT_NOT_REGISTERED",
            CoreError::VcsFailure(_) => "VCS_FAILURE",
            CoreError::LoadFailed(_) => "LOAD_FAILED",
            CoreError::TypeCheckFailed(_) => "TYPE_CHECK_FAILED",
            CoreError::EntryPointNotFound(_) => "ENTRY_POINT_NOT_FOUND",
            CoreError::AlgorithmFailed(_) => "ALGORITHM_FAILED",
            CoreError::StorageFailed(_) => "STORAGE_FAILED",
            CoreError::Cancelled => "CANCELLED",
            CoreError::Internal(_) => "INTERNAL",
            CoreError::Io(_) => "STORAGE_FAILED",
            CoreError::Db(_) => "STORAGE_FAILED",
            CoreError::Json(_) => "STORAGE_FAILED",
        }
    }

    /// `suggestion` field populated only for `AlgorithmFailed`, per §7.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            CoreError::AlgorithmFailed(f) => Some(f.suggestion.as_str()),
            _ => None,
        }
    }

    /// `details` field populated only for `AlgorithmFailed`, per §7.
    pub fn details(&self) -> Option<&str> {
        match self {
            CoreError::AlgorithmFailed(f) => Some(f.details.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::call_graph::Algorithm;

    #[test]
    fn algorithm_failed_carries_suggestion_and_details() {
        let err = CoreError::AlgorithmFailed(AlgorithmFailure {
            algorithm: Algorithm::Static,
            reason: "no entry points resolved".to_string(),
            suggestion: "try RTA with a smaller entry-point set".to_string(),
            details: "attempted: vta, rta, cha, static".to_string(),
        });
        assert_eq!(err.error_code(), "ALGORITHM_FAILED");
        assert_eq!(
            err.suggestion(),
            Some("try RTA with a smaller entry-point set")
        );
        assert!(err.details().unwrap().contains("static"));
    }

    #[test]
    fn other_variants_have_no_suggestion() {
        let err = CoreError::Cancelled;
        assert_eq!(err.error_code(), "CANCELLED");
        assert!(err.suggestion().is_none());
    }
}
