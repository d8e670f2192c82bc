//! Per-commit inter-procedural call-graph construction and downstream
//! impact analysis for Go modules.
//!
//! The crate implements the eight components of the design (C1-C8):
//! entry-point scanning ([`entrypoints`]), worktree materialization
//! ([`worktree`]), git-diff-driven change resolution ([`diff`]), SSA-based
//! call-graph construction with algorithm fallback ([`ssa`]), an embedded
//! per-commit call-graph store ([`store`]), on-disk layout and retention
//! ([`manager`]), reverse-reachability impact queries ([`impact`]), and
//! async generation orchestration ([`service`]).
//!
//! HTTP/JSON transport, CLI parsing, authentication, and frontend
//! rendering are explicitly out of scope; [`service::GenerationService`]
//! is the seam a thin transport layer is built on top of.

pub mod config;
pub mod diff;
pub mod entrypoints;
pub mod errors;
pub mod impact;
pub mod manager;
pub mod model;
pub mod project_store;
pub mod service;
pub mod ssa;
pub mod store;
pub mod worktree;

pub use config::CoreConfig;
pub use errors::{CoreError, CoreResult};
pub use service::GenerationService;
