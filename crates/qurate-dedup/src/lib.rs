//! Duplicate detection, resolution, and audited mutation for qurate.
//!
//! This crate is the engine behind the CLI: it scans a collection for
//! exact and semantic duplicate clusters, resolves each cluster to a
//! survivor (or a synthesized merge) under a named strategy, and applies
//! the outcome through a mutation executor that records every change in
//! the audit ledger so it can be undone later.
//!
//! Resolution is a pure function over an in-memory cluster; nothing
//! touches storage until a resolution is handed to the executor. That
//! split keeps strategy behavior deterministic and testable without a
//! live backend.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod cluster;
pub mod config;
pub mod execute;
pub mod resolve;
pub mod scan;
pub mod undo;

pub use cluster::{build_exact_clusters, build_semantic_clusters};
pub use config::Config;
pub use execute::{ApplyOutcome, MutationExecutor};
pub use resolve::resolve;
pub use scan::{fetch_all, scan, ScanMethod, ScanOptions, ScanReport};
pub use undo::{undo_last, undo_operation};
