//! # PlexNotify Scheduler
//!
//! The reconciliation engine and the loop that drives it.
//!
//! ## Architecture
//! ```text
//! tokio interval (run loop)
//!   └── Reconciler::run
//!         ├── take run lease in the StateStore (skip if held)
//!         ├── RequestSource::fetch        → snapshot (abort run on error)
//!         ├── per record, sequentially:
//!         │     get(key) → unchanged?  → nothing
//!         │              → new/changed → put(key, status)
//!         │                              → terminal? → Notifier
//!         └── RunReport (one result per record, failures isolated)
//! ```

pub mod engine;
pub mod reconcile;
pub mod report;

pub use engine::run_loop;
pub use reconcile::{RUN_LEASE, Reconciler};
pub use report::{FailureStage, RecordFailure, RecordOutcome, RecordReport, RunOutcome, RunReport};
