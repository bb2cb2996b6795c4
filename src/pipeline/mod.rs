//! Batch pipeline for subtitle proofreading.
//!
//! This module wires the directory scan → change detection → analysis →
//! correction → state persistence flow and produces the run report.
//!
//! # Architecture
//!
//! ```text
//! PipelineOrchestrator::run(dir)
//!        │
//!        ├─ ChangeDetectionStore::decide   (per file, sequential)
//!        │
//!        ├─ JoinSet ── one task per dispatched file
//!        │     └─ ConcurrencyLimiter::acquire → extract → analyze → apply
//!        │
//!        ├─ barrier: join every task
//!        │
//!        └─ ChangeDetectionStore::persist  (once)
//!
//! RunReport ←─── printed by the CLI
//! ```

pub mod limiter;
pub mod report;
pub mod runner;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use limiter::{ConcurrencyLimiter, LimiterError, Permit};
pub use report::{FileOutcome, FileReport, RunReport, RunSummary};
pub use runner::{PipelineError, PipelineOrchestrator, RunOptions};
