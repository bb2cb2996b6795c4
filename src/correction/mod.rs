//! Applying analysis corrections to subtitle files.
//!
//! [`apply_corrections`] is the pure text transformation; [`CorrectionEngine`]
//! wraps it with the on-disk backup-then-replace sequence.

pub mod engine;

pub use engine::{apply_corrections, CorrectionEngine, CorrectionError, FixOutcome};
