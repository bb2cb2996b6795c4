//! Change detection between runs.
//!
//! [`ChangeDetectionStore`] remembers, per subtitle file, the fingerprint of
//! the content it last finished processing.  Comparing that against the
//! file's current fingerprint decides whether the (expensive) analysis call
//! is needed again.

pub mod fingerprint;
pub mod store;

pub use fingerprint::fingerprint;
pub use store::{
    ChangeDetectionStore, DecisionReason, FileRecord, ProcessingDecision, ProcessingState,
    StateError,
};
