//! Persisted processing state and the reprocessing decision.
//!
//! The store is a single pretty-printed JSON file mapping file name →
//! [`FileRecord`].  It is loaded once at the start of a run, mutated as
//! files finish, and persisted once after every file has completed.
//!
//! Loading is fail-soft: a missing, unreadable or corrupt store yields an
//! empty state, which only means every file is treated as new.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::fingerprint::fingerprint;

// ---------------------------------------------------------------------------
// StateError
// ---------------------------------------------------------------------------

/// Errors raised while persisting the store.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("state file I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialise processing state: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// What is remembered about one file after it was processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Fingerprint of the file content as left on disk by the run.
    pub content_hash: String,
    pub last_processed_at: DateTime<Utc>,
    /// Corrections were found that are not reflected in the file.
    pub has_unresolved_errors: bool,
}

/// The whole persisted mapping.  `BTreeMap` keeps the file diff-friendly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingState {
    #[serde(default)]
    pub files: BTreeMap<String, FileRecord>,
}

// ---------------------------------------------------------------------------
// ProcessingDecision
// ---------------------------------------------------------------------------

/// Why a file is (or is not) dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    New,
    Modified,
    Forced,
    Unchanged,
    /// Unchanged, but the last run left found corrections unapplied.
    Unresolved,
    /// The file could not be fingerprinted; it is processed anyway.
    StateError,
}

impl DecisionReason {
    pub fn label(&self) -> &'static str {
        match self {
            DecisionReason::New => "new",
            DecisionReason::Modified => "modified",
            DecisionReason::Forced => "forced",
            DecisionReason::Unchanged => "unchanged",
            DecisionReason::Unresolved => "unresolved corrections",
            DecisionReason::StateError => "state error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingDecision {
    pub should_process: bool,
    pub reason: DecisionReason,
    /// Current fingerprint, when it could be computed.
    pub fingerprint: Option<String>,
}

impl ProcessingDecision {
    fn process(reason: DecisionReason, fingerprint: Option<String>) -> Self {
        Self {
            should_process: true,
            reason,
            fingerprint,
        }
    }

    /// Decision for a file whose content could not be read.
    pub fn state_error() -> Self {
        Self::process(DecisionReason::StateError, None)
    }
}

// ---------------------------------------------------------------------------
// ChangeDetectionStore
// ---------------------------------------------------------------------------

/// Fingerprint cache backed by a JSON file.
///
/// ```rust
/// use vtt_proofread::state::{ChangeDetectionStore, DecisionReason};
///
/// let mut store = ChangeDetectionStore::empty("/tmp/unused-state.json");
/// assert_eq!(store.decide("a.vtt", b"hello", false).reason, DecisionReason::New);
///
/// store.record("a.vtt", b"hello", false);
/// assert_eq!(store.decide("a.vtt", b"hello", false).reason, DecisionReason::Unchanged);
/// assert_eq!(store.decide("a.vtt", b"hello!", false).reason, DecisionReason::Modified);
/// assert_eq!(store.decide("a.vtt", b"hello", true).reason, DecisionReason::Forced);
/// ```
#[derive(Debug)]
pub struct ChangeDetectionStore {
    path: PathBuf,
    state: ProcessingState,
}

impl ChangeDetectionStore {
    /// A store with no history that will persist to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: ProcessingState::default(),
        }
    }

    /// Load the store at `path`.  Never fails: missing or unparseable state
    /// yields an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no processing state at {}; starting fresh", path.display());
                return Self::empty(path);
            }
            Err(e) => {
                log::warn!(
                    "cannot read processing state {} ({e}); starting fresh",
                    path.display()
                );
                return Self::empty(path);
            }
        };

        match serde_json::from_str::<ProcessingState>(&data) {
            Ok(state) => {
                log::debug!(
                    "loaded processing state for {} file(s) from {}",
                    state.files.len(),
                    path.display()
                );
                Self { path, state }
            }
            Err(e) => {
                log::warn!(
                    "processing state {} is corrupt ({e}); treating all files as new",
                    path.display()
                );
                Self::empty(path)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &ProcessingState {
        &self.state
    }

    pub fn get(&self, filename: &str) -> Option<&FileRecord> {
        self.state.files.get(filename)
    }

    pub fn len(&self) -> usize {
        self.state.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.files.is_empty()
    }

    /// Decide whether `filename` with `content` needs processing.
    ///
    /// Forced beats everything; otherwise a missing entry is new and a
    /// different fingerprint is modified.
    pub fn decide(&self, filename: &str, content: &[u8], force: bool) -> ProcessingDecision {
        let current = fingerprint(content);

        if force {
            return ProcessingDecision::process(DecisionReason::Forced, Some(current));
        }

        match self.state.files.get(filename) {
            None => ProcessingDecision::process(DecisionReason::New, Some(current)),
            Some(record) if record.content_hash != current => {
                ProcessingDecision::process(DecisionReason::Modified, Some(current))
            }
            Some(_) => ProcessingDecision {
                should_process: false,
                reason: DecisionReason::Unchanged,
                fingerprint: Some(current),
            },
        }
    }

    /// Turn an `Unchanged` decision back into a dispatch when the stored
    /// record still has unresolved corrections.
    ///
    /// Used by fixing runs so that corrections reported earlier without being
    /// applied are not hidden by the fingerprint match.
    pub fn retry_unresolved(
        &self,
        filename: &str,
        decision: ProcessingDecision,
    ) -> ProcessingDecision {
        let unresolved = self
            .state
            .files
            .get(filename)
            .is_some_and(|record| record.has_unresolved_errors);

        if decision.reason == DecisionReason::Unchanged && unresolved {
            ProcessingDecision::process(DecisionReason::Unresolved, decision.fingerprint)
        } else {
            decision
        }
    }

    /// Remember `final_content` as the processed state of `filename`.
    ///
    /// `final_content` must be what is on disk after any corrections.
    pub fn record(&mut self, filename: &str, final_content: &[u8], has_unresolved_errors: bool) {
        self.state.files.insert(
            filename.to_string(),
            FileRecord {
                content_hash: fingerprint(final_content),
                last_processed_at: Utc::now(),
                has_unresolved_errors,
            },
        );
    }

    /// Forget every entry.
    pub fn clear(&mut self) {
        self.state.files.clear();
    }

    /// Drop entries for files not in `present`.  Returns how many were
    /// removed.
    pub fn retain_files(&mut self, present: &HashSet<String>) -> usize {
        let before = self.state.files.len();
        self.state.files.retain(|name, _| present.contains(name));
        before - self.state.files.len()
    }

    /// Write the whole mapping to disk.
    ///
    /// The JSON is written to a temporary sibling first and renamed over the
    /// store, so readers never observe a half-written file.
    pub fn persist(&self) -> Result<(), StateError> {
        let io_err = |source| StateError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let data = serde_json::to_string_pretty(&self.state)?;

        let mut tmp_name = self.path.clone().into_os_string();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        std::fs::write(&tmp_path, data).map_err(io_err)?;
        std::fs::rename(&tmp_path, &self.path).map_err(io_err)?;

        log::debug!(
            "persisted processing state for {} file(s) to {}",
            self.state.files.len(),
            self.path.display()
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
