//! Correction engine.
//!
//! Corrections are applied in the order the backend returned them, each one
//! replacing only the **first** occurrence of its `original` span in the
//! working copy (which already reflects earlier corrections of the same
//! batch).  A span that does not occur verbatim is skipped.  Spans that
//! repeat are therefore corrected once per returned correction, never
//! globally.
//!
//! In a WebVTT document only cue text is searched (see
//! [`vtt::text_ranges`]): the backend never saw timing lines, cue settings,
//! markup or `NOTE` blocks, so a short span like `i` must not land in
//! `align:start`.  A span has to fit inside one cue line between tags.
//!
//! On disk the sequence is:
//!
//! ```text
//! copy  file.vtt      → file.vtt<suffix>     (byte-exact backup)
//! write file.vtt.tmp  ← corrected content
//! rename file.vtt.tmp → file.vtt             (atomic replace)
//! ```
//!
//! A fault at any step leaves the original file intact.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::llm::Correction;
use crate::vtt;

// ---------------------------------------------------------------------------
// CorrectionError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CorrectionError {
    #[error("failed to back up {path}: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write corrected {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// FixOutcome
// ---------------------------------------------------------------------------

/// What applying a batch of corrections actually did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixOutcome {
    pub applied_count: usize,
    /// The corrections that matched, in application order.
    pub applied_changes: Vec<Correction>,
    /// Set only when at least one correction was applied.
    pub backup_path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Pure application
// ---------------------------------------------------------------------------

/// Apply `corrections` to `content`, returning the new text and the
/// corrections that matched.
///
/// ```
/// use vtt_proofread::correction::apply_corrections;
/// use vtt_proofread::llm::{Correction, CorrectionKind};
///
/// let fix = Correction::new("teh", "the", CorrectionKind::Spelling, "");
/// let (text, applied) = apply_corrections("The cat sat on teh mat, teh end.", &[fix]);
/// assert_eq!(text, "The cat sat on the mat, teh end.");
/// assert_eq!(applied.len(), 1);
/// ```
pub fn apply_corrections(content: &str, corrections: &[Correction]) -> (String, Vec<Correction>) {
    let mut working = content.to_string();
    let mut applied = Vec::new();

    for correction in corrections {
        if correction.original.is_empty() {
            continue;
        }
        let found = vtt::text_ranges(&working).into_iter().find_map(|range| {
            working[range.clone()]
                .find(&correction.original)
                .map(|offset| range.start + offset)
        });
        match found {
            Some(start) => {
                let end = start + correction.original.len();
                working.replace_range(start..end, &correction.corrected);
                applied.push(correction.clone());
            }
            None => {
                log::debug!("correction span not found, skipping: {:?}", correction.original);
            }
        }
    }

    (working, applied)
}

// ---------------------------------------------------------------------------
// CorrectionEngine
// ---------------------------------------------------------------------------

/// Applies corrections to files on disk, leaving a backup beside each
/// modified file.
#[derive(Debug, Clone)]
pub struct CorrectionEngine {
    backup_suffix: String,
}

impl CorrectionEngine {
    pub fn new(backup_suffix: impl Into<String>) -> Self {
        Self {
            backup_suffix: backup_suffix.into(),
        }
    }

    /// `file.vtt` → `file.vtt<suffix>`.
    pub fn backup_path_for(&self, path: &Path) -> PathBuf {
        with_suffix(path, &self.backup_suffix)
    }

    /// Apply `corrections` to the file at `path`, whose current content is
    /// `original`.
    ///
    /// Returns the content now on disk together with the outcome.  When no
    /// correction matches, nothing on disk is touched and `original` is
    /// returned unchanged.
    pub async fn apply(
        &self,
        path: &Path,
        original: &str,
        corrections: &[Correction],
    ) -> Result<(String, FixOutcome), CorrectionError> {
        let (updated, applied) = apply_corrections(original, corrections);

        if applied.is_empty() {
            return Ok((original.to_string(), FixOutcome::default()));
        }

        let backup_path = self.backup_path_for(path);
        tokio::fs::copy(path, &backup_path)
            .await
            .map_err(|source| CorrectionError::Backup {
                path: backup_path.clone(),
                source,
            })?;

        let write_err = |source| CorrectionError::Write {
            path: path.to_path_buf(),
            source,
        };
        let tmp_path = with_suffix(path, ".tmp");
        tokio::fs::write(&tmp_path, updated.as_bytes())
            .await
            .map_err(write_err)?;
        if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(write_err(e));
        }

        log::info!(
            "{}: applied {} of {} correction(s), backup at {}",
            path.display(),
            applied.len(),
            corrections.len(),
            backup_path.display()
        );

        Ok((
            updated,
            FixOutcome {
                applied_count: applied.len(),
                applied_changes: applied,
                backup_path: Some(backup_path),
            },
        ))
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::CorrectionKind;
    use tempfile::tempdir;

    fn fix(original: &str, corrected: &str) -> Correction {
        Correction::new(original, corrected, CorrectionKind::Spelling, "")
    }

    #[test]
    fn replaces_only_first_occurrence() {
        let (text, applied) =
            apply_corrections("The cat sat on teh mat, teh end.", &[fix("teh", "the")]);
        assert_eq!(text, "The cat sat on the mat, teh end.");
        assert_eq!(applied.len(), 1);
    }

    #[test]
    fn repeated_correction_targets_next_occurrence() {
        let (text, applied) = apply_corrections(
            "The cat sat on teh mat, teh end.",
            &[fix("teh", "the"), fix("teh", "the")],
        );
        assert_eq!(text, "The cat sat on the mat, the end.");
        assert_eq!(applied.len(), 2);
    }

    #[test]
    fn missing_span_is_a_no_op() {
        let content = "Nothing wrong here.";
        let (text, applied) = apply_corrections(content, &[fix("recieve", "receive")]);
        assert_eq!(text, content);
        assert!(applied.is_empty());
    }

    #[test]
    fn later_corrections_see_earlier_edits() {
        // The second correction only matches after the first was applied.
        let (text, applied) = apply_corrections(
            "he go home",
            &[fix("he go", "he goes"), fix("goes home", "goes home.")],
        );
        assert_eq!(text, "he goes home.");
        assert_eq!(applied.len(), 2);
    }

    #[test]
    fn correction_satisfied_by_earlier_edit_is_skipped() {
        let (text, applied) =
            apply_corrections("teh cat", &[fix("teh cat", "the cat"), fix("teh", "the")]);
        assert_eq!(text, "the cat");
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].original, "teh cat");
    }

    #[test]
    fn handles_multibyte_text() {
        let (text, applied) = apply_corrections("Ça va trés bien", &[fix("trés", "très")]);
        assert_eq!(text, "Ça va très bien");
        assert_eq!(applied.len(), 1);
    }

    #[test]
    fn empty_span_is_ignored() {
        let (text, applied) = apply_corrections("abc", &[fix("", "x")]);
        assert_eq!(text, "abc");
        assert!(applied.is_empty());
    }

    #[test]
    fn timing_lines_and_markup_are_never_edited() {
        let content = "WEBVTT\n\n00:00:01.000 --> 00:00:02.000 align:start\n<i>and i said</i>\n";
        let (text, applied) = apply_corrections(content, &[fix("i", "I")]);
        assert_eq!(
            text,
            "WEBVTT\n\n00:00:01.000 --> 00:00:02.000 align:start\n<i>and I said</i>\n"
        );
        assert_eq!(applied.len(), 1);
    }

    #[test]
    fn note_blocks_are_never_edited() {
        let content = "WEBVTT\n\nNOTE teh draft\n\n00:00:01.000 --> 00:00:02.000\nteh end\n";
        let (text, _) = apply_corrections(content, &[fix("teh", "the")]);
        assert_eq!(
            text,
            "WEBVTT\n\nNOTE teh draft\n\n00:00:01.000 --> 00:00:02.000\nthe end\n"
        );
    }

    #[test]
    fn span_outside_cue_text_is_skipped() {
        let content = "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nHello\n";
        let (text, applied) = apply_corrections(content, &[fix("00:00", "11:11")]);
        assert_eq!(text, content);
        assert!(applied.is_empty());
    }

    #[test]
    fn backup_path_appends_suffix() {
        let engine = CorrectionEngine::new(".bak");
        assert_eq!(
            engine.backup_path_for(Path::new("/subs/ep1.vtt")),
            PathBuf::from("/subs/ep1.vtt.bak")
        );
    }

    #[tokio::test]
    async fn writes_backup_then_corrected_file() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("ep1.vtt");
        let original = "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nThe cat sat on teh mat, teh end.\n";
        std::fs::write(&path, original).expect("write");

        let engine = CorrectionEngine::new(".bak");
        let (updated, outcome) = engine
            .apply(&path, original, &[fix("teh", "the"), fix("dgo", "dog")])
            .await
            .expect("apply");

        assert_eq!(outcome.applied_count, 1);
        assert_eq!(outcome.applied_changes, vec![fix("teh", "the")]);

        let backup = outcome.backup_path.expect("backup path");
        assert_eq!(backup, dir.path().join("ep1.vtt.bak"));
        assert_eq!(std::fs::read(&backup).expect("read backup"), original.as_bytes());

        let on_disk = std::fs::read_to_string(&path).expect("read file");
        assert_eq!(on_disk, updated);
        assert!(on_disk.contains("The cat sat on the mat, teh end."));
        assert!(!dir.path().join("ep1.vtt.tmp").exists());
    }

    #[tokio::test]
    async fn no_match_leaves_disk_untouched() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("ep1.vtt");
        let original = "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nAll good.\n";
        std::fs::write(&path, original).expect("write");

        let engine = CorrectionEngine::new(".bak");
        let (content, outcome) = engine
            .apply(&path, original, &[fix("recieve", "receive")])
            .await
            .expect("apply");

        assert_eq!(content, original);
        assert_eq!(outcome, FixOutcome::default());
        assert!(!dir.path().join("ep1.vtt.bak").exists());
        assert_eq!(std::fs::read_to_string(&path).expect("read"), original);
    }

    #[tokio::test]
    async fn backup_failure_leaves_original_intact() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("ep1.vtt");
        let original = "teh text";
        std::fs::write(&path, original).expect("write");

        // A directory squatting on the backup path makes the copy fail.
        std::fs::create_dir(dir.path().join("ep1.vtt.bak")).expect("mkdir");

        let engine = CorrectionEngine::new(".bak");
        let err = engine
            .apply(&path, original, &[fix("teh", "the")])
            .await
            .expect_err("backup must fail");

        assert!(matches!(err, CorrectionError::Backup { .. }));
        assert_eq!(std::fs::read_to_string(&path).expect("read"), original);
    }

    #[tokio::test]
    async fn overwrites_previous_backup() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("ep1.vtt");
        std::fs::write(&path, "teh one").expect("write");
        std::fs::write(dir.path().join("ep1.vtt.bak"), "stale").expect("write stale");

        let engine = CorrectionEngine::new(".bak");
        engine
            .apply(&path, "teh one", &[fix("teh", "the")])
            .await
            .expect("apply");

        assert_eq!(
            std::fs::read_to_string(dir.path().join("ep1.vtt.bak")).expect("read"),
            "teh one"
        );
    }
}
