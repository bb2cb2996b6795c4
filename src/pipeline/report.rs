//! Per-file outcomes and the end-of-run report.

use std::fmt;
use std::path::PathBuf;

use crate::correction::FixOutcome;
use crate::llm::AnalysisResult;
use crate::state::DecisionReason;

// ---------------------------------------------------------------------------
// FileOutcome
// ---------------------------------------------------------------------------

/// How one file's pipeline ended.
#[derive(Debug, Clone)]
pub enum FileOutcome {
    /// Fingerprint matched the stored one; not dispatched.
    Unchanged,
    /// The file holds no cue text; the backend was not called.
    NoContent,
    /// Analysis succeeded.  `fix` is `None` when there was nothing to apply
    /// or auto-fix is off.
    Analyzed {
        result: AnalysisResult,
        fix: Option<FixOutcome>,
    },
    /// The backend was not called (no credentials, provider disabled).
    AnalysisSkipped { reason: String },
    /// Analysis succeeded but applying its corrections failed.
    Partial {
        result: AnalysisResult,
        error: String,
    },
    Failed { error: String },
    /// The run was interrupted before this file was admitted.
    Cancelled,
}

impl FileOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            FileOutcome::Unchanged => "skipped",
            FileOutcome::NoContent => "no content",
            FileOutcome::Analyzed { .. } => "analyzed",
            FileOutcome::AnalysisSkipped { .. } => "analysis skipped",
            FileOutcome::Partial { .. } => "partial",
            FileOutcome::Failed { .. } => "error",
            FileOutcome::Cancelled => "cancelled",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, FileOutcome::Partial { .. } | FileOutcome::Failed { .. })
    }

    fn analysis(&self) -> Option<&AnalysisResult> {
        match self {
            FileOutcome::Analyzed { result, .. } | FileOutcome::Partial { result, .. } => {
                Some(result)
            }
            _ => None,
        }
    }

    fn fix(&self) -> Option<&FixOutcome> {
        match self {
            FileOutcome::Analyzed { fix, .. } => fix.as_ref(),
            _ => None,
        }
    }
}

/// One line of the report.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub filename: String,
    pub decision: DecisionReason,
    pub outcome: FileOutcome,
}

// ---------------------------------------------------------------------------
// RunSummary
// ---------------------------------------------------------------------------

/// Aggregate counts over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub scanned: usize,
    pub skipped_unchanged: usize,
    pub analyzed: usize,
    pub analysis_skipped: usize,
    pub no_content: usize,
    pub files_fixed: usize,
    pub corrections_found: usize,
    pub corrections_applied: usize,
    pub errored: usize,
    pub cancelled: usize,
    pub total_tokens: u64,
}

// ---------------------------------------------------------------------------
// RunReport
// ---------------------------------------------------------------------------

/// Everything a run did, one entry per eligible file, sorted by name.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub directory: PathBuf,
    /// The directory did not exist and was created by this run.
    pub directory_created: bool,
    pub files: Vec<FileReport>,
}

impl RunReport {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }

    pub fn push(&mut self, report: FileReport) {
        self.files.push(report);
    }

    pub fn sort(&mut self) {
        self.files.sort_by(|a, b| a.filename.cmp(&b.filename));
    }

    pub fn file(&self, filename: &str) -> Option<&FileReport> {
        self.files.iter().find(|f| f.filename == filename)
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            scanned: self.files.len(),
            ..RunSummary::default()
        };

        for file in &self.files {
            match &file.outcome {
                FileOutcome::Unchanged => summary.skipped_unchanged += 1,
                FileOutcome::NoContent => summary.no_content += 1,
                FileOutcome::Analyzed { .. } => summary.analyzed += 1,
                FileOutcome::AnalysisSkipped { .. } => summary.analysis_skipped += 1,
                FileOutcome::Partial { .. } => {
                    summary.analyzed += 1;
                    summary.errored += 1;
                }
                FileOutcome::Failed { .. } => summary.errored += 1,
                FileOutcome::Cancelled => summary.cancelled += 1,
            }

            if let Some(result) = file.outcome.analysis() {
                summary.corrections_found += result.corrections.len();
                if let Some(usage) = result.token_usage {
                    summary.total_tokens += usage.total_tokens;
                }
            }
            if let Some(fix) = file.outcome.fix().filter(|f| f.applied_count > 0) {
                summary.files_fixed += 1;
                summary.corrections_applied += fix.applied_count;
            }
        }

        summary
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Proofreading report for {}", self.directory.display())?;

        if self.directory_created {
            writeln!(
                f,
                "  Directory did not exist and was created; add .vtt files and run again."
            )?;
        }

        for file in &self.files {
            write!(f, "  [{}] {}", file.outcome.label(), file.filename)?;
            match &file.outcome {
                FileOutcome::Unchanged => writeln!(f, " ({})", file.decision.label())?,
                FileOutcome::AnalysisSkipped { reason } => writeln!(f, " ({reason})")?,
                FileOutcome::Failed { error } => writeln!(f, ": {error}")?,
                FileOutcome::Partial { error, .. } => {
                    writeln!(f, ": corrections not applied: {error}")?
                }
                _ => writeln!(f)?,
            }

            if let Some(summary) = file.outcome.analysis().and_then(|r| r.summary.as_deref()) {
                writeln!(f, "      {summary}")?;
            }
            if let Some(result) = file.outcome.analysis() {
                let fix = file.outcome.fix();
                let mut applied: Vec<_> =
                    fix.map(|x| x.applied_changes.iter().collect()).unwrap_or_default();

                for found in &result.corrections {
                    let was_applied = match applied.iter().position(|a| *a == found) {
                        Some(idx) => {
                            applied.remove(idx);
                            true
                        }
                        None => false,
                    };
                    writeln!(
                        f,
                        "      {}{}: \"{}\" -> \"{}\"",
                        found.kind.label(),
                        if was_applied { "" } else { " (not applied)" },
                        found.original,
                        found.corrected
                    )?;
                }
                if let Some(backup) = fix.and_then(|x| x.backup_path.as_ref()) {
                    writeln!(f, "      backup: {}", backup.display())?;
                }
            }
        }

        let s = self.summary();
        writeln!(f)?;
        writeln!(f, "Summary")?;
        writeln!(f, "  files scanned:        {}", s.scanned)?;
        writeln!(f, "  skipped (unchanged):  {}", s.skipped_unchanged)?;
        writeln!(f, "  analyzed:             {}", s.analyzed)?;
        writeln!(f, "  analysis skipped:     {}", s.analysis_skipped)?;
        writeln!(f, "  no content:           {}", s.no_content)?;
        writeln!(f, "  files corrected:      {}", s.files_fixed)?;
        writeln!(
            f,
            "  corrections applied:  {} of {}",
            s.corrections_applied, s.corrections_found
        )?;
        writeln!(f, "  errors:               {}", s.errored)?;
        if s.cancelled > 0 {
            writeln!(f, "  cancelled:            {}", s.cancelled)?;
        }
        if s.total_tokens > 0 {
            writeln!(f, "  tokens used:          {}", s.total_tokens)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
