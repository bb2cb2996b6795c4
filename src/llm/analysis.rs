//! Result types produced by an [`Analyzer`](crate::llm::Analyzer).

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Correction
// ---------------------------------------------------------------------------

/// Category of a proposed correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrectionKind {
    Spelling,
    Grammar,
}

impl CorrectionKind {
    pub fn label(&self) -> &'static str {
        match self {
            CorrectionKind::Spelling => "spelling",
            CorrectionKind::Grammar => "grammar",
        }
    }
}

/// A literal substitution proposed by the analysis backend.
///
/// `original` is expected to occur verbatim in the subtitle file; when it
/// does not, applying the correction is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    pub original: String,
    pub corrected: String,
    pub kind: CorrectionKind,
    pub explanation: String,
}

impl Correction {
    pub fn new(
        original: impl Into<String>,
        corrected: impl Into<String>,
        kind: CorrectionKind,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            original: original.into(),
            corrected: corrected.into(),
            kind,
            explanation: explanation.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// TokenUsage
// ---------------------------------------------------------------------------

/// Token accounting reported by the backend, when it reports any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

// ---------------------------------------------------------------------------
// AnalysisResult
// ---------------------------------------------------------------------------

/// Outcome class of one analysis call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Success,
    Error,
    /// The backend was not called (no credentials, provider disabled).
    Skipped,
}

/// Structured result of analysing one file's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub status: AnalysisStatus,
    pub summary: Option<String>,
    pub corrections: Vec<Correction>,
    /// The backend's reply verbatim, or the skip/error reason.
    pub raw_analysis: String,
    pub token_usage: Option<TokenUsage>,
}

impl AnalysisResult {
    pub fn success(
        summary: Option<String>,
        corrections: Vec<Correction>,
        raw_analysis: impl Into<String>,
        token_usage: Option<TokenUsage>,
    ) -> Self {
        Self {
            status: AnalysisStatus::Success,
            summary,
            corrections,
            raw_analysis: raw_analysis.into(),
            token_usage,
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: AnalysisStatus::Skipped,
            summary: None,
            corrections: Vec::new(),
            raw_analysis: reason.into(),
            token_usage: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: AnalysisStatus::Error,
            summary: None,
            corrections: Vec::new(),
            raw_analysis: message.into(),
            token_usage: None,
        }
    }

    pub fn has_corrections(&self) -> bool {
        !self.corrections.is_empty()
    }
}
