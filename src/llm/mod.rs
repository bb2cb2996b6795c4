//! Analysis client for subtitle proofreading.
//!
//! This module provides:
//! * [`Analyzer`] — async trait implemented by all analysis backends.
//! * [`ApiAnalyzer`] — OpenAI-compatible REST API backend.
//! * [`PromptBuilder`] — builds the proofreading prompt.
//! * [`parse_reply`] — tolerant parser for the model's JSON reply.
//! * [`AnalysisResult`] / [`Correction`] — what an analysis returns.
//! * [`LlmError`] — error variants for analysis calls.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use vtt_proofread::config::AppConfig;
//! use vtt_proofread::llm::{Analyzer, ApiAnalyzer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let analyzer = ApiAnalyzer::from_config(&config.llm, &config.pipeline.language);
//!
//!     let result = analyzer
//!         .analyze("The cat sat on teh mat.", "demo.vtt")
//!         .await
//!         .unwrap();
//!
//!     for c in &result.corrections {
//!         println!("{} -> {}", c.original, c.corrected);
//!     }
//! }
//! ```

pub mod analysis;
pub mod analyzer;
pub mod prompt;
pub mod response;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use analysis::{AnalysisResult, AnalysisStatus, Correction, CorrectionKind, TokenUsage};
pub use analyzer::{Analyzer, ApiAnalyzer, LlmError};
pub use prompt::PromptBuilder;
pub use response::{parse_reply, ParsedReply};

#[cfg(test)]
pub use analyzer::{MockAnalyzer, MockReply};
