//! Parsing of the backend's proofreading reply.
//!
//! The model is asked for a JSON object, but replies are untrusted: they may
//! arrive wrapped in Markdown code fences, surrounded by prose, use slightly
//! different field names, or not be JSON at all.  [`parse_reply`] never
//! fails; anything it cannot read degrades to "no structured corrections".

use serde::Deserialize;

use crate::llm::analysis::{Correction, CorrectionKind};

/// Structured content recovered from a reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedReply {
    pub summary: Option<String>,
    pub corrections: Vec<Correction>,
    /// `false` when the reply could not be read as the expected JSON object.
    pub structured: bool,
}

#[derive(Debug, Deserialize)]
struct RawReply {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default, alias = "errors", alias = "issues")]
    corrections: Vec<RawCorrection>,
}

#[derive(Debug, Deserialize)]
struct RawCorrection {
    #[serde(alias = "original_text", alias = "originalSpan", alias = "error")]
    original: String,
    #[serde(
        alias = "corrected_text",
        alias = "correctedSpan",
        alias = "correction",
        alias = "suggestion"
    )]
    corrected: String,
    #[serde(default, rename = "type", alias = "kind")]
    kind: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
}

impl RawCorrection {
    fn into_correction(self) -> Option<Correction> {
        if self.original.is_empty() || self.original == self.corrected {
            return None;
        }
        Some(Correction {
            original: self.original,
            corrected: self.corrected,
            kind: parse_kind(self.kind.as_deref()),
            explanation: self.explanation.unwrap_or_default(),
        })
    }
}

/// Parse a model reply into a summary and a list of corrections.
pub fn parse_reply(reply: &str) -> ParsedReply {
    let body = strip_code_fence(reply.trim());

    let raw = serde_json::from_str::<RawReply>(body).ok().or_else(|| {
        let start = body.find('{')?;
        let end = body.rfind('}')?;
        (start < end)
            .then(|| serde_json::from_str::<RawReply>(&body[start..=end]).ok())
            .flatten()
    });

    match raw {
        Some(raw) => ParsedReply {
            summary: raw.summary.filter(|s| !s.trim().is_empty()),
            corrections: raw
                .corrections
                .into_iter()
                .filter_map(RawCorrection::into_correction)
                .collect(),
            structured: true,
        },
        None => {
            log::debug!("analysis reply is not structured JSON (len={})", reply.len());
            ParsedReply::default()
        }
    }
}

fn parse_kind(kind: Option<&str>) -> CorrectionKind {
    match kind {
        Some(k) if k.to_ascii_lowercase().contains("grammar") => CorrectionKind::Grammar,
        _ => CorrectionKind::Spelling,
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (e.g. "json") on the opening fence line.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const REPLY: &str = r#"{
        "summary": "Two issues found.",
        "corrections": [
            {"original": "teh", "corrected": "the", "type": "spelling", "explanation": "typo"},
            {"original": "he go", "corrected": "he goes", "type": "grammar", "explanation": "agreement"}
        ]
    }"#;

    #[test]
    fn parses_plain_json() {
        let parsed = parse_reply(REPLY);
        assert!(parsed.structured);
        assert_eq!(parsed.summary.as_deref(), Some("Two issues found."));
        assert_eq!(parsed.corrections.len(), 2);
        assert_eq!(parsed.corrections[0].original, "teh");
        assert_eq!(parsed.corrections[0].kind, CorrectionKind::Spelling);
        assert_eq!(parsed.corrections[1].kind, CorrectionKind::Grammar);
        assert_eq!(parsed.corrections[1].explanation, "agreement");
    }

    #[test]
    fn strips_markdown_fence() {
        let fenced = format!("```json\n{REPLY}\n```");
        let parsed = parse_reply(&fenced);
        assert!(parsed.structured);
        assert_eq!(parsed.corrections.len(), 2);
    }

    #[test]
    fn finds_object_inside_prose() {
        let reply = format!("Sure! Here is the analysis:\n{REPLY}\nLet me know.");
        let parsed = parse_reply(&reply);
        assert!(parsed.structured);
        assert_eq!(parsed.corrections.len(), 2);
    }

    #[test]
    fn accepts_alternative_field_names() {
        let reply = r#"{"errors": [{"originalSpan": "recieve", "correctedSpan": "receive", "kind": "Spelling"}]}"#;
        let parsed = parse_reply(reply);
        assert_eq!(parsed.corrections.len(), 1);
        assert_eq!(parsed.corrections[0].corrected, "receive");
        assert!(parsed.corrections[0].explanation.is_empty());
        assert!(parsed.summary.is_none());
    }

    #[test]
    fn drops_empty_and_identity_corrections() {
        let reply = r#"{"corrections": [
            {"original": "", "corrected": "x"},
            {"original": "same", "corrected": "same"},
            {"original": "wrod", "corrected": "word"}
        ]}"#;
        let parsed = parse_reply(reply);
        assert_eq!(parsed.corrections.len(), 1);
        assert_eq!(parsed.corrections[0].original, "wrod");
    }

    #[test]
    fn unparseable_reply_degrades_to_no_corrections() {
        let parsed = parse_reply("The text looks fine to me.");
        assert!(!parsed.structured);
        assert!(parsed.corrections.is_empty());
        assert!(parsed.summary.is_none());
    }

    #[test]
    fn unknown_kind_defaults_to_spelling() {
        let reply = r#"{"corrections": [{"original": "a", "corrected": "b", "type": "punctuation"}]}"#;
        let parsed = parse_reply(reply);
        assert_eq!(parsed.corrections[0].kind, CorrectionKind::Spelling);
    }
}
