//! Core `Analyzer` trait and `ApiAnalyzer` implementation.
//!
//! `ApiAnalyzer` calls any OpenAI-compatible `/v1/chat/completions` endpoint
//! — OpenAI, Ollama (OpenAI mode), Groq, LM Studio, vLLM, etc.
//! All connection details come from [`LlmConfig`]; nothing is hardcoded.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{LlmConfig, LlmProvider};
use crate::llm::analysis::{AnalysisResult, TokenUsage};
use crate::llm::prompt::PromptBuilder;
use crate::llm::response::parse_reply;

/// Longest slice of an error body kept in [`LlmError::Status`].
const MAX_ERROR_BODY: usize = 512;

// ---------------------------------------------------------------------------
// LlmError
// ---------------------------------------------------------------------------

/// Errors that can occur while analysing a file.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("analysis request timed out")]
    Timeout,

    /// The endpoint answered with a non-success status.
    #[error("analysis endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse analysis response: {0}")]
    Parse(String),

    /// The backend returned a response with no usable text content.
    #[error("analysis endpoint returned an empty response")]
    EmptyResponse,
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Analyzer trait
// ---------------------------------------------------------------------------

/// Async trait for LLM-based proofreading of extracted subtitle text.
///
/// Implementors must be `Send + Sync` so they can be shared across tasks
/// (e.g. wrapped in `Arc<dyn Analyzer>`).
///
/// # Arguments
/// * `text`     – Flattened cue text of one subtitle file.
/// * `filename` – Originating file name, for the prompt and diagnostics.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, text: &str, filename: &str) -> Result<AnalysisResult, LlmError>;
}

// ---------------------------------------------------------------------------
// ApiAnalyzer
// ---------------------------------------------------------------------------

/// Calls an OpenAI-compatible `/v1/chat/completions` endpoint.
///
/// When the configuration has no usable credentials the analyzer answers
/// every call with [`AnalysisResult::skipped`] and never touches the
/// network.
pub struct ApiAnalyzer {
    client: reqwest::Client,
    config: LlmConfig,
    prompt_builder: PromptBuilder,
}

impl ApiAnalyzer {
    /// Build an `ApiAnalyzer` from application config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.timeout_secs`.  A default (no-timeout) client is used as a
    /// last-resort fallback if the builder fails.
    pub fn from_config(config: &LlmConfig, language: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
            prompt_builder: PromptBuilder::new(language),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn skip_reason(&self) -> Option<&'static str> {
        match self.config.provider {
            LlmProvider::Disabled => Some("analysis disabled"),
            _ if !self.config.has_credentials() => Some("no API key configured"),
            _ => None,
        }
    }
}

#[async_trait]
impl Analyzer for ApiAnalyzer {
    /// Send `text` to the configured endpoint and parse the proofreading
    /// reply.
    ///
    /// The `Authorization: Bearer …` header is attached **only** when
    /// `config.api_key` is a non-empty string.
    async fn analyze(&self, text: &str, filename: &str) -> Result<AnalysisResult, LlmError> {
        if let Some(reason) = self.skip_reason() {
            log::debug!("{filename}: analysis skipped ({reason})");
            return Ok(AnalysisResult::skipped(reason));
        }

        let (system_msg, user_msg) = self.prompt_builder.build_chat(text, filename);

        let body = serde_json::json!({
            "model":       self.config.model,
            "messages": [
                { "role": "system", "content": system_msg },
                { "role": "user",   "content": user_msg   }
            ],
            "stream":          false,
            "temperature":     self.config.temperature,
            "max_tokens":      self.config.max_tokens,
            "response_format": { "type": "json_object" }
        });

        let mut req = self.client.post(self.endpoint()).json(&body);

        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        log::debug!("{filename}: sending {} chars for analysis", text.len());
        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        completion_to_result(&json, filename)
    }
}

/// Map a 2xx chat-completion body to an [`AnalysisResult`].
///
/// Some OpenAI-compatible servers answer `200 OK` with an `error` object, or
/// stop generation with `finish_reason: "content_filter"`; both come back as
/// an `Error`-status result for this file.  A body with no message content
/// is an [`LlmError::EmptyResponse`].
fn completion_to_result(
    json: &serde_json::Value,
    filename: &str,
) -> Result<AnalysisResult, LlmError> {
    if let Some(error) = json.get("error").filter(|e| !e.is_null()) {
        let message = error["message"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        log::warn!("{filename}: backend reported an error: {message}");
        return Ok(AnalysisResult::error(format!("backend error: {message}")));
    }

    let choice = &json["choices"][0];
    if choice["finish_reason"].as_str() == Some("content_filter") {
        log::warn!("{filename}: reply withheld by the backend's content filter");
        return Ok(AnalysisResult::error("reply withheld by content filter"));
    }

    let content = choice["message"]["content"]
        .as_str()
        .ok_or(LlmError::EmptyResponse)?
        .trim()
        .to_string();

    if content.is_empty() {
        return Err(LlmError::EmptyResponse);
    }

    let usage = json
        .get("usage")
        .and_then(|u| serde_json::from_value::<TokenUsage>(u.clone()).ok());

    let parsed = parse_reply(&content);
    if !parsed.structured {
        log::warn!("{filename}: unstructured analysis reply, no corrections extracted");
    }

    Ok(AnalysisResult::success(
        parsed.summary,
        parsed.corrections,
        content,
        usage,
    ))
}

// ---------------------------------------------------------------------------
// MockAnalyzer — test double shared with the pipeline tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub use mock::{MockAnalyzer, MockReply};


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
