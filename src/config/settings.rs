//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// LlmProvider
// ---------------------------------------------------------------------------

/// Selects which LLM backend analyses the subtitle text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LlmProvider {
    /// Any OpenAI-compatible REST API (OpenAI, Groq, Together.ai, LM Studio …).
    /// Requires an API key.
    OpenAiCompatible,
    /// Ollama running locally — no authentication required.
    Ollama,
    /// Analysis disabled — every file is reported as skipped.
    Disabled,
}

impl Default for LlmProvider {
    fn default() -> Self {
        Self::OpenAiCompatible
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "openai-compatible" | "openaicompatible" => Ok(Self::OpenAiCompatible),
            "ollama" => Ok(Self::Ollama),
            "disabled" | "none" | "off" => Ok(Self::Disabled),
            other => Err(format!(
                "unknown provider `{other}` (expected openai, ollama or disabled)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

/// Settings for the analysis backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Which backend to use.
    pub provider: LlmProvider,
    /// Base URL of the API endpoint.
    ///
    /// - OpenAI default: `https://api.openai.com`
    /// - Ollama: `http://localhost:11434`
    pub base_url: String,
    /// API key — `None` for local providers.
    pub api_key: Option<String>,
    /// Model identifier sent to the API (e.g. `"gpt-4o-mini"`, `"qwen2.5:7b"`).
    pub model: String,
    /// Sampling temperature (0.0 – 1.0).  Lower = more deterministic.
    pub temperature: f32,
    /// Maximum seconds to wait for one analysis response before timing out.
    pub timeout_secs: u64,
    /// Upper bound on tokens generated per analysis.
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            base_url: "https://api.openai.com".into(),
            api_key: None,
            model: "gpt-4o-mini".into(),
            temperature: 0.1,
            timeout_secs: 60,
            max_tokens: 2048,
        }
    }
}

impl LlmConfig {
    /// Whether the configured provider can be called at all.
    ///
    /// Ollama needs no key; OpenAI-compatible providers need a non-empty
    /// `api_key`; `Disabled` never has credentials.
    pub fn has_credentials(&self) -> bool {
        match self.provider {
            LlmProvider::Ollama => true,
            LlmProvider::OpenAiCompatible => self
                .api_key
                .as_deref()
                .is_some_and(|key| !key.trim().is_empty()),
            LlmProvider::Disabled => false,
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// Settings for file discovery, dispatch and correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum number of files analysed at the same time.
    pub concurrency: usize,
    /// Subtitle file extension, matched case-insensitively, without the dot.
    pub extension: String,
    /// Suffix appended to a file name to form its backup path.
    pub backup_suffix: String,
    /// File name of the processing-state store inside the subtitle directory.
    pub state_file: String,
    /// Apply returned corrections to the files on disk.
    pub auto_fix: bool,
    /// ISO-639-1 code of the subtitle language, used in the prompt.
    pub language: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            extension: "vtt".into(),
            backup_suffix: ".bak".into(),
            state_file: ".vtt-proofread-state.json".into(),
            auto_fix: true,
            language: "en".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use vtt_proofread::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// assert!(config.pipeline.concurrency >= 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory scanned for subtitle files when none is given on the
    /// command line.
    pub input_dir: PathBuf,
    /// Analysis backend settings.
    pub llm: LlmConfig,
    /// Pipeline settings.
    pub pipeline: PipelineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("subtitles"),
            llm: LlmConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Concurrency limit clamped to at least one permit.
    pub fn concurrency(&self) -> usize {
        self.pipeline.concurrency.max(1)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.input_dir, loaded.input_dir);

        assert_eq!(original.llm.provider, loaded.llm.provider);
        assert_eq!(original.llm.base_url, loaded.llm.base_url);
        assert_eq!(original.llm.api_key, loaded.llm.api_key);
        assert_eq!(original.llm.model, loaded.llm.model);
        assert_eq!(original.llm.timeout_secs, loaded.llm.timeout_secs);
        assert_eq!(original.llm.max_tokens, loaded.llm.max_tokens);

        assert_eq!(original.pipeline.concurrency, loaded.pipeline.concurrency);
        assert_eq!(original.pipeline.extension, loaded.pipeline.extension);
        assert_eq!(original.pipeline.backup_suffix, loaded.pipeline.backup_suffix);
        assert_eq!(original.pipeline.state_file, loaded.pipeline.state_file);
        assert_eq!(original.pipeline.auto_fix, loaded.pipeline.auto_fix);
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        let default = AppConfig::default();

        assert_eq!(config.llm.model, default.llm.model);
        assert_eq!(config.pipeline.concurrency, default.pipeline.concurrency);
        assert_eq!(config.input_dir, default.input_dir);
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.llm.provider, LlmProvider::OpenAiCompatible);
        assert_eq!(cfg.llm.base_url, "https://api.openai.com");
        assert_eq!(cfg.llm.model, "gpt-4o-mini");
        assert_eq!(cfg.llm.timeout_secs, 60);
        assert!(cfg.llm.api_key.is_none());
        assert_eq!(cfg.pipeline.concurrency, 3);
        assert_eq!(cfg.pipeline.extension, "vtt");
        assert_eq!(cfg.pipeline.backup_suffix, ".bak");
        assert!(cfg.pipeline.auto_fix);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[pipeline]\nconcurrency = 8\n").expect("write");

        let cfg = AppConfig::load_from(&path).expect("load");
        assert_eq!(cfg.pipeline.concurrency, 8);
        assert_eq!(cfg.pipeline.extension, "vtt");
        assert_eq!(cfg.llm.model, "gpt-4o-mini");
    }

    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.input_dir = PathBuf::from("/srv/subs");
        cfg.llm.provider = LlmProvider::Ollama;
        cfg.llm.base_url = "http://localhost:11434".into();
        cfg.llm.api_key = Some("sk-test".into());
        cfg.llm.model = "qwen2.5:7b".into();
        cfg.pipeline.concurrency = 5;
        cfg.pipeline.auto_fix = false;

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.input_dir, PathBuf::from("/srv/subs"));
        assert_eq!(loaded.llm.provider, LlmProvider::Ollama);
        assert_eq!(loaded.llm.api_key, Some("sk-test".into()));
        assert_eq!(loaded.llm.model, "qwen2.5:7b");
        assert_eq!(loaded.pipeline.concurrency, 5);
        assert!(!loaded.pipeline.auto_fix);
    }

    #[test]
    fn credentials_depend_on_provider() {
        let mut llm = LlmConfig::default();
        assert!(!llm.has_credentials());

        llm.api_key = Some("   ".into());
        assert!(!llm.has_credentials());

        llm.api_key = Some("sk-live".into());
        assert!(llm.has_credentials());

        llm.provider = LlmProvider::Disabled;
        assert!(!llm.has_credentials());

        llm.provider = LlmProvider::Ollama;
        llm.api_key = None;
        assert!(llm.has_credentials());
    }

    #[test]
    fn provider_parses_from_str() {
        assert_eq!("openai".parse::<LlmProvider>(), Ok(LlmProvider::OpenAiCompatible));
        assert_eq!("Ollama".parse::<LlmProvider>(), Ok(LlmProvider::Ollama));
        assert_eq!("off".parse::<LlmProvider>(), Ok(LlmProvider::Disabled));
        assert!("claude".parse::<LlmProvider>().is_err());
    }

    #[test]
    fn concurrency_never_below_one() {
        let mut cfg = AppConfig::default();
        cfg.pipeline.concurrency = 0;
        assert_eq!(cfg.concurrency(), 1);
    }
}
