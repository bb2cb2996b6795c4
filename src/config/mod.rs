//! Configuration module for the subtitle proofreader.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for the analysis
//! backend and the pipeline, `AppPaths` for the platform config directory,
//! and TOML persistence via `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{AppConfig, LlmConfig, LlmProvider, PipelineConfig};
