//! Command-line entry point — VTT proofreader.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Parse the command line.
//! 3. Load [`AppConfig`] (`--config` path or the platform settings file) and
//!    apply command-line / environment overrides.
//! 4. Create the [`tokio`] runtime.
//! 5. Build the analysis backend ([`ApiAnalyzer`]) from config.
//! 6. Run the [`PipelineOrchestrator`] over the target directory, racing it
//!    against Ctrl-C.
//! 7. Print the run report.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use vtt_proofread::{
    config::{AppConfig, LlmProvider},
    llm::{Analyzer, ApiAnalyzer},
    pipeline::{PipelineOrchestrator, RunOptions},
};

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

/// Spelling and grammar checker for WebVTT subtitle directories.
#[derive(Parser, Debug)]
#[command(name = "vtt-proofread")]
#[command(version)]
struct Cli {
    /// Directory containing the .vtt files (default: `input_dir` from the
    /// settings file).
    dir: Option<PathBuf>,

    /// Reprocess every file, ignoring stored fingerprints.
    #[arg(short, long)]
    force: bool,

    /// Report corrections without modifying any file.
    #[arg(long)]
    no_fix: bool,

    /// Discard the stored processing state before the run.
    #[arg(long)]
    clear_state: bool,

    /// Settings file to use instead of the platform default.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// API key for the analysis backend.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Maximum number of files analysed at the same time.
    #[arg(long, env = "VTT_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Model identifier sent to the backend.
    #[arg(long, env = "VTT_MODEL")]
    model: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint.
    #[arg(long, env = "VTT_BASE_URL")]
    base_url: Option<String>,

    /// Analysis backend: openai, ollama or disabled.
    #[arg(long, env = "VTT_PROVIDER")]
    provider: Option<LlmProvider>,
}

impl Cli {
    /// Fold command-line and environment overrides into `config`.
    fn apply_to(&self, config: &mut AppConfig) {
        if let Some(dir) = &self.dir {
            config.input_dir = dir.clone();
        }
        if let Some(key) = &self.api_key {
            config.llm.api_key = Some(key.clone());
        }
        if let Some(concurrency) = self.concurrency {
            config.pipeline.concurrency = concurrency;
        }
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if let Some(base_url) = &self.base_url {
            config.llm.base_url = base_url.clone();
        }
        if let Some(provider) = self.provider {
            config.llm.provider = provider;
        }
        if self.no_fix {
            config.pipeline.auto_fix = false;
        }
        config.pipeline.concurrency = config.concurrency();
    }

    fn run_options(&self) -> RunOptions {
        RunOptions {
            force: self.force,
            clear_state: self.clear_state,
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> AppConfig {
    let loaded = match path {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    loaded.unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    })
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 2. Command line
    let cli = Cli::parse();

    // 3. Configuration
    let mut config = load_config(cli.config.as_ref());
    cli.apply_to(&mut config);
    log::info!(
        "vtt-proofread starting (dir: {}, concurrency: {}, auto-fix: {})",
        config.input_dir.display(),
        config.pipeline.concurrency,
        config.pipeline.auto_fix
    );

    // 4. Tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    // 5. Analysis backend
    if config.llm.provider == LlmProvider::Disabled {
        log::warn!("Analysis backend disabled; files will be reported as skipped");
    } else if !config.llm.has_credentials() {
        log::warn!("No API key configured (set OPENAI_API_KEY or --api-key); files will be reported as skipped");
    }
    let analyzer: Arc<dyn Analyzer> = Arc::new(ApiAnalyzer::from_config(
        &config.llm,
        &config.pipeline.language,
    ));

    // 6. Run, racing Ctrl-C
    let orchestrator = PipelineOrchestrator::new(analyzer, &config.pipeline);
    let options = cli.run_options();

    let outcome = rt.block_on(async {
        tokio::select! {
            result = orchestrator.run(&config.input_dir, &options) => Some(result),
            Ok(()) = tokio::signal::ctrl_c() => {
                orchestrator.limiter().close();
                None
            }
        }
    });
    rt.shutdown_timeout(Duration::from_secs(2));

    // 7. Report
    match outcome {
        Some(Ok(report)) => {
            print!("{report}");
            ExitCode::SUCCESS
        }
        Some(Err(e)) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
        None => {
            println!("Interrupted; processing state was not saved.");
            ExitCode::SUCCESS
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "vtt-proofread",
            "subs",
            "--no-fix",
            "--concurrency",
            "0",
            "--model",
            "qwen2.5:7b",
            "--provider",
            "ollama",
        ]);
        let mut config = AppConfig::default();
        cli.apply_to(&mut config);

        assert_eq!(config.input_dir, PathBuf::from("subs"));
        assert!(!config.pipeline.auto_fix);
        assert_eq!(config.pipeline.concurrency, 1);
        assert_eq!(config.llm.model, "qwen2.5:7b");
        assert_eq!(config.llm.provider, LlmProvider::Ollama);
    }

    #[test]
    fn force_and_clear_state_map_to_run_options() {
        let cli = Cli::parse_from(["vtt-proofread", "-f", "--clear-state"]);
        let options = cli.run_options();
        assert!(options.force);
        assert!(options.clear_state);
        assert!(cli.dir.is_none());
    }
}
