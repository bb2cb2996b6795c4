//! Pipeline orchestrator — scans a directory and drives every subtitle file
//! through extract → analyze → correct → record.
//!
//! # Run flow
//!
//! ```text
//! scan *.vtt ──▶ read + fingerprint ──▶ decide (store)
//!                                         ├─ Unchanged → report as skipped
//!                                         └─ otherwise → JoinSet task
//!                                               acquire permit (limiter)
//!                                               extract cue text
//!                                               ├─ empty → NoContent
//!                                               analyzer.analyze
//!                                               engine.apply (auto-fix)
//!                                               release permit
//! join every task (barrier) ──▶ record each finished file ──▶ persist once
//! ```
//!
//! A failure inside one file's task, including a panic, becomes that file's
//! report entry; it never aborts the other tasks or the barrier.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinSet;

use crate::config::PipelineConfig;
use crate::correction::CorrectionEngine;
use crate::llm::{AnalysisStatus, Analyzer};
use crate::state::{ChangeDetectionStore, DecisionReason, ProcessingDecision};
use crate::vtt;

use super::limiter::ConcurrencyLimiter;
use super::report::{FileOutcome, FileReport, RunReport};

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Errors that stop a run before any file is processed.
///
/// Everything that goes wrong with an individual file is reported in the
/// [`RunReport`] instead.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("cannot create subtitle directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot list subtitle directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// RunOptions
// ---------------------------------------------------------------------------

/// Per-run switches from the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Reprocess every file regardless of stored fingerprints.
    pub force: bool,
    /// Discard the stored state before deciding.
    pub clear_state: bool,
}

// ---------------------------------------------------------------------------
// Per-file task plumbing
// ---------------------------------------------------------------------------

/// Shared, read-only context handed to every file task.
struct FileContext {
    analyzer: Arc<dyn Analyzer>,
    engine: CorrectionEngine,
    limiter: ConcurrencyLimiter,
    auto_fix: bool,
}

/// State-store update produced by a finished file.
struct StateUpdate {
    final_content: String,
    has_unresolved_errors: bool,
}

struct FileTaskResult {
    report: FileReport,
    update: Option<StateUpdate>,
}

// ---------------------------------------------------------------------------
// PipelineOrchestrator
// ---------------------------------------------------------------------------

/// Drives one proofreading run over a directory.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use vtt_proofread::config::AppConfig;
/// use vtt_proofread::llm::ApiAnalyzer;
/// use vtt_proofread::pipeline::{PipelineOrchestrator, RunOptions};
///
/// # async fn example() {
/// let config = AppConfig::default();
/// let analyzer = Arc::new(ApiAnalyzer::from_config(&config.llm, &config.pipeline.language));
/// let orchestrator = PipelineOrchestrator::new(analyzer, &config.pipeline);
///
/// let report = orchestrator
///     .run(&config.input_dir, &RunOptions::default())
///     .await
///     .unwrap();
/// println!("{report}");
/// # }
/// ```
pub struct PipelineOrchestrator {
    ctx: Arc<FileContext>,
    extension: String,
    state_file: String,
}

impl PipelineOrchestrator {
    /// Create a new orchestrator.
    ///
    /// # Arguments
    ///
    /// * `analyzer` — analysis backend (e.g. `ApiAnalyzer`).
    /// * `config`   — concurrency, extension, backup and state settings.
    pub fn new(analyzer: Arc<dyn Analyzer>, config: &PipelineConfig) -> Self {
        Self {
            ctx: Arc::new(FileContext {
                analyzer,
                engine: CorrectionEngine::new(config.backup_suffix.clone()),
                limiter: ConcurrencyLimiter::new(config.concurrency),
                auto_fix: config.auto_fix,
            }),
            extension: config.extension.trim_start_matches('.').to_string(),
            state_file: config.state_file.clone(),
        }
    }

    /// The limiter guarding analysis calls.  Closing it stops new files
    /// from being admitted.
    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.ctx.limiter
    }

    /// Path of the processing-state store for `directory`.
    pub fn state_path(&self, directory: &Path) -> PathBuf {
        directory.join(&self.state_file)
    }

    /// Process every eligible file in `directory`.
    ///
    /// Returns `Err` only when the directory cannot be created or listed.
    pub async fn run(
        &self,
        directory: &Path,
        options: &RunOptions,
    ) -> Result<RunReport, PipelineError> {
        let mut report = RunReport::new(directory);

        if !directory.exists() {
            std::fs::create_dir_all(directory).map_err(|source| PipelineError::CreateDir {
                path: directory.to_path_buf(),
                source,
            })?;
            log::info!("created subtitle directory {}", directory.display());
            report.directory_created = true;
            return Ok(report);
        }

        let files = self.scan(directory)?;
        if files.is_empty() {
            log::info!(
                "no .{} files found in {}",
                self.extension,
                directory.display()
            );
            return Ok(report);
        }
        log::info!("found {} subtitle file(s) in {}", files.len(), directory.display());

        let mut store = ChangeDetectionStore::load(self.state_path(directory));
        if options.clear_state {
            log::info!("clearing {} stored fingerprint(s)", store.len());
            store.clear();
        }

        // -- Decide ----------------------------------------------------------
        let mut dispatch = Vec::new();
        for (path, filename) in &files {
            let decision = match tokio::fs::read(path).await {
                Ok(bytes) => {
                    let decision = store.decide(filename, &bytes, options.force);
                    if self.ctx.auto_fix {
                        store.retry_unresolved(filename, decision)
                    } else {
                        decision
                    }
                }
                Err(e) => {
                    log::warn!("{filename}: cannot fingerprint ({e}); processing anyway");
                    ProcessingDecision::state_error()
                }
            };

            if decision.should_process {
                log::debug!("{filename}: dispatching ({})", decision.reason.label());
                dispatch.push((path.clone(), filename.clone(), decision.reason));
            } else {
                log::info!("{filename}: unchanged, skipping");
                report.push(FileReport {
                    filename: filename.clone(),
                    decision: decision.reason,
                    outcome: FileOutcome::Unchanged,
                });
            }
        }

        // -- Dispatch --------------------------------------------------------
        let mut tasks = JoinSet::new();
        let mut names = HashMap::new();
        for (path, filename, reason) in dispatch {
            let ctx = Arc::clone(&self.ctx);
            let task_name = filename.clone();
            let handle =
                tasks.spawn(async move { process_file(ctx, path, filename, reason).await });
            names.insert(handle.id(), (task_name, reason));
        }

        // -- Barrier ---------------------------------------------------------
        while let Some(joined) = tasks.join_next_with_id().await {
            let result = match joined {
                Ok((_, result)) => result,
                Err(e) => {
                    let (filename, decision) = names
                        .remove(&e.id())
                        .unwrap_or_else(|| ("<unknown>".to_string(), DecisionReason::StateError));
                    log::error!("{filename}: processing task failed: {e}");
                    FileTaskResult {
                        report: FileReport {
                            filename,
                            decision,
                            outcome: FileOutcome::Failed {
                                error: format!("internal error: {e}"),
                            },
                        },
                        update: None,
                    }
                }
            };

            if let Some(update) = result.update {
                store.record(
                    &result.report.filename,
                    update.final_content.as_bytes(),
                    update.has_unresolved_errors,
                );
            }
            report.push(result.report);
        }

        // -- Persist ---------------------------------------------------------
        let present: HashSet<String> = files.into_iter().map(|(_, name)| name).collect();
        let pruned = store.retain_files(&present);
        if pruned > 0 {
            log::debug!("dropped {pruned} stale state entr(ies)");
        }
        if let Err(e) = store.persist() {
            log::warn!("could not save processing state: {e}");
        }

        report.sort();
        Ok(report)
    }

    /// Eligible files in `directory` as `(path, file name)`, sorted by name.
    fn scan(&self, directory: &Path) -> Result<Vec<(PathBuf, String)>, PipelineError> {
        let read_dir_err = |source| PipelineError::ReadDir {
            path: directory.to_path_buf(),
            source,
        };

        let mut files = Vec::new();
        for entry in std::fs::read_dir(directory).map_err(read_dir_err)? {
            let entry = entry.map_err(read_dir_err)?;
            let path = entry.path();
            if !path.is_file() || !self.is_eligible(&path) {
                continue;
            }
            match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => {
                    let name = name.to_string();
                    files.push((path, name));
                }
                None => log::warn!("skipping non UTF-8 file name {}", path.display()),
            }
        }

        files.sort_by(|a, b| a.1.cmp(&b.1));
        Ok(files)
    }

    fn is_eligible(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
    }
}

// ---------------------------------------------------------------------------
// Per-file pipeline
// ---------------------------------------------------------------------------

/// read → extract → analyze → correct, strictly in that order, while holding
/// a limiter permit.
async fn process_file(
    ctx: Arc<FileContext>,
    path: PathBuf,
    filename: String,
    decision: DecisionReason,
) -> FileTaskResult {
    let finish = |outcome, update| FileTaskResult {
        report: FileReport {
            filename: filename.clone(),
            decision,
            outcome,
        },
        update,
    };

    let _permit = match ctx.limiter.acquire().await {
        Ok(permit) => permit,
        Err(_) => {
            log::info!("{filename}: cancelled before start");
            return finish(FileOutcome::Cancelled, None);
        }
    };

    log::info!("{filename}: processing ({})", decision.label());

    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) => {
            log::warn!("{filename}: read failed: {e}");
            return finish(
                FileOutcome::Failed {
                    error: format!("read failed: {e}"),
                },
                None,
            );
        }
    };

    let text = vtt::extract_text(&content);
    if text.trim().is_empty() {
        log::info!("{filename}: no cue text, nothing to analyze");
        return finish(
            FileOutcome::NoContent,
            Some(StateUpdate {
                final_content: content,
                has_unresolved_errors: false,
            }),
        );
    }

    let result = match ctx.analyzer.analyze(&text, &filename).await {
        Ok(result) => result,
        Err(e) => {
            log::warn!("{filename}: analysis failed: {e}");
            return finish(
                FileOutcome::Failed {
                    error: e.to_string(),
                },
                None,
            );
        }
    };

    match result.status {
        AnalysisStatus::Success => {}
        AnalysisStatus::Skipped => {
            return finish(
                FileOutcome::AnalysisSkipped {
                    reason: result.raw_analysis,
                },
                None,
            );
        }
        AnalysisStatus::Error => {
            return finish(
                FileOutcome::Failed {
                    error: result.raw_analysis,
                },
                None,
            );
        }
    }

    log::info!(
        "{filename}: analysis found {} correction(s)",
        result.corrections.len()
    );

    if !result.has_corrections() || !ctx.auto_fix {
        let unresolved = result.has_corrections();
        return finish(
            FileOutcome::Analyzed { result, fix: None },
            Some(StateUpdate {
                final_content: content,
                has_unresolved_errors: unresolved,
            }),
        );
    }

    match ctx.engine.apply(&path, &content, &result.corrections).await {
        Ok((final_content, fix)) => {
            let unresolved = fix.applied_count < result.corrections.len();
            finish(
                FileOutcome::Analyzed {
                    result,
                    fix: Some(fix),
                },
                Some(StateUpdate {
                    final_content,
                    has_unresolved_errors: unresolved,
                }),
            )
        }
        Err(e) => {
            log::warn!("{filename}: {e}");
            finish(
                FileOutcome::Partial {
                    result,
                    error: e.to_string(),
                },
                None,
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
