//! Batch spelling and grammar proofreading for WebVTT subtitles.
//!
//! The crate is organised leaves-first:
//!
//! * [`vtt`] — flattens cue text out of subtitle markup.
//! * [`state`] — content-fingerprint cache deciding what needs (re)analysis.
//! * [`llm`] — the analysis client talking to an LLM backend.
//! * [`correction`] — applies returned corrections with a backup on disk.
//! * [`pipeline`] — bounded-concurrency orchestration and the run report.
//! * [`config`] — TOML settings and platform paths.

pub mod config;
pub mod correction;
pub mod llm;
pub mod pipeline;
pub mod state;
pub mod vtt;
