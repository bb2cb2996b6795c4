//! WebVTT cue-text extraction.
//!
//! Subtitle files are parsed line by line into [`Cue`]s; [`extract_text`]
//! flattens every cue's text into a single analysable string, and
//! [`text_ranges`] locates that text inside the raw file.

pub mod extract;

pub use extract::{extract_text, parse_cues, text_ranges, Cue};
