//! Line-oriented WebVTT parser.
//!
//! A WebVTT file is a sequence of blocks separated by blank lines.  The
//! `WEBVTT` header and `NOTE` / `STYLE` / `REGION` blocks carry no spoken
//! text; every other block that contains a `-->` timing line is a cue.
//! Lines above the timing line form the optional cue identifier (often a
//! plain cue number), lines below it are the cue payload.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

/// Inline cue markup: `<i>`, `</b>`, `<v Speaker>`, `<00:00:01.000>` …
static TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>\n]*>").unwrap());

const BYTE_ORDER_MARK: char = '\u{feff}';

/// One timed subtitle entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    /// Identifier line(s) preceding the timing line, if any.
    pub identifier: Option<String>,
    /// The raw timing line, including any cue settings.
    pub timing: String,
    /// Payload with markup removed and lines joined by a single space.
    pub text: String,
}

/// Parse every cue in `content`.
///
/// Blocks without a timing line are ignored, as are cues whose payload is
/// empty after markup removal.
pub fn parse_cues(content: &str) -> Vec<Cue> {
    let content = content.trim_start_matches(BYTE_ORDER_MARK);

    split_blocks(content)
        .into_iter()
        .filter(|block| !is_metadata_block(block[0]))
        .filter_map(|block| {
            let timing_idx = block.iter().position(|line| line.contains("-->"))?;

            let identifier = (timing_idx > 0).then(|| block[..timing_idx].join(" "));
            let text = block[timing_idx + 1..]
                .iter()
                .map(|line| clean_line(line))
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join(" ");

            if text.is_empty() {
                return None;
            }

            Some(Cue {
                identifier,
                timing: block[timing_idx].trim().to_string(),
                text,
            })
        })
        .collect()
}

/// Flatten all cue text in `content` into one string, cues joined by a
/// single space.  Returns an empty string for files with no spoken text.
///
/// ```
/// use vtt_proofread::vtt::extract_text;
///
/// let vtt = "WEBVTT\n\n1\n00:00:01.000 --> 00:00:02.000\n<i>Hello</i> there\n\n\
///            2\n00:00:03.000 --> 00:00:04.000\nGeneral Kenobi\n";
/// assert_eq!(extract_text(vtt), "Hello there General Kenobi");
/// ```
pub fn extract_text(content: &str) -> String {
    parse_cues(content)
        .into_iter()
        .map(|cue| cue.text)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Byte ranges of `content` holding cue payload text, with inline markup cut
/// out.  Timing lines, cue settings, identifiers, tags and metadata blocks
/// fall outside every range.
///
/// Text without a `WEBVTT` signature is not a subtitle document and comes
/// back as a single range covering all of it.
///
/// ```
/// use vtt_proofread::vtt::text_ranges;
///
/// let vtt = "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\n<i>Hi</i> there\n";
/// let spans: Vec<&str> = text_ranges(vtt).into_iter().map(|r| &vtt[r]).collect();
/// assert_eq!(spans, ["Hi", " there"]);
/// ```
pub fn text_ranges(content: &str) -> Vec<Range<usize>> {
    let body = content.trim_start_matches(BYTE_ORDER_MARK);
    if !body.starts_with("WEBVTT") {
        return vec![0..content.len()];
    }

    // Every line below is a subslice of `content`.
    let base = content.as_ptr() as usize;
    let mut ranges = Vec::new();

    for block in split_blocks(body) {
        if is_metadata_block(block[0]) {
            continue;
        }
        let Some(timing_idx) = block.iter().position(|line| line.contains("-->")) else {
            continue;
        };

        for line in &block[timing_idx + 1..] {
            let start = line.as_ptr() as usize - base;
            let mut cursor = start;
            for tag in TAG_REGEX.find_iter(line) {
                if start + tag.start() > cursor {
                    ranges.push(cursor..start + tag.start());
                }
                cursor = start + tag.end();
            }
            if start + line.len() > cursor {
                ranges.push(cursor..start + line.len());
            }
        }
    }

    ranges
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn split_blocks(content: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
}

fn is_metadata_block(first_line: &str) -> bool {
    let first = first_line.trim();
    first.starts_with("WEBVTT")
        || ["NOTE", "STYLE", "REGION"].iter().any(|keyword| {
            first == *keyword
                || first
                    .strip_prefix(keyword)
                    .is_some_and(|rest| rest.starts_with(char::is_whitespace))
        })
}

fn clean_line(line: &str) -> String {
    TAG_REGEX
        .replace_all(line, "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
