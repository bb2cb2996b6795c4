//! Prompt builder for subtitle proofreading.
//!
//! [`PromptBuilder`] produces a `(system_msg, user_msg)` pair for any
//! OpenAI-compatible `/v1/chat/completions` endpoint.  The system message
//! fixes the reply format to a JSON object so that
//! [`parse_reply`](crate::llm::response::parse_reply) can recover the
//! individual corrections.

// ---------------------------------------------------------------------------
// System instruction
// ---------------------------------------------------------------------------

const SYSTEM_INSTRUCTION: &str = "\
You are a meticulous proofreader for video subtitles.
Task: find spelling and grammar errors in the subtitle text you are given.

Rules:
1. Report only real spelling or grammar mistakes. Ignore style, tone and punctuation preferences.
2. Keep names, technical terms, slang and intentional dialect exactly as written.
3. \"original\" must be copied character-for-character from the input text and be as short as possible while still unique.
4. \"corrected\" is the replacement for \"original\" only, not the whole sentence.
5. \"type\" is either \"spelling\" or \"grammar\".
6. Reply with ONLY a JSON object, no Markdown and no commentary.

Reply format:
{
  \"summary\": \"one sentence describing the overall quality\",
  \"corrections\": [
    {\"original\": \"teh\", \"corrected\": \"the\", \"type\": \"spelling\", \"explanation\": \"misspelling\"}
  ]
}
If there are no errors, reply with an empty \"corrections\" array.";

// ---------------------------------------------------------------------------
// PromptBuilder
// ---------------------------------------------------------------------------

/// Builds proofreading prompts for a given subtitle language.
///
/// # Example
/// ```rust
/// use vtt_proofread::llm::PromptBuilder;
///
/// let builder = PromptBuilder::new("en");
/// let (system, user) = builder.build_chat("Teh end.", "movie.vtt");
/// assert!(system.contains("JSON"));
/// assert!(user.contains("movie.vtt"));
/// ```
pub struct PromptBuilder {
    language: String,
}

impl PromptBuilder {
    /// Create a new builder for the given ISO-639-1 language code.
    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
        }
    }

    /// Build a **(system_msg, user_msg)** pair.
    ///
    /// * `system_msg` — proofreading rules and the reply schema.
    /// * `user_msg` — language, source file name and the subtitle text.
    pub fn build_chat(&self, text: &str, filename: &str) -> (String, String) {
        let system_msg = SYSTEM_INSTRUCTION.to_string();

        let mut user_msg = String::with_capacity(text.len() + 256);
        user_msg.push_str(&format!(
            "Language: {}\nFile: {}\n\nSubtitle text:\n{}\n",
            self.language_name(),
            filename,
            text
        ));

        (system_msg, user_msg)
    }

    fn language_name(&self) -> &str {
        match self.language.as_str() {
            "en" => "English",
            "de" => "German",
            "fr" => "French",
            "es" => "Spanish",
            "it" => "Italian",
            "nl" => "Dutch",
            "pt" => "Portuguese",
            other => other,
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
    fn system_message_fixes_json_schema() {
        let builder = PromptBuilder::new("en");
        let (system, _) = builder.build_chat("text", "a.vtt");

        assert!(system.contains("\"corrections\""));
        assert!(system.contains("\"original\""));
        assert!(system.contains("\"corrected\""));
        assert!(
            system.contains("character-for-character"),
            "spans must be requested verbatim"
        );
    }

    #[test]
    fn user_message_carries_text_and_filename() {
        let builder = PromptBuilder::new("en");
        let (_, user) = builder.build_chat("The cat sat on teh mat.", "episode01.vtt");

        assert!(user.contains("The cat sat on teh mat."));
        assert!(user.contains("File: episode01.vtt"));
        assert!(user.contains("Language: English"));
    }

    #[test]
    fn known_language_codes_are_named() {
        let (_, user) = PromptBuilder::new("de").build_chat("Hallo", "x.vtt");
        assert!(user.contains("Language: German"));
    }

    #[test]
    fn unknown_language_code_is_passed_through() {
        let (_, user) = PromptBuilder::new("th").build_chat("สวัสดี", "x.vtt");
        assert!(user.contains("Language: th"));
        assert!(user.contains("สวัสดี"));
    }
}
