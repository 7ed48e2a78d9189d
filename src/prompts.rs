//! Prompts for LLM-backed translation.
//!
//! The remote gateway depends on the model answering with *only* a JSON
//! array of strings, one per input paragraph. Everything that shapes that
//! answer lives here so prompt changes never touch retry or parsing code in
//! [`crate::pipeline::llm`].

use serde_json::json;

/// System prompt for batch paragraph translation.
///
/// The user message is a JSON object (see [`translation_request`]); the
/// expected reply is a JSON array with exactly as many strings as
/// `paragraphs`.
pub const TRANSLATION_SYSTEM_PROMPT: &str = r#"You are a professional literary translator.

You receive a JSON object with:
- "source_language": the language of the input
- "target_language": the language to translate into
- "paragraphs": an array of paragraphs from a book, in reading order

Rules:
1. Translate every paragraph faithfully, keeping tone, names and punctuation style.
2. Never merge, split, drop or reorder paragraphs.
3. Do not translate proper names unless they have a well-known form in the target language.
4. Reply with ONLY a JSON array of strings: element i is the translation of paragraph i.
5. The array MUST have exactly the same length as "paragraphs".
6. No commentary, no keys, no Markdown fences."#;

/// Build the user message for one batch.
pub fn translation_request(texts: &[String], src_lang: &str, tgt_lang: &str) -> String {
    json!({
        "source_language": language_name(src_lang),
        "target_language": language_name(tgt_lang),
        "paragraphs": texts,
    })
    .to_string()
}

/// English name for an ISO 639-1 code; unknown codes pass through.
pub fn language_name(code: &str) -> &str {
    match code.to_ascii_lowercase().as_str() {
        "en" => "English",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "it" => "Italian",
        "pt" => "Portuguese",
        "nl" => "Dutch",
        _ => code,
    }
}
