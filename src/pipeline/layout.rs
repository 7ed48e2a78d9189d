//! Layout-aware paragraph extraction.
//!
//! Input is the per-page block structure produced by a
//! [`DocumentReader`](crate::pipeline::pdf::DocumentReader): every text block
//! with its vertical bounds, in reading order. Output is the ordered list of
//! clean paragraphs that becomes the unit of translation.
//!
//! Two things make raw PDF text unusable as-is:
//!
//! - **Running headers and footers.** Book titles, chapter names and page
//!   furniture repeat on most pages. A block whose top sits in the header
//!   zone (or whose bottom sits in the footer zone) is a candidate; its
//!   normalised text is dropped everywhere once it appears on enough pages.
//!   Single-page documents are never filtered: with one page there is no
//!   repetition to detect.
//! - **Hard-wrapped lines.** Lines inside a block are joined with a space,
//!   and a word split as `exam-` / `ple` is rejoined as `example`. A hyphen
//!   followed by an uppercase continuation (`Jean-` / `Paul`) is kept.
//!
//! Extraction is a pure function of the page blocks, so running it twice on
//! the same document yields the same paragraphs.

use crate::config::LayoutTuning;
use crate::error::ExtractionError;
use std::collections::{HashMap, HashSet};

/// Kind of a page block. Only [`BlockKind::Text`] contributes paragraphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockKind {
    #[default]
    Text,
    Image,
}

/// A page-scoped text fragment. Coordinates grow downwards from the top edge
/// of the page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextBlock {
    pub top: f32,
    pub bottom: f32,
    /// Block text; lines are separated by `\n`, blank lines end paragraphs.
    pub text: String,
    pub kind: BlockKind,
}

impl TextBlock {
    pub fn text(top: f32, bottom: f32, text: impl Into<String>) -> Self {
        Self {
            top,
            bottom,
            text: text.into(),
            kind: BlockKind::Text,
        }
    }
}

/// One page: its height and its blocks in reading order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageLayout {
    pub height: f32,
    pub blocks: Vec<TextBlock>,
}

/// Convert page blocks into ordered, non-empty paragraphs.
///
/// # Errors
/// [`ExtractionError::NoText`] when nothing survives filtering (image-only
/// or unreadable documents).
pub fn extract_paragraphs(
    pages: &[PageLayout],
    tuning: &LayoutTuning,
) -> Result<Vec<String>, ExtractionError> {
    let repeated = if pages.len() >= 2 {
        repeating_zone_text(pages, tuning)
    } else {
        HashSet::new()
    };

    let mut paragraphs = Vec::new();
    for page in pages {
        for block in page.blocks.iter().filter(|b| b.kind == BlockKind::Text) {
            if !repeated.is_empty() && repeated.contains(&normalise(&block.text)) {
                continue;
            }
            block_paragraphs(&block.text, &mut paragraphs);
        }
    }

    if paragraphs.is_empty() {
        return Err(ExtractionError::NoText);
    }
    Ok(paragraphs)
}

/// Normalised header/footer strings that appear on at least
/// `max(2, ceil(repeat_ratio × pages))` pages.
fn repeating_zone_text(pages: &[PageLayout], tuning: &LayoutTuning) -> HashSet<String> {
    let mut page_counts: HashMap<String, usize> = HashMap::new();

    for page in pages {
        let header_limit = page.height * tuning.header_zone_ratio;
        let footer_limit = page.height * (1.0 - tuning.footer_zone_ratio);
        let mut seen_on_page = HashSet::new();

        for block in page.blocks.iter().filter(|b| b.kind == BlockKind::Text) {
            let in_zone = block.top <= header_limit || block.bottom >= footer_limit;
            if !in_zone {
                continue;
            }
            let key = normalise(&block.text);
            if !key.is_empty() && seen_on_page.insert(key.clone()) {
                *page_counts.entry(key).or_default() += 1;
            }
        }
    }

    let threshold = repeat_threshold(pages.len(), tuning.repeat_ratio);
    page_counts
        .into_iter()
        .filter(|(_, count)| *count >= threshold)
        .map(|(text, _)| text)
        .collect()
}

fn repeat_threshold(page_count: usize, ratio: f64) -> usize {
    // Epsilon keeps float noise (0.6 × 5 = 3.0000001) from bumping the ceiling.
    let scaled = (ratio * page_count as f64 - 1e-9).ceil() as usize;
    scaled.max(2)
}

/// Collapse all whitespace runs to one space and trim.
pub fn normalise(text: &str) -> String {
    strip_invisible(text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_invisible(text: &str) -> String {
    text.replace(['\u{200B}', '\u{FEFF}', '\u{200C}', '\u{200D}', '\u{2060}'], "")
}

/// Append the paragraphs of one block to `out`.
fn block_paragraphs(text: &str, out: &mut Vec<String>) {
    let mut current = String::new();

    for raw in text.lines() {
        let line = clean_line(raw);
        if line.is_empty() {
            flush(&mut current, out);
            continue;
        }

        if current.is_empty() {
            current.push_str(&line);
        } else if current.ends_with('-') && starts_lowercase(&line) {
            current.pop();
            current.push_str(&line);
        } else {
            current.push(' ');
            current.push_str(&line);
        }
    }
    flush(&mut current, out);
}

fn clean_line(raw: &str) -> String {
    // A trailing soft hyphen marks a typeset word break; treat it as `-`.
    let raw = raw.trim_end();
    let raw = match raw.strip_suffix('\u{00AD}') {
        Some(rest) => format!("{rest}-"),
        None => raw.to_string(),
    };
    normalise(&raw.replace('\u{00AD}', ""))
}

fn starts_lowercase(line: &str) -> bool {
    line.chars().next().is_some_and(char::is_lowercase)
}

fn flush(current: &mut String, out: &mut Vec<String>) {
    let paragraph = current.trim();
    if !paragraph.is_empty() {
        out.push(paragraph.to_string());
    }
    current.clear();
}
