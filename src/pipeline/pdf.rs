//! PDF reading: page text blocks and metadata via pdfium.
//!
//! ## Why a trait?
//!
//! The layout algorithm in [`crate::pipeline::layout`] only needs page
//! heights and positioned text blocks. Hiding pdfium behind
//! [`DocumentReader`] keeps that algorithm testable without a native library
//! and lets callers plug in another PDF backend.
//!
//! ## Why blocking?
//!
//! pdfium keeps thread-local state and is not async-safe. Every method here
//! is synchronous; [`crate::pipeline::extract`] runs them inside
//! `spawn_blocking` so request-facing runtime threads never stall on
//! parsing.
//!
//! ## From segments to blocks
//!
//! pdfium exposes text as rectangular segments (runs of characters sharing a
//! baseline and font). Segments on the same baseline are merged into a line;
//! consecutive lines separated by less than one line height form a block.
//! A wider gap starts a new block, which the layout stage treats as a
//! paragraph boundary.

use crate::error::ExtractionError;
use crate::pipeline::layout::{PageLayout, TextBlock};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Page count plus best-effort metadata, read without extracting text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentInfo {
    pub page_count: usize,
    pub title: Option<String>,
    pub author: Option<String>,
}

/// Source of positioned page text.
///
/// Implementations must report encrypted documents as
/// [`ExtractionError::PasswordProtected`], never as a generic parse failure.
pub trait DocumentReader: Send + Sync {
    /// Open the document and report its page count and metadata.
    ///
    /// Missing metadata is `None`, not an error.
    fn inspect(&self, path: &Path) -> Result<DocumentInfo, ExtractionError>;

    /// Read every page's text blocks, top to bottom.
    fn read_pages(&self, path: &Path) -> Result<Vec<PageLayout>, ExtractionError>;
}

/// [`DocumentReader`] backed by the pdfium shared library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumReader {
    library_path: Option<PathBuf>,
}

impl PdfiumReader {
    /// Bind to the library at `path` instead of searching for one.
    pub fn with_library(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }

    /// Honour `PDFIUM_LIB_PATH` when set, else search the working directory
    /// and system library paths.
    pub fn from_env() -> Self {
        match std::env::var("PDFIUM_LIB_PATH") {
            Ok(p) if !p.is_empty() => Self::with_library(p),
            _ => Self::default(),
        }
    }

    fn bind(&self) -> Result<Pdfium, ExtractionError> {
        let bindings = match &self.library_path {
            Some(path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| ExtractionError::BackendUnavailable(format!("{:?}", e)))?;
        Ok(Pdfium::new(bindings))
    }
}

fn open<'a>(pdfium: &'a Pdfium, path: &Path) -> Result<PdfDocument<'a>, ExtractionError> {
    pdfium.load_pdf_from_file(path, None).map_err(|e| {
        let detail = format!("{:?}", e);
        if detail.contains("Password") || detail.contains("password") {
            ExtractionError::PasswordProtected
        } else {
            ExtractionError::Unreadable { detail }
        }
    })
}

impl DocumentReader for PdfiumReader {
    fn inspect(&self, path: &Path) -> Result<DocumentInfo, ExtractionError> {
        let pdfium = self.bind()?;
        let document = open(&pdfium, path)?;

        let metadata = document.metadata();
        let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
            metadata.get(tag).and_then(|t| {
                let v = t.value().trim().to_string();
                if v.is_empty() {
                    None
                } else {
                    Some(v)
                }
            })
        };

        let info = DocumentInfo {
            page_count: document.pages().len() as usize,
            title: get_meta(PdfDocumentMetadataTagType::Title),
            author: get_meta(PdfDocumentMetadataTagType::Author),
        };
        debug!("Inspected {}: {:?}", path.display(), info);
        Ok(info)
    }

    fn read_pages(&self, path: &Path) -> Result<Vec<PageLayout>, ExtractionError> {
        let pdfium = self.bind()?;
        let document = open(&pdfium, path)?;

        let mut layouts = Vec::new();
        for (idx, page) in document.pages().iter().enumerate() {
            let height = page.height().value;
            let text = match page.text() {
                Ok(t) => t,
                Err(e) => {
                    warn!("Page {}: no text layer ({:?})", idx + 1, e);
                    layouts.push(PageLayout {
                        height,
                        blocks: Vec::new(),
                    });
                    continue;
                }
            };

            let segments: Vec<Segment> = text
                .segments()
                .iter()
                .map(|seg| {
                    let bounds = seg.bounds();
                    // pdfium's origin is bottom-left; flip to top-down.
                    Segment {
                        top: height - bounds.top().value,
                        bottom: height - bounds.bottom().value,
                        left: bounds.left().value,
                        text: seg.text(),
                    }
                })
                .collect();

            let blocks = group_blocks(segments);
            debug!("Page {}: {} blocks", idx + 1, blocks.len());
            layouts.push(PageLayout { height, blocks });
        }

        info!("Read {} pages from {}", layouts.len(), path.display());
        Ok(layouts)
    }
}

/// One positioned text run, top-down coordinates.
#[derive(Debug, Clone, PartialEq)]
struct Segment {
    top: f32,
    bottom: f32,
    left: f32,
    text: String,
}

struct Line {
    top: f32,
    bottom: f32,
    text: String,
}

/// Merge same-baseline segments into lines, then lines into blocks.
fn group_blocks(mut segments: Vec<Segment>) -> Vec<TextBlock> {
    segments.retain(|s| !s.text.trim().is_empty());
    segments.sort_by(|a, b| {
        a.top
            .total_cmp(&b.top)
            .then_with(|| a.left.total_cmp(&b.left))
    });

    let mut lines: Vec<Line> = Vec::new();
    for seg in segments {
        let height = (seg.bottom - seg.top).abs().max(1.0);
        match lines.last_mut() {
            Some(line) if (seg.top - line.top).abs() < height * 0.5 => {
                line.text.push(' ');
                line.text.push_str(seg.text.trim());
                line.bottom = line.bottom.max(seg.bottom);
            }
            _ => lines.push(Line {
                top: seg.top,
                bottom: seg.bottom,
                text: seg.text.trim().to_string(),
            }),
        }
    }

    let mut blocks: Vec<TextBlock> = Vec::new();
    let mut prev_bottom: Option<f32> = None;
    for line in lines {
        let line_height = (line.bottom - line.top).abs().max(1.0);
        let continues = prev_bottom.is_some_and(|b| line.top - b < line_height);
        match blocks.last_mut() {
            Some(block) if continues => {
                block.text.push('\n');
                block.text.push_str(&line.text);
                block.bottom = line.bottom;
            }
            _ => blocks.push(TextBlock::text(line.top, line.bottom, line.text)),
        }
        prev_bottom = Some(line.bottom);
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(top: f32, left: f32, text: &str) -> Segment {
        Segment {
            top,
            bottom: top + 12.0,
            left,
            text: text.to_string(),
        }
    }

    #[test]
    fn segments_on_one_baseline_form_a_line() {
        let blocks = group_blocks(vec![seg(100.0, 200.0, "world"), seg(100.5, 72.0, "Hello")]);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "Hello world");
    }

    #[test]
    fn close_lines_share_a_block_and_gaps_split() {
        let blocks = group_blocks(vec![
            seg(40.0, 72.0, "Chapter 1"),
            seg(120.0, 72.0, "Good-"),
            seg(134.0, 72.0, "bye now."),
            seg(200.0, 72.0, "Next block."),
        ]);
        let texts: Vec<&str> = blocks.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, vec!["Chapter 1", "Good-\nbye now.", "Next block."]);
        assert_eq!(blocks[1].top, 120.0);
        assert_eq!(blocks[1].bottom, 146.0);
    }

    #[test]
    fn blank_segments_are_dropped() {
        let blocks = group_blocks(vec![seg(10.0, 0.0, "   "), seg(50.0, 0.0, "Text")]);
        assert_eq!(blocks.len(), 1);
    }

    /// Skip unless a pdfium library and a sample file are available.
    macro_rules! pdfium_skip_unless_ready {
        () => {{
            if std::env::var("PDFIUM_E2E").is_err() {
                println!("SKIP: set PDFIUM_E2E=1 to run pdfium tests");
                return;
            }
        }};
    }

    #[test]
    fn missing_file_is_unreadable() {
        pdfium_skip_unless_ready!();
        let err = PdfiumReader::from_env()
            .inspect(Path::new("/definitely/not/here.pdf"))
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Unreadable { .. }));
    }
}
