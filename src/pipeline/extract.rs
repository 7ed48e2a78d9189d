//! The extraction stage: limits, then layout analysis.
//!
//! Limits are enforced in the cheapest order: file size from filesystem
//! metadata, then page count from the document header, and only then the
//! full text pass. An oversized or encrypted upload is rejected without
//! ever reading its pages.

use crate::config::{LayoutTuning, PipelineConfig};
use crate::error::{BookError, ExtractionError};
use crate::pipeline::layout::extract_paragraphs;
use crate::pipeline::pdf::{DocumentInfo, DocumentReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Paragraphs plus whatever metadata the document carried.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedDocument {
    pub paragraphs: Vec<String>,
    pub info: DocumentInfo,
}

/// The subset of [`PipelineConfig`] extraction depends on.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionLimits {
    pub max_source_bytes: u64,
    pub max_pages: usize,
    pub max_paragraphs: usize,
    pub layout: LayoutTuning,
}

impl From<&PipelineConfig> for ExtractionLimits {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_source_bytes: config.max_source_bytes(),
            max_pages: config.max_pages,
            max_paragraphs: config.max_paragraphs,
            layout: config.layout,
        }
    }
}

/// Run [`extract_blocking`] on the blocking pool.
pub async fn extract_document(
    reader: Arc<dyn DocumentReader>,
    path: PathBuf,
    limits: ExtractionLimits,
) -> Result<ExtractedDocument, BookError> {
    tokio::task::spawn_blocking(move || extract_blocking(reader.as_ref(), &path, &limits))
        .await
        .map_err(|e| BookError::Internal(format!("Extraction task panicked: {}", e)))?
        .map_err(BookError::from)
}

/// Check limits and turn the document at `path` into paragraphs.
pub fn extract_blocking(
    reader: &dyn DocumentReader,
    path: &Path,
    limits: &ExtractionLimits,
) -> Result<ExtractedDocument, ExtractionError> {
    let size_bytes = std::fs::metadata(path)
        .map_err(|_| ExtractionError::FileNotFound {
            path: path.to_path_buf(),
        })?
        .len();
    if size_bytes > limits.max_source_bytes {
        return Err(ExtractionError::TooLarge {
            size_bytes,
            limit_bytes: limits.max_source_bytes,
        });
    }

    let info = reader.inspect(path)?;
    if info.page_count > limits.max_pages {
        return Err(ExtractionError::TooManyPages {
            pages: info.page_count,
            limit: limits.max_pages,
        });
    }
    debug!("{} pages, {} bytes", info.page_count, size_bytes);

    let pages = reader.read_pages(path)?;
    let paragraphs = extract_paragraphs(&pages, &limits.layout)?;
    if paragraphs.len() > limits.max_paragraphs {
        return Err(ExtractionError::TooManyParagraphs {
            count: paragraphs.len(),
            limit: limits.max_paragraphs,
        });
    }

    info!(
        "Extracted {} paragraphs from {} pages",
        paragraphs.len(),
        info.page_count
    );
    Ok(ExtractedDocument { paragraphs, info })
}
