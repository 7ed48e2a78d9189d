//! Error types for the edgequake-pdftranslate library.
//!
//! Errors are grouped by the collaborator that raises them:
//!
//! * [`ExtractionError`]: the source document cannot be turned into
//!   paragraphs (missing, oversized, encrypted, image-only). Terminal for the
//!   job and shown to the user verbatim, so every message says what to do.
//! * [`StorageError`]: an artifact or upload could not be read or written.
//! * [`JobStoreError`]: the job state backend (SQLite table or manifest
//!   file) failed.
//! * [`BookError`]: the top-level error returned by every public fallible
//!   API. Wraps the three above and adds configuration and translation
//!   provider failures.
//!
//! None of these are retried by the pipeline. The orchestrator converts any
//! of them into a terminal `error` job state with `to_string()` as the
//! message.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors returned by the public API.
#[derive(Debug, Error)]
pub enum BookError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or environment validation failed (budgets, backends).
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Requested target language is not in the configured allow-list.
    #[error("Unsupported target language '{lang}'. Supported: {}", allowed.join(", "))]
    UnsupportedLanguage { lang: String, allowed: Vec<String> },

    // ── Source errors ─────────────────────────────────────────────────────
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    // ── Translation provider errors ───────────────────────────────────────
    /// The provider answered with a different number of items than it was sent.
    #[error("Translation provider mismatch: sent {expected} items, received {actual}")]
    ProviderMismatch { expected: usize, actual: usize },

    /// The provider answer could not be parsed as a JSON array of strings.
    #[error("Translation provider returned an unparseable response: {0}")]
    ProviderFormat(String),

    /// Transport-level failure that persisted after all retries.
    #[error("Translation provider error: {0}")]
    Provider(String),

    // ── Artifact errors ───────────────────────────────────────────────────
    /// The e-book or flashcard file could not be assembled.
    #[error("Artifact assembly failed: {0}")]
    Artifact(String),

    // ── Persistence errors ────────────────────────────────────────────────
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    JobStore(#[from] JobStoreError),

    /// No job with this id exists in the configured job store.
    #[error("Job '{0}' not found")]
    JobNotFound(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (task panic, runtime construction).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a source document could not be turned into paragraphs.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Source file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    #[error("Source is not a PDF (first bytes: {magic:?})")]
    NotAPdf { magic: [u8; 4] },

    #[error("PDF size {size_bytes} bytes exceeds the {limit_bytes} byte limit")]
    TooLarge { size_bytes: u64, limit_bytes: u64 },

    #[error("PDF page count {pages} exceeds the limit of {limit} pages")]
    TooManyPages { pages: usize, limit: usize },

    /// Distinct from [`ExtractionError::Unreadable`] so callers can prompt
    /// for an unlocked copy.
    #[error("Encrypted PDF: the document is password-protected.\nRemove the password (e.g. qpdf --decrypt in.pdf out.pdf) and upload it again.")]
    PasswordProtected,

    #[error("PDF could not be parsed: {detail}")]
    Unreadable { detail: String },

    #[error("No extractable text found. The PDF may contain only scanned images.")]
    NoText,

    #[error("Document has {count} paragraphs, exceeding the limit of {limit}")]
    TooManyParagraphs { count: usize, limit: usize },

    #[error("PDF backend unavailable: {0}\nSet PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide.")]
    BackendUnavailable(String),
}

/// Artifact or upload storage failure.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O failed for '{location}': {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Artifact not found: '{location}'")]
    NotFound { location: String },

    #[error("Object storage request for '{location}' failed: {reason}")]
    Remote { location: String, reason: String },

    #[error("Invalid storage location '{0}'")]
    InvalidLocation(String),
}

/// Job state backend failure.
#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Manifest I/O failed for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Manifest '{path}' is malformed: {source}")]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Stored value is invalid: {0}")]
    InvalidValue(String),

    #[error("Job store lock poisoned")]
    LockPoisoned,

    #[error("Job '{job_id}' not found in store")]
    NotFound { job_id: String },

    #[error("Job '{job_id}' already exists")]
    AlreadyExists { job_id: String },

    #[error("Job store task failed: {0}")]
    Task(String),
}
