//! # edgequake-pdftranslate
//!
//! Turn a PDF book into a translated EPUB e-book plus a vocabulary
//! flashcard deck, through a staged job pipeline with durable state.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload ─▶ submit (queued, 0%)
//!            │
//!            ├─ 1. parse_pdf       limits, text layout, header/footer removal
//!            ├─ 2. translate       token-budgeted batches through the gateway
//!            ├─ 3. build_artifact  EPUB 3 container
//!            ├─ 4. flashcards      ranked vocabulary, one gloss call, CSV
//!            └─ 5. finalize        done, 100%, artifact locations recorded
//! ```
//!
//! Every stage persists its state before running, so a client polling
//! [`Pipeline::status`] always sees where a job is and, on failure, the
//! stage and message that stopped it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdftranslate::{Pipeline, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads DATA_DIR, TRANSLATOR_PROVIDER, DB_MODE, TARGET_LANGS, …
//!     let config = PipelineConfig::from_env()?;
//!     let pipeline = Pipeline::from_config(config).await?;
//!
//!     let bytes = std::fs::read("moby-dick.pdf")?;
//!     let job = pipeline.submit("moby-dick.pdf", bytes, "es").await?;
//!     let done = pipeline.run_job(&job.id).await?;
//!     println!("{:?}", done.artifacts.epub_path);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdftranslate` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! ## Backends
//!
//! | Concern      | Options |
//! |--------------|---------|
//! | Translation  | offline stub (default), any edgequake-llm provider |
//! | Artifacts    | local directory (default), S3-compatible bucket (AWS, MinIO) |
//! | Job state    | SQLite (default), one JSON manifest per job |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod storage;
pub mod store;
pub mod translator;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    JobStoreBackend, LayoutTuning, ObjectStoreConfig, PipelineConfig, PipelineConfigBuilder,
    StorageBackend, TranslatorKind, VocabularyTuning,
};
pub use error::{BookError, ExtractionError, JobStoreError, StorageError};
pub use job::{Job, JobArtifacts, JobStage, JobStatus, JobUpdate};
pub use orchestrator::Pipeline;
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use translator::{LocalTranslator, Translator};
