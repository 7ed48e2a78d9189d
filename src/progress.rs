//! Progress-callback trait for job pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::orchestrator::Pipeline::with_progress`] to observe a run as it
//! happens. The job store remains the durable record; callbacks are for live
//! display (a terminal progress bar, a websocket push) and carry the same
//! numbers that are persisted.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdftranslate::PipelineProgressCallback;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct BatchCounter(AtomicUsize);
//!
//! impl PipelineProgressCallback for BatchCounter {
//!     fn on_batch_complete(&self, _job_id: &str, batch: usize, total: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("batch {batch}/{total}");
//!     }
//! }
//! ```

use crate::job::{JobArtifacts, JobStage};
use std::sync::Arc;

/// Called by the orchestrator as a job advances.
///
/// All methods default to no-ops so implementors override only what they
/// need. Jobs for different ids may run concurrently, so implementations
/// must synchronise any shared state.
pub trait PipelineProgressCallback: Send + Sync {
    /// A stage was entered and persisted at `pct`.
    fn on_stage_start(&self, job_id: &str, stage: JobStage, pct: u8) {
        let _ = (job_id, stage, pct);
    }

    /// Progress moved forward within the current stage.
    fn on_progress(&self, job_id: &str, pct: u8) {
        let _ = (job_id, pct);
    }

    /// Translation batch `batch` (1-indexed) of `total` finished.
    fn on_batch_complete(&self, job_id: &str, batch: usize, total: usize) {
        let _ = (job_id, batch, total);
    }

    /// The job reached `done`.
    fn on_job_complete(&self, job_id: &str, artifacts: &JobArtifacts) {
        let _ = (job_id, artifacts);
    }

    /// The job reached `error` while in `stage`.
    fn on_job_failed(&self, job_id: &str, stage: JobStage, error: &str) {
        let _ = (job_id, stage, error);
    }
}

/// The default when no callback is configured.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
