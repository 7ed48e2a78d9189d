//! Job submission and the stage state machine.
//!
//! ```text
//! queued ─▶ parse_pdf ─▶ translate ─▶ build_artifact ─▶ flashcards ─▶ finalize (done)
//!              │             │              │                │
//!              └─────────────┴──────────────┴────────────────┴──▶ error
//! ```
//!
//! Every stage persists `status=processing` with its start percentage
//! before doing any work, and progress only ever moves forward within a
//! run. Any error unwinds to [`Pipeline::run_job`], the single place that
//! writes the terminal `error` state. Artifacts written before the failure
//! stay in storage but are not recorded on the job; only `done` records
//! artifact locations.

use crate::config::PipelineConfig;
use crate::error::BookError;
use crate::job::{new_job_id, Job, JobArtifacts, JobStage, JobUpdate};
use crate::pipeline::budget::chunk_by_tokens;
use crate::pipeline::epub::{build_epub, EpubMetadata};
use crate::pipeline::extract::{extract_document, ExtractedDocument, ExtractionLimits};
use crate::pipeline::input::{stage_source, StagedSource};
use crate::pipeline::pdf::{DocumentReader, PdfiumReader};
use crate::pipeline::vocab::{build_flashcards, flashcards_csv, RuleTokenizer, Tokenizer};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::storage::{build_storage, ArtifactStorage};
use crate::store::{open_job_store, JobStore};
use crate::translator::{build_translator, Translator};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Artifact names under each job's storage prefix.
pub const PARAGRAPHS_ARTIFACT: &str = "paragraphs.json";
pub const TRANSLATIONS_ARTIFACT: &str = "translated_paragraphs.json";
pub const EPUB_ARTIFACT: &str = "book.epub";
pub const FLASHCARDS_ARTIFACT: &str = "flashcards.csv";

// Stage progress checkpoints.
const PARSE_START: u8 = 5;
const PARSE_STAGED: u8 = 20;
const PARSE_DONE: u8 = 30;
const TRANSLATE_START: u8 = 40;
const TRANSLATE_DONE: u8 = 75;
const BUILD_START: u8 = 80;
const BUILD_DONE: u8 = 95;
const CARDS_START: u8 = 96;
const CARDS_DONE: u8 = 98;

/// Per-run state threaded through the stages.
///
/// Holding the staged source here ties its lifetime to the run: when
/// `run_job` returns, on any path, the temporary copy is removed.
#[derive(Default)]
struct RunState {
    stage: JobStage,
    pct: u8,
    artifacts: JobArtifacts,
    staged: Option<StagedSource>,
}

/// The translation service: collaborators resolved once, shared by every
/// job run.
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    storage: Arc<dyn ArtifactStorage>,
    store: Arc<dyn JobStore>,
    translator: Arc<dyn Translator>,
    reader: Arc<dyn DocumentReader>,
    tokenizer: Arc<dyn Tokenizer>,
    progress: ProgressCallback,
}

impl Pipeline {
    /// Resolve every backend named in `config`.
    pub async fn from_config(config: PipelineConfig) -> Result<Self, BookError> {
        let storage = build_storage(&config.storage, &config.data_dir)?;
        let store = open_job_store(&config.job_store).await?;
        let translator = build_translator(&config)?;
        let reader: Arc<dyn DocumentReader> = Arc::new(PdfiumReader::from_env());
        Ok(Self::new(config, storage, store, translator, reader))
    }

    /// Assemble a pipeline from explicit collaborators.
    pub fn new(
        config: PipelineConfig,
        storage: Arc<dyn ArtifactStorage>,
        store: Arc<dyn JobStore>,
        translator: Arc<dyn Translator>,
        reader: Arc<dyn DocumentReader>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            storage,
            store,
            translator,
            reader,
            tokenizer: Arc::new(RuleTokenizer),
            progress: Arc::new(NoopProgressCallback),
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn ArtifactStorage> {
        &self.storage
    }

    /// Accept an upload: validate the language, store the bytes and create
    /// a `queued` job at 0 %.
    pub async fn submit(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        tgt_lang: &str,
    ) -> Result<Job, BookError> {
        let tgt_lang = tgt_lang.trim().to_ascii_lowercase();
        if !self.config.supports_target(&tgt_lang) {
            return Err(BookError::UnsupportedLanguage {
                lang: tgt_lang,
                allowed: self.config.target_langs.clone(),
            });
        }

        let filename = upload_filename(filename);
        let job_id = new_job_id();
        let source = self
            .storage
            .save(&job_id, &format!("uploads/{filename}"), bytes)
            .await?;

        let job = Job::new(&job_id, filename, source, tgt_lang);
        self.store.create(&job).await?;
        info!("Job {} queued ({} → {})", job.id, job.filename, job.tgt_lang);
        Ok(job)
    }

    /// Current state of a job.
    pub async fn status(&self, job_id: &str) -> Result<Job, BookError> {
        self.store
            .get(job_id)
            .await?
            .ok_or_else(|| BookError::JobNotFound(job_id.to_string()))
    }

    /// Run every stage of `job_id` to completion.
    ///
    /// On failure the job is left in `error` at the failing stage and the
    /// error is returned. Failures are not retried.
    pub async fn run_job(&self, job_id: &str) -> Result<Job, BookError> {
        let job = self.status(job_id).await?;
        let start = Instant::now();
        info!("Job {}: starting run for {}", job.id, job.filename);

        let mut run = RunState::default();
        let outcome = self.execute(&job, &mut run).await;
        // Drop the staged copy before reporting, whatever the outcome.
        drop(run.staged.take());

        match outcome {
            Ok(done) => {
                info!(
                    "Job {}: done in {:.1}s",
                    job.id,
                    start.elapsed().as_secs_f64()
                );
                self.progress.on_job_complete(&job.id, &done.artifacts);
                Ok(done)
            }
            Err(e) => {
                let message = e.to_string();
                error!("Job {} failed at {}: {}", job.id, run.stage, message);
                if let Err(store_err) = self
                    .store
                    .update(&job.id, &JobUpdate::failed(run.stage, &message))
                    .await
                {
                    error!("Job {}: could not record failure: {}", job.id, store_err);
                }
                self.progress.on_job_failed(&job.id, run.stage, &message);
                Err(e)
            }
        }
    }

    async fn execute(&self, job: &Job, run: &mut RunState) -> Result<Job, BookError> {
        let document = self.parse_pdf(job, run).await?;
        let translated = self.translate(job, run, &document.paragraphs).await?;
        self.build_artifact(job, run, &document, &translated).await?;
        self.flashcards(job, run, &translated).await?;

        run.stage = JobStage::Finalize;
        let done = self
            .store
            .update(&job.id, &JobUpdate::done(run.artifacts.clone()))
            .await?;
        Ok(done)
    }

    // ── Stages ───────────────────────────────────────────────────────────

    async fn parse_pdf(
        &self,
        job: &Job,
        run: &mut RunState,
    ) -> Result<ExtractedDocument, BookError> {
        self.enter(job, run, JobStage::ParsePdf, PARSE_START).await?;

        let staged = stage_source(self.storage.as_ref(), &job.source).await?;
        let path = staged.path().to_path_buf();
        run.staged = Some(staged);
        self.advance(job, run, PARSE_STAGED).await?;

        let document = extract_document(
            Arc::clone(&self.reader),
            path,
            ExtractionLimits::from(self.config.as_ref()),
        )
        .await?;

        let body = to_json(&json!({ "paragraphs": document.paragraphs }))?;
        let location = self
            .storage
            .save(&job.id, PARAGRAPHS_ARTIFACT, body)
            .await?;
        run.artifacts.paragraphs_path = Some(location);
        self.advance(job, run, PARSE_DONE).await?;
        Ok(document)
    }

    async fn translate(
        &self,
        job: &Job,
        run: &mut RunState,
        paragraphs: &[String],
    ) -> Result<Vec<String>, BookError> {
        self.enter(job, run, JobStage::Translate, TRANSLATE_START)
            .await?;

        let src = self.config.source_lang.as_str();
        let batches = chunk_by_tokens(
            paragraphs,
            self.config.max_tokens,
            self.config.reserved_tokens,
        )?;
        let total = batches.len();
        info!(
            "Job {}: translating {} paragraphs in {} batches with {}",
            job.id,
            paragraphs.len(),
            total,
            self.translator.name()
        );

        let mut translated = Vec::with_capacity(paragraphs.len());
        for (i, batch) in batches.into_iter().enumerate() {
            let out = self
                .translator
                .translate_batch(batch, src, &job.tgt_lang)
                .await?;
            if out.len() != batch.len() {
                return Err(BookError::ProviderMismatch {
                    expected: batch.len(),
                    actual: out.len(),
                });
            }
            translated.extend(out);

            debug!("Job {}: batch {}/{} done", job.id, i + 1, total);
            self.progress.on_batch_complete(&job.id, i + 1, total);
            let pct = stage_fraction(TRANSLATE_START, TRANSLATE_DONE, i + 1, total);
            self.advance(job, run, pct).await?;
        }

        let body = to_json(&json!({
            "source_language": src,
            "target_language": job.tgt_lang,
            "paragraphs": translated,
        }))?;
        let location = self
            .storage
            .save(&job.id, TRANSLATIONS_ARTIFACT, body)
            .await?;
        run.artifacts.translations_path = Some(location);
        self.advance(job, run, TRANSLATE_DONE).await?;
        Ok(translated)
    }

    async fn build_artifact(
        &self,
        job: &Job,
        run: &mut RunState,
        document: &ExtractedDocument,
        translated: &[String],
    ) -> Result<(), BookError> {
        self.enter(job, run, JobStage::BuildArtifact, BUILD_START)
            .await?;

        let meta = EpubMetadata {
            title: document
                .info
                .title
                .clone()
                .unwrap_or_else(|| title_from_filename(&job.filename)),
            author: document
                .info
                .author
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            language: job.tgt_lang.clone(),
            identifier: job.id.clone(),
        };
        debug!("Job {}: EPUB metadata {:?}", job.id, meta);

        let paragraphs = translated.to_vec();
        let bytes = tokio::task::spawn_blocking(move || build_epub(&paragraphs, &meta))
            .await
            .map_err(|e| BookError::Internal(format!("EPUB task panicked: {}", e)))??;

        let location = self.storage.save(&job.id, EPUB_ARTIFACT, bytes).await?;
        run.artifacts.epub_path = Some(location);
        self.advance(job, run, BUILD_DONE).await
    }

    async fn flashcards(
        &self,
        job: &Job,
        run: &mut RunState,
        translated: &[String],
    ) -> Result<(), BookError> {
        self.enter(job, run, JobStage::Flashcards, CARDS_START).await?;

        let cards = build_flashcards(
            translated,
            &job.tgt_lang,
            &self.config.source_lang,
            self.translator.as_ref(),
            self.tokenizer.as_ref(),
            &self.config.vocabulary,
        )
        .await?;
        info!("Job {}: {} flashcards", job.id, cards.len());

        let location = self
            .storage
            .save(&job.id, FLASHCARDS_ARTIFACT, flashcards_csv(&cards).into_bytes())
            .await?;
        run.artifacts.cards_path = Some(location);
        self.advance(job, run, CARDS_DONE).await
    }

    // ── State persistence ────────────────────────────────────────────────

    async fn enter(
        &self,
        job: &Job,
        run: &mut RunState,
        stage: JobStage,
        pct: u8,
    ) -> Result<(), BookError> {
        run.stage = stage;
        run.pct = run.pct.max(pct);
        self.store
            .update(&job.id, &JobUpdate::processing(stage, run.pct))
            .await?;
        info!("Job {}: {} ({}%)", job.id, stage, run.pct);
        self.progress.on_stage_start(&job.id, stage, run.pct);
        Ok(())
    }

    /// Persist `pct` if it moves progress forward.
    async fn advance(&self, job: &Job, run: &mut RunState, pct: u8) -> Result<(), BookError> {
        if pct <= run.pct {
            return Ok(());
        }
        run.pct = pct;
        self.store
            .update(&job.id, &JobUpdate::progress(pct))
            .await?;
        self.progress.on_progress(&job.id, pct);
        Ok(())
    }
}

/// Map `done` of `total` into the `[start, end]` percentage range.
fn stage_fraction(start: u8, end: u8, done: usize, total: usize) -> u8 {
    if total == 0 {
        return end;
    }
    let span = (end - start) as usize;
    start + (span * done.min(total) / total) as u8
}

fn to_json(value: &serde_json::Value) -> Result<Vec<u8>, BookError> {
    serde_json::to_vec_pretty(value)
        .map_err(|e| BookError::Artifact(format!("JSON encoding failed: {}", e)))
}

/// Keep only the final path component of a client-supplied filename.
fn upload_filename(raw: &str) -> String {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim()
        .trim_start_matches('.');
    if name.is_empty() {
        "upload.pdf".to_string()
    } else {
        name.to_string()
    }
}

fn title_from_filename(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.replace(['_', '-'], " "))
        .unwrap_or_else(|| filename.to_string())
}
