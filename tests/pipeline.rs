//! End-to-end pipeline tests.
//!
//! PDF parsing is replaced by a scripted [`DocumentReader`] so these run
//! without libpdfium; everything downstream (storage, job store, batching,
//! translation, EPUB and flashcards) is the real implementation.
//!
//! Tests against a real pdfium build are gated behind `PDFIUM_E2E`:
//!   PDFIUM_E2E=1 PDFIUM_LIB_PATH=/path/to/libpdfium cargo test --test pipeline

use async_trait::async_trait;
use edgequake_pdftranslate::pipeline::layout::{PageLayout, TextBlock};
use edgequake_pdftranslate::pipeline::pdf::{DocumentInfo, DocumentReader, PdfiumReader};
use edgequake_pdftranslate::storage::{ArtifactStorage, LocalStorage};
use edgequake_pdftranslate::store::{JobStore, ManifestJobStore, SqliteJobStore};
use edgequake_pdftranslate::{
    BookError, ExtractionError, JobArtifacts, JobStage, JobStatus, LocalTranslator, Pipeline,
    PipelineConfig, PipelineProgressCallback, Translator,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const FAKE_PDF: &[u8] = b"%PDF-1.4\n% scripted\n";

// ── Test helpers ─────────────────────────────────────────────────────────────

struct ScriptedReader {
    pages: Vec<PageLayout>,
    title: Option<String>,
}

impl ScriptedReader {
    fn new(pages: Vec<PageLayout>) -> Arc<Self> {
        Arc::new(Self { pages, title: None })
    }
}

impl DocumentReader for ScriptedReader {
    fn inspect(&self, _path: &Path) -> Result<DocumentInfo, ExtractionError> {
        Ok(DocumentInfo {
            page_count: self.pages.len(),
            title: self.title.clone(),
            author: None,
        })
    }

    fn read_pages(&self, _path: &Path) -> Result<Vec<PageLayout>, ExtractionError> {
        Ok(self.pages.clone())
    }
}

fn page(blocks: Vec<TextBlock>) -> PageLayout {
    PageLayout {
        height: 800.0,
        blocks,
    }
}

fn body(text: &str) -> TextBlock {
    TextBlock::text(200.0, 260.0, text)
}

enum Store {
    Sqlite,
    Manifests,
}

struct Harness {
    _dir: tempfile::TempDir,
    storage: Arc<dyn ArtifactStorage>,
    pipeline: Pipeline,
}

async fn harness(
    store: Store,
    reader: Arc<dyn DocumentReader>,
    translator: Arc<dyn Translator>,
    config: PipelineConfig,
) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn ArtifactStorage> = Arc::new(LocalStorage::new(dir.path()));
    let store: Arc<dyn JobStore> = match store {
        Store::Sqlite => Arc::new(
            SqliteJobStore::open(dir.path().join("app.db"))
                .await
                .unwrap(),
        ),
        Store::Manifests => Arc::new(
            ManifestJobStore::open(dir.path().join("manifests"))
                .await
                .unwrap(),
        ),
    };
    let pipeline = Pipeline::new(config, Arc::clone(&storage), store, translator, reader);
    Harness {
        _dir: dir,
        storage,
        pipeline,
    }
}

async fn read_json(
    storage: &Arc<dyn ArtifactStorage>,
    location: &Option<String>,
) -> serde_json::Value {
    let bytes = storage.read(location.as_deref().unwrap()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Records every callback event in order.
#[derive(Default)]
struct Recorder {
    stages: Mutex<Vec<(JobStage, u8)>>,
    pcts: Mutex<Vec<u8>>,
    batches: Mutex<Vec<(usize, usize)>>,
    failed: Mutex<Option<(JobStage, String)>>,
    completed: Mutex<bool>,
}

impl PipelineProgressCallback for Recorder {
    fn on_stage_start(&self, _job_id: &str, stage: JobStage, pct: u8) {
        self.stages.lock().unwrap().push((stage, pct));
        self.pcts.lock().unwrap().push(pct);
    }

    fn on_progress(&self, _job_id: &str, pct: u8) {
        self.pcts.lock().unwrap().push(pct);
    }

    fn on_batch_complete(&self, _job_id: &str, batch: usize, total: usize) {
        self.batches.lock().unwrap().push((batch, total));
    }

    fn on_job_complete(&self, _job_id: &str, _artifacts: &JobArtifacts) {
        *self.completed.lock().unwrap() = true;
    }

    fn on_job_failed(&self, _job_id: &str, stage: JobStage, error: &str) {
        *self.failed.lock().unwrap() = Some((stage, error.to_string()));
    }
}

/// Drops the last item of every batch.
struct ShortTranslator;

#[async_trait]
impl Translator for ShortTranslator {
    fn name(&self) -> &str {
        "short"
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        _src: &str,
        _tgt: &str,
    ) -> Result<Vec<String>, BookError> {
        Ok(texts[..texts.len().saturating_sub(1)].to_vec())
    }
}

// ── Scenarios ────────────────────────────────────────────────────────────────

async fn offline_run_completes(store: Store) {
    let h = harness(
        store,
        ScriptedReader::new(vec![page(vec![body("hi")])]),
        Arc::new(LocalTranslator),
        PipelineConfig::default(),
    )
    .await;

    let job = h.pipeline.submit("book.pdf", FAKE_PDF.to_vec(), "es").await.unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.pct, 0);

    let done = h.pipeline.run_job(&job.id).await.unwrap();
    assert_eq!(done.status, JobStatus::Done);
    assert_eq!(done.stage, JobStage::Finalize);
    assert_eq!(done.pct, 100);
    assert!(done.error.is_none());
    assert!(done.artifacts.is_complete());

    let translated = read_json(&h.storage, &done.artifacts.translations_path).await;
    assert_eq!(translated["paragraphs"], serde_json::json!(["[es] hi"]));
    assert_eq!(translated["target_language"], "es");

    let paragraphs = read_json(&h.storage, &done.artifacts.paragraphs_path).await;
    assert_eq!(paragraphs["paragraphs"], serde_json::json!(["hi"]));

    let epub = h
        .storage
        .read(done.artifacts.epub_path.as_deref().unwrap())
        .await
        .unwrap();
    assert!(epub.starts_with(b"PK"));

    let cards = h
        .storage
        .read(done.artifacts.cards_path.as_deref().unwrap())
        .await
        .unwrap();
    let cards = String::from_utf8(cards).unwrap();
    assert!(cards.starts_with("word,translation,count,score\n"));
    assert!(cards.contains("hi,[en] hi,1,"));

    let polled = h.pipeline.status(&job.id).await.unwrap();
    assert_eq!(polled, done);
}

#[tokio::test]
async fn offline_run_completes_with_sqlite() {
    offline_run_completes(Store::Sqlite).await;
}

#[tokio::test]
async fn offline_run_completes_with_manifests() {
    offline_run_completes(Store::Manifests).await;
}

#[tokio::test]
async fn running_headers_are_removed_and_words_rejoined() {
    let header = || TextBlock::text(20.0, 40.0, "Chapter 1");
    let reader = ScriptedReader::new(vec![
        page(vec![header(), body("Hello world.")]),
        page(vec![header(), body("Good-\nbye now.")]),
    ]);
    let h = harness(
        Store::Sqlite,
        reader,
        Arc::new(LocalTranslator),
        PipelineConfig::default(),
    )
    .await;

    let job = h.pipeline.submit("novel.pdf", FAKE_PDF.to_vec(), "fr").await.unwrap();
    let done = h.pipeline.run_job(&job.id).await.unwrap();

    let paragraphs = read_json(&h.storage, &done.artifacts.paragraphs_path).await;
    assert_eq!(
        paragraphs["paragraphs"],
        serde_json::json!(["Hello world.", "Goodbye now."])
    );
    let translated = read_json(&h.storage, &done.artifacts.translations_path).await;
    assert_eq!(
        translated["paragraphs"],
        serde_json::json!(["[fr] Hello world.", "[fr] Goodbye now."])
    );
}

#[tokio::test]
async fn page_limit_fails_in_parse_stage() {
    let pages = (0..3).map(|i| page(vec![body(&format!("Page {i}"))])).collect();
    let config = PipelineConfig::builder().max_pages(2).build().unwrap();
    let h = harness(
        Store::Manifests,
        ScriptedReader::new(pages),
        Arc::new(LocalTranslator),
        config,
    )
    .await;

    let job = h.pipeline.submit("big.pdf", FAKE_PDF.to_vec(), "es").await.unwrap();
    let err = h.pipeline.run_job(&job.id).await.unwrap_err();
    assert!(matches!(
        err,
        BookError::Extraction(ExtractionError::TooManyPages { pages: 3, limit: 2 })
    ));

    let failed = h.pipeline.status(&job.id).await.unwrap();
    assert_eq!(failed.status, JobStatus::Error);
    assert_eq!(failed.stage, JobStage::ParsePdf);
    assert!(failed.error.unwrap().contains("page count"));
    assert_eq!(failed.artifacts, JobArtifacts::default());
}

#[tokio::test]
async fn short_translation_fails_without_artifacts() {
    let recorder = Arc::new(Recorder::default());
    let h = harness(
        Store::Sqlite,
        ScriptedReader::new(vec![page(vec![body("One.\n\nTwo.")])]),
        Arc::new(ShortTranslator),
        PipelineConfig::default(),
    )
    .await;
    let pipeline = h.pipeline.clone().with_progress(recorder.clone());

    let job = pipeline.submit("book.pdf", FAKE_PDF.to_vec(), "es").await.unwrap();
    let err = pipeline.run_job(&job.id).await.unwrap_err();
    assert!(matches!(
        err,
        BookError::ProviderMismatch {
            expected: 2,
            actual: 1
        }
    ));

    let failed = pipeline.status(&job.id).await.unwrap();
    assert_eq!(failed.status, JobStatus::Error);
    assert_eq!(failed.stage, JobStage::Translate);
    assert!(failed.error.as_deref().unwrap().contains("mismatch"));
    assert!(failed.artifacts.epub_path.is_none());

    let (stage, message) = recorder.failed.lock().unwrap().clone().unwrap();
    assert_eq!(stage, JobStage::Translate);
    assert!(message.contains("mismatch"));
    assert!(!*recorder.completed.lock().unwrap());
}

#[tokio::test]
async fn progress_is_monotonic_across_stages() {
    let recorder = Arc::new(Recorder::default());
    let paragraphs: String = (0..30)
        .map(|i| format!("Paragraph number {i} with some words in it."))
        .collect::<Vec<_>>()
        .join("\n\n");
    // Small window: several translation batches.
    let config = PipelineConfig::builder()
        .token_budget(64, 16)
        .build()
        .unwrap();
    let h = harness(
        Store::Manifests,
        ScriptedReader::new(vec![page(vec![body(&paragraphs)])]),
        Arc::new(LocalTranslator),
        config,
    )
    .await;
    let pipeline = h.pipeline.clone().with_progress(recorder.clone());

    let job = pipeline.submit("book.pdf", FAKE_PDF.to_vec(), "de").await.unwrap();
    pipeline.run_job(&job.id).await.unwrap();

    let stages: Vec<JobStage> = recorder.stages.lock().unwrap().iter().map(|s| s.0).collect();
    assert_eq!(
        stages,
        vec![
            JobStage::ParsePdf,
            JobStage::Translate,
            JobStage::BuildArtifact,
            JobStage::Flashcards
        ]
    );

    let pcts = recorder.pcts.lock().unwrap().clone();
    assert!(pcts.windows(2).all(|w| w[0] <= w[1]), "{pcts:?}");
    assert!(pcts.iter().all(|&p| p < 100));

    let batches = recorder.batches.lock().unwrap().clone();
    assert!(batches.len() > 1);
    assert_eq!(batches.last().map(|b| b.0), Some(batches[0].1));
    assert!(*recorder.completed.lock().unwrap());
}

#[tokio::test]
async fn unsupported_language_is_rejected_at_submit() {
    let h = harness(
        Store::Sqlite,
        ScriptedReader::new(vec![page(vec![body("hi")])]),
        Arc::new(LocalTranslator),
        PipelineConfig::default(),
    )
    .await;

    let err = h
        .pipeline
        .submit("book.pdf", FAKE_PDF.to_vec(), "xx")
        .await
        .unwrap_err();
    assert!(matches!(err, BookError::UnsupportedLanguage { .. }));
    assert!(err.to_string().contains("es"));
}

#[tokio::test]
async fn non_pdf_upload_fails_in_parse_stage() {
    let h = harness(
        Store::Sqlite,
        ScriptedReader::new(vec![page(vec![body("hi")])]),
        Arc::new(LocalTranslator),
        PipelineConfig::default(),
    )
    .await;

    let job = h
        .pipeline
        .submit("notes.pdf", b"just text".to_vec(), "es")
        .await
        .unwrap();
    let err = h.pipeline.run_job(&job.id).await.unwrap_err();
    assert!(matches!(
        err,
        BookError::Extraction(ExtractionError::NotAPdf { .. })
    ));
    let failed = h.pipeline.status(&job.id).await.unwrap();
    assert_eq!(failed.stage, JobStage::ParsePdf);
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let h = harness(
        Store::Manifests,
        ScriptedReader::new(Vec::new()),
        Arc::new(LocalTranslator),
        PipelineConfig::default(),
    )
    .await;
    let err = h.pipeline.status("0000000000000000").await.unwrap_err();
    assert!(matches!(err, BookError::JobNotFound(_)));
}

#[tokio::test]
async fn document_title_becomes_book_title() {
    let reader = Arc::new(ScriptedReader {
        pages: vec![page(vec![body("hi")])],
        title: Some("Moby Dick".to_string()),
    });
    let h = harness(
        Store::Sqlite,
        reader,
        Arc::new(LocalTranslator),
        PipelineConfig::default(),
    )
    .await;

    let job = h.pipeline.submit("upload_1.pdf", FAKE_PDF.to_vec(), "it").await.unwrap();
    let done = h.pipeline.run_job(&job.id).await.unwrap();
    let epub = h
        .storage
        .read(done.artifacts.epub_path.as_deref().unwrap())
        .await
        .unwrap();

    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(epub)).unwrap();
    let mut opf = String::new();
    std::io::Read::read_to_string(&mut archive.by_name("OEBPS/content.opf").unwrap(), &mut opf)
        .unwrap();
    assert!(opf.contains("<dc:title>Moby Dick</dc:title>"));
    assert!(opf.contains("<dc:language>it</dc:language>"));
}

// ── Real pdfium (gated) ──────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip unless PDFIUM_E2E is set and a PDF exists at `path`.
macro_rules! pdfium_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("PDFIUM_E2E").is_err() {
            println!("SKIP: set PDFIUM_E2E=1 to run pdfium tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test file not found: {}", p.display());
            return;
        }
        p
    }};
}

#[tokio::test]
async fn real_pdf_translates_offline() {
    let path = pdfium_skip_unless_ready!(test_cases_dir().join("sample.pdf"));
    let h = harness(
        Store::Sqlite,
        Arc::new(PdfiumReader::from_env()),
        Arc::new(LocalTranslator),
        PipelineConfig::default(),
    )
    .await;

    let bytes = std::fs::read(&path).unwrap();
    let job = h.pipeline.submit("sample.pdf", bytes, "es").await.unwrap();
    let done = h.pipeline.run_job(&job.id).await.unwrap();
    assert_eq!(done.status, JobStatus::Done);

    let translated = read_json(&h.storage, &done.artifacts.translations_path).await;
    let paragraphs = translated["paragraphs"].as_array().unwrap();
    assert!(!paragraphs.is_empty());
    assert!(paragraphs
        .iter()
        .all(|p| p.as_str().unwrap().starts_with("[es] ")));
}
