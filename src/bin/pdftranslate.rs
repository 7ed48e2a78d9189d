//! CLI binary for edgequake-pdftranslate.
//!
//! A thin shim over the library crate: flags are layered over the process
//! environment, the PDF is submitted and run to completion, and the final
//! job record is printed.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdftranslate::{
    Job, JobArtifacts, JobStage, JobStatus, Pipeline, PipelineConfig, PipelineProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Renders the job's persisted percentage as a live bar.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold:>14}  [{bar:42.green/238}] {pos:>3}%  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("queued");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, _job_id: &str, stage: JobStage, pct: u8) {
        self.bar.set_prefix(stage.as_str());
        self.bar.set_message("");
        self.bar.set_position(pct as u64);
    }

    fn on_progress(&self, _job_id: &str, pct: u8) {
        self.bar.set_position(pct as u64);
    }

    fn on_batch_complete(&self, _job_id: &str, batch: usize, total: usize) {
        self.bar.set_message(format!("batch {batch}/{total}"));
    }

    fn on_job_complete(&self, _job_id: &str, _artifacts: &JobArtifacts) {
        self.bar.finish_and_clear();
    }

    fn on_job_failed(&self, _job_id: &str, stage: JobStage, _error: &str) {
        self.bar.abandon_with_message(red(&format!("failed at {stage}")));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Offline run with the stub translator
  pdftranslate book.pdf --lang es

  # Translate with an LLM provider
  pdftranslate book.pdf --lang fr --translator openai --model gpt-4o-mini

  # Keep job state as JSON manifests instead of SQLite
  pdftranslate book.pdf --lang de --store manifests --data-dir ./data

  # Inspect a job
  pdftranslate --status 3f2a9c0b1d4e5f60

ENVIRONMENT VARIABLES:
  DATA_DIR                    Root for artifacts, manifests and app.db
  TRANSLATOR_PROVIDER         local (default), openai, anthropic, gemini, ollama, auto
  EDGEQUAKE_MODEL             Model for the remote translator
  DB_MODE / DB_PATH           sqlite (default) or manifests
  STORAGE_BACKEND             local (default) or s3
  S3_ENDPOINT / S3_BUCKET     Object store URL and bucket
  S3_ACCESS_KEY / S3_SECRET_KEY / S3_REGION
                              SigV4 credentials and region (default us-east-1)
  TARGET_LANGS                Comma-separated allowed target languages
  DEFAULT_SRC_LANG            Language of the uploaded books
  MAX_PDF_MB / MAX_PAGES      Upload limits
  MAX_TOKENS                  Provider window per translation request
  PDFIUM_LIB_PATH             Path to libpdfium
"#;

/// Translate a PDF book into an EPUB and a flashcard deck.
#[derive(Parser, Debug)]
#[command(
    name = "pdftranslate",
    version,
    about = "Translate a PDF book into an EPUB e-book and vocabulary flashcards",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF file to translate.
    #[arg(required_unless_present = "status")]
    input: Option<PathBuf>,

    /// Target language code (e.g. es, fr, de).
    #[arg(short, long, default_value = "es")]
    lang: String,

    /// Translation gateway: local, or an edgequake-llm provider name.
    #[arg(long, env = "TRANSLATOR_PROVIDER")]
    translator: Option<String>,

    /// LLM model ID for the remote translator.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Job store: sqlite or manifests.
    #[arg(long, env = "DB_MODE")]
    store: Option<String>,

    /// Data directory for artifacts and job state.
    #[arg(long, env = "DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Print the record of an existing job and exit.
    #[arg(long, value_name = "JOB_ID")]
    status: Option<String>,

    /// Print the final job record as JSON.
    #[arg(long)]
    json: bool,

    /// Disable the progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Value for a configuration key: the flag when given, else the
    /// environment.
    fn lookup(&self, key: &str) -> Option<String> {
        let flag = match key {
            "TRANSLATOR_PROVIDER" => self.translator.clone(),
            "EDGEQUAKE_MODEL" => self.model.clone(),
            "DB_MODE" => self.store.clone(),
            "DATA_DIR" => self
                .data_dir
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            _ => None,
        };
        flag.or_else(|| std::env::var(key).ok())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.no_progress && !cli.json && cli.status.is_none();
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build pipeline ───────────────────────────────────────────────────
    let config =
        PipelineConfig::from_lookup(|key| cli.lookup(key)).context("Invalid configuration")?;
    let mut pipeline = Pipeline::from_config(config)
        .await
        .context("Failed to initialise pipeline")?;

    // ── Status-only mode ─────────────────────────────────────────────────
    if let Some(ref job_id) = cli.status {
        let job = pipeline.status(job_id).await?;
        println!(
            "{}",
            serde_json::to_string_pretty(&job).context("Failed to serialise job")?
        );
        return Ok(());
    }

    if show_progress {
        pipeline = pipeline.with_progress(CliProgressCallback::new());
    }

    // ── Submit and run ───────────────────────────────────────────────────
    let Some(ref input) = cli.input else {
        anyhow::bail!("No input PDF given");
    };
    let bytes = tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let filename = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.pdf".to_string());

    let job = pipeline
        .submit(&filename, bytes, &cli.lang)
        .await
        .context("Upload rejected")?;
    eprintln!("{} job {}", dim("◆"), bold(&job.id));

    let outcome = pipeline.run_job(&job.id).await;
    let record = pipeline.status(&job.id).await?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&record).context("Failed to serialise job")?
        );
    } else {
        print_summary(&record);
    }

    outcome.map(|_| ()).context("Translation failed")
}

fn print_summary(job: &Job) {
    match job.status {
        JobStatus::Done => {
            eprintln!("{} {} → {}", green("✔"), job.filename, job.tgt_lang);
            let artifacts = [
                ("paragraphs", &job.artifacts.paragraphs_path),
                ("translation", &job.artifacts.translations_path),
                ("epub", &job.artifacts.epub_path),
                ("flashcards", &job.artifacts.cards_path),
            ];
            for (label, location) in artifacts {
                if let Some(location) = location {
                    eprintln!("   {:<12} {}", dim(label), location);
                }
            }
        }
        _ => {
            eprintln!(
                "{} {} at {}: {}",
                red("✘"),
                job.status,
                job.stage,
                job.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
}
