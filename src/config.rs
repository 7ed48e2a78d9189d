//! Configuration types for the translation pipeline.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`] or loaded from the process environment with
//! [`PipelineConfig::from_env`]. The config is read once at startup and shared
//! immutably by every job run; nothing in the pipeline mutates it.
//!
//! Backend selection (translator, artifact storage, job store) is resolved
//! here into plain enums. The orchestrator turns each enum into a trait object
//! exactly once and never branches on the variant afterwards.

use crate::error::BookError;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default per-request token window for the remote provider.
pub const DEFAULT_MAX_TOKENS: i64 = 4096;

/// Tokens held back from the window for the provider's completion.
pub const RESERVED_COMPLETION_TOKENS: i64 = 1024;

/// Configuration for translation jobs.
///
/// # Example
/// ```rust
/// use edgequake_pdftranslate::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .target_langs(["es", "fr"])
///     .max_pages(300)
///     .token_budget(2048, 512)
///     .build()
///     .unwrap();
/// assert_eq!(config.token_budget(), 1536);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Which translation gateway to use. Default: [`TranslatorKind::Local`].
    pub translator: TranslatorKind,

    /// LLM model identifier for the remote translator. Default: `gpt-4o-mini`.
    pub model: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over the provider name
    /// in [`TranslatorKind::Remote`].
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for translation calls. Default: 0.0.
    pub temperature: f32,

    /// Transport retries per batch on provider errors. Default: 2.
    ///
    /// Only transport failures are retried. A malformed or short answer is
    /// terminal for the job.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Where uploads and artifacts live. Default: [`StorageBackend::Local`].
    pub storage: StorageBackend,

    /// Where job records live. Default: SQLite under `data_dir`.
    pub job_store: JobStoreBackend,

    /// Root directory for local storage, manifests and the SQLite file.
    pub data_dir: PathBuf,

    /// Maximum source size in megabytes. Default: 100.
    pub max_source_mb: u64,

    /// Maximum page count. Default: 600.
    pub max_pages: usize,

    /// Maximum number of extracted paragraphs. Default: 50 000.
    pub max_paragraphs: usize,

    /// Allowed target languages. Default: es, fr, de, it, pt.
    pub target_langs: Vec<String>,

    /// Language of the uploaded books. Default: en.
    pub source_lang: String,

    /// Provider token window per request. Default: [`DEFAULT_MAX_TOKENS`].
    pub max_tokens: i64,

    /// Tokens reserved for the completion. Default: [`RESERVED_COMPLETION_TOKENS`].
    pub reserved_tokens: i64,

    /// Header/footer detection knobs.
    pub layout: LayoutTuning,

    /// Flashcard scoring knobs.
    pub vocabulary: VocabularyTuning,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let data_dir = PathBuf::from("data");
        Self {
            translator: TranslatorKind::default(),
            model: None,
            provider: None,
            temperature: 0.0,
            max_retries: 2,
            retry_backoff_ms: 500,
            storage: StorageBackend::default(),
            job_store: JobStoreBackend::Sqlite {
                path: data_dir.join("app.db"),
            },
            data_dir,
            max_source_mb: 100,
            max_pages: 600,
            max_paragraphs: 50_000,
            target_langs: ["es", "fr", "de", "it", "pt"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            source_lang: "en".to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            reserved_tokens: RESERVED_COMPLETION_TOKENS,
            layout: LayoutTuning::default(),
            vocabulary: VocabularyTuning::default(),
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("translator", &self.translator)
            .field("model", &self.model)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("storage", &self.storage)
            .field("job_store", &self.job_store)
            .field("data_dir", &self.data_dir)
            .field("max_source_mb", &self.max_source_mb)
            .field("max_pages", &self.max_pages)
            .field("target_langs", &self.target_langs)
            .field("max_tokens", &self.max_tokens)
            .field("reserved_tokens", &self.reserved_tokens)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, BookError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Unset or empty keys keep their defaults. Values that are set but fail
    /// to parse are a [`BookError::Configuration`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BookError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut b = Self::builder();

        if let Some(dir) = get("DATA_DIR") {
            b = b.data_dir(dir);
        }

        if let Some(name) = get("TRANSLATOR_PROVIDER") {
            b = b.translator(TranslatorKind::parse(&name));
        }
        if let Some(model) = get("EDGEQUAKE_MODEL").or_else(|| get("OPENAI_MODEL")) {
            b = b.model(model);
        }

        match get("STORAGE_BACKEND").as_deref() {
            None | Some("local") => {}
            Some("s3") => {
                let endpoint = get("S3_ENDPOINT").ok_or_else(|| {
                    BookError::Configuration("STORAGE_BACKEND=s3 requires S3_ENDPOINT".into())
                })?;
                let access_key = get("S3_ACCESS_KEY");
                let secret_key = get("S3_SECRET_KEY");
                if access_key.is_some() != secret_key.is_some() {
                    return Err(BookError::Configuration(
                        "S3_ACCESS_KEY and S3_SECRET_KEY must be set together".into(),
                    ));
                }
                b = b.storage(StorageBackend::ObjectStore(ObjectStoreConfig {
                    endpoint,
                    bucket: get("S3_BUCKET").unwrap_or_else(|| "book-translator".to_string()),
                    region: get("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                    access_key,
                    secret_key,
                }));
            }
            Some(other) => {
                return Err(BookError::Configuration(format!(
                    "Unsupported storage backend '{other}' (expected local or s3)"
                )))
            }
        }

        match get("DB_MODE").as_deref() {
            None | Some("sqlite") => {
                if let Some(path) = get("DB_PATH") {
                    b = b.job_store(JobStoreBackend::Sqlite { path: path.into() });
                }
            }
            Some("manifests") => {
                let dir = b.config.data_dir.join("manifests");
                b = b.job_store(JobStoreBackend::Manifests { dir });
            }
            Some(other) => {
                return Err(BookError::Configuration(format!(
                    "Unsupported DB_MODE '{other}' (expected sqlite or manifests)"
                )))
            }
        }

        if let Some(v) = get("MAX_PDF_MB") {
            b = b.max_source_mb(parse_num("MAX_PDF_MB", &v)?);
        }
        if let Some(v) = get("MAX_PAGES") {
            b = b.max_pages(parse_num("MAX_PAGES", &v)?);
        }
        if let Some(v) = get("MAX_PARAGRAPHS") {
            b = b.max_paragraphs(parse_num("MAX_PARAGRAPHS", &v)?);
        }
        if let Some(v) = get("TARGET_LANGS") {
            b = b.target_langs(v.split(',').map(str::trim).filter(|s| !s.is_empty()));
        }
        if let Some(v) = get("DEFAULT_SRC_LANG") {
            b = b.source_lang(v);
        }

        let max_tokens = match get("MAX_TOKENS") {
            Some(v) => parse_num("MAX_TOKENS", &v)?,
            None => DEFAULT_MAX_TOKENS,
        };
        let reserved = match get("RESERVED_COMPLETION_TOKENS") {
            Some(v) => parse_num("RESERVED_COMPLETION_TOKENS", &v)?,
            None => RESERVED_COMPLETION_TOKENS,
        };

        b.token_budget(max_tokens, reserved).build()
    }

    /// Tokens available to the input side of one batch.
    pub fn token_budget(&self) -> i64 {
        self.max_tokens - self.reserved_tokens
    }

    /// Source size limit in bytes.
    pub fn max_source_bytes(&self) -> u64 {
        self.max_source_mb.saturating_mul(1024 * 1024)
    }

    /// Whether `lang` is an accepted target language.
    pub fn supports_target(&self, lang: &str) -> bool {
        self.target_langs.iter().any(|l| l.eq_ignore_ascii_case(lang))
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, BookError> {
    value
        .trim()
        .parse()
        .map_err(|_| BookError::Configuration(format!("{key} must be a number, got '{value}'")))
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl fmt::Debug for PipelineConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl PipelineConfigBuilder {
    pub fn translator(mut self, kind: TranslatorKind) -> Self {
        self.config.translator = kind;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn storage(mut self, storage: StorageBackend) -> Self {
        self.config.storage = storage;
        self
    }

    pub fn job_store(mut self, store: JobStoreBackend) -> Self {
        self.config.job_store = store;
        self
    }

    /// Set the data root. A SQLite store still pointing at the default
    /// location follows the new root.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let JobStoreBackend::Sqlite { path } = &self.config.job_store {
            if *path == self.config.data_dir.join("app.db") {
                self.config.job_store = JobStoreBackend::Sqlite {
                    path: dir.join("app.db"),
                };
            }
        }
        self.config.data_dir = dir;
        self
    }

    pub fn max_source_mb(mut self, mb: u64) -> Self {
        self.config.max_source_mb = mb;
        self
    }

    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = n;
        self
    }

    pub fn max_paragraphs(mut self, n: usize) -> Self {
        self.config.max_paragraphs = n;
        self
    }

    pub fn target_langs<I, S>(mut self, langs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config.target_langs = langs
            .into_iter()
            .map(|s| s.as_ref().trim().to_ascii_lowercase())
            .collect();
        self
    }

    pub fn source_lang(mut self, lang: impl Into<String>) -> Self {
        self.config.source_lang = lang.into();
        self
    }

    /// Set the provider window and the completion reservation together.
    pub fn token_budget(mut self, max_tokens: i64, reserved_tokens: i64) -> Self {
        self.config.max_tokens = max_tokens;
        self.config.reserved_tokens = reserved_tokens;
        self
    }

    pub fn layout(mut self, tuning: LayoutTuning) -> Self {
        self.config.layout = tuning;
        self
    }

    pub fn vocabulary(mut self, tuning: VocabularyTuning) -> Self {
        self.config.vocabulary = tuning;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, BookError> {
        let c = &self.config;
        crate::pipeline::budget::validate_budget(c.max_tokens, c.reserved_tokens)?;
        if c.target_langs.is_empty() {
            return Err(BookError::Configuration(
                "At least one target language must be allowed".into(),
            ));
        }
        if c.max_pages == 0 {
            return Err(BookError::Configuration("max_pages must be ≥ 1".into()));
        }
        c.layout.validate()?;
        if c.vocabulary.max_entries == 0 {
            return Err(BookError::Configuration(
                "max flashcard entries must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Translation gateway selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TranslatorKind {
    /// Deterministic offline stub: `"[<tgt>] <text>"`. (default)
    #[default]
    Local,
    /// LLM-backed translation through the named edgequake-llm provider
    /// (e.g. `"openai"`, `"anthropic"`, `"ollama"`).
    Remote { provider: String },
}

impl TranslatorKind {
    /// Map a `TRANSLATOR_PROVIDER` value to a kind. `local`, `stub` and `hf`
    /// select the offline stub; anything else names a remote provider.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "local" | "stub" | "hf" | "offline" => TranslatorKind::Local,
            other => TranslatorKind::Remote {
                provider: other.to_string(),
            },
        }
    }
}

/// Artifact storage selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageBackend {
    /// Files under `data_dir/jobs/<job_id>/`. (default)
    #[default]
    Local,
    /// S3-compatible bucket (AWS or MinIO).
    ObjectStore(ObjectStoreConfig),
}

/// Connection details for an S3-compatible object store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    /// Base URL, e.g. `http://localhost:9000`.
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    /// Access key id and secret for SigV4 signing. Both or neither.
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

impl fmt::Debug for ObjectStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStoreConfig")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Job state backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStoreBackend {
    /// One row per job in a SQLite `jobs` table.
    Sqlite { path: PathBuf },
    /// One JSON manifest per job in `dir`.
    Manifests { dir: PathBuf },
}

/// Thresholds for running header/footer detection.
///
/// The defaults reproduce the output of earlier releases; they are
/// heuristics, not derived constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutTuning {
    /// Fraction of page height from the top treated as the header zone.
    pub header_zone_ratio: f32,
    /// Fraction of page height from the bottom treated as the footer zone.
    pub footer_zone_ratio: f32,
    /// Fraction of pages a zone string must appear on to be dropped.
    pub repeat_ratio: f64,
}

impl Default for LayoutTuning {
    fn default() -> Self {
        Self {
            header_zone_ratio: 0.12,
            footer_zone_ratio: 0.12,
            repeat_ratio: 0.6,
        }
    }
}

impl LayoutTuning {
    fn validate(&self) -> Result<(), BookError> {
        let zone_ok = |r: f32| r > 0.0 && r < 0.5;
        if !zone_ok(self.header_zone_ratio) || !zone_ok(self.footer_zone_ratio) {
            return Err(BookError::Configuration(
                "header/footer zone ratios must be in (0, 0.5)".into(),
            ));
        }
        if !(self.repeat_ratio > 0.0 && self.repeat_ratio <= 1.0) {
            return Err(BookError::Configuration(
                "repeat_ratio must be in (0, 1]".into(),
            ));
        }
        Ok(())
    }
}

/// Flashcard ranking knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VocabularyTuning {
    /// Zipf value at or above which a word earns no rarity bonus.
    pub zipf_ceiling: f64,
    /// Maximum number of flashcards produced.
    pub max_entries: usize,
}

impl Default for VocabularyTuning {
    fn default() -> Self {
        Self {
            zipf_ceiling: 7.0,
            max_entries: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_build() {
        let c = PipelineConfig::builder().build().unwrap();
        assert_eq!(c.token_budget(), 3072);
        assert_eq!(c.translator, TranslatorKind::Local);
        assert!(c.supports_target("es"));
        assert!(c.supports_target("FR"));
        assert!(!c.supports_target("ja"));
    }

    #[test]
    fn rejects_non_positive_budget() {
        assert!(PipelineConfig::builder().token_budget(0, 0).build().is_err());
        assert!(PipelineConfig::builder().token_budget(10, -1).build().is_err());
        assert!(PipelineConfig::builder().token_budget(10, 10).build().is_err());
        assert!(PipelineConfig::builder().token_budget(10, 9).build().is_ok());
    }

    #[test]
    fn rejects_bad_zone_ratio() {
        let tuning = LayoutTuning {
            header_zone_ratio: 0.7,
            ..LayoutTuning::default()
        };
        assert!(PipelineConfig::builder().layout(tuning).build().is_err());
    }

    #[test]
    fn env_lookup_overrides_defaults() {
        let c = PipelineConfig::from_lookup(lookup(&[
            ("TRANSLATOR_PROVIDER", "openai"),
            ("OPENAI_MODEL", "gpt-test"),
            ("DB_MODE", "manifests"),
            ("DATA_DIR", "/srv/books"),
            ("MAX_PAGES", "12"),
            ("TARGET_LANGS", "es, de ,"),
        ]))
        .unwrap();
        assert_eq!(
            c.translator,
            TranslatorKind::Remote {
                provider: "openai".into()
            }
        );
        assert_eq!(c.model.as_deref(), Some("gpt-test"));
        assert_eq!(c.max_pages, 12);
        assert_eq!(c.target_langs, vec!["es", "de"]);
        assert_eq!(
            c.job_store,
            JobStoreBackend::Manifests {
                dir: PathBuf::from("/srv/books/manifests")
            }
        );
    }

    #[test]
    fn env_lookup_rejects_garbage_numbers() {
        let err = PipelineConfig::from_lookup(lookup(&[("MAX_PDF_MB", "lots")])).unwrap_err();
        assert!(matches!(err, BookError::Configuration(_)));
    }

    #[test]
    fn env_lookup_requires_endpoint_for_s3() {
        let err = PipelineConfig::from_lookup(lookup(&[("STORAGE_BACKEND", "s3")])).unwrap_err();
        assert!(err.to_string().contains("S3_ENDPOINT"));
    }

    #[test]
    fn env_lookup_reads_s3_credentials() {
        let c = PipelineConfig::from_lookup(lookup(&[
            ("STORAGE_BACKEND", "s3"),
            ("S3_ENDPOINT", "http://minio:9000"),
            ("S3_ACCESS_KEY", "minio"),
            ("S3_SECRET_KEY", "minio-secret"),
            ("S3_REGION", "eu-west-1"),
        ]))
        .unwrap();
        let StorageBackend::ObjectStore(s3) = &c.storage else {
            panic!("expected object store, got {:?}", c.storage);
        };
        assert_eq!(s3.endpoint, "http://minio:9000");
        assert_eq!(s3.bucket, "book-translator");
        assert_eq!(s3.region, "eu-west-1");
        assert_eq!(s3.access_key.as_deref(), Some("minio"));
        assert_eq!(s3.secret_key.as_deref(), Some("minio-secret"));

        let debug = format!("{s3:?}");
        assert!(!debug.contains("minio-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn s3_region_defaults_and_keys_are_optional() {
        let c = PipelineConfig::from_lookup(lookup(&[
            ("STORAGE_BACKEND", "s3"),
            ("S3_ENDPOINT", "https://s3.amazonaws.com"),
            ("S3_BUCKET", "books"),
        ]))
        .unwrap();
        let StorageBackend::ObjectStore(s3) = &c.storage else {
            panic!("expected object store, got {:?}", c.storage);
        };
        assert_eq!(s3.region, "us-east-1");
        assert_eq!(s3.bucket, "books");
        assert!(s3.access_key.is_none() && s3.secret_key.is_none());

        let err = PipelineConfig::from_lookup(lookup(&[
            ("STORAGE_BACKEND", "s3"),
            ("S3_ENDPOINT", "http://minio:9000"),
            ("S3_ACCESS_KEY", "minio"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("S3_SECRET_KEY"));
    }

    #[test]
    fn hf_alias_selects_local_stub() {
        assert_eq!(TranslatorKind::parse("hf"), TranslatorKind::Local);
        assert_eq!(TranslatorKind::parse(" LOCAL "), TranslatorKind::Local);
    }

    #[test]
    fn data_dir_moves_default_sqlite_path() {
        let c = PipelineConfig::builder().data_dir("/tmp/x").build().unwrap();
        assert_eq!(
            c.job_store,
            JobStoreBackend::Sqlite {
                path: PathBuf::from("/tmp/x/app.db")
            }
        );
    }
}
