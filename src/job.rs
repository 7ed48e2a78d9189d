//! The durable job record and its partial-update type.
//!
//! A [`Job`] is created `queued` at 0 % when a source upload is accepted and
//! is afterwards mutated only by the orchestrator, one [`JobUpdate`] at a
//! time. Each update is a complete, self-consistent patch: backends apply it
//! atomically under a per-job lock so two writers never interleave a
//! read-modify-write.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Overall lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Queued,
    Processing,
    Done,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(JobStatus::Queued),
            "processing" => Some(JobStatus::Processing),
            "done" => Some(JobStatus::Done),
            "error" => Some(JobStatus::Error),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stage, in execution order.
///
/// `Queued` is the stage of a job that has not started yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    #[default]
    Queued,
    ParsePdf,
    Translate,
    BuildArtifact,
    Flashcards,
    Finalize,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::Queued => "queued",
            JobStage::ParsePdf => "parse_pdf",
            JobStage::Translate => "translate",
            JobStage::BuildArtifact => "build_artifact",
            JobStage::Flashcards => "flashcards",
            JobStage::Finalize => "finalize",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(JobStage::Queued),
            "parse_pdf" => Some(JobStage::ParsePdf),
            "translate" => Some(JobStage::Translate),
            "build_artifact" => Some(JobStage::BuildArtifact),
            "flashcards" => Some(JobStage::Flashcards),
            "finalize" => Some(JobStage::Finalize),
            _ => None,
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage locations of everything a finished job produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobArtifacts {
    pub paragraphs_path: Option<String>,
    pub translations_path: Option<String>,
    pub epub_path: Option<String>,
    pub cards_path: Option<String>,
}

impl JobArtifacts {
    /// True when every artifact reference is recorded.
    pub fn is_complete(&self) -> bool {
        self.paragraphs_path.is_some()
            && self.translations_path.is_some()
            && self.epub_path.is_some()
            && self.cards_path.is_some()
    }
}

/// A translation job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    /// Original upload filename, used as the fallback book title.
    pub filename: String,
    /// Storage location of the uploaded PDF.
    pub source: String,
    pub tgt_lang: String,
    pub status: JobStatus,
    pub stage: JobStage,
    /// Progress percentage, 0–100.
    pub pct: u8,
    pub error: Option<String>,
    #[serde(flatten)]
    pub artifacts: JobArtifacts,
    pub created_at: String,
    pub updated_at: String,
}

impl Job {
    /// A fresh `queued` job at 0 %.
    pub fn new(
        id: impl Into<String>,
        filename: impl Into<String>,
        source: impl Into<String>,
        tgt_lang: impl Into<String>,
    ) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: id.into(),
            filename: filename.into(),
            source: source.into(),
            tgt_lang: tgt_lang.into(),
            status: JobStatus::Queued,
            stage: JobStage::Queued,
            pct: 0,
            error: None,
            artifacts: JobArtifacts::default(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Apply a partial update in place and bump `updated_at`.
    pub fn apply(&mut self, update: &JobUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(stage) = update.stage {
            self.stage = stage;
        }
        if let Some(pct) = update.pct {
            self.pct = pct.min(100);
        }
        if let Some(ref error) = update.error {
            self.error = error.clone();
        }
        if let Some(ref artifacts) = update.artifacts {
            self.artifacts = artifacts.clone();
        }
        self.updated_at = Utc::now().to_rfc3339();
    }
}

/// A partial job update. `None` fields are left untouched.
///
/// `error: Some(None)` clears a previous error message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub stage: Option<JobStage>,
    pub pct: Option<u8>,
    pub error: Option<Option<String>>,
    pub artifacts: Option<JobArtifacts>,
}

impl JobUpdate {
    /// `status=processing` at `stage`, `pct`.
    pub fn processing(stage: JobStage, pct: u8) -> Self {
        Self {
            status: Some(JobStatus::Processing),
            stage: Some(stage),
            pct: Some(pct),
            ..Self::default()
        }
    }

    /// Progress-only update.
    pub fn progress(pct: u8) -> Self {
        Self {
            pct: Some(pct),
            ..Self::default()
        }
    }

    /// Terminal failure at `stage` with a human-readable message.
    pub fn failed(stage: JobStage, message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Error),
            stage: Some(stage),
            error: Some(Some(message.into())),
            ..Self::default()
        }
    }

    /// Terminal success: `done`, `finalize`, 100 %, artifacts recorded,
    /// error cleared.
    pub fn done(artifacts: JobArtifacts) -> Self {
        Self {
            status: Some(JobStatus::Done),
            stage: Some(JobStage::Finalize),
            pct: Some(100),
            error: Some(None),
            artifacts: Some(artifacts),
        }
    }
}

/// Generate a 16-hex-character job identifier.
pub fn new_job_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(16);
    id
}
