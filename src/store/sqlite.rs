use super::JobStore;
use crate::error::JobStoreError;
use crate::job::{Job, JobArtifacts, JobStage, JobStatus, JobUpdate};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::info;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS jobs (
    id                TEXT PRIMARY KEY,
    filename          TEXT NOT NULL,
    source            TEXT NOT NULL,
    tgt_lang          TEXT NOT NULL,
    status            TEXT NOT NULL,
    stage             TEXT NOT NULL,
    pct               INTEGER NOT NULL DEFAULT 0,
    error             TEXT,
    paragraphs_path   TEXT,
    translations_path TEXT,
    epub_path         TEXT,
    cards_path        TEXT,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);";

/// Jobs as rows of a SQLite `jobs` table.
///
/// All access is serialised through one `Mutex<Connection>`, and each
/// update runs its read-modify-write inside a transaction. Calls run on the
/// blocking pool so SQLite I/O never stalls the async runtime.
#[derive(Clone)]
pub struct SqliteJobStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteJobStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub async fn open(path: PathBuf) -> Result<Self, JobStoreError> {
        tokio::task::spawn_blocking(move || {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| JobStoreError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
            let conn = Connection::open(&path)?;
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
            conn.execute_batch(SCHEMA)?;
            info!("Job database opened at {}", path.display());
            Ok(Self::from_conn(conn))
        })
        .await
        .map_err(|e| JobStoreError::Task(e.to_string()))?
    }

    pub fn open_in_memory() -> Result<Self, JobStoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self::from_conn(conn))
    }

    fn from_conn(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run `f` with the locked connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T, JobStoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, JobStoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| JobStoreError::LockPoisoned)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| JobStoreError::Task(e.to_string()))?
    }
}

fn find(conn: &Connection, id: &str) -> Result<Option<Job>, JobStoreError> {
    let row = conn
        .query_row("SELECT * FROM jobs WHERE id = ?1", params![id], JobRow::from_row)
        .optional()?;
    row.map(JobRow::into_job).transpose()
}

/// A raw `jobs` row; enum columns are still strings.
struct JobRow {
    id: String,
    filename: String,
    source: String,
    tgt_lang: String,
    status: String,
    stage: String,
    pct: i64,
    error: Option<String>,
    artifacts: JobArtifacts,
    created_at: String,
    updated_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            filename: row.get("filename")?,
            source: row.get("source")?,
            tgt_lang: row.get("tgt_lang")?,
            status: row.get("status")?,
            stage: row.get("stage")?,
            pct: row.get("pct")?,
            error: row.get("error")?,
            artifacts: JobArtifacts {
                paragraphs_path: row.get("paragraphs_path")?,
                translations_path: row.get("translations_path")?,
                epub_path: row.get("epub_path")?,
                cards_path: row.get("cards_path")?,
            },
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn into_job(self) -> Result<Job, JobStoreError> {
        let status = JobStatus::parse(&self.status)
            .ok_or_else(|| JobStoreError::InvalidValue(format!("status '{}'", self.status)))?;
        let stage = JobStage::parse(&self.stage)
            .ok_or_else(|| JobStoreError::InvalidValue(format!("stage '{}'", self.stage)))?;
        Ok(Job {
            id: self.id,
            filename: self.filename,
            source: self.source,
            tgt_lang: self.tgt_lang,
            status,
            stage,
            pct: self.pct.clamp(0, 100) as u8,
            error: self.error,
            artifacts: self.artifacts,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn create(&self, job: &Job) -> Result<(), JobStoreError> {
        let job = job.clone();
        self.with_conn(move |conn| {
            if find(conn, &job.id)?.is_some() {
                return Err(JobStoreError::AlreadyExists { job_id: job.id });
            }
            let a = &job.artifacts;
            conn.execute(
                "INSERT INTO jobs (id, filename, source, tgt_lang, status, stage, pct, error,
                 paragraphs_path, translations_path, epub_path, cards_path, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    job.id,
                    job.filename,
                    job.source,
                    job.tgt_lang,
                    job.status.as_str(),
                    job.stage.as_str(),
                    job.pct,
                    job.error,
                    a.paragraphs_path,
                    a.translations_path,
                    a.epub_path,
                    a.cards_path,
                    job.created_at,
                    job.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get(&self, job_id: &str) -> Result<Option<Job>, JobStoreError> {
        let id = job_id.to_string();
        self.with_conn(move |conn| find(conn, &id)).await
    }

    async fn update(&self, job_id: &str, update: &JobUpdate) -> Result<Job, JobStoreError> {
        let id = job_id.to_string();
        let update = update.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut job = find(&tx, &id)?.ok_or_else(|| JobStoreError::NotFound {
                job_id: id.clone(),
            })?;
            job.apply(&update);

            let a = &job.artifacts;
            tx.execute(
                "UPDATE jobs SET status=?2, stage=?3, pct=?4, error=?5, paragraphs_path=?6,
                 translations_path=?7, epub_path=?8, cards_path=?9, updated_at=?10
                 WHERE id=?1",
                params![
                    job.id,
                    job.status.as_str(),
                    job.stage.as_str(),
                    job.pct,
                    job.error,
                    a.paragraphs_path,
                    a.translations_path,
                    a.epub_path,
                    a.cards_path,
                    job.updated_at,
                ],
            )?;
            tx.commit()?;
            Ok(job)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::contract;

    #[tokio::test]
    async fn in_memory_store_honours_contract() {
        let store = SqliteJobStore::open_in_memory().unwrap();
        contract::create_get_update(&store).await;
        contract::update_missing_job(&store).await;
        contract::concurrent_updates_do_not_interleave(Arc::new(store)).await;
    }

    #[tokio::test]
    async fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/app.db");
        let job = Job::new("1111222233334444", "x.pdf", "loc", "de");

        let store = SqliteJobStore::open(path.clone()).await.unwrap();
        store.create(&job).await.unwrap();
        store
            .update(&job.id, &JobUpdate::failed(JobStage::ParsePdf, "bad pdf"))
            .await
            .unwrap();
        drop(store);

        let reopened = SqliteJobStore::open(path).await.unwrap();
        let loaded = reopened.get(&job.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Error);
        assert_eq!(loaded.stage, JobStage::ParsePdf);
        assert_eq!(loaded.error.as_deref(), Some("bad pdf"));
    }
}
