use super::JobStore;
use crate::error::JobStoreError;
use crate::job::{Job, JobUpdate};
use crate::storage::write_atomic;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Jobs as one JSON manifest per id: `<dir>/<job_id>.json`.
///
/// Updates to the same id are serialised by a per-job async lock held across
/// the read, apply and atomic rename. Different jobs never contend.
pub struct ManifestJobStore {
    dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ManifestJobStore {
    pub async fn open(dir: PathBuf) -> Result<Self, JobStoreError> {
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| JobStoreError::Io {
                path: dir.clone(),
                source: e,
            })?;
        info!("Job manifests in {}", dir.display());
        Ok(Self {
            dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    fn manifest_path(&self, job_id: &str) -> Result<PathBuf, JobStoreError> {
        let safe = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
        if job_id.is_empty() || !job_id.chars().all(safe) {
            return Err(JobStoreError::InvalidValue(format!("job id '{job_id}'")));
        }
        Ok(self.dir.join(format!("{job_id}.json")))
    }

    fn lock_for(&self, job_id: &str) -> Result<Arc<tokio::sync::Mutex<()>>, JobStoreError> {
        let mut locks = self.locks.lock().map_err(|_| JobStoreError::LockPoisoned)?;
        Ok(Arc::clone(locks.entry(job_id.to_string()).or_default()))
    }

    /// Drops the map entry once no other task holds or waits on it.
    fn release(&self, job_id: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        if let Ok(mut locks) = self.locks.lock() {
            // One count for the map, one for `lock`.
            if Arc::strong_count(&lock) == 2 {
                locks.remove(job_id);
            }
        }
    }

    async fn load(&self, job_id: &str) -> Result<Option<Job>, JobStoreError> {
        let path = self.manifest_path(job_id)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(JobStoreError::Io { path, source: e }),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| JobStoreError::Serde { path, source: e })
    }

    async fn store(&self, job: &Job) -> Result<(), JobStoreError> {
        let path = self.manifest_path(&job.id)?;
        let bytes = serde_json::to_vec_pretty(job).map_err(|e| JobStoreError::Serde {
            path: path.clone(),
            source: e,
        })?;
        write_atomic(&path, &bytes)
            .await
            .map_err(|e| JobStoreError::Io { path, source: e })
    }

    async fn apply_locked(&self, job_id: &str, update: &JobUpdate) -> Result<Job, JobStoreError> {
        let mut job = self
            .load(job_id)
            .await?
            .ok_or_else(|| JobStoreError::NotFound {
                job_id: job_id.to_string(),
            })?;
        job.apply(update);
        self.store(&job).await?;
        Ok(job)
    }
}

#[async_trait]
impl JobStore for ManifestJobStore {
    async fn create(&self, job: &Job) -> Result<(), JobStoreError> {
        let lock = self.lock_for(&job.id)?;
        let result = {
            let _guard = lock.lock().await;
            match self.load(&job.id).await {
                Ok(Some(_)) => Err(JobStoreError::AlreadyExists {
                    job_id: job.id.clone(),
                }),
                Ok(None) => self.store(job).await,
                Err(e) => Err(e),
            }
        };
        self.release(&job.id, lock);
        result
    }

    async fn get(&self, job_id: &str) -> Result<Option<Job>, JobStoreError> {
        self.load(job_id).await
    }

    async fn update(&self, job_id: &str, update: &JobUpdate) -> Result<Job, JobStoreError> {
        let lock = self.lock_for(job_id)?;
        let result = {
            let _guard = lock.lock().await;
            self.apply_locked(job_id, update).await
        };
        self.release(job_id, lock);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::contract;

    #[tokio::test]
    async fn manifest_store_honours_contract() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestJobStore::open(dir.path().join("manifests"))
            .await
            .unwrap();
        contract::create_get_update(&store).await;
        contract::update_missing_job(&store).await;
        contract::concurrent_updates_do_not_interleave(Arc::new(store)).await;
    }

    #[tokio::test]
    async fn manifest_is_plain_json_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestJobStore::open(dir.path().to_path_buf()).await.unwrap();
        let job = Job::new("abcdefabcdefabcd", "b.pdf", "loc", "it");
        store.create(&job).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("abcdefabcdefabcd.json")).unwrap();
        let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v["status"], "queued");
        assert_eq!(v["tgt_lang"], "it");
        assert!(v["epub_path"].is_null());
    }

    #[tokio::test]
    async fn lock_entries_are_released_after_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ManifestJobStore::open(dir.path().to_path_buf()).await.unwrap());
        let job = Job::new("0123456789abcdef", "c.pdf", "loc", "de");
        store.create(&job).await.unwrap();
        assert!(store.locks.lock().unwrap().is_empty());

        let mut handles = Vec::new();
        for pct in 1..=16u8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .update("0123456789abcdef", &JobUpdate::progress(pct))
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(store.locks.lock().unwrap().is_empty());

        assert!(store.update("ffffffffffffffff", &JobUpdate::progress(1)).await.is_err());
        assert!(store.locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsafe_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestJobStore::open(dir.path().to_path_buf()).await.unwrap();
        assert!(matches!(
            store.get("../etc").await,
            Err(JobStoreError::InvalidValue(_))
        ));
    }
}
