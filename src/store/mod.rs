//! Durable job state.
//!
//! [`JobStore`] is the only shared mutable state between concurrently
//! running jobs. Both backends serialise updates to the same job id, so a
//! read-modify-write of `status`/`stage`/`pct`/`error`/artifact fields can
//! never interleave with another writer's.

mod manifest;
mod sqlite;

pub use manifest::ManifestJobStore;
pub use sqlite::SqliteJobStore;

use crate::config::JobStoreBackend;
use crate::error::JobStoreError;
use crate::job::{Job, JobUpdate};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job. Fails with [`JobStoreError::AlreadyExists`] if the id
    /// is taken.
    async fn create(&self, job: &Job) -> Result<(), JobStoreError>;

    async fn get(&self, job_id: &str) -> Result<Option<Job>, JobStoreError>;

    /// Apply a partial update atomically and return the resulting record.
    async fn update(&self, job_id: &str, update: &JobUpdate) -> Result<Job, JobStoreError>;
}

/// Open the configured backend, creating its schema or directory.
pub async fn open_job_store(backend: &JobStoreBackend) -> Result<Arc<dyn JobStore>, JobStoreError> {
    Ok(match backend {
        JobStoreBackend::Sqlite { path } => Arc::new(SqliteJobStore::open(path.clone()).await?),
        JobStoreBackend::Manifests { dir } => Arc::new(ManifestJobStore::open(dir.clone()).await?),
    })
}
