//! Upload and artifact storage.
//!
//! Every file a job reads or produces goes through [`ArtifactStorage`]:
//! the uploaded PDF, the paragraph and translation JSON, the EPUB and the
//! flashcard CSV. A *location* is an opaque string returned by
//! [`ArtifactStorage::save`] and recorded on the job; only the backend that
//! produced it knows how to interpret it.
//!
//! Two backends are provided:
//!
//! * [`LocalStorage`]: files under `<data_dir>/jobs/<job_id>/`.
//! * [`S3Storage`]: an S3-compatible bucket (AWS or MinIO) with SigV4
//!   signed requests.

mod local;
mod remote;

pub use local::LocalStorage;
pub(crate) use local::write_atomic;
pub use remote::S3Storage;

use crate::config::StorageBackend;
use crate::error::StorageError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Byte storage keyed by job id and artifact name.
#[async_trait]
pub trait ArtifactStorage: Send + Sync {
    /// Store `bytes` as `name` under `job_id` and return its location.
    ///
    /// `name` may contain `/` separators (`uploads/book.pdf`) but never `..`.
    async fn save(&self, job_id: &str, name: &str, bytes: Vec<u8>) -> Result<String, StorageError>;

    /// Read the full contents at `location`.
    async fn read(&self, location: &str) -> Result<Vec<u8>, StorageError>;

    /// Overwrite the contents at an existing `location`.
    async fn write(&self, location: &str, bytes: Vec<u8>) -> Result<(), StorageError>;

    /// Local filesystem path for `location`, when the backend keeps files
    /// locally. Remote backends return `None` and callers fall back to
    /// [`ArtifactStorage::read`].
    fn local_path(&self, location: &str) -> Option<PathBuf> {
        let _ = location;
        None
    }
}

/// Instantiate the configured backend.
pub fn build_storage(
    backend: &StorageBackend,
    data_dir: &Path,
) -> Result<Arc<dyn ArtifactStorage>, StorageError> {
    Ok(match backend {
        StorageBackend::Local => Arc::new(LocalStorage::new(data_dir)),
        StorageBackend::ObjectStore(cfg) => Arc::new(S3Storage::new(cfg.clone())?),
    })
}

/// Reject artifact names that are empty, absolute or escape the job prefix.
pub(crate) fn validate_name(name: &str) -> Result<(), StorageError> {
    let bad = name.is_empty()
        || name.starts_with('/')
        || name.contains('\\')
        || name.split('/').any(|part| part.is_empty() || part == "." || part == "..");
    if bad {
        return Err(StorageError::InvalidLocation(name.to_string()));
    }
    Ok(())
}
