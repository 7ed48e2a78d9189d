use super::{validate_name, ArtifactStorage};
use crate::error::StorageError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Filesystem storage rooted at the data directory.
///
/// Locations are the file paths themselves, so a location recorded on a job
/// can be opened directly by anything on the same host.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn job_path(&self, job_id: &str, name: &str) -> Result<PathBuf, StorageError> {
        validate_name(job_id)?;
        validate_name(name)?;
        Ok(self.root.join("jobs").join(job_id).join(name))
    }
}

/// Write through a sibling temp file and rename, so readers never observe a
/// half-written artifact.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}

fn io_error(location: &str, source: std::io::Error) -> StorageError {
    if source.kind() == ErrorKind::NotFound {
        StorageError::NotFound {
            location: location.to_string(),
        }
    } else {
        StorageError::Io {
            location: location.to_string(),
            source,
        }
    }
}

#[async_trait]
impl ArtifactStorage for LocalStorage {
    async fn save(&self, job_id: &str, name: &str, bytes: Vec<u8>) -> Result<String, StorageError> {
        let path = self.job_path(job_id, name)?;
        let location = path.display().to_string();
        write_atomic(&path, &bytes)
            .await
            .map_err(|e| io_error(&location, e))?;
        debug!("Saved {} bytes to {}", bytes.len(), location);
        Ok(location)
    }

    async fn read(&self, location: &str) -> Result<Vec<u8>, StorageError> {
        tokio::fs::read(location)
            .await
            .map_err(|e| io_error(location, e))
    }

    async fn write(&self, location: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        write_atomic(Path::new(location), &bytes)
            .await
            .map_err(|e| io_error(location, e))
    }

    fn local_path(&self, location: &str) -> Option<PathBuf> {
        Some(PathBuf::from(location))
    }
}
