//! Source staging: turn a storage location into a local file pdfium can open.
//!
//! ## Why download to a temp file?
//!
//! pdfium requires a file-system path and cannot stream from a byte buffer.
//! When the upload lives in remote storage it is copied into a `TempDir`
//! owned by [`StagedSource`]; dropping the value removes the copy, so the
//! orchestrator gets cleanup on every exit path (success, error or panic)
//! just by letting it go out of scope.

use crate::error::{BookError, ExtractionError, StorageError};
use crate::storage::ArtifactStorage;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

/// A source PDF available on the local filesystem.
#[derive(Debug)]
pub enum StagedSource {
    /// The storage backend already keeps the file locally.
    Local(PathBuf),
    /// Copied out of remote storage. The `TempDir` is kept alive until the
    /// value is dropped.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl StagedSource {
    pub fn path(&self) -> &Path {
        match self {
            StagedSource::Local(p) => p,
            StagedSource::Downloaded { path, .. } => path,
        }
    }
}

/// Make `location` readable as a local file and check it looks like a PDF.
pub async fn stage_source(
    storage: &dyn ArtifactStorage,
    location: &str,
) -> Result<StagedSource, BookError> {
    if let Some(path) = storage.local_path(location) {
        check_pdf_magic(&path).await?;
        debug!("Staged local source: {}", path.display());
        return Ok(StagedSource::Local(path));
    }

    info!("Downloading source from storage: {}", location);
    let bytes = storage.read(location).await?;
    check_magic_bytes(&bytes)?;

    let temp_dir = TempDir::new().map_err(|e| StorageError::Io {
        location: location.to_string(),
        source: e,
    })?;
    let path = temp_dir.path().join(source_filename(location));
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| StorageError::Io {
            location: path.display().to_string(),
            source: e,
        })?;

    debug!("Staged {} bytes at {}", bytes.len(), path.display());
    Ok(StagedSource::Downloaded {
        path,
        _temp_dir: temp_dir,
    })
}

/// Reject files whose first four bytes are not `%PDF`.
pub async fn check_pdf_magic(path: &Path) -> Result<(), ExtractionError> {
    let mut file = tokio::fs::File::open(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => ExtractionError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => ExtractionError::Unreadable {
            detail: format!("{}: {}", path.display(), e),
        },
    })?;
    let mut magic = [0u8; 4];
    let mut read = 0;
    // Short files are still checked: a 2-byte file is not a PDF either.
    while read < magic.len() {
        match file.read(&mut magic[read..]).await {
            Ok(0) => break,
            Ok(n) => read += n,
            Err(e) => {
                return Err(ExtractionError::Unreadable {
                    detail: e.to_string(),
                })
            }
        }
    }
    check_magic_bytes(&magic[..read])
}

fn check_magic_bytes(bytes: &[u8]) -> Result<(), ExtractionError> {
    if bytes.starts_with(b"%PDF") {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    Err(ExtractionError::NotAPdf { magic })
}

/// Last path segment of a location, or `source.pdf`.
fn source_filename(location: &str) -> String {
    location
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty() && s.contains('.'))
        .unwrap_or("source.pdf")
        .to_string()
}
