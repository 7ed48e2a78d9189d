use super::{validate_name, ArtifactStorage};
use crate::config::ObjectStoreConfig;
use crate::error::StorageError;
use async_trait::async_trait;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::{ClientOptions, ObjectStore, PutPayload};
use std::time::Duration;
use tracing::{debug, info};

const REQUEST_TIMEOUT_SECS: u64 = 120;

/// S3-compatible object storage (AWS S3 or MinIO).
///
/// Keys are `jobs/<job_id>/<name>`; locations are `s3://<bucket>/<key>`.
/// Requests are SigV4-signed with the configured access and secret key, or
/// sent unsigned when no key pair is set.
#[derive(Debug)]
pub struct S3Storage {
    bucket: String,
    store: AmazonS3,
}

impl S3Storage {
    pub fn new(config: ObjectStoreConfig) -> Result<Self, StorageError> {
        let options =
            ClientOptions::new().with_timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS));
        let mut builder = AmazonS3Builder::new()
            .with_endpoint(config.endpoint.trim_end_matches('/'))
            .with_bucket_name(&config.bucket)
            .with_region(&config.region)
            .with_allow_http(config.endpoint.starts_with("http://"))
            .with_client_options(options);
        builder = match (&config.access_key, &config.secret_key) {
            (Some(key), Some(secret)) => builder
                .with_access_key_id(key)
                .with_secret_access_key(secret),
            (None, None) => builder.with_skip_signature(true),
            _ => {
                return Err(StorageError::Remote {
                    location: config.endpoint.clone(),
                    reason: "S3_ACCESS_KEY and S3_SECRET_KEY must be set together".into(),
                })
            }
        };
        let store = builder.build().map_err(|e| StorageError::Remote {
            location: config.endpoint.clone(),
            reason: e.to_string(),
        })?;

        info!(
            "Object storage: {} bucket '{}' ({})",
            config.endpoint, config.bucket, config.region
        );
        Ok(Self {
            bucket: config.bucket,
            store,
        })
    }

    fn location_for(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }

    /// Recover the object key from a location produced by this backend.
    fn key_of<'a>(&self, location: &'a str) -> Result<&'a str, StorageError> {
        location
            .strip_prefix("s3://")
            .and_then(|rest| rest.strip_prefix(self.bucket.as_str()))
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|key| !key.is_empty())
            .ok_or_else(|| StorageError::InvalidLocation(location.to_string()))
    }

    async fn put(&self, location: &str, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let len = bytes.len();
        self.store
            .put(&ObjectPath::from(key), PutPayload::from(bytes))
            .await
            .map_err(|e| remote_error(location, e))?;
        debug!("PUT {} ({} bytes)", location, len);
        Ok(())
    }
}

fn remote_error(location: &str, e: object_store::Error) -> StorageError {
    match e {
        object_store::Error::NotFound { .. } => StorageError::NotFound {
            location: location.to_string(),
        },
        other => StorageError::Remote {
            location: location.to_string(),
            reason: other.to_string(),
        },
    }
}

#[async_trait]
impl ArtifactStorage for S3Storage {
    async fn save(&self, job_id: &str, name: &str, bytes: Vec<u8>) -> Result<String, StorageError> {
        validate_name(job_id)?;
        validate_name(name)?;
        let key = format!("jobs/{job_id}/{name}");
        let location = self.location_for(&key);
        self.put(&location, &key, bytes).await?;
        Ok(location)
    }

    async fn read(&self, location: &str) -> Result<Vec<u8>, StorageError> {
        let key = self.key_of(location)?;
        let bytes = self
            .store
            .get(&ObjectPath::from(key))
            .await
            .map_err(|e| remote_error(location, e))?
            .bytes()
            .await
            .map_err(|e| remote_error(location, e))?;
        debug!("GET {} ({} bytes)", location, bytes.len());
        Ok(bytes.to_vec())
    }

    async fn write(&self, location: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let key = self.key_of(location)?;
        self.put(location, key, bytes).await
    }
}
