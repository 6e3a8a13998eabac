//! Object storage for uploaded attachments.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;

use common::errors::{AppError, AppResult};

/// Bucket/key addressed blob storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` under `bucket/key` and returns the stored key.
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> AppResult<String>;
}

/// Relative url an uploaded object is reachable under.
///
/// Computed whenever a response is built; the storage base url may change, so
/// it is never persisted.
pub fn attachment_url(bucket: &str, key: &str) -> String {
    format!("/{}/{}", bucket, key.trim_start_matches('/'))
}

/// Object store backed by Amazon S3.
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    /// Builds a client from the default AWS credential chain.
    pub async fn from_env(region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region));
        }
        let sdk_config = loader.load().await;
        Self {
            client: aws_sdk_s3::Client::new(&sdk_config),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> AppResult<String> {
        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(bytes));
        if let Some(content_type) = content_type {
            request = request.content_type(content_type);
        }
        request
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("upload of {} failed: {}", key, e)))?;
        Ok(key.to_string())
    }
}

/// Object store writing to a local directory, one sub-directory per bucket.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> AppResult<PathBuf> {
        let relative = Path::new(bucket).join(key);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(AppError::Storage(format!("invalid object key: {}", key)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        _content_type: Option<&str>,
    ) -> AppResult<String> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(e.to_string()))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| AppError::Storage(format!("write {} failed: {}", path.display(), e)))?;
        tracing::debug!(bucket, key, "object stored locally");
        Ok(key.to_string())
    }
}
