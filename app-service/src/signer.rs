//! Signed upload URLs for object-storage datasources.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;

use common::errors::{AppError, AppResult};
use common::models::S3Config;

/// How long a signed upload URL stays valid.
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(15 * 60);

/// Produces time-limited URLs that allow a PUT to one object.
#[async_trait]
pub trait UrlSigner: Send + Sync {
    async fn sign_put(
        &self,
        config: &S3Config,
        region: &str,
        bucket: &str,
        key: &str,
    ) -> AppResult<String>;
}

/// Signs with SigV4 using the datasource's own credentials.
#[derive(Debug, Default)]
pub struct S3UrlSigner;

#[async_trait]
impl UrlSigner for S3UrlSigner {
    async fn sign_put(
        &self,
        config: &S3Config,
        region: &str,
        bucket: &str,
        key: &str,
    ) -> AppResult<String> {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "datasource",
        );
        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials)
            .build();
        let client = aws_sdk_s3::Client::from_conf(s3_config);

        let presigning = PresigningConfig::expires_in(SIGNED_URL_TTL)
            .map_err(|e| AppError::Storage(e.to_string()))?;
        let request = client
            .put_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| AppError::Storage(format!("could not sign upload url: {}", e)))?;
        Ok(request.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signed_url_targets_bucket_and_key() {
        let config = S3Config {
            region: None,
            access_key_id: "AKIDEXAMPLE".into(),
            secret_access_key: "secret".into(),
            endpoint: None,
        };
        let url = S3UrlSigner
            .sign_put(&config, "eu-west-1", "my-bucket", "uploads/a.png")
            .await
            .unwrap();

        assert!(url.contains("my-bucket"));
        assert!(url.contains("uploads/a.png"));
        assert!(url.contains("X-Amz-Expires=900"));
        assert!(url.contains("AKIDEXAMPLE"));
    }
}
