//! Attachment uploads and signed upload URLs.

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use common::errors::{AppError, AppResult};
use common::models::{Datasource, DatasourceSource};
use common::store::AppDb;

use crate::object_store::{attachment_url, ObjectStore};
use crate::signer::UrlSigner;

/// Region used when an S3 datasource does not name one.
pub const DEFAULT_AWS_REGION: &str = "eu-west-1";

/// A file received in a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Stored attachment as returned to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Attachment {
    pub size: u64,
    pub name: String,
    pub url: String,
    pub extension: String,
    pub key: String,
}

/// Body of a signed upload URL request.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct SignedUrlRequest {
    #[validate(required, length(min = 1))]
    pub bucket: Option<String>,
    #[validate(required, length(min = 1))]
    pub key: Option<String>,
}

/// Signed PUT url and the url the object will be readable at.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignedUrlResponse {
    pub signed_url: String,
    pub public_url: String,
}

/// Text after the last `.` of a file name.
pub fn extension_of(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or_default()
}

/// Uploads every file concurrently under `{app_id}/attachments/`.
///
/// Fails as a whole when any single upload fails.
pub async fn upload_files(
    store: &dyn ObjectStore,
    bucket: &str,
    app_id: &str,
    files: Vec<UploadedFile>,
) -> AppResult<Vec<Attachment>> {
    let uploads = files.into_iter().map(|file| async move {
        let extension = extension_of(&file.name).to_string();
        let key = format!(
            "{}/attachments/{}.{}",
            app_id,
            uuid::Uuid::new_v4(),
            extension
        );
        let size = file.bytes.len() as u64;
        let stored_key = store
            .upload(bucket, &key, file.bytes, file.content_type.as_deref())
            .await?;
        Ok::<_, AppError>(Attachment {
            size,
            name: file.name,
            url: attachment_url(bucket, &stored_key),
            extension,
            key: stored_key,
        })
    });

    let attachments = try_join_all(uploads).await?;
    tracing::info!(app_id, count = attachments.len(), "attachments uploaded");
    Ok(attachments)
}

/// Signs a direct-to-S3 upload for an object-storage datasource.
pub async fn signed_upload_url(
    db: &AppDb,
    signer: &dyn UrlSigner,
    datasource_id: &str,
    req: SignedUrlRequest,
) -> AppResult<SignedUrlResponse> {
    let not_found = || AppError::BadRequest("The specified datasource could not be found".to_string());
    let datasource: Datasource = db
        .try_get(datasource_id)
        .await
        .map_err(|_| not_found())?
        .ok_or_else(not_found)?;

    let config = match datasource.source {
        DatasourceSource::S3(config) => config,
        other => {
            return Err(AppError::BadRequest(format!(
                "Signed upload URLs are not supported for {} datasources",
                other.tag()
            )))
        }
    };
    if config.endpoint.as_deref().is_some_and(|e| !e.is_empty()) {
        return Err(AppError::BadRequest(
            "S3 datasources with custom endpoints are not supported".to_string(),
        ));
    }

    req.validate()
        .map_err(|_| AppError::BadRequest("bucket and key values are required".to_string()))?;
    let (Some(bucket), Some(key)) = (req.bucket, req.key) else {
        return Err(AppError::BadRequest("bucket and key values are required".to_string()));
    };

    let region = config
        .region
        .clone()
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| DEFAULT_AWS_REGION.to_string());
    let signed_url = signer
        .sign_put(&config, &region, &bucket, &key)
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    Ok(SignedUrlResponse {
        signed_url,
        public_url: format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use common::models::S3Config;
    use common::store::MemoryDocumentStore;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        keys: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl ObjectStore for RecordingStore {
        async fn upload(
            &self,
            _bucket: &str,
            key: &str,
            _bytes: Vec<u8>,
            _content_type: Option<&str>,
        ) -> AppResult<String> {
            if self.fail_on.is_some_and(|ext| key.ends_with(ext)) {
                return Err(AppError::Storage("bucket unavailable".into()));
            }
            self.keys.lock().await.push(key.to_string());
            Ok(key.to_string())
        }
    }

    struct FixedSigner;

    #[async_trait]
    impl UrlSigner for FixedSigner {
        async fn sign_put(
            &self,
            _config: &S3Config,
            region: &str,
            bucket: &str,
            key: &str,
        ) -> AppResult<String> {
            Ok(format!("https://signed/{}/{}/{}", region, bucket, key))
        }
    }

    fn file(name: &str) -> UploadedFile {
        UploadedFile {
            name: name.into(),
            content_type: None,
            bytes: b"data".to_vec(),
        }
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("photo.final.PNG"), "PNG");
        assert_eq!(extension_of("README"), "README");
    }

    #[tokio::test]
    async fn test_upload_keys_are_unique_and_scoped() {
        let store = RecordingStore::default();
        let attachments = upload_files(
            &store,
            "app-assets",
            "app_dev_1",
            vec![file("a.png"), file("a.png")],
        )
        .await
        .unwrap();

        assert_eq!(attachments.len(), 2);
        assert_ne!(attachments[0].key, attachments[1].key);
        for attachment in &attachments {
            assert!(attachment.key.starts_with("app_dev_1/attachments/"));
            assert!(attachment.key.ends_with(".png"));
            assert_eq!(attachment.url, format!("/app-assets/{}", attachment.key));
            assert_eq!(attachment.size, 4);
            assert_eq!(attachment.extension, "png");
        }
    }

    #[tokio::test]
    async fn test_one_failed_upload_fails_the_request() {
        let store = RecordingStore {
            fail_on: Some(".pdf"),
            ..Default::default()
        };
        let result = upload_files(&store, "b", "app_1", vec![file("a.png"), file("b.pdf")]).await;
        assert!(matches!(result, Err(AppError::Storage(_))));
    }

    async fn db_with(datasource: Datasource) -> AppDb {
        let db = AppDb::new(Arc::new(MemoryDocumentStore::new()), "app_dev_1");
        db.put(&datasource).await.unwrap();
        db
    }

    fn s3(endpoint: Option<&str>, region: Option<&str>) -> Datasource {
        Datasource {
            id: Some("datasource_s3".into()),
            rev: None,
            name: "files".into(),
            source: DatasourceSource::S3(S3Config {
                region: region.map(String::from),
                access_key_id: "id".into(),
                secret_access_key: "secret".into(),
                endpoint: endpoint.map(String::from),
            }),
        }
    }

    fn request(bucket: &str, key: &str) -> SignedUrlRequest {
        SignedUrlRequest {
            bucket: Some(bucket.into()),
            key: Some(key.into()),
        }
    }

    #[tokio::test]
    async fn test_signed_url_for_plain_s3_datasource() {
        let db = db_with(s3(None, None)).await;
        let response = signed_upload_url(&db, &FixedSigner, "datasource_s3", request("pics", "a.png"))
            .await
            .unwrap();
        assert_eq!(response.signed_url, "https://signed/eu-west-1/pics/a.png");
        assert_eq!(response.public_url, "https://pics.s3.eu-west-1.amazonaws.com/a.png");
    }

    #[tokio::test]
    async fn test_signed_url_rejections() {
        let db = db_with(s3(Some("https://minio.local"), Some("us-east-1"))).await;
        let custom = signed_upload_url(&db, &FixedSigner, "datasource_s3", request("b", "k")).await;
        assert!(matches!(custom, Err(AppError::BadRequest(_))));

        let missing = signed_upload_url(&db, &FixedSigner, "datasource_nope", request("b", "k")).await;
        assert!(matches!(missing, Err(AppError::BadRequest(m)) if m.contains("could not be found")));

        let mut rest = Datasource::rest("api", "https://api.io");
        rest.id = Some("datasource_rest".into());
        db.put(&rest).await.unwrap();
        let wrong_kind = signed_upload_url(&db, &FixedSigner, "datasource_rest", request("b", "k")).await;
        assert!(matches!(wrong_kind, Err(AppError::BadRequest(_))));

        let db = db_with(s3(None, Some("us-east-1"))).await;
        let no_key = signed_upload_url(
            &db,
            &FixedSigner,
            "datasource_s3",
            SignedUrlRequest {
                bucket: Some("b".into()),
                key: None,
            },
        )
        .await;
        assert!(matches!(no_key, Err(AppError::BadRequest(m)) if m == "bucket and key values are required"));
    }
}
