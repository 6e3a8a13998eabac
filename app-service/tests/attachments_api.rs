use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::task::JoinHandle;

use app_service::object_store::LocalObjectStore;
use app_service::signer::UrlSigner;
use app_service::{build_app, AppState};
use common::config::AppConfig;
use common::errors::AppResult;
use common::events::RecordingEventEmitter;
use common::models::{Datasource, DatasourceSource, S3Config};
use common::store::{AppDb, DocumentStore, MemoryDocumentStore};

const APP_ID: &str = "app_dev_5e2b";

struct StubSigner;

#[async_trait]
impl UrlSigner for StubSigner {
    async fn sign_put(
        &self,
        _config: &S3Config,
        region: &str,
        bucket: &str,
        key: &str,
    ) -> AppResult<String> {
        Ok(format!("https://{bucket}.s3.{region}.amazonaws.com/{key}?X-Amz-Signature=stub"))
    }
}

struct Fixture {
    addr: SocketAddr,
    store: Arc<dyn DocumentStore>,
    objects: TempDir,
    _handle: JoinHandle<()>,
}

async fn spawn_service() -> Fixture {
    let objects = tempfile::tempdir().unwrap();
    let config = AppConfig::default();
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
    let state = AppState::with_parts(
        config,
        store.clone(),
        Arc::new(RecordingEventEmitter::new()),
        Arc::new(LocalObjectStore::new(objects.path())),
        Arc::new(StubSigner),
    );
    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("listener should have addr");
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("service should run");
    });
    Fixture {
        addr,
        store,
        objects,
        _handle: handle,
    }
}

fn s3_datasource(id: &str, endpoint: Option<&str>) -> Datasource {
    Datasource {
        id: Some(id.to_string()),
        rev: None,
        name: id.to_string(),
        source: DatasourceSource::S3(S3Config {
            region: Some("us-west-2".into()),
            access_key_id: "AKID".into(),
            secret_access_key: "secret".into(),
            endpoint: endpoint.map(String::from),
        }),
    }
}

#[tokio::test]
async fn uploads_every_file_under_the_app_prefix() {
    let f = spawn_service().await;
    let form = reqwest::multipart::Form::new()
        .part(
            "file",
            reqwest::multipart::Part::bytes(b"first".to_vec()).file_name("report.pdf"),
        )
        .part(
            "file",
            reqwest::multipart::Part::bytes(b"second!".to_vec()).file_name("logo.png"),
        );

    let response = reqwest::Client::new()
        .post(format!("http://{}/api/attachments/upload", f.addr))
        .header("x-app-id", APP_ID)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let attachments: Vec<Value> = response.json().await.unwrap();
    assert_eq!(attachments.len(), 2);

    let bucket = AppConfig::default().object_store.apps_bucket;
    for (attachment, (name, size, ext)) in attachments
        .iter()
        .zip([("report.pdf", 5, "pdf"), ("logo.png", 7, "png")])
    {
        let key = attachment["key"].as_str().unwrap();
        assert!(key.starts_with(&format!("{APP_ID}/attachments/")));
        assert!(key.ends_with(&format!(".{ext}")));
        assert_eq!(attachment["name"], name);
        assert_eq!(attachment["size"], size);
        assert_eq!(attachment["extension"], ext);
        assert_eq!(attachment["url"], format!("/{bucket}/{key}"));
        assert!(f.objects.path().join(&bucket).join(key).exists());
    }
}

#[tokio::test]
async fn uploads_larger_than_the_default_body_limit() {
    let f = spawn_service().await;
    let photo = vec![0xAB_u8; 3 * 1024 * 1024];
    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(photo).file_name("photo.jpg"),
    );

    let response = reqwest::Client::new()
        .post(format!("http://{}/api/attachments/upload", f.addr))
        .header("x-app-id", APP_ID)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let attachments: Vec<Value> = response.json().await.unwrap();
    assert_eq!(attachments[0]["size"], 3 * 1024 * 1024);
    assert_eq!(attachments[0]["extension"], "jpg");

    let bucket = AppConfig::default().object_store.apps_bucket;
    let key = attachments[0]["key"].as_str().unwrap();
    let written = std::fs::metadata(f.objects.path().join(&bucket).join(key)).unwrap();
    assert_eq!(written.len(), 3 * 1024 * 1024);
}

#[tokio::test]
async fn upload_without_files_is_rejected() {
    let f = spawn_service().await;
    let form = reqwest::multipart::Form::new().text("note", "no files here");
    let response = reqwest::Client::new()
        .post(format!("http://{}/api/attachments/upload", f.addr))
        .header("x-app-id", APP_ID)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn signed_upload_url_for_s3_datasource() {
    let f = spawn_service().await;
    AppDb::new(f.store.clone(), APP_ID)
        .put(&s3_datasource("datasource_s3", None))
        .await
        .unwrap();

    let response = reqwest::Client::new()
        .post(format!("http://{}/api/attachments/datasource_s3/url", f.addr))
        .header("x-app-id", APP_ID)
        .json(&json!({ "bucket": "media", "key": "uploads/cat.png" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["publicUrl"],
        "https://media.s3.us-west-2.amazonaws.com/uploads/cat.png"
    );
    assert!(body["signedUrl"].as_str().unwrap().contains("X-Amz-Signature"));
}

#[tokio::test]
async fn signed_upload_url_rejects_unsupported_datasources() {
    let f = spawn_service().await;
    let db = AppDb::new(f.store.clone(), APP_ID);
    db.put(&s3_datasource("datasource_minio", Some("https://minio.internal")))
        .await
        .unwrap();
    let mut rest = Datasource::rest("api", "https://api.example.com");
    rest.id = Some("datasource_rest".into());
    db.put(&rest).await.unwrap();
    db.put(&s3_datasource("datasource_s3", None)).await.unwrap();

    let client = reqwest::Client::new();
    let cases = [
        ("datasource_missing", json!({ "bucket": "b", "key": "k" })),
        ("datasource_rest", json!({ "bucket": "b", "key": "k" })),
        ("datasource_minio", json!({ "bucket": "b", "key": "k" })),
        ("datasource_s3", json!({ "bucket": "b" })),
        ("datasource_s3", json!({ "bucket": "", "key": "k" })),
    ];
    for (datasource_id, body) in cases {
        let response = client
            .post(format!("http://{}/api/attachments/{datasource_id}/url", f.addr))
            .header("x-app-id", APP_ID)
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400, "{datasource_id} {body}");
    }
}
