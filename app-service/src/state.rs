//! Application state for app service.

use std::sync::Arc;

use common::config::AppConfig;
use common::errors::AppResult;
use common::events::{EventEmitter, TracingEventEmitter};
use common::store::{DocumentStore, MemoryDocumentStore, SqliteDocumentStore};

use crate::object_store::{LocalObjectStore, ObjectStore, S3ObjectStore};
use crate::render::{DefaultShellRenderer, ShellRenderer};
use crate::signer::{S3UrlSigner, UrlSigner};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn DocumentStore>,
    pub events: Arc<dyn EventEmitter>,
    pub object_store: Arc<dyn ObjectStore>,
    pub signer: Arc<dyn UrlSigner>,
    pub renderer: Arc<dyn ShellRenderer>,
    pub http_client: reqwest::Client,
}

impl AppState {
    /// Creates the state from configuration, connecting to the configured backends.
    pub async fn new(config: AppConfig) -> AppResult<Self> {
        let store: Arc<dyn DocumentStore> = match &config.database_url {
            Some(url) => Arc::new(SqliteDocumentStore::connect(url).await?),
            None => {
                tracing::warn!("DATABASE_URL not set, documents are kept in memory");
                Arc::new(MemoryDocumentStore::new())
            }
        };

        let object_store: Arc<dyn ObjectStore> = match &config.object_store.local_dir {
            Some(dir) => {
                tracing::info!(dir = %dir.display(), "attachments are stored on the local filesystem");
                Arc::new(LocalObjectStore::new(dir.clone()))
            }
            None => Arc::new(S3ObjectStore::from_env(config.object_store.region.clone()).await),
        };

        Ok(Self::with_parts(
            config,
            store,
            Arc::new(TracingEventEmitter),
            object_store,
            Arc::new(S3UrlSigner),
        ))
    }

    /// Assembles the state from explicit collaborators.
    pub fn with_parts(
        config: AppConfig,
        store: Arc<dyn DocumentStore>,
        events: Arc<dyn EventEmitter>,
        object_store: Arc<dyn ObjectStore>,
        signer: Arc<dyn UrlSigner>,
    ) -> Self {
        Self {
            config,
            store,
            events,
            object_store,
            signer,
            renderer: Arc::new(DefaultShellRenderer),
            http_client: reqwest::Client::new(),
        }
    }
}
