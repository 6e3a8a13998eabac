//! Application lifecycle: create, list, publish, unpublish.
//!
//! Every application has a development database (`app_dev_…`) edited in the
//! builder. Publishing copies it wholesale into the production database
//! (`app_…`); an app counts as published exactly while that copy exists.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use validator::Validate;

use common::errors::{AppError, AppResult};
use common::events::{notify, Event, EventEmitter};
use common::models::{AppMetadata, AppStatus, AppSummary, CreateAppRequest};
use common::store::{AppDb, DocumentStore};
use common::utils::id_generator::{
    is_dev_app_id, is_prod_app_id, prod_app_id, APP_DEV_PREFIX, APP_METADATA_ID,
};
use common::utils::IdGenerator;

use crate::state::AppState;

/// Application lifecycle service.
pub struct AppLifecycle {
    store: Arc<dyn DocumentStore>,
    events: Arc<dyn EventEmitter>,
    public_base_url: String,
}

impl AppLifecycle {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            events: state.events.clone(),
            public_base_url: state.config.public_base_url.clone(),
        }
    }

    fn db(&self, app_id: &str) -> AppDb {
        AppDb::new(self.store.clone(), app_id)
    }

    /// Creates a new, unpublished application.
    pub async fn create(&self, req: CreateAppRequest) -> AppResult<AppSummary> {
        req.validate()?;
        let app_id = IdGenerator::dev_app_id();
        let mut metadata = AppMetadata::new(&app_id, req.name.trim(), env!("CARGO_PKG_VERSION"));
        if metadata.slug().is_empty() {
            // names without ascii letters or digits fall back to the id suffix
            let suffix = app_id.strip_prefix(APP_DEV_PREFIX).unwrap_or(&app_id);
            metadata.url = format!("/{}", suffix);
        }
        if let Some(owner) = self.app_with_slug(metadata.slug()).await? {
            return Err(AppError::Conflict(format!(
                "url {} is already used by {}",
                metadata.url, owner
            )));
        }
        self.db(&app_id).put(&metadata).await?;
        tracing::info!(app_id = %app_id, url = %metadata.url, "application created");
        self.summary(&app_id).await
    }

    /// Every application, with its publish state.
    pub async fn list(&self) -> AppResult<Vec<AppSummary>> {
        let mut apps = Vec::new();
        for db_name in self.store.list_databases().await? {
            if !is_dev_app_id(&db_name) {
                continue;
            }
            match self.summary(&db_name).await {
                Ok(summary) => apps.push(summary),
                Err(AppError::NotFound(_)) => {
                    tracing::debug!(app_id = %db_name, "database without app metadata skipped");
                }
                Err(e) => return Err(e),
            }
        }
        apps.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.app_id.cmp(&b.app_id)));
        Ok(apps)
    }

    /// Development app whose url slug is `slug`, if any.
    async fn app_with_slug(&self, slug: &str) -> AppResult<Option<String>> {
        for db_name in self.store.list_databases().await? {
            if !is_dev_app_id(&db_name) {
                continue;
            }
            let metadata: Option<AppMetadata> = self.db(&db_name).try_get(APP_METADATA_ID).await?;
            if metadata.is_some_and(|m| m.slug() == slug) {
                return Ok(Some(db_name));
            }
        }
        Ok(None)
    }

    /// Builder view of one application.
    pub async fn summary(&self, app_id: &str) -> AppResult<AppSummary> {
        let metadata: AppMetadata = self.db(app_id).get(APP_METADATA_ID).await?;
        let published: Option<AppMetadata> =
            self.db(&prod_app_id(app_id)).try_get(APP_METADATA_ID).await?;

        let summary = match published {
            Some(live) => AppSummary {
                app_id: app_id.to_string(),
                name: metadata.name,
                url: metadata.url,
                status: AppStatus::Published,
                public_url: Some(format!("{}/app/{}", self.public_base_url, live.slug())),
                last_published_at: live.published_at,
            },
            None => AppSummary {
                app_id: app_id.to_string(),
                name: metadata.name,
                url: metadata.url,
                status: AppStatus::Unpublished,
                public_url: None,
                last_published_at: None,
            },
        };
        Ok(summary)
    }

    /// Replaces the production copy with the current development documents.
    pub async fn publish(&self, app_id: &str) -> AppResult<AppSummary> {
        ensure_dev_app_id(app_id)?;
        let dev = self.db(app_id);
        let _: AppMetadata = dev.get(APP_METADATA_ID).await?;

        let prod_id = prod_app_id(app_id);
        let docs = publishable_docs(dev.all_raw().await?, &prod_id, Utc::now());
        let copied = docs.len();

        let prod = self.db(&prod_id);
        prod.destroy().await.map_err(|e| {
            tracing::error!(app_id = %app_id, prod_id = %prod_id, error = %e, "clearing production copy failed");
            e
        })?;
        for (written, doc) in docs.into_iter().enumerate() {
            let doc_id = doc.get("_id").and_then(Value::as_str).unwrap_or_default().to_string();
            if let Err(e) = prod.put_raw(doc).await {
                tracing::error!(
                    app_id = %app_id,
                    prod_id = %prod_id,
                    doc_id = %doc_id,
                    written,
                    total = copied,
                    error = %e,
                    "copying document to production failed"
                );
                // a partial copy must not stay live
                if let Err(cleanup) = prod.destroy().await {
                    tracing::error!(prod_id = %prod_id, error = %cleanup, "removing partial production copy failed");
                }
                return Err(AppError::Internal(format!(
                    "publish of {} stopped at {} ({}/{} documents copied): {}",
                    app_id, doc_id, written, copied, e
                )));
            }
        }

        notify(
            self.events.as_ref(),
            Event::AppPublished {
                app_id: app_id.to_string(),
            },
        )
        .await;
        tracing::info!(app_id = %app_id, prod_id = %prod_id, documents = copied, "application published");
        self.summary(app_id).await
    }

    /// Removes the production copy of an application.
    pub async fn unpublish(&self, app_id: &str) -> AppResult<AppSummary> {
        ensure_dev_app_id(app_id)?;
        let prod = self.db(&prod_app_id(app_id));
        if !prod.exists().await? {
            return Err(AppError::BadRequest(format!("{} is not published", app_id)));
        }
        prod.destroy().await?;

        notify(
            self.events.as_ref(),
            Event::AppUnpublished {
                app_id: app_id.to_string(),
            },
        )
        .await;
        tracing::info!(app_id = %app_id, "application unpublished");
        self.summary(app_id).await
    }

    /// Metadata of the published app reachable under `/app/{slug}`.
    pub async fn find_published(&self, slug: &str) -> AppResult<AppMetadata> {
        for db_name in self.store.list_databases().await? {
            if !is_prod_app_id(&db_name) {
                continue;
            }
            let metadata: Option<AppMetadata> = self.db(&db_name).try_get(APP_METADATA_ID).await?;
            if let Some(metadata) = metadata.filter(|m| m.slug() == slug) {
                return Ok(metadata);
            }
        }
        Err(AppError::NotFound(format!("No published app at /app/{}", slug)))
    }
}

/// Development documents as they are stored in the production copy:
/// revisions dropped, metadata pointing at the production id and stamped.
fn publishable_docs(docs: Vec<Value>, prod_id: &str, published_at: DateTime<Utc>) -> Vec<Value> {
    let published_at = Value::String(published_at.to_rfc3339());
    docs.into_iter()
        .map(|mut doc| {
            if let Value::Object(map) = &mut doc {
                map.remove("_rev");
                if map.get("_id").and_then(Value::as_str) == Some(APP_METADATA_ID) {
                    map.insert("appId".to_string(), Value::String(prod_id.to_string()));
                    map.insert("publishedAt".to_string(), published_at.clone());
                }
            }
            doc
        })
        .collect()
}

fn ensure_dev_app_id(app_id: &str) -> AppResult<()> {
    if is_dev_app_id(app_id) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "{} is not a development app id",
            app_id
        )))
    }
}
