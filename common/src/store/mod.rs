//! Document store.
//!
//! Each application owns one database of JSON documents. Documents carry an
//! `_id` and a `_rev`; a write must present the current revision, otherwise it
//! fails with `AppError::Conflict` instead of overwriting.

mod memory;
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::errors::{AppError, AppResult};
use crate::utils::IdGenerator;

pub use memory::MemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

/// Backend holding the per-application document databases.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetches a document, `None` when it does not exist.
    async fn get(&self, db: &str, id: &str) -> AppResult<Option<Value>>;

    /// Creates or updates a document and returns its new revision.
    async fn put(&self, db: &str, doc: Value) -> AppResult<String>;

    /// Deletes a document at the given revision.
    async fn remove(&self, db: &str, id: &str, rev: &str) -> AppResult<()>;

    /// All documents whose id starts with `prefix`, ordered by id.
    async fn all_docs(&self, db: &str, prefix: &str) -> AppResult<Vec<Value>>;

    /// Names of all databases holding at least one document.
    async fn list_databases(&self) -> AppResult<Vec<String>>;

    /// Drops a database and every document in it.
    async fn destroy_database(&self, db: &str) -> AppResult<()>;
}

/// Reads `_id` and `_rev` out of a document about to be written.
pub(crate) fn doc_identity(doc: &Value) -> AppResult<(String, Option<String>)> {
    let id = doc
        .get("_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::Validation("document is missing an _id".to_string()))?;
    let rev = doc.get("_rev").and_then(Value::as_str).map(String::from);
    Ok((id.to_string(), rev))
}

/// Rejects a write whose revision does not match the stored one.
pub(crate) fn check_revision(id: &str, stored: Option<&str>, supplied: Option<&str>) -> AppResult<()> {
    match (stored, supplied) {
        (None, None) => Ok(()),
        (Some(current), Some(given)) if current == given => Ok(()),
        (None, Some(_)) => Err(AppError::Conflict(format!("{} does not exist", id))),
        (Some(_), _) => Err(AppError::Conflict(format!("{} has a newer revision", id))),
    }
}

/// Revision following `current`: `{n + 1}-{hex}`.
pub(crate) fn next_revision(current: Option<&str>) -> String {
    let generation = current
        .and_then(|rev| rev.split_once('-'))
        .and_then(|(n, _)| n.parse::<u64>().ok())
        .unwrap_or(0);
    format!("{}-{}", generation + 1, IdGenerator::short_id())
}

/// Sets `_rev` on a document.
pub(crate) fn with_revision(mut doc: Value, rev: &str) -> Value {
    if let Value::Object(map) = &mut doc {
        map.insert("_rev".to_string(), Value::String(rev.to_string()));
    }
    doc
}

/// Typed view of one application database.
#[derive(Clone)]
pub struct AppDb {
    store: Arc<dyn DocumentStore>,
    app_id: String,
}

impl AppDb {
    pub fn new(store: Arc<dyn DocumentStore>, app_id: impl Into<String>) -> Self {
        Self {
            store,
            app_id: app_id.into(),
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Fetches and decodes a document, failing with `NotFound` when absent.
    pub async fn get<T: DeserializeOwned>(&self, id: &str) -> AppResult<T> {
        self.try_get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Document {} not found", id)))
    }

    pub async fn try_get<T: DeserializeOwned>(&self, id: &str) -> AppResult<Option<T>> {
        match self.store.get(&self.app_id, id).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    /// Writes a document and returns its new revision.
    pub async fn put<T: Serialize>(&self, doc: &T) -> AppResult<String> {
        let value = serde_json::to_value(doc)?;
        self.store.put(&self.app_id, value).await
    }

    pub async fn remove(&self, id: &str, rev: &str) -> AppResult<()> {
        self.store.remove(&self.app_id, id, rev).await
    }

    pub async fn all_docs<T: DeserializeOwned>(&self, prefix: &str) -> AppResult<Vec<T>> {
        self.store
            .all_docs(&self.app_id, prefix)
            .await?
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(AppError::from))
            .collect()
    }

    /// Raw documents, used when copying a database wholesale.
    pub async fn all_raw(&self) -> AppResult<Vec<Value>> {
        self.store.all_docs(&self.app_id, "").await
    }

    pub async fn put_raw(&self, doc: Value) -> AppResult<String> {
        self.store.put(&self.app_id, doc).await
    }

    pub async fn exists(&self) -> AppResult<bool> {
        Ok(self
            .store
            .list_databases()
            .await?
            .iter()
            .any(|db| db == &self.app_id))
    }

    pub async fn destroy(&self) -> AppResult<()> {
        self.store.destroy_database(&self.app_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revision_generations_increase() {
        let first = next_revision(None);
        assert!(first.starts_with("1-"));
        let second = next_revision(Some(&first));
        assert!(second.starts_with("2-"));
    }

    #[test]
    fn test_check_revision() {
        assert!(check_revision("a", None, None).is_ok());
        assert!(check_revision("a", Some("1-x"), Some("1-x")).is_ok());
        assert!(matches!(check_revision("a", Some("2-y"), Some("1-x")), Err(AppError::Conflict(_))));
        assert!(matches!(check_revision("a", Some("1-x"), None), Err(AppError::Conflict(_))));
        assert!(matches!(check_revision("a", None, Some("1-x")), Err(AppError::Conflict(_))));
    }
}
