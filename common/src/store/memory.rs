//! In-process document store, used for development and tests.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{check_revision, doc_identity, next_revision, with_revision, DocumentStore};
use crate::errors::{AppError, AppResult};

type Database = BTreeMap<String, Value>;

/// Document store keeping every database in memory.
#[derive(Default)]
pub struct MemoryDocumentStore {
    databases: RwLock<HashMap<String, Database>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn stored_rev(doc: &Value) -> Option<&str> {
    doc.get("_rev").and_then(Value::as_str)
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, db: &str, id: &str) -> AppResult<Option<Value>> {
        let databases = self.databases.read().await;
        Ok(databases.get(db).and_then(|docs| docs.get(id)).cloned())
    }

    async fn put(&self, db: &str, doc: Value) -> AppResult<String> {
        let (id, supplied) = doc_identity(&doc)?;
        let mut databases = self.databases.write().await;
        let docs = databases.entry(db.to_string()).or_default();

        let stored = docs.get(&id).and_then(stored_rev);
        check_revision(&id, stored, supplied.as_deref())?;

        let rev = next_revision(stored);
        docs.insert(id, with_revision(doc, &rev));
        Ok(rev)
    }

    async fn remove(&self, db: &str, id: &str, rev: &str) -> AppResult<()> {
        let mut databases = self.databases.write().await;
        let docs = databases
            .get_mut(db)
            .ok_or_else(|| AppError::NotFound(format!("Document {} not found", id)))?;
        let stored = docs
            .get(id)
            .ok_or_else(|| AppError::NotFound(format!("Document {} not found", id)))?;
        check_revision(id, stored_rev(stored), Some(rev))?;
        docs.remove(id);
        if docs.is_empty() {
            databases.remove(db);
        }
        Ok(())
    }

    async fn all_docs(&self, db: &str, prefix: &str) -> AppResult<Vec<Value>> {
        let databases = self.databases.read().await;
        Ok(databases
            .get(db)
            .map(|docs| {
                docs.range(prefix.to_string()..)
                    .take_while(|(id, _)| id.starts_with(prefix))
                    .map(|(_, doc)| doc.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_databases(&self) -> AppResult<Vec<String>> {
        let databases = self.databases.read().await;
        let mut names: Vec<String> = databases.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn destroy_database(&self, db: &str) -> AppResult<()> {
        self.databases.write().await.remove(db);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_get_and_stale_revision() {
        let store = MemoryDocumentStore::new();
        let rev1 = store.put("app_1", json!({"_id": "query_a", "name": "a"})).await.unwrap();
        let doc = store.get("app_1", "query_a").await.unwrap().unwrap();
        assert_eq!(doc["_rev"], rev1.as_str());

        let rev2 = store
            .put("app_1", json!({"_id": "query_a", "_rev": rev1.clone(), "name": "b"}))
            .await
            .unwrap();
        assert_ne!(rev1, rev2);

        let stale = store
            .put("app_1", json!({"_id": "query_a", "_rev": rev1.clone(), "name": "c"}))
            .await;
        assert!(matches!(stale, Err(AppError::Conflict(_))));
        let doc = store.get("app_1", "query_a").await.unwrap().unwrap();
        assert_eq!(doc["name"], "b");
    }

    #[tokio::test]
    async fn test_all_docs_by_prefix() {
        let store = MemoryDocumentStore::new();
        for id in ["query_b", "datasource_1", "query_a", "app_metadata"] {
            store.put("app_1", json!({"_id": id})).await.unwrap();
        }
        let ids: Vec<String> = store
            .all_docs("app_1", "query_")
            .await
            .unwrap()
            .into_iter()
            .map(|doc| doc["_id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["query_a", "query_b"]);
        assert!(store.all_docs("app_2", "query_").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_requires_current_revision() {
        let store = MemoryDocumentStore::new();
        let rev = store.put("app_1", json!({"_id": "query_a"})).await.unwrap();
        assert!(store.remove("app_1", "query_a", "1-nope").await.is_err());
        store.remove("app_1", "query_a", &rev).await.unwrap();
        assert!(store.get("app_1", "query_a").await.unwrap().is_none());
        assert!(matches!(
            store.remove("app_1", "query_a", &rev).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_databases_listing_and_destroy() {
        let store = MemoryDocumentStore::new();
        store.put("app_dev_1", json!({"_id": "app_metadata"})).await.unwrap();
        store.put("app_1", json!({"_id": "app_metadata"})).await.unwrap();
        assert_eq!(store.list_databases().await.unwrap(), vec!["app_1", "app_dev_1"]);
        store.destroy_database("app_1").await.unwrap();
        assert_eq!(store.list_databases().await.unwrap(), vec!["app_dev_1"]);
    }
}
