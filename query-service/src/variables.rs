//! Dynamic variable bookkeeping.
//!
//! Dynamic variables live in a datasource's config and their cached values
//! live in the variable cache. Deleting a query must clear both.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::Mutex;

use common::errors::AppResult;
use common::models::{Datasource, DynamicVariable, Query};
use common::store::AppDb;

/// Cache holding the values of dynamic variables between query runs.
#[async_trait]
pub trait VariableCache: Send + Sync {
    /// Evicts the cached values of the given variables.
    async fn invalidate(&self, variables: &[DynamicVariable]) -> AppResult<()>;
}

/// Variable cache stored in Redis.
pub struct RedisVariableCache {
    conn: ConnectionManager,
}

impl RedisVariableCache {
    pub async fn connect(url: &str) -> AppResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl VariableCache for RedisVariableCache {
    async fn invalidate(&self, variables: &[DynamicVariable]) -> AppResult<()> {
        if variables.is_empty() {
            return Ok(());
        }
        let keys: Vec<String> = variables.iter().map(DynamicVariable::cache_key).collect();
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(keys).await?;
        Ok(())
    }
}

/// In-process variable cache.
#[derive(Debug, Default)]
pub struct MemoryVariableCache {
    values: Mutex<HashMap<String, String>>,
    invalidated: Mutex<Vec<DynamicVariable>>,
}

impl MemoryVariableCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, variable: &DynamicVariable, value: impl Into<String>) {
        self.values
            .lock()
            .await
            .insert(variable.cache_key(), value.into());
    }

    pub async fn get(&self, variable: &DynamicVariable) -> Option<String> {
        self.values.lock().await.get(&variable.cache_key()).cloned()
    }

    /// Every variable invalidated so far.
    pub async fn invalidated(&self) -> Vec<DynamicVariable> {
        self.invalidated.lock().await.clone()
    }
}

#[async_trait]
impl VariableCache for MemoryVariableCache {
    async fn invalidate(&self, variables: &[DynamicVariable]) -> AppResult<()> {
        let mut values = self.values.lock().await;
        for variable in variables {
            values.remove(&variable.cache_key());
        }
        self.invalidated.lock().await.extend_from_slice(variables);
        Ok(())
    }
}

/// Removes the dynamic variables created by `query_id` from its datasource
/// and evicts their cached values.
///
/// Both steps finish before this returns, so the caller can delete the query
/// afterwards without leaving variables that point at it.
pub async fn remove_dynamic_variables(
    db: &AppDb,
    cache: &dyn VariableCache,
    query_id: &str,
) -> AppResult<()> {
    let query: Query = db.get(query_id).await?;
    let mut datasource: Datasource = db.get(&query.datasource_id).await?;
    if datasource.dynamic_variables().is_empty() {
        return Ok(());
    }

    let removed = datasource.take_dynamic_variables_of(query_id);
    db.put(&datasource).await?;
    cache.invalidate(&removed).await?;

    tracing::info!(
        query_id = %query_id,
        datasource_id = %query.datasource_id,
        removed = removed.len(),
        "dynamic variables removed"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use common::models::DatasourceSource;
    use common::store::MemoryDocumentStore;
    use serde_json::json;

    fn variable(name: &str, query_id: &str) -> DynamicVariable {
        DynamicVariable {
            name: name.into(),
            query_id: query_id.into(),
            value: format!("{{{{ data.{} }}}}", name),
        }
    }

    async fn seed(variables: Vec<DynamicVariable>) -> AppDb {
        let db = AppDb::new(Arc::new(MemoryDocumentStore::new()), "app_dev_1");
        let mut ds = Datasource::rest("api", "https://api.io");
        ds.id = Some("datasource_1".into());
        if let DatasourceSource::Rest(config) = &mut ds.source {
            config.dynamic_variables = variables;
        }
        db.put(&ds).await.unwrap();
        for id in ["query_a", "query_b"] {
            db.put_raw(json!({
                "_id": id,
                "datasourceId": "datasource_1",
                "name": id,
                "queryVerb": "read"
            }))
            .await
            .unwrap();
        }
        db
    }

    #[tokio::test]
    async fn test_removes_exactly_the_query_variables() {
        let db = seed(vec![
            variable("token", "query_a"),
            variable("user", "query_b"),
            variable("org", "query_a"),
        ])
        .await;
        let cache = MemoryVariableCache::new();
        cache.set(&variable("token", "query_a"), "abc").await;
        cache.set(&variable("user", "query_b"), "bob").await;

        remove_dynamic_variables(&db, &cache, "query_a").await.unwrap();

        let ds: Datasource = db.get("datasource_1").await.unwrap();
        assert_eq!(ds.dynamic_variables(), &[variable("user", "query_b")]);
        assert_eq!(
            cache.invalidated().await,
            vec![variable("token", "query_a"), variable("org", "query_a")]
        );
        assert_eq!(cache.get(&variable("token", "query_a")).await, None);
        assert_eq!(cache.get(&variable("user", "query_b")).await.as_deref(), Some("bob"));
    }

    #[tokio::test]
    async fn test_no_variables_is_a_noop() {
        let db = seed(Vec::new()).await;
        let before: Datasource = db.get("datasource_1").await.unwrap();
        let cache = MemoryVariableCache::new();

        remove_dynamic_variables(&db, &cache, "query_a").await.unwrap();

        let after: Datasource = db.get("datasource_1").await.unwrap();
        assert_eq!(before.rev, after.rev);
        assert!(cache.invalidated().await.is_empty());
    }
}
