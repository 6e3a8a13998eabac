//! Application state for query service.

use std::sync::Arc;

use common::config::AppConfig;
use common::errors::AppResult;
use common::events::{EventEmitter, TracingEventEmitter};
use common::store::{DocumentStore, MemoryDocumentStore, SqliteDocumentStore};

use crate::quota::QueryQuota;
use crate::runner::{HttpQueryRunner, QueryRunner, Runner};
use crate::variables::{MemoryVariableCache, RedisVariableCache, VariableCache};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn DocumentStore>,
    pub runner: Runner,
    pub quota: Arc<QueryQuota>,
    pub events: Arc<dyn EventEmitter>,
    pub variables: Arc<dyn VariableCache>,
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

        let variables: Arc<dyn VariableCache> = match &config.redis_url {
            Some(url) => Arc::new(RedisVariableCache::connect(url).await?),
            None => Arc::new(MemoryVariableCache::new()),
        };

        let runner: Arc<dyn QueryRunner> = Arc::new(HttpQueryRunner::new(
            config.runner_url.clone(),
            reqwest::Client::new(),
        ));

        Ok(Self::with_parts(
            config,
            store,
            runner,
            Arc::new(TracingEventEmitter),
            variables,
        ))
    }

    /// Assembles the state from explicit collaborators.
    pub fn with_parts(
        config: AppConfig,
        store: Arc<dyn DocumentStore>,
        runner: Arc<dyn QueryRunner>,
        events: Arc<dyn EventEmitter>,
        variables: Arc<dyn VariableCache>,
    ) -> Self {
        Self {
            runner: Runner::new(runner, config.query_thread_timeout),
            quota: Arc::new(QueryQuota::new(config.query_quota_limit)),
            config,
            store,
            events,
            variables,
        }
    }
}
