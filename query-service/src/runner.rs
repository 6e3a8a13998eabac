//! Query runner client.
//!
//! The runner is an external engine that talks to the datasource. This
//! module only builds its input, bounds the call with a timeout and hands
//! back its output.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use common::errors::{AppError, AppResult};
use common::models::{RunRequest, RunResponse};

/// Engine that executes a query against its datasource.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    async fn run(&self, request: RunRequest) -> AppResult<RunResponse>;
}

/// Runner reached over HTTP: `POST {base_url}/run`.
pub struct HttpQueryRunner {
    base_url: String,
    http_client: reqwest::Client,
}

#[derive(Deserialize)]
struct RunnerFailure {
    #[serde(alias = "error")]
    message: String,
}

impl HttpQueryRunner {
    pub fn new(base_url: impl Into<String>, http_client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        }
    }
}

#[async_trait]
impl QueryRunner for HttpQueryRunner {
    async fn run(&self, request: RunRequest) -> AppResult<RunResponse> {
        let url = format!("{}/run", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Execution(format!("query runner unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<RunnerFailure>(&body)
                .map(|f| f.message)
                .unwrap_or_else(|_| format!("query runner responded with {}: {}", status, body));
            return Err(AppError::Execution(message));
        }

        response
            .json::<RunResponse>()
            .await
            .map_err(|e| AppError::Execution(format!("invalid query runner response: {}", e)))
    }
}

/// Runner handle bounding every run with a timeout.
#[derive(Clone)]
pub struct Runner {
    inner: Arc<dyn QueryRunner>,
    timeout: Duration,
}

impl Runner {
    pub fn new(inner: Arc<dyn QueryRunner>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub async fn run(&self, request: RunRequest) -> AppResult<RunResponse> {
        let query_id = request.query_id.clone().unwrap_or_default();
        match tokio::time::timeout(self.timeout, self.inner.run(request)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(query_id = %query_id, timeout_ms = self.timeout.as_millis() as u64, "query run timed out");
                Err(AppError::Execution(format!(
                    "Query response time exceeded {}ms timeout.",
                    self.timeout.as_millis()
                )))
            }
        }
    }
}
