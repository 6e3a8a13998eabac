//! Query usage metering.

use std::collections::HashMap;
use std::future::Future;

use tokio::sync::Mutex;

use common::errors::{AppError, AppResult};

/// Counts successful query runs per application against an optional limit.
#[derive(Debug, Default)]
pub struct QueryQuota {
    limit: Option<u64>,
    usage: Mutex<HashMap<String, u64>>,
}

impl QueryQuota {
    pub fn new(limit: Option<u64>) -> Self {
        Self {
            limit,
            usage: Mutex::new(HashMap::new()),
        }
    }

    /// Runs `action` if the app is under its limit; a successful run is counted.
    ///
    /// The slot is reserved before the action runs and released if it fails,
    /// so concurrent runs cannot overshoot the limit.
    pub async fn add_query<F, Fut, T>(&self, app_id: &str, action: F) -> AppResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        {
            let mut usage = self.usage.lock().await;
            let used = usage.entry(app_id.to_string()).or_insert(0);
            if let Some(limit) = self.limit {
                if *used >= limit {
                    return Err(AppError::UsageLimit(format!(
                        "Usage limit of {} queries reached for this app",
                        limit
                    )));
                }
            }
            *used += 1;
        }

        let output = action().await;
        if output.is_err() {
            let mut usage = self.usage.lock().await;
            if let Some(used) = usage.get_mut(app_id) {
                *used = used.saturating_sub(1);
            }
        }
        output
    }

    /// Runs recorded for an app, in-flight ones included.
    pub async fn usage(&self, app_id: &str) -> u64 {
        self.usage.lock().await.get(app_id).copied().unwrap_or(0)
    }
}
