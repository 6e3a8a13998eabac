//! Outbound notifications about things users did.
//!
//! Emission never decides the outcome of a request: `notify` logs a failed
//! emission and carries on.

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::errors::AppResult;

/// Notification emitted by the services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    QueryCreated { datasource_id: String, query_id: String },
    QueryUpdated { datasource_id: String, query_id: String },
    QueryDeleted { datasource_id: String, query_id: String },
    QueryPreviewed { datasource_id: String },
    QueriesImported { datasource_id: String, count: usize },
    DatasourceCreated { datasource_id: String, source: String },
    ServedBuilder,
    ServedApp { app_id: String, version: String },
    ServedAppPreview { app_id: String, version: String },
    AppPublished { app_id: String },
    AppUnpublished { app_id: String },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::QueryCreated { .. } => "query:created",
            Event::QueryUpdated { .. } => "query:updated",
            Event::QueryDeleted { .. } => "query:deleted",
            Event::QueryPreviewed { .. } => "query:previewed",
            Event::QueriesImported { .. } => "query:imported",
            Event::DatasourceCreated { .. } => "datasource:created",
            Event::ServedBuilder => "serve:builder",
            Event::ServedApp { .. } => "serve:app",
            Event::ServedAppPreview { .. } => "serve:app:preview",
            Event::AppPublished { .. } => "app:published",
            Event::AppUnpublished { .. } => "app:unpublished",
        }
    }
}

/// Sink for events.
#[async_trait]
pub trait EventEmitter: Send + Sync {
    async fn emit(&self, event: Event) -> AppResult<()>;
}

/// Emits the event; a failure is logged and swallowed.
pub async fn notify(emitter: &dyn EventEmitter, event: Event) {
    let name = event.name();
    if let Err(e) = emitter.emit(event).await {
        tracing::warn!(event = name, error = %e, "event emission failed");
    }
}

/// Writes every event as a structured log line.
#[derive(Debug, Default)]
pub struct TracingEventEmitter;

#[async_trait]
impl EventEmitter for TracingEventEmitter {
    async fn emit(&self, event: Event) -> AppResult<()> {
        let payload = serde_json::to_string(&event)?;
        tracing::info!(event = event.name(), payload = %payload, "event");
        Ok(())
    }
}

/// Keeps emitted events in memory for inspection.
#[derive(Debug, Default)]
pub struct RecordingEventEmitter {
    events: Mutex<Vec<Event>>,
}

impl RecordingEventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events emitted so far, oldest first.
    pub async fn events(&self) -> Vec<Event> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl EventEmitter for RecordingEventEmitter {
    async fn emit(&self, event: Event) -> AppResult<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}
