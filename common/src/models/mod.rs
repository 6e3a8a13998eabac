//! Shared data models for all services.

pub mod app;
pub mod datasource;
pub mod query;

// Re-export commonly used types
pub use app::{AppMetadata, AppStatus, AppSummary, CreateAppRequest};
pub use datasource::{
    Datasource, DatasourceSource, DynamicVariable, RestConfig, S3Config, SqlConfig,
};
pub use query::{
    ExecuteRequest, PreviewRequest, PreviewResponse, Query, QueryParameter, QueryVerb,
    RunRequest, RunResponse,
};
