//! Explicit per-request application context.
//!
//! Handlers that work on "the current app" take an `AppContext` argument
//! instead of reaching for ambient state.

use axum::{
    extract::FromRequestParts,
    http::{header::HeaderName, request::Parts},
};

use crate::errors::AppError;
use crate::utils::id_generator::{is_dev_app_id, is_prod_app_id};

/// Header carrying the id of the application a request targets.
pub static APP_ID_HEADER: HeaderName = HeaderName::from_static("x-app-id");

/// The application a request is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppContext {
    pub app_id: String,
}

impl AppContext {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
        }
    }

    /// Whether the request targets a published app.
    pub fn is_production(&self) -> bool {
        is_prod_app_id(&self.app_id)
    }

    /// Whether the request targets a builder copy of an app.
    pub fn is_development(&self) -> bool {
        is_dev_app_id(&self.app_id)
    }
}

impl<S> FromRequestParts<S> for AppContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let app_id = parts
            .headers
            .get(&APP_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::Validation("x-app-id header is required".to_string()))?;
        Ok(AppContext::new(app_id))
    }
}
