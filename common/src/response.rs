//! API response wrapper types.
//!
//! Endpoints whose body shape is fixed by the client contract (query lists,
//! execution results, attachments) return their payload directly; everything
//! else, and every error, uses this envelope.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Standard API response wrapper.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,

    /// Response data (present on success).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    /// Human-readable outcome, e.g. "Query deleted.".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Error details (present on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,

    /// Response metadata.
    pub meta: ResponseMeta,
}

/// API error details.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    /// Error code for client handling (e.g., "VALIDATION_ERROR", "NOT_FOUND").
    pub code: String,

    /// Human-readable error message.
    pub message: String,
}

/// Response metadata.
#[derive(Debug, Serialize, ToSchema)]
pub struct ResponseMeta {
    /// Response timestamp.
    pub timestamp: DateTime<Utc>,

    /// Service name that handled the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

impl Default for ResponseMeta {
    fn default() -> Self {
        Self {
            timestamp: Utc::now(),
            service: None,
        }
    }
}

impl ResponseMeta {
    /// Creates a new ResponseMeta with service name.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: Some(service.into()),
            ..Default::default()
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response with data.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
            meta: ResponseMeta::default(),
        }
    }

    /// Creates a successful response with service name.
    pub fn ok_with_service(data: T, service: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
            meta: ResponseMeta::with_service(service),
        }
    }

    /// Sets the human-readable message on the response.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    /// Creates an error response.
    pub fn err(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
            meta: ResponseMeta::default(),
        }
    }

    /// Creates a success response carrying only a message.
    pub fn message(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
            error: None,
            meta: ResponseMeta::with_service(service),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope_shape() {
        let value = serde_json::to_value(ApiResponse::err("NOT_FOUND", "gone")).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["code"], "NOT_FOUND");
        assert_eq!(value["error"]["message"], "gone");
        assert!(value.get("data").is_none());
    }

    #[test]
    fn test_message_envelope_shape() {
        let value =
            serde_json::to_value(ApiResponse::message("query-service", "Query deleted.")).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["message"], "Query deleted.");
        assert_eq!(value["meta"]["service"], "query-service");
    }
}
