//! Middleware and extractors shared by all services.

pub mod app_context;
pub mod request_id;

// Re-export commonly used types
pub use app_context::{AppContext, APP_ID_HEADER};
pub use request_id::{request_id_middleware, RequestId, REQUEST_ID_HEADER};
