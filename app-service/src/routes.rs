//! 应用服务路由模块

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::handlers::{
    create_app, get_signed_upload_url, health_check, list_apps, publish_app, serve_app_preview,
    serve_builder, serve_client_library, serve_published_app, toggle_beta_feature,
    unpublish_app, upload_attachments,
};
use crate::state::AppState;

/// 创建应用发布、静态资源与附件路由
///
/// `max_upload_bytes` 为附件上传请求体的大小上限
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/app/{app_url}", get(serve_published_app))
        .route("/preview/{app_id}", get(serve_app_preview))
        .route("/builder", get(serve_builder))
        .route("/builder/{*path}", get(serve_builder))
        .route("/api/assets/client", get(serve_client_library))
        .route("/api/beta/{feature}", post(toggle_beta_feature))
        .route(
            "/api/attachments/upload",
            post(upload_attachments).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/api/attachments/{datasource_id}/url", post(get_signed_upload_url))
        .route("/api/applications", get(list_apps).post(create_app))
        .route("/api/applications/{app_id}/publish", post(publish_app))
        .route("/api/applications/{app_id}/unpublish", post(unpublish_app))
        .route("/api/health", get(health_check))
}
