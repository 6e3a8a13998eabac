//! 应用发布与静态资源服务
//!
//! 提供以下功能：
//! - 应用创建、发布与取消发布
//! - 已发布应用与预览页面
//! - 构建器静态资源与 Beta UI 切换
//! - 附件上传与 S3 签名上传 URL
//! - 客户端库分发

pub mod apps;
pub mod attachments;
pub mod beta;
pub mod cookies;
pub mod handlers;
pub mod object_store;
pub mod render;
pub mod routes;
pub mod serve;
pub mod signer;
pub mod state;

use axum::{middleware, routing::get, Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use common::middleware::request_id_middleware;

pub use state::AppState;

pub const SERVICE_NAME: &str = "app-service";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "应用服务 API",
        version = "0.1.0",
        description = "应用发布、静态资源与附件微服务"
    ),
    paths(
        handlers::serve_published_app,
        handlers::serve_app_preview,
        handlers::serve_client_library,
        handlers::toggle_beta_feature,
        handlers::upload_attachments,
        handlers::get_signed_upload_url,
        handlers::list_apps,
        handlers::create_app,
        handlers::publish_app,
        handlers::unpublish_app,
        handlers::health_check,
    ),
    components(schemas(
        common::models::AppMetadata,
        common::models::AppStatus,
        common::models::AppSummary,
        common::models::CreateAppRequest,
        attachments::Attachment,
        attachments::SignedUrlRequest,
        attachments::SignedUrlResponse,
        handlers::HealthResponse,
    )),
    tags(
        (name = "applications", description = "应用生命周期端点"),
        (name = "serving", description = "应用与静态资源端点"),
        (name = "attachments", description = "附件端点"),
        (name = "health", description = "健康检查端点")
    )
)]
pub struct ApiDoc;

/// 创建带中间件的完整路由
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::router(state.config.max_upload_bytes))
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
