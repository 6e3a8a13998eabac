//! 查询存储与执行服务
//!
//! 提供以下功能：
//! - 查询的增删改查（按应用隔离）
//! - 查询预览与执行（V1 / V2 响应格式）
//! - 执行配额与超时控制
//! - 删除查询时清理动态变量
//! - 从 OpenAPI / Swagger 文档批量导入查询

pub mod datasource;
pub mod handlers;
pub mod import;
pub mod quota;
pub mod routes;
pub mod runner;
pub mod service;
pub mod state;
pub mod variables;

use axum::{middleware, routing::get, Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use common::middleware::request_id_middleware;

pub use state::AppState;

pub const SERVICE_NAME: &str = "query-service";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "查询服务 API",
        version = "0.1.0",
        description = "查询存储与执行微服务"
    ),
    paths(
        handlers::fetch_queries,
        handlers::find_query,
        handlers::save_query,
        handlers::delete_query,
        handlers::import_queries,
        handlers::preview_query,
        handlers::execute_query_v1,
        handlers::execute_query_v2,
        handlers::health_check,
    ),
    components(schemas(
        common::models::Query,
        common::models::QueryVerb,
        common::models::QueryParameter,
        common::models::PreviewRequest,
        common::models::PreviewResponse,
        common::models::ExecuteRequest,
        service::ImportRequest,
        service::ImportResponse,
        import::ImportResult,
        import::ImportFailure,
        handlers::HealthResponse,
    )),
    tags(
        (name = "queries", description = "查询管理端点"),
        (name = "execution", description = "查询执行端点"),
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
        .merge(routes::router())
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
