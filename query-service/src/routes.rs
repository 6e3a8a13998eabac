//! 查询服务路由模块

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::handlers::{
    delete_query, execute_query_v1, execute_query_v2, fetch_queries, find_query, health_check,
    import_queries, preview_query, save_query,
};
use crate::state::AppState;

/// 创建查询管理与执行路由
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/queries", get(fetch_queries).post(save_query))
        .route("/api/queries/import", post(import_queries))
        .route("/api/queries/preview", post(preview_query))
        .route(
            "/api/queries/{query_id}",
            get(find_query).post(execute_query_v1),
        )
        .route("/api/queries/{query_id}/{rev_id}", delete(delete_query))
        .route("/api/v2/queries/{query_id}", post(execute_query_v2))
        .route("/api/health", get(health_check))
}
