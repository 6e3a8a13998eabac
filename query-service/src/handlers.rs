//! Handler模块

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use common::errors::AppError;
use common::middleware::AppContext;
use common::models::{ExecuteRequest, PreviewRequest, PreviewResponse, Query};
use common::response::ApiResponse;

use crate::service::{execution_body, ImportRequest, ImportResponse, QueryService};
use crate::state::AppState;
use crate::SERVICE_NAME;

/// 列出当前应用的全部查询
#[utoipa::path(
    get,
    path = "/api/queries",
    tag = "queries",
    params(("x-app-id" = String, Header, description = "应用 ID")),
    responses(
        (status = 200, description = "查询列表", body = Vec<Query>),
        (status = 400, description = "缺少应用上下文")
    )
)]
pub async fn fetch_queries(
    State(state): State<AppState>,
    ctx: AppContext,
) -> Result<Json<Vec<Query>>, AppError> {
    let service = QueryService::new(&state, &ctx);
    Ok(Json(service.fetch().await?))
}

/// 根据 ID 获取查询（已发布应用不返回 fields / parameters）
#[utoipa::path(
    get,
    path = "/api/queries/{query_id}",
    tag = "queries",
    params(
        ("query_id" = String, Path, description = "查询 ID"),
        ("x-app-id" = String, Header, description = "应用 ID")
    ),
    responses(
        (status = 200, description = "查询详情", body = Query),
        (status = 404, description = "查询未找到")
    )
)]
pub async fn find_query(
    State(state): State<AppState>,
    ctx: AppContext,
    Path(query_id): Path<String>,
) -> Result<Json<Query>, AppError> {
    let service = QueryService::new(&state, &ctx);
    Ok(Json(service.find(&query_id).await?))
}

/// 创建或更新查询
#[utoipa::path(
    post,
    path = "/api/queries",
    tag = "queries",
    params(("x-app-id" = String, Header, description = "应用 ID")),
    request_body = Query,
    responses(
        (status = 200, description = "查询已保存", body = ApiResponse<Query>),
        (status = 400, description = "请求参数错误"),
        (status = 404, description = "数据源未找到"),
        (status = 409, description = "修订版本冲突")
    )
)]
pub async fn save_query(
    State(state): State<AppState>,
    ctx: AppContext,
    Json(query): Json<Query>,
) -> Result<Json<ApiResponse<Query>>, AppError> {
    let service = QueryService::new(&state, &ctx);
    let saved = service.save(query).await?;
    let message = format!("Query {} saved successfully.", saved.name);
    Ok(Json(
        ApiResponse::ok_with_service(saved, SERVICE_NAME).with_message(message),
    ))
}

/// 删除查询，并清理其产生的动态变量
#[utoipa::path(
    delete,
    path = "/api/queries/{query_id}/{rev_id}",
    tag = "queries",
    params(
        ("query_id" = String, Path, description = "查询 ID"),
        ("rev_id" = String, Path, description = "当前修订版本"),
        ("x-app-id" = String, Header, description = "应用 ID")
    ),
    responses(
        (status = 200, description = "查询已删除"),
        (status = 404, description = "查询未找到"),
        (status = 409, description = "修订版本冲突")
    )
)]
pub async fn delete_query(
    State(state): State<AppState>,
    ctx: AppContext,
    Path((query_id, rev_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let service = QueryService::new(&state, &ctx);
    service.destroy(&query_id, &rev_id).await?;
    Ok(Json(ApiResponse::message(SERVICE_NAME, "Query deleted.")))
}

/// 从 OpenAPI / Swagger 文档批量导入查询
#[utoipa::path(
    post,
    path = "/api/queries/import",
    tag = "queries",
    params(("x-app-id" = String, Header, description = "应用 ID")),
    request_body = ImportRequest,
    responses(
        (status = 200, description = "导入结果", body = ImportResponse),
        (status = 400, description = "无法识别的导入格式")
    )
)]
pub async fn import_queries(
    State(state): State<AppState>,
    ctx: AppContext,
    Json(req): Json<ImportRequest>,
) -> Result<Json<ImportResponse>, AppError> {
    let service = QueryService::new(&state, &ctx);
    Ok(Json(service.import(req).await?))
}

/// 预览未保存的查询
#[utoipa::path(
    post,
    path = "/api/queries/preview",
    tag = "execution",
    params(("x-app-id" = String, Header, description = "应用 ID")),
    request_body = PreviewRequest,
    responses(
        (status = 200, description = "预览结果", body = PreviewResponse),
        (status = 400, description = "执行失败、超时或超出配额")
    )
)]
pub async fn preview_query(
    State(state): State<AppState>,
    ctx: AppContext,
    Json(req): Json<PreviewRequest>,
) -> Result<Json<PreviewResponse>, AppError> {
    let service = QueryService::new(&state, &ctx);
    Ok(Json(service.preview(req).await?))
}

/// 执行已保存的查询（V1：直接返回结果行）
#[utoipa::path(
    post,
    path = "/api/queries/{query_id}",
    tag = "execution",
    params(
        ("query_id" = String, Path, description = "查询 ID"),
        ("x-app-id" = String, Header, description = "应用 ID")
    ),
    request_body = ExecuteRequest,
    responses(
        (status = 200, description = "结果行"),
        (status = 400, description = "执行失败、超时或超出配额"),
        (status = 404, description = "查询未找到")
    )
)]
pub async fn execute_query_v1(
    State(state): State<AppState>,
    ctx: AppContext,
    Path(query_id): Path<String>,
    body: Option<Json<ExecuteRequest>>,
) -> Result<Json<Vec<Value>>, AppError> {
    let service = QueryService::new(&state, &ctx);
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let output = service.execute(&query_id, req).await?;
    Ok(Json(output.rows))
}

/// 执行已保存的查询（V2：返回 data、分页信息与附加字段）
#[utoipa::path(
    post,
    path = "/api/v2/queries/{query_id}",
    tag = "execution",
    params(
        ("query_id" = String, Path, description = "查询 ID"),
        ("x-app-id" = String, Header, description = "应用 ID")
    ),
    request_body = ExecuteRequest,
    responses(
        (status = 200, description = "执行结果 {data, pagination, ...}"),
        (status = 400, description = "执行失败、超时或超出配额"),
        (status = 404, description = "查询未找到")
    )
)]
pub async fn execute_query_v2(
    State(state): State<AppState>,
    ctx: AppContext,
    Path(query_id): Path<String>,
    body: Option<Json<ExecuteRequest>>,
) -> Result<Json<Value>, AppError> {
    let service = QueryService::new(&state, &ctx);
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let output = service.execute(&query_id, req).await?;
    Ok(Json(execution_body(output)))
}

/// 健康检查端点
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "服务运行正常", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: state.config.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

/// 健康检查响应
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// 服务状态
    pub status: String,
    /// 服务名称
    pub service: String,
    /// 服务版本
    pub version: String,
    /// 当前时间戳
    pub timestamp: DateTime<Utc>,
}
