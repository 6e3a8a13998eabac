//! Handler模块

use axum::{
    body::Body,
    extract::{Multipart, Path, Request, State},
    http::{header, HeaderMap, Uri},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};
use utoipa::ToSchema;

use common::errors::{AppError, AppResult};
use common::events::{notify, Event};
use common::middleware::AppContext;
use common::models::{AppMetadata, AppSummary, CreateAppRequest};
use common::response::ApiResponse;
use common::store::AppDb;
use common::utils::id_generator::APP_METADATA_ID;

use crate::apps::AppLifecycle;
use crate::attachments::{
    signed_upload_url, upload_files, Attachment, SignedUrlRequest, SignedUrlResponse,
    UploadedFile,
};
use crate::beta::{builder_root, ensure_beta_ui, NEW_DESIGN_UI_DIR};
use crate::cookies::{beta_cookie_name, clear_cookie, get_cookie, set_cookie, DESIGN_UI_COOKIE};
use crate::serve::{serve_app, ServedApp};
use crate::state::AppState;
use crate::SERVICE_NAME;

/// 客户端库文件名
pub const CLIENT_LIBRARY_FILE: &str = "client.js";

/// 访问已发布应用
#[utoipa::path(
    get,
    path = "/app/{app_url}",
    tag = "serving",
    params(("app_url" = String, Path, description = "应用 URL（slug）")),
    responses(
        (status = 200, description = "应用页面（测试环境下返回应用元数据）"),
        (status = 404, description = "应用未发布")
    )
)]
pub async fn serve_published_app(
    State(state): State<AppState>,
    Path(app_url): Path<String>,
) -> Result<ServedApp, AppError> {
    let metadata = AppLifecycle::new(&state).find_published(&app_url).await?;
    serve_app(&state, metadata).await
}

/// 在构建器中预览开发版应用
#[utoipa::path(
    get,
    path = "/preview/{app_id}",
    tag = "serving",
    params(("app_id" = String, Path, description = "应用 ID")),
    responses(
        (status = 200, description = "应用页面（测试环境下返回应用元数据）"),
        (status = 404, description = "应用未找到")
    )
)]
pub async fn serve_app_preview(
    State(state): State<AppState>,
    Path(app_id): Path<String>,
) -> Result<ServedApp, AppError> {
    let metadata: AppMetadata = AppDb::new(state.store.clone(), app_id)
        .get(APP_METADATA_ID)
        .await?;
    serve_app(&state, metadata).await
}

/// 构建器静态资源（根据 beta:design_ui Cookie 选择新旧 UI）
pub async fn serve_builder(State(state): State<AppState>, mut request: Request) -> Response {
    let beta_ui = get_cookie(request.headers(), DESIGN_UI_COOKIE).is_some();
    let root = builder_root(&state.config.top_level_path, beta_ui);

    let file = request
        .uri()
        .path()
        .strip_prefix("/builder")
        .unwrap_or_default()
        .to_string();
    let file = if file.is_empty() { "/".to_string() } else { file };

    match file.parse::<Uri>() {
        Ok(uri) => *request.uri_mut() = uri,
        Err(e) => return AppError::BadRequest(format!("invalid path: {}", e)).into_response(),
    }
    let response = match ServeDir::new(root).oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    };
    if response.status().is_success() && !file.contains("assets/") {
        notify(state.events.as_ref(), Event::ServedBuilder).await;
    }
    response.into_response()
}

/// 客户端库文件
#[utoipa::path(
    get,
    path = "/api/assets/client",
    tag = "serving",
    responses((status = 200, description = "客户端库 JavaScript 文件"))
)]
pub async fn serve_client_library(State(state): State<AppState>, request: Request) -> Response {
    let path = state.config.client_library_dir.join(CLIENT_LIBRARY_FILE);
    match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.map(Body::new).into_response(),
        Err(never) => match never {},
    }
}

/// 切换 Beta 功能（启用时按需下载 Beta UI 包）
#[utoipa::path(
    post,
    path = "/api/beta/{feature}",
    tag = "serving",
    params(("feature" = String, Path, description = "功能名称，例如 design_ui")),
    responses(
        (status = 200, description = "功能已启用或停用"),
        (status = 502, description = "Beta UI 包下载失败")
    )
)]
pub async fn toggle_beta_feature(
    State(state): State<AppState>,
    Path(feature): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let cookie = beta_cookie_name(&feature);

    if get_cookie(&headers, &cookie).is_some() {
        let body = ApiResponse::message(SERVICE_NAME, format!("{} disabled", feature));
        tracing::info!(feature = %feature, "beta feature disabled");
        return Ok(([(header::SET_COOKIE, clear_cookie(&cookie)?)], Json(body)).into_response());
    }

    let target = state.config.top_level_path.join(NEW_DESIGN_UI_DIR);
    ensure_beta_ui(&state.http_client, &state.config.beta_ui_archive_url, &target).await?;

    let body = ApiResponse::message(SERVICE_NAME, format!("{} enabled", feature));
    tracing::info!(feature = %feature, "beta feature enabled");
    Ok(([(header::SET_COOKIE, set_cookie(&cookie)?)], Json(body)).into_response())
}

/// 上传附件（multipart 字段 file，可多个）
#[utoipa::path(
    post,
    path = "/api/attachments/upload",
    tag = "attachments",
    params(("x-app-id" = String, Header, description = "应用 ID")),
    responses(
        (status = 200, description = "已上传的附件", body = Vec<Attachment>),
        (status = 400, description = "没有文件或上传失败")
    )
)]
pub async fn upload_attachments(
    State(state): State<AppState>,
    ctx: AppContext,
    multipart: Multipart,
) -> Result<Json<Vec<Attachment>>, AppError> {
    let files = read_files(multipart).await?;
    let attachments = upload_files(
        state.object_store.as_ref(),
        &state.config.object_store.apps_bucket,
        &ctx.app_id,
        files,
    )
    .await?;
    Ok(Json(attachments))
}

async fn read_files(mut multipart: Multipart) -> AppResult<Vec<UploadedFile>> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart payload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("file").to_string();
        let content_type = field.content_type().map(String::from);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("invalid file field: {}", e)))?;
        files.push(UploadedFile {
            name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }
    if files.is_empty() {
        return Err(AppError::Validation("No file was provided".to_string()));
    }
    Ok(files)
}

/// 为 S3 数据源生成带签名的上传 URL
#[utoipa::path(
    post,
    path = "/api/attachments/{datasource_id}/url",
    tag = "attachments",
    params(
        ("datasource_id" = String, Path, description = "数据源 ID"),
        ("x-app-id" = String, Header, description = "应用 ID")
    ),
    request_body = SignedUrlRequest,
    responses(
        (status = 200, description = "签名 URL 与公开 URL", body = SignedUrlResponse),
        (status = 400, description = "数据源不存在、类型不支持、配置了自定义 endpoint 或缺少 bucket/key")
    )
)]
pub async fn get_signed_upload_url(
    State(state): State<AppState>,
    ctx: AppContext,
    Path(datasource_id): Path<String>,
    Json(req): Json<SignedUrlRequest>,
) -> Result<Json<SignedUrlResponse>, AppError> {
    let db = AppDb::new(state.store.clone(), ctx.app_id);
    let response = signed_upload_url(&db, state.signer.as_ref(), &datasource_id, req).await?;
    Ok(Json(response))
}

/// 列出所有应用及其发布状态
#[utoipa::path(
    get,
    path = "/api/applications",
    tag = "applications",
    responses((status = 200, description = "应用列表", body = ApiResponse<Vec<AppSummary>>))
)]
pub async fn list_apps(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<AppSummary>>>, AppError> {
    let data = AppLifecycle::new(&state).list().await?;
    Ok(Json(ApiResponse::ok_with_service(data, SERVICE_NAME)))
}

/// 创建应用
#[utoipa::path(
    post,
    path = "/api/applications",
    tag = "applications",
    request_body = CreateAppRequest,
    responses(
        (status = 200, description = "应用已创建", body = ApiResponse<AppSummary>),
        (status = 400, description = "名称无效"),
        (status = 409, description = "URL 已被其他应用使用")
    )
)]
pub async fn create_app(
    State(state): State<AppState>,
    Json(req): Json<CreateAppRequest>,
) -> Result<Json<ApiResponse<AppSummary>>, AppError> {
    let data = AppLifecycle::new(&state).create(req).await?;
    Ok(Json(ApiResponse::ok_with_service(data, SERVICE_NAME)))
}

/// 发布应用
#[utoipa::path(
    post,
    path = "/api/applications/{app_id}/publish",
    tag = "applications",
    params(("app_id" = String, Path, description = "开发版应用 ID")),
    responses(
        (status = 200, description = "应用已发布", body = ApiResponse<AppSummary>),
        (status = 404, description = "应用未找到")
    )
)]
pub async fn publish_app(
    State(state): State<AppState>,
    Path(app_id): Path<String>,
) -> Result<Json<ApiResponse<AppSummary>>, AppError> {
    let data = AppLifecycle::new(&state).publish(&app_id).await?;
    let message = format!("{} published", data.name);
    Ok(Json(ApiResponse::ok_with_service(data, SERVICE_NAME).with_message(message)))
}

/// 取消发布应用
#[utoipa::path(
    post,
    path = "/api/applications/{app_id}/unpublish",
    tag = "applications",
    params(("app_id" = String, Path, description = "开发版应用 ID")),
    responses(
        (status = 200, description = "应用已取消发布", body = ApiResponse<AppSummary>),
        (status = 400, description = "应用尚未发布")
    )
)]
pub async fn unpublish_app(
    State(state): State<AppState>,
    Path(app_id): Path<String>,
) -> Result<Json<ApiResponse<AppSummary>>, AppError> {
    let data = AppLifecycle::new(&state).unpublish(&app_id).await?;
    let message = format!("{} unpublished", data.name);
    Ok(Json(ApiResponse::ok_with_service(data, SERVICE_NAME).with_message(message)))
}

/// 健康检查端点
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses((status = 200, description = "服务运行正常", body = HealthResponse))
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
