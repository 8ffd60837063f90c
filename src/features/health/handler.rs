use axum::{Router, http::StatusCode, response::Json, routing::get};
use serde::Serialize;

use crate::state::AppState;

/// 根路径响应
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RootResponse {
    /// 服务说明
    #[schema(example = "Background Remover API")]
    pub message: String,
    /// 当前版本（Cargo package version）
    #[schema(example = "0.3.0")]
    pub version: String,
    /// 运行状态
    #[schema(example = "running")]
    pub status: String,
}

/// 健康检查响应
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    /// 服务状态
    #[schema(example = "healthy")]
    pub status: String,
    /// 服务名称
    #[schema(example = "bg-remover-backend")]
    pub service: String,
    /// 当前版本（Cargo package version）
    #[schema(example = "0.3.0")]
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/",
    summary = "服务信息",
    description = "返回服务名称、版本与状态；无需鉴权，不依赖抠图引擎。",
    responses((status = 200, description = "服务信息", body = RootResponse)),
    tag = "Health"
)]
pub async fn root() -> (StatusCode, Json<RootResponse>) {
    (
        StatusCode::OK,
        Json(RootResponse {
            message: "Background Remover API".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            status: "running".to_string(),
        }),
    )
}

#[utoipa::path(
    get,
    path = "/health",
    summary = "健康检查",
    description = "用于探活的健康检查端点，返回服务状态与版本信息。",
    responses((status = 200, description = "服务健康", body = HealthResponse)),
    tag = "Health"
)]
pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

pub fn create_health_router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
}
