use axum::{extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// 健康检查响应
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// healthy / degraded
    #[schema(example = "healthy")]
    pub status: String,
    #[schema(example = "qr-backend")]
    pub service: String,
    #[schema(example = "0.1.0")]
    pub version: String,
    /// 二维码存储目录是否可用
    pub storage_ready: bool,
}

#[utoipa::path(
    get,
    path = "/health",
    summary = "健康检查",
    description = "返回服务状态与版本；存储目录缺失时状态为 degraded 并返回 503。",
    responses(
        (status = 200, description = "服务健康", body = HealthResponse),
        (status = 503, description = "存储目录不可用", body = HealthResponse)
    ),
    tag = "Health"
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let storage_ready = tokio::fs::metadata(&state.qr.storage_dir)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    let (code, status) = if storage_ready {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            storage_ready,
        }),
    )
}
