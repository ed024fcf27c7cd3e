use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use super::service::{self, QR_FILE_EXTENSION};
use super::style::QrStyle;
use crate::error::AppError;
use crate::features::auth::bearer::AuthenticatedSubject;
use crate::state::AppState;

/// 由数据推导的文件名（不含扩展名）最大长度
const MAX_STEM_LEN: usize = 200;

#[derive(Debug, Deserialize, ToSchema)]
pub struct QrCodeRequest {
    /// 要编码的内容
    #[schema(example = "https://example.com/landing")]
    pub url: String,
    /// 深色模块颜色，缺省取配置值
    #[serde(default)]
    #[schema(example = "red")]
    pub fill_color: Option<String>,
    /// 背景颜色，缺省取配置值
    #[serde(default)]
    #[schema(example = "white")]
    pub back_color: Option<String>,
    /// 模块像素边长，缺省取配置值
    #[serde(default)]
    #[schema(example = 10)]
    pub size: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QrCodeResponse {
    #[schema(example = "QR code created successfully.")]
    pub message: String,
    #[schema(example = "http://localhost:8000/downloads/aHR0cHM6Ly9leGFtcGxlLmNvbQ.png")]
    pub qr_code_url: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QrLink {
    pub filename: String,
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QrCodeListResponse {
    pub links: Vec<QrLink>,
}

/// 由内容推导文件名：短内容用 URL-safe base64，过长时退化为 SHA-256
pub fn filename_for(data: &str) -> String {
    let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(data.as_bytes());
    let stem = if encoded.len() <= MAX_STEM_LEN {
        encoded
    } else {
        let digest = Sha256::digest(data.as_bytes());
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        format!("sha256-{hex}")
    };
    format!("{stem}{QR_FILE_EXTENSION}")
}

/// 只接受存储目录下的扁平 `.png` 文件名
fn validate_filename(name: &str) -> Result<&str, AppError> {
    let ok = name.ends_with(QR_FILE_EXTENSION)
        && name.len() > QR_FILE_EXTENSION.len()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
        && !name.contains("..");
    if ok {
        Ok(name)
    } else {
        Err(AppError::Validation(format!("非法的二维码文件名: {name}")))
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("文件任务失败: {e}")))?
}

#[utoipa::path(
    post,
    path = "/qr-codes",
    summary = "生成二维码",
    description = "将 url 编码为二维码 PNG 并保存到存储目录，返回下载地址。颜色与尺寸缺省取服务端配置。",
    request_body = QrCodeRequest,
    responses(
        (status = 201, description = "生成成功", body = QrCodeResponse),
        (status = 401, description = "缺少或无效的 Bearer 令牌", body = AppError),
        (status = 409, description = "同名二维码已存在", body = AppError),
        (status = 422, description = "内容过长或样式无效", body = AppError)
    ),
    security(("bearer" = [])),
    tag = "QR"
)]
pub async fn create_qr_code(
    State(state): State<AppState>,
    subject: AuthenticatedSubject,
    Json(req): Json<QrCodeRequest>,
) -> Result<(StatusCode, Json<QrCodeResponse>), AppError> {
    if req.url.is_empty() {
        return Err(AppError::Validation("url 不能为空".into()));
    }

    let settings = state.qr.clone();
    let defaults = &settings.default_style;
    let style = QrStyle {
        fill_color: req.fill_color.unwrap_or_else(|| defaults.fill_color.clone()),
        back_color: req.back_color.unwrap_or_else(|| defaults.back_color.clone()),
        box_size: req.size.unwrap_or(defaults.box_size),
        border: defaults.border,
    };
    let filename = filename_for(&req.url);
    let path = settings.storage_dir.join(&filename);

    tracing::info!(
        target: "qr_backend::qr",
        "create qr: user={} file={}",
        subject.username(),
        filename
    );

    let data = req.url;
    run_blocking(move || {
        if path.exists() {
            return Err(AppError::Conflict(
                "QR code already exists. Delete it first to regenerate.".into(),
            ));
        }
        service::generate_qr_code(&data, &path, &style)?;
        Ok(())
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(QrCodeResponse {
            message: "QR code created successfully.".to_string(),
            qr_code_url: settings.download_url(&filename),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/qr-codes",
    summary = "列出二维码",
    description = "列出存储目录中的全部二维码文件及其下载地址。",
    responses(
        (status = 200, description = "二维码列表", body = QrCodeListResponse),
        (status = 401, description = "缺少或无效的 Bearer 令牌", body = AppError),
        (status = 404, description = "存储目录不存在", body = AppError)
    ),
    security(("bearer" = [])),
    tag = "QR"
)]
pub async fn list_qr_codes(
    State(state): State<AppState>,
    _subject: AuthenticatedSubject,
) -> Result<Json<QrCodeListResponse>, AppError> {
    let settings = state.qr.clone();
    let dir = settings.storage_dir.clone();
    let names = run_blocking(move || Ok(service::list_qr_codes(&dir)?)).await?;

    let links = names
        .into_iter()
        .map(|filename| QrLink {
            url: settings.download_url(&filename),
            filename,
        })
        .collect();
    Ok(Json(QrCodeListResponse { links }))
}

#[utoipa::path(
    delete,
    path = "/qr-codes/{filename}",
    summary = "删除二维码",
    params(("filename" = String, Path, description = "二维码文件名（含 .png）")),
    responses(
        (status = 204, description = "已删除"),
        (status = 401, description = "缺少或无效的 Bearer 令牌", body = AppError),
        (status = 404, description = "文件不存在", body = AppError),
        (status = 422, description = "文件名非法", body = AppError)
    ),
    security(("bearer" = [])),
    tag = "QR"
)]
pub async fn delete_qr_code(
    State(state): State<AppState>,
    subject: AuthenticatedSubject,
    Path(filename): Path<String>,
) -> Result<StatusCode, AppError> {
    let name = validate_filename(&filename)?;
    let path = state.qr.storage_dir.join(name);
    tracing::info!(
        target: "qr_backend::qr",
        "delete qr: user={} file={}",
        subject.username(),
        name
    );
    run_blocking(move || Ok(service::delete_qr_code(&path)?)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_qr_router() -> Router<AppState> {
    Router::<AppState>::new()
        .route("/qr-codes", get(list_qr_codes).post(create_qr_code))
        .route("/qr-codes/:filename", delete(delete_qr_code))
}
