use std::io;
use std::path::{Path, PathBuf};

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// 应用统一错误类型
#[derive(Error, Debug, utoipa::ToSchema)]
pub enum AppError {
    /// 认证失败（凭据错误、缺少或无效的 Bearer 令牌）
    #[error("认证失败: {0}")]
    Unauthorized(String),

    /// 资源不存在
    #[error("资源不存在: {0}")]
    NotFound(String),

    /// 资源冲突（如同名二维码已存在）
    #[error("资源冲突: {0}")]
    Conflict(String),

    /// 参数校验错误
    #[error("参数校验错误: {0}")]
    Validation(String),

    /// 内部服务器错误
    #[error("内部错误: {0}")]
    Internal(String),

    /// 二维码文件操作错误
    #[error("{0}")]
    QrFile(#[from] QrFileError),
}

/// 二维码文件操作错误（封闭的错误种类，调用方可穷举匹配）
#[derive(Error, Debug, utoipa::ToSchema)]
pub enum QrFileError {
    /// 目录或文件不存在
    #[error("路径不存在: {}", path.display())]
    NotFound {
        #[schema(value_type = String)]
        path: PathBuf,
    },

    /// 操作系统拒绝访问
    #[error("无权访问 {}: {source}", path.display())]
    PermissionDenied {
        #[schema(value_type = String)]
        path: PathBuf,
        #[schema(value_type = String)]
        source: io::Error,
    },

    /// 其他 I/O 错误
    #[error("I/O 错误 {}: {source}", path.display())]
    Io {
        #[schema(value_type = String)]
        path: PathBuf,
        #[schema(value_type = String)]
        source: io::Error,
    },

    /// 图像编码失败
    #[error("二维码编码失败: {0}")]
    Encode(String),

    /// 数据超出最大版本（40）的容量
    #[error("数据过长，超出二维码最大容量")]
    DataTooLong,

    /// 样式参数无效（颜色、模块尺寸）
    #[error("样式参数无效: {0}")]
    InvalidStyle(String),
}

impl QrFileError {
    /// 按 `io::ErrorKind` 归类操作系统错误
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        let path = path.to_path_buf();
        match err.kind() {
            io::ErrorKind::NotFound => QrFileError::NotFound { path },
            io::ErrorKind::PermissionDenied => QrFileError::PermissionDenied { path, source: err },
            _ => QrFileError::Io { path, source: err },
        }
    }
}

impl From<qrcode::types::QrError> for QrFileError {
    fn from(err: qrcode::types::QrError) -> Self {
        match err {
            qrcode::types::QrError::DataTooLong => QrFileError::DataTooLong,
            other => QrFileError::Encode(other.to_string()),
        }
    }
}

impl From<image::ImageError> for QrFileError {
    fn from(err: image::ImageError) -> Self {
        QrFileError::Encode(err.to_string())
    }
}

/// RFC7807 风格的错误响应（Problem Details）。
///
/// - 让所有 API 错误返回结构化 JSON，便于调用方稳定处理
/// - 与 OpenAPI 一致（content-type = application/problem+json）
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetails {
    /// 问题类型（URI）。若无更细分的类型，可使用 about:blank。
    #[serde(rename = "type")]
    #[schema(example = "about:blank")]
    pub type_url: String,

    /// 简短标题，用于概括错误。
    #[schema(example = "Unauthorized")]
    pub title: String,

    /// HTTP 状态码（与响应 status 一致）。
    #[schema(example = 401)]
    pub status: u16,

    /// 人类可读的详细信息（尽量稳定，不建议依赖解析）。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// 稳定的错误码，用于程序化处理。
    #[schema(example = "UNAUTHORIZED")]
    pub code: String,

    /// 可选：请求追踪 ID。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::QrFile(e) => match e {
                QrFileError::NotFound { .. } => StatusCode::NOT_FOUND,
                QrFileError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
                QrFileError::DataTooLong | QrFileError::InvalidStyle(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                QrFileError::Io { .. } | QrFileError::Encode(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    fn stable_code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Validation(_) => "VALIDATION_FAILED",
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::QrFile(e) => match e {
                QrFileError::NotFound { .. } => "NOT_FOUND",
                QrFileError::PermissionDenied { .. } => "PERMISSION_DENIED",
                QrFileError::DataTooLong => "QR_DATA_TOO_LONG",
                QrFileError::InvalidStyle(_) => "QR_INVALID_STYLE",
                QrFileError::Encode(_) => "QR_ENCODE_FAILED",
                QrFileError::Io { .. } => "IO_ERROR",
            },
        }
    }

    fn title(&self) -> &'static str {
        match self.status_code() {
            StatusCode::UNAUTHORIZED => "Unauthorized",
            StatusCode::FORBIDDEN => "Forbidden",
            StatusCode::NOT_FOUND => "Not Found",
            StatusCode::CONFLICT => "Conflict",
            StatusCode::UNPROCESSABLE_ENTITY => "Validation Failed",
            StatusCode::INTERNAL_SERVER_ERROR => "Internal Server Error",
            _ => "Error",
        }
    }

    /// 对外展示的详细信息：文件错误不回显服务端的绝对路径
    fn public_detail(&self) -> String {
        match self {
            AppError::Unauthorized(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::Validation(msg)
            | AppError::Internal(msg) => msg.clone(),
            AppError::QrFile(e) => match e {
                QrFileError::NotFound { path } => {
                    format!("QR code {} not found", file_name_of(path))
                }
                QrFileError::PermissionDenied { path, .. } => {
                    format!("permission denied: {}", file_name_of(path))
                }
                QrFileError::Io { .. } => "I/O error while accessing QR storage".to_string(),
                other => other.to_string(),
            },
        }
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let problem = ProblemDetails {
            type_url: "about:blank".to_string(),
            title: self.title().to_string(),
            status: status.as_u16(),
            detail: Some(self.public_detail()),
            code: self.stable_code().to_string(),
            request_id: crate::request_id::current_request_id(),
        };

        let mut res = Json(problem).into_response();
        *res.status_mut() = status;
        res.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        if status == StatusCode::UNAUTHORIZED {
            res.headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        res
    }
}
