use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::features::auth::credentials::{CredentialStore, StaticCredentialStore};
use crate::features::auth::token::{JwtService, TokenSigner, TokenVerifier};
use crate::features::qr::QrStyle;

/// 二维码存储相关的只读设置
#[derive(Debug, Clone)]
pub struct QrSettings {
    /// PNG 存放目录
    pub storage_dir: PathBuf,
    /// 对外服务基地址（不含结尾斜杠）
    pub base_url: String,
    /// 静态下载路由前缀（不含斜杠）
    pub download_prefix: String,
    /// 请求未指定时使用的样式
    pub default_style: QrStyle,
}

impl QrSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            storage_dir: config.download_path(),
            base_url: config.storage.base_url.trim_end_matches('/').to_string(),
            download_prefix: config.storage.download_prefix.trim_matches('/').to_string(),
            default_style: QrStyle::from(&config.qr),
        }
    }

    /// 拼接某个二维码文件的下载地址
    pub fn download_url(&self, filename: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.download_prefix, filename)
    }
}

/// 聚合的应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub credentials: Arc<dyn CredentialStore>,
    pub signer: Arc<dyn TokenSigner>,
    /// Bearer 校验器（显式注入，handler 通过 `AuthenticatedSubject` 使用）
    pub verifier: Arc<dyn TokenVerifier>,
    pub token_lifetime: chrono::Duration,
    pub qr: Arc<QrSettings>,
}

impl AppState {
    /// 按配置装配默认实现：配置文件用户表 + HS256 JWT
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        config
            .validate()
            .map_err(|e| AppError::Internal(format!("配置无效: {e}")))?;
        let token_lifetime = config
            .auth
            .access_token_lifetime()
            .map_err(|e| AppError::Internal(format!("配置无效: {e}")))?;
        let credentials = Arc::new(StaticCredentialStore::from_entries(&config.auth.users)?);
        let jwt = Arc::new(JwtService::from_config(&config.auth)?);
        Ok(Self {
            credentials,
            signer: jwt.clone(),
            verifier: jwt,
            token_lifetime,
            qr: Arc::new(QrSettings::from_config(config)),
        })
    }
}
