use crate::config::AppConfig;
use crate::error::AppError;
use crate::features::auth::token::resolve_jwt_secret;
use crate::features::qr;

/// 执行启动检查
///
/// 1. 确保二维码存储目录存在
/// 2. 确认签名密钥已配置
/// 3. 提示未配置登录用户的情况
pub async fn run_startup_checks(config: &AppConfig) -> Result<(), AppError> {
    tracing::info!("🔍 开始执行启动检查...");

    let dir = config.download_path();
    tokio::task::spawn_blocking(move || qr::create_directory(&dir))
        .await
        .map_err(|e| AppError::Internal(format!("存储目录检查任务失败: {e}")))??;
    tracing::info!("✅ 二维码存储目录就绪: {:?}", config.download_path());

    resolve_jwt_secret(&config.auth)?;

    if config.auth.users.is_empty() {
        tracing::warn!("⚠️ 未配置 auth.users，所有登录请求都会被拒绝");
    } else {
        tracing::info!("✅ 已加载 {} 个登录用户", config.auth.users.len());
    }

    tracing::info!("✅ 启动检查完成");
    Ok(())
}
