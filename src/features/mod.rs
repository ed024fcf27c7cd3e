/// 令牌签发与 Bearer 校验
pub mod auth;
/// 健康检查
pub mod health;
/// 二维码文件管理
pub mod qr;
