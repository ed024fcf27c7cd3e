use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 全局配置单例
static CONFIG: OnceCell<AppConfig> = OnceCell::new();

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: String,
    /// 日志格式
    pub format: String,
}

/// API 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API 路由前缀
    pub prefix: String,
}

/// CORS 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// 是否启用 CORS
    #[serde(default = "CorsConfig::default_enabled")]
    pub enabled: bool,
    /// 允许的 Origin 列表（支持 "*" 表示任意）
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    /// 允许的方法列表（支持 "*" 表示任意）
    #[serde(default)]
    pub allowed_methods: Vec<String>,
    /// 允许的请求头列表（支持 "*" 表示任意）
    #[serde(default)]
    pub allowed_headers: Vec<String>,
    /// 暴露的响应头列表（支持 "*" 表示任意）
    #[serde(default)]
    pub expose_headers: Vec<String>,
    /// 是否允许携带凭证（Cookie/Authorization）
    #[serde(default = "CorsConfig::default_allow_credentials")]
    pub allow_credentials: bool,
    /// 预检缓存时间（秒）
    #[serde(default)]
    pub max_age_secs: Option<u64>,
}

impl CorsConfig {
    fn default_enabled() -> bool {
        false
    }

    fn default_allow_credentials() -> bool {
        false
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            allowed_origins: Vec::new(),
            allowed_methods: Vec::new(),
            allowed_headers: Vec::new(),
            expose_headers: Vec::new(),
            allow_credentials: Self::default_allow_credentials(),
            max_age_secs: None,
        }
    }
}

/// 可登录用户（口令以 PBKDF2 哈希保存，见 `features::auth::credentials::hash_password`）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEntry {
    pub username: String,
    /// 形如 `pbkdf2-sha256$<rounds>$<salt_b64>$<hash_b64>`
    pub password_hash: String,
}

/// 访问令牌有效期上限（分钟，366 天）
pub const MAX_TOKEN_EXPIRE_MINUTES: i64 = 366 * 24 * 60;

/// 令牌签发配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 签名密钥（为空时回退到环境变量 APP_AUTH_JWT_SECRET）
    #[serde(default)]
    pub jwt_secret: String,
    /// 令牌签发方（iss）
    #[serde(default = "AuthConfig::default_issuer")]
    pub jwt_issuer: String,
    /// 访问令牌有效期（分钟）
    #[serde(default = "AuthConfig::default_expire_minutes")]
    pub access_token_expire_minutes: u64,
    /// 允许登录的用户列表
    #[serde(default)]
    pub users: Vec<UserEntry>,
}

impl AuthConfig {
    fn default_issuer() -> String {
        "qr-backend".to_string()
    }
    fn default_expire_minutes() -> u64 {
        30
    }

    /// 访问令牌有效期；取值须在 1..=MAX_TOKEN_EXPIRE_MINUTES 之间
    pub fn access_token_lifetime(&self) -> Result<chrono::Duration, ConfigError> {
        let minutes = self.access_token_expire_minutes;
        i64::try_from(minutes)
            .ok()
            .filter(|m| (1..=MAX_TOKEN_EXPIRE_MINUTES).contains(m))
            .and_then(chrono::TimeDelta::try_minutes)
            .ok_or_else(|| {
                ConfigError::Message(format!(
                    "auth.access_token_expire_minutes 必须在 1..={MAX_TOKEN_EXPIRE_MINUTES} 之间: {minutes}"
                ))
            })
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            jwt_issuer: Self::default_issuer(),
            access_token_expire_minutes: Self::default_expire_minutes(),
            users: Vec::new(),
        }
    }
}

/// 二维码文件存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 对外访问的服务基地址，用于拼接下载链接
    #[serde(default = "StorageConfig::default_base_url")]
    pub base_url: String,
    /// 二维码 PNG 存放目录
    #[serde(default = "StorageConfig::default_download_folder")]
    pub download_folder: String,
    /// 静态下载路由前缀（不含斜杠）
    #[serde(default = "StorageConfig::default_download_prefix")]
    pub download_prefix: String,
}

impl StorageConfig {
    fn default_base_url() -> String {
        "http://localhost:8000".to_string()
    }
    fn default_download_folder() -> String {
        "./downloads".to_string()
    }
    fn default_download_prefix() -> String {
        "downloads".to_string()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            download_folder: Self::default_download_folder(),
            download_prefix: Self::default_download_prefix(),
        }
    }
}

/// 二维码默认样式
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrConfig {
    #[serde(default = "QrConfig::default_fill")]
    pub fill_color: String,
    #[serde(default = "QrConfig::default_back")]
    pub back_color: String,
    /// 每个模块的像素边长
    #[serde(default = "QrConfig::default_box_size")]
    pub box_size: u32,
    /// 空白边框宽度（模块数）
    #[serde(default = "QrConfig::default_border")]
    pub border: u32,
}

impl QrConfig {
    fn default_fill() -> String {
        "red".to_string()
    }
    fn default_back() -> String {
        "white".to_string()
    }
    fn default_box_size() -> u32 {
        10
    }
    fn default_border() -> u32 {
        5
    }
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            fill_color: Self::default_fill(),
            back_color: Self::default_back(),
            box_size: Self::default_box_size(),
            border: Self::default_border(),
        }
    }
}

/// 优雅退出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// 优雅退出超时时间（秒）
    #[serde(default = "ShutdownConfig::default_timeout")]
    pub timeout_secs: u64,
}

impl ShutdownConfig {
    fn default_timeout() -> u64 {
        30
    }

    /// 获取优雅退出超时时间
    pub fn timeout_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Self::default_timeout(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub api: ApiConfig,
    /// CORS 配置
    #[serde(default)]
    pub cors: CorsConfig,
    /// 令牌签发配置
    #[serde(default)]
    pub auth: AuthConfig,
    /// 二维码存储配置
    #[serde(default)]
    pub storage: StorageConfig,
    /// 二维码默认样式
    #[serde(default)]
    pub qr: QrConfig,
    /// 优雅退出配置
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

impl AppConfig {
    /// 从配置文件加载配置，支持环境变量覆盖
    ///
    /// 配置文件缺失时使用内置默认值。
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path();

        tracing::info!("正在从 {:?} 加载配置文件", config_path);

        let defaults = ConfigBuilder::try_from(&AppConfig::default())?;
        let builder = ConfigBuilder::builder()
            .add_source(defaults)
            // 加载配置文件
            .add_source(File::from(config_path).required(false))
            // 支持环境变量覆盖，例如：APP_SERVER_PORT
            .add_source(
                Environment::with_prefix("APP")
                    .separator("_")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = builder.try_deserialize()?;
        config.validate()?;

        tracing::debug!(
            "配置加载完成: users = {}, token_ttl = {}min",
            config.auth.users.len(),
            config.auth.access_token_expire_minutes
        );

        Ok(config)
    }

    /// 校验反序列化后无法表达的约束
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.auth.access_token_lifetime()?;
        if self.storage.download_prefix.trim_matches('/').is_empty() {
            return Err(ConfigError::Message(
                "storage.download_prefix 不能为空（下载路由不能挂在根路径）".to_string(),
            ));
        }
        Ok(())
    }

    /// 获取全局配置单例
    pub fn global() -> &'static AppConfig {
        CONFIG.get().expect("配置未初始化，请先调用 init_global()")
    }

    /// 初始化全局配置
    pub fn init_global() -> Result<(), ConfigError> {
        let config = Self::load()?;
        CONFIG
            .set(config)
            .map_err(|_| ConfigError::Message("配置已经被初始化".to_string()))?;
        Ok(())
    }

    /// 获取配置文件路径
    fn get_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    /// 获取服务器监听地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 获取二维码存放目录
    pub fn download_path(&self) -> PathBuf {
        PathBuf::from(&self.storage.download_folder)
    }

    /// 静态下载路由（以 `/` 开头）
    pub fn download_route(&self) -> String {
        format!("/{}", self.storage.download_prefix.trim_matches('/'))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "full".to_string(),
            },
            api: ApiConfig {
                prefix: "/api/v1".to_string(),
            },
            cors: CorsConfig::default(),
            auth: AuthConfig::default(),
            storage: StorageConfig::default(),
            qr: QrConfig::default(),
            shutdown: ShutdownConfig::default(),
        }
    }
}
