use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::error::AppError;

/// 访问令牌载荷
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    /// 用户名
    pub sub: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// 令牌签发接口
pub trait TokenSigner: Send + Sync {
    /// 为 `subject` 签发有效期为 `lifetime` 的令牌
    fn sign(&self, subject: &str, lifetime: chrono::Duration) -> Result<String, AppError>;
}

/// 令牌校验接口（签名 + 签发方 + 过期时间）
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<AccessClaims, AppError>;
}

/// HS256 JWT 的签发与校验
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
}

impl JwtService {
    pub fn new(secret: &str, issuer: impl Into<String>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
        }
    }

    pub fn from_config(cfg: &AuthConfig) -> Result<Self, AppError> {
        let secret = resolve_jwt_secret(cfg)?;
        Ok(Self::new(&secret, cfg.jwt_issuer.clone()))
    }
}

impl TokenSigner for JwtService {
    fn sign(&self, subject: &str, lifetime: chrono::Duration) -> Result<String, AppError> {
        let now = chrono::Utc::now();
        let exp = now
            .checked_add_signed(lifetime)
            .filter(|exp| *exp > now)
            .ok_or_else(|| AppError::Internal(format!("令牌有效期无效: {lifetime}")))?;
        let claims = AccessClaims {
            sub: subject.to_string(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("签发访问令牌失败: {e}")))
    }
}

impl TokenVerifier for JwtService {
    fn verify(&self, token: &str) -> Result<AccessClaims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        jsonwebtoken::decode::<AccessClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| AppError::Unauthorized("Could not validate credentials".into()))
    }
}

/// 读取签名密钥：优先配置文件，其次环境变量 APP_AUTH_JWT_SECRET
pub fn resolve_jwt_secret(cfg: &AuthConfig) -> Result<String, AppError> {
    if !cfg.jwt_secret.trim().is_empty() {
        return Ok(cfg.jwt_secret.clone());
    }
    let from_env = std::env::var("APP_AUTH_JWT_SECRET").unwrap_or_default();
    if !from_env.trim().is_empty() {
        return Ok(from_env);
    }
    Err(AppError::Internal(
        "auth.jwt_secret 未配置（可通过 APP_AUTH_JWT_SECRET 设置）".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new("unit-test-secret", "qr-backend")
    }

    #[test]
    fn signed_token_verifies_to_subject_and_expiry() {
        let svc = service();
        let before = chrono::Utc::now().timestamp();
        let token = svc.sign("alice", chrono::Duration::minutes(30)).expect("sign");
        let claims = svc.verify(&token).expect("verify");
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.iss, "qr-backend");
        let expected = before + 30 * 60;
        assert!((claims.exp - expected).abs() <= 2, "exp={} expected≈{}", claims.exp, expected);
    }

    #[test]
    fn non_positive_or_overflowing_lifetime_is_refused() {
        let svc = service();
        assert!(svc.sign("alice", chrono::Duration::zero()).is_err());
        assert!(svc.sign("alice", chrono::Duration::minutes(-1)).is_err());
        assert!(svc.sign("alice", chrono::TimeDelta::MAX).is_err());
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = JwtService::new("other-secret", "qr-backend")
            .sign("alice", chrono::Duration::minutes(5))
            .unwrap();
        assert!(matches!(service().verify(&token), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn token_from_other_issuer_is_rejected() {
        let token = JwtService::new("unit-test-secret", "someone-else")
            .sign("alice", chrono::Duration::minutes(5))
            .unwrap();
        assert!(service().verify(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let svc = service();
        // 超出 jsonwebtoken 默认 60s 的 leeway
        let token = svc.sign("alice", chrono::Duration::minutes(-5)).unwrap();
        assert!(svc.verify(&token).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(service().verify("not.a.jwt").is_err());
        assert!(service().verify("").is_err());
    }

    #[test]
    fn config_secret_takes_precedence() {
        let cfg = AuthConfig {
            jwt_secret: "from-config".into(),
            ..AuthConfig::default()
        };
        assert_eq!(resolve_jwt_secret(&cfg).unwrap(), "from-config");
    }
}
