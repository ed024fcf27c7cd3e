use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};

use super::token::AccessClaims;
use crate::error::AppError;
use crate::state::AppState;

/// 从 `Authorization: Bearer <token>` 中取出令牌
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let raw = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Not authenticated".into()))?;
    let (scheme, token) = raw
        .trim()
        .split_once(' ')
        .ok_or_else(|| AppError::Unauthorized("Authorization 必须使用 Bearer 方案".into()))?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::Unauthorized(
            "Authorization 必须使用 Bearer 方案".into(),
        ));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::Unauthorized("Bearer token 不能为空".into()));
    }
    Ok(token.to_string())
}

/// 已通过 Bearer 校验的调用方。
///
/// 校验器取自 `AppState`，作为显式依赖注入到每个需要认证的 handler。
#[derive(Debug, Clone)]
pub struct AuthenticatedSubject(pub AccessClaims);

impl AuthenticatedSubject {
    pub fn username(&self) -> &str {
        &self.0.sub
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedSubject {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)?;
        let claims = state.verifier.verify(&token)?;
        tracing::debug!(target: "qr_backend::auth::bearer", "bearer accepted: sub={}", claims.sub);
        Ok(Self(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::extract_bearer_token;
    use axum::http::{HeaderMap, HeaderValue, header};

    fn headers(v: &'static str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_static(v));
        h
    }

    #[test]
    fn accepts_bearer_scheme_case_insensitively() {
        assert_eq!(extract_bearer_token(&headers("Bearer abc")).unwrap(), "abc");
        assert_eq!(extract_bearer_token(&headers("bearer  abc ")).unwrap(), "abc");
    }

    #[test]
    fn rejects_missing_or_foreign_schemes() {
        assert!(extract_bearer_token(&HeaderMap::new()).is_err());
        assert!(extract_bearer_token(&headers("Basic dXNlcjpwdw==")).is_err());
        assert!(extract_bearer_token(&headers("Bearer")).is_err());
        assert!(extract_bearer_token(&headers("Bearer   ")).is_err());
    }
}
