use axum::{Form, Json, Router, extract::State, routing::post};

use super::credentials::CredentialStore;
use super::models::{TokenRequest, TokenResponse};
use super::token::TokenSigner;
use crate::error::AppError;
use crate::state::AppState;

/// 凭据错误时返回给调用方的提示
pub const BAD_CREDENTIALS_DETAIL: &str = "Please check your username and password";

/// 校验凭据并签发访问令牌。
///
/// 只做一次同步校验，不重试；令牌本身不落盘，有效性完全由签名与过期时间证明。
pub fn issue_token(
    store: &dyn CredentialStore,
    signer: &dyn TokenSigner,
    lifetime: chrono::Duration,
    username: &str,
    password: &str,
) -> Result<TokenResponse, AppError> {
    let Some(user) = store.authenticate(username, password) else {
        tracing::warn!(target: "qr_backend::auth", "login rejected: username={}", username);
        return Err(AppError::Unauthorized(BAD_CREDENTIALS_DETAIL.into()));
    };
    let token = signer.sign(&user.username, lifetime)?;
    tracing::info!(target: "qr_backend::auth", "access token issued: username={}", user.username);
    Ok(TokenResponse::bearer(token))
}

#[utoipa::path(
    post,
    path = "/token",
    summary = "签发访问令牌",
    description = "OAuth2 password grant：表单提交 username/password，校验通过后返回 Bearer 访问令牌。",
    request_body(content = TokenRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "签发成功", body = TokenResponse),
        (status = 401, description = "用户名或口令错误（附带 WWW-Authenticate: Bearer）", body = AppError),
        (status = 422, description = "grant_type 不受支持", body = AppError)
    ),
    tag = "Auth"
)]
pub async fn post_token(
    State(state): State<AppState>,
    Form(form): Form<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    if let Some(grant) = form.grant_type.as_deref()
        && grant != "password"
    {
        return Err(AppError::Validation(format!("unsupported grant_type: {grant}")));
    }

    // PBKDF2 推导是 CPU 密集操作，放到阻塞线程池执行
    let resp = tokio::task::spawn_blocking(move || {
        issue_token(
            state.credentials.as_ref(),
            state.signer.as_ref(),
            state.token_lifetime,
            &form.username,
            &form.password,
        )
    })
    .await
    .map_err(|e| AppError::Internal(format!("令牌签发任务失败: {e}")))??;

    Ok(Json(resp))
}

pub fn create_auth_router() -> Router<AppState> {
    Router::<AppState>::new().route("/token", post(post_token))
}
