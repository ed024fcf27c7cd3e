use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::openapi::server::{ServerBuilder, ServerVariableBuilder};
use utoipa::{Modify, OpenApi};

/// 在 OpenAPI 中注入 Bearer(JWT) 安全定义，供二维码接口引用。
struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// 业务接口带 `config.api.prefix` 前缀，`/health` 不带前缀，因此同时提供两个 server。
struct ApiServers;

impl Modify for ApiServers {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let api = ServerBuilder::new()
            .url("{api_prefix}")
            .description(Some("业务接口（默认 /api/v1）"))
            .parameter(
                "api_prefix",
                ServerVariableBuilder::new()
                    .default_value("/api/v1")
                    .description(Some("业务接口前缀：对应 config.api.prefix")),
            )
            .build();

        let root = ServerBuilder::new()
            .url("/")
            .description(Some("根路径（/health）"))
            .build();

        openapi.servers = Some(vec![api, root]);
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::features::health::handler::health_check,
        crate::features::auth::handler::post_token,
        crate::features::qr::handler::create_qr_code,
        crate::features::qr::handler::list_qr_codes,
        crate::features::qr::handler::delete_qr_code,
    ),
    components(
        schemas(
            crate::error::AppError,
            crate::error::QrFileError,
            crate::error::ProblemDetails,
            crate::features::health::handler::HealthResponse,
            crate::features::auth::models::TokenRequest,
            crate::features::auth::models::TokenResponse,
            crate::features::qr::handler::QrCodeRequest,
            crate::features::qr::handler::QrCodeResponse,
            crate::features::qr::handler::QrLink,
            crate::features::qr::handler::QrCodeListResponse,
        )
    ),
    modifiers(&BearerSecurity, &ApiServers),
    tags(
        (name = "Auth", description = "Token APIs"),
        (name = "QR", description = "QR code file APIs"),
        (name = "Health", description = "Health APIs"),
    ),
    info(
        title = "QR Backend API",
        version = "0.1.0",
        description = "Bearer token issuance and QR code file management (Axum)"
    )
)]
pub struct ApiDoc;
