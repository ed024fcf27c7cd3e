use axum::{Router, routing::get};
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::features::{auth, health, qr};
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// 响应压缩策略：PNG 本身已压缩，只压缩 JSON/文本等。
fn compression_predicate() -> impl tower_http::compression::predicate::Predicate {
    use tower_http::compression::predicate::{NotForContentType, Predicate, SizeAbove};

    SizeAbove::default()
        .and(NotForContentType::GRPC)
        .and(NotForContentType::IMAGES)
        .and(NotForContentType::SSE)
        .and(NotForContentType::const_new("application/octet-stream"))
}

/// 组装完整的 HTTP 应用：
/// - `POST /token` 与 `/health` 位于根路径
/// - 二维码接口挂在 `config.api.prefix` 下
/// - 存储目录以只读静态文件的形式挂在 `/<download_prefix>`
pub fn build_app(state: AppState, config: &AppConfig) -> Router {
    let api_router = Router::<AppState>::new().merge(qr::create_qr_router());

    let mut app = Router::<AppState>::new()
        .route("/health", get(health::health_check))
        .merge(auth::create_auth_router())
        .nest(&config.api.prefix, api_router)
        .nest_service(
            &config.download_route(),
            ServeDir::new(state.qr.storage_dir.clone()),
        )
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state);

    if let Some(cors) = crate::cors::build_cors_layer(&config.cors) {
        app = app.layer(cors);
    }

    app.layer(CompressionLayer::new().compress_when(compression_predicate()))
        .layer(axum::middleware::from_fn(
            crate::request_id::request_id_middleware,
        ))
}
