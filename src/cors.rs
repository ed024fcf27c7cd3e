use axum::http::{HeaderName, HeaderValue, Method};
use std::time::Duration;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer, ExposeHeaders};

use crate::config::CorsConfig;

/// 配置列表解析结果：`*` 表示任意，其余为逐项解析成功的值
struct Allowed<T> {
    any: bool,
    values: Vec<T>,
}

impl<T> Allowed<T> {
    fn is_empty(&self) -> bool {
        !self.any && self.values.is_empty()
    }
}

fn parse_list<T>(label: &str, raw: &[String], parse: impl Fn(&str) -> Option<T>) -> Allowed<T> {
    let mut out = Allowed {
        any: false,
        values: Vec::new(),
    };
    for value in raw.iter().map(|v| v.trim()).filter(|v| !v.is_empty()) {
        if value == "*" {
            out.any = true;
            continue;
        }
        match parse(value) {
            Some(v) => out.values.push(v),
            None => tracing::warn!("CORS {} 含无效值: {}", label, value),
        }
    }
    out
}

fn parse_origin(v: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(v).ok()
}

fn parse_method(v: &str) -> Option<Method> {
    Method::from_bytes(v.to_ascii_uppercase().as_bytes()).ok()
}

fn parse_header(v: &str) -> Option<HeaderName> {
    HeaderName::from_bytes(v.to_ascii_lowercase().as_bytes()).ok()
}

/// 根据配置构建 CORS 中间件；未启用或配置无效时返回 None
pub fn build_cors_layer(cors: &CorsConfig) -> Option<CorsLayer> {
    if !cors.enabled {
        return None;
    }

    let origins = parse_list("allowed_origins", &cors.allowed_origins, parse_origin);
    if origins.is_empty() {
        tracing::warn!("CORS 已启用但 allowed_origins 为空，已跳过启用");
        return None;
    }
    let methods = parse_list("allowed_methods", &cors.allowed_methods, parse_method);
    let headers = parse_list("allowed_headers", &cors.allowed_headers, parse_header);
    let expose = parse_list("expose_headers", &cors.expose_headers, parse_header);

    // 浏览器不接受凭证模式下的通配符
    if cors.allow_credentials && (origins.any || methods.any || headers.any || expose.any) {
        tracing::error!("CORS 配置无效：allow_credentials=true 不能与 \"*\" 同时使用，已跳过启用");
        return None;
    }

    let mut layer = CorsLayer::new().allow_origin(if origins.any {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins.values)
    });
    if methods.any {
        layer = layer.allow_methods(AllowMethods::from(Any));
    } else if !methods.values.is_empty() {
        layer = layer.allow_methods(methods.values);
    }
    if headers.any {
        layer = layer.allow_headers(AllowHeaders::from(Any));
    } else if !headers.values.is_empty() {
        layer = layer.allow_headers(headers.values);
    }
    if expose.any {
        layer = layer.expose_headers(ExposeHeaders::from(Any));
    } else if !expose.values.is_empty() {
        layer = layer.expose_headers(expose.values);
    }
    if cors.allow_credentials {
        layer = layer.allow_credentials(true);
    }
    if let Some(secs) = cors.max_age_secs.filter(|s| *s > 0) {
        layer = layer.max_age(Duration::from_secs(secs));
    }

    Some(layer)
}
