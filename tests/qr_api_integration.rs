use std::path::PathBuf;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use tower::ServiceExt;

use qr_backend::config::{AppConfig, UserEntry};
use qr_backend::features::auth::credentials::hash_password;
use qr_backend::{AppState, build_app};

const USER: &str = "alice";
const PASSWORD: &str = "wonderland";

/// 每个用例独占一个临时存储目录
struct TestEnv {
    app: Router,
    root: PathBuf,
}

impl Drop for TestEnv {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

fn test_env() -> TestEnv {
    let root = std::env::temp_dir().join(format!("qr_api_{}", uuid::Uuid::new_v4().simple()));
    std::fs::create_dir_all(&root).expect("create storage dir");

    let mut cfg = AppConfig::default();
    cfg.auth.jwt_secret = "integration-secret".into();
    cfg.auth.users = vec![UserEntry {
        username: USER.into(),
        password_hash: hash_password(PASSWORD, 1_000),
    }];
    cfg.storage.download_folder = root.display().to_string();

    let state = AppState::from_config(&cfg).expect("app state");
    TestEnv {
        app: build_app(state, &cfg),
        root,
    }
}

async fn send(app: &Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.expect("call app")
}

async fn json_body(resp: Response) -> serde_json::Value {
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("parse json")
}

fn token_request(form: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/token")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .expect("build request")
}

async fn login(app: &Router) -> String {
    let resp = send(
        app,
        token_request(&format!("username={USER}&password={PASSWORD}")),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    json["access_token"]
        .as_str()
        .expect("access_token")
        .to_string()
}

fn authed(method: &str, uri: &str, token: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .expect("build request")
}

#[tokio::test]
async fn token_endpoint_issues_bearer_token() {
    let env = test_env();
    let resp = send(
        &env.app,
        token_request(&format!(
            "grant_type=password&username={USER}&password={PASSWORD}"
        )),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["token_type"].as_str(), Some("bearer"));
    assert!(!json["access_token"].as_str().unwrap_or("").is_empty());
}

#[tokio::test]
async fn token_endpoint_rejects_bad_credentials() {
    let env = test_env();
    for form in [
        format!("username={USER}&password=nope"),
        "username=mallory&password=wonderland".to_string(),
    ] {
        let resp = send(&env.app, token_request(&form)).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.headers()
                .get(header::WWW_AUTHENTICATE)
                .and_then(|v| v.to_str().ok()),
            Some("Bearer")
        );
        let json = json_body(resp).await;
        assert_eq!(
            json["detail"].as_str(),
            Some("Please check your username and password")
        );
    }
}

#[tokio::test]
async fn token_endpoint_rejects_other_grant_types() {
    let env = test_env();
    let resp = send(
        &env.app,
        token_request(&format!(
            "grant_type=client_credentials&username={USER}&password={PASSWORD}"
        )),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn qr_routes_require_bearer_token() {
    let env = test_env();

    let resp = send(
        &env.app,
        Request::builder()
            .uri("/api/v1/qr-codes")
            .body(Body::empty())
            .expect("build request"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));

    let resp = send(
        &env.app,
        authed("GET", "/api/v1/qr-codes", "not-a-jwt", Body::empty()),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let json = json_body(resp).await;
    assert_eq!(json["detail"].as_str(), Some("Could not validate credentials"));
}

#[tokio::test]
async fn create_list_download_delete_round() {
    let env = test_env();
    let token = login(&env.app).await;

    // 生成
    let resp = send(
        &env.app,
        authed(
            "POST",
            "/api/v1/qr-codes",
            &token,
            Body::from(r#"{"url":"hello"}"#),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let json = json_body(resp).await;
    assert_eq!(
        json["qr_code_url"].as_str(),
        Some("http://localhost:8000/downloads/aGVsbG8.png")
    );
    assert!(env.root.join("aGVsbG8.png").is_file());

    // 同名文件不覆盖
    let resp = send(
        &env.app,
        authed(
            "POST",
            "/api/v1/qr-codes",
            &token,
            Body::from(r#"{"url":"hello"}"#),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    // 列表
    let resp = send(
        &env.app,
        authed("GET", "/api/v1/qr-codes", &token, Body::empty()),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    let links = json["links"].as_array().expect("links");
    assert_eq!(links.len(), 1);
    assert_eq!(links[0]["filename"].as_str(), Some("aGVsbG8.png"));

    // 静态下载不需要令牌
    let resp = send(
        &env.app,
        Request::builder()
            .uri("/downloads/aGVsbG8.png")
            .body(Body::empty())
            .expect("build request"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("image/png")
    );
    let png = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read png");
    assert!(png.starts_with(b"\x89PNG\r\n\x1a\n"));

    // 删除两次：第二次 404
    let resp = send(
        &env.app,
        authed(
            "DELETE",
            "/api/v1/qr-codes/aGVsbG8.png",
            &token,
            Body::empty(),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(!env.root.join("aGVsbG8.png").exists());

    let resp = send(
        &env.app,
        authed(
            "DELETE",
            "/api/v1/qr-codes/aGVsbG8.png",
            &token,
            Body::empty(),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let json = json_body(resp).await;
    assert_eq!(json["detail"].as_str(), Some("QR code aGVsbG8.png not found"));
}

#[tokio::test]
async fn create_rejects_bad_input() {
    let env = test_env();
    let token = login(&env.app).await;

    for body in [
        r#"{"url":""}"#,
        r#"{"url":"hello","fill_color":"not-a-color"}"#,
        r#"{"url":"hello","size":0}"#,
    ] {
        let resp = send(
            &env.app,
            authed("POST", "/api/v1/qr-codes", &token, Body::from(body)),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY, "{body}");
    }

    let too_long = format!(r#"{{"url":"{}"}}"#, "a".repeat(8000));
    let resp = send(
        &env.app,
        authed("POST", "/api/v1/qr-codes", &token, Body::from(too_long)),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = json_body(resp).await;
    assert_eq!(json["code"].as_str(), Some("QR_DATA_TOO_LONG"));

    let leftovers = std::fs::read_dir(&env.root).expect("read dir").count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn delete_rejects_traversal_names() {
    let env = test_env();
    let token = login(&env.app).await;

    let resp = send(
        &env.app,
        authed(
            "DELETE",
            "/api/v1/qr-codes/..%2Fsecret.png",
            &token,
            Body::empty(),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn health_reports_storage_state() {
    let env = test_env();
    let resp = send(
        &env.app,
        Request::builder()
            .uri("/health")
            .body(Body::empty())
            .expect("build request"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["status"].as_str(), Some("healthy"));
    assert_eq!(json["storageReady"].as_bool(), Some(true));

    std::fs::remove_dir_all(&env.root).expect("remove storage");
    let resp = send(
        &env.app,
        Request::builder()
            .uri("/health")
            .body(Body::empty())
            .expect("build request"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}
