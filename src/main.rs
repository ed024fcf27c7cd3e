use qr_backend::startup::run_startup_checks;
use qr_backend::{AppConfig, AppState, ShutdownManager, build_app};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qr_backend=info,tower_http=info".into()),
        )
        .init();

    let shutdown_manager = ShutdownManager::new();

    // Load config
    if let Err(e) = AppConfig::init_global() {
        tracing::error!("Config init failed: {}", e);
        std::process::exit(1);
    }
    let config = AppConfig::global();

    if let Err(e) = shutdown_manager.start_signal_handler() {
        tracing::error!("信号处理器启动失败: {}", e);
        std::process::exit(1);
    }

    // Run startup checks
    if let Err(e) = run_startup_checks(config).await {
        tracing::error!("Startup checks failed: {}", e);
        std::process::exit(1);
    }

    let app_state = match AppState::from_config(config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("App state init failed: {}", e);
            std::process::exit(1);
        }
    };
    let app = build_app(app_state, config);

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Bind address failed {}: {}", addr, e);
            std::process::exit(1);
        });

    tracing::info!("Server: http://{}", addr);
    tracing::info!("Docs: http://{}/docs", addr);
    tracing::info!("Health: http://{}/health", addr);
    tracing::info!("Token API: http://{}/token", addr);
    tracing::info!("QR API: http://{}{}/qr-codes", addr, config.api.prefix);
    tracing::info!(
        "Downloads: http://{}{} -> {:?}",
        addr,
        config.download_route(),
        config.download_path()
    );

    let shutdown_timeout = config.shutdown.timeout_duration();
    let waiter = shutdown_manager.clone();
    let graceful = axum::serve(listener, app).with_graceful_shutdown(async move {
        let reason = waiter.wait_for_shutdown().await;
        tracing::info!("接收到退出信号: {:?}，开始优雅关闭HTTP服务器...", reason);
    });

    // 收到信号后，存量连接最多再等待 timeout_secs
    let server = tokio::spawn(async move { graceful.await });
    let outcome = tokio::select! {
        res = server => Some(res),
        _ = async {
            shutdown_manager.wait_for_shutdown().await;
            tokio::time::sleep(shutdown_timeout).await;
        } => None,
    };

    match outcome {
        Some(Ok(Ok(()))) => tracing::info!("服务器已优雅关闭"),
        Some(Ok(Err(e))) => {
            tracing::error!("服务器运行错误: {}", e);
            std::process::exit(1);
        }
        Some(Err(e)) => {
            tracing::error!("服务器任务异常: {}", e);
            std::process::exit(1);
        }
        None => {
            tracing::warn!(
                "优雅退出超时（{}秒），强制退出",
                config.shutdown.timeout_secs
            );
        }
    }
}
