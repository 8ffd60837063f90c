use std::sync::Arc;

use bg_remover_backend::config::LoggingConfig;
use bg_remover_backend::features::remover::build_remover;
use bg_remover_backend::startup::run_startup_checks;
use bg_remover_backend::{AppConfig, AppState, ShutdownManager, build_router};

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "bg_remover_backend={lvl},tower_http={lvl}",
            lvl = logging.level
        )
        .into()
    });
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format.eq_ignore_ascii_case("compact") {
        builder.compact().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() {
    // Load config
    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            init_tracing(&LoggingConfig::default());
            tracing::error!("Config init failed: {}", e);
            std::process::exit(1);
        }
    };
    init_tracing(&config.logging);
    tracing::info!("配置加载完成，抠图引擎: {:?}", config.remover.engine);

    // 创建优雅退出管理器并启动信号处理器
    let shutdown_manager = ShutdownManager::new();
    if let Err(e) = shutdown_manager.start_signal_handler() {
        tracing::error!("信号处理器启动失败: {}", e);
        std::process::exit(1);
    }

    // Run startup checks
    if let Err(e) = run_startup_checks(&config).await {
        tracing::error!("Startup checks failed: {}", e);
        std::process::exit(1);
    }

    let remover = match build_remover(&config.remover) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("抠图引擎初始化失败: {}", e);
            std::process::exit(1);
        }
    };

    let config = Arc::new(config);
    let app = build_router(AppState::new(config.clone(), remover));

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Bind address failed {}: {}", addr, e);
            std::process::exit(1);
        });

    tracing::info!("Server: http://{}", addr);
    tracing::info!("Docs: http://{}/docs", addr);
    tracing::info!("Process API: http://{}/process-image", addr);

    // 收到退出信号后停止接收新连接；在途请求超过时限仍未结束则强制退出
    let shutdown_timeout = config.shutdown.timeout_duration();
    let shutdown_signal = async move {
        let reason = shutdown_manager.wait_for_shutdown().await;
        tracing::info!("接收到退出信号: {:?}，开始优雅退出...", reason);
        tokio::spawn(async move {
            tokio::time::sleep(shutdown_timeout).await;
            tracing::warn!("优雅退出超时（{}秒），强制退出", shutdown_timeout.as_secs());
            std::process::exit(1);
        });
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
    {
        tracing::error!("服务器运行错误: {}", e);
        std::process::exit(1);
    }

    tracing::info!("服务器已优雅关闭");
}
