use std::time::Duration;

use crate::config::{AppConfig, RemoverEngine};
use crate::error::AppError;

/// 执行启动检查
///
/// 1. 检查鉴权密钥（默认密钥仅告警）
/// 2. 输出 CORS 与处理并发概况
/// 3. 远端引擎模式下探测服务可达性（仅告警，不阻断启动）
pub async fn run_startup_checks(config: &AppConfig) -> Result<(), AppError> {
    tracing::info!("🔍 开始执行启动检查...");

    check_api_key(config);
    log_runtime_summary(config);

    if config.remover.engine == RemoverEngine::Remote {
        probe_remote_remover(&config.remover.remote.url).await;
    }

    tracing::info!("✅ 启动检查完成");
    Ok(())
}

fn check_api_key(config: &AppConfig) {
    let auth = &config.auth;
    if !auth.enabled {
        tracing::warn!("⚠️ x-api-key 校验已关闭，/process-image 对所有调用方开放");
    } else if auth.uses_default_key() {
        tracing::warn!(
            "⚠️ 正在使用开发默认 API Key，生产环境请通过 APP_AUTH__API_KEY 覆盖（或开启 auth.require_explicit_key）"
        );
    } else {
        tracing::info!("✅ API Key 已配置");
    }
}

fn log_runtime_summary(config: &AppConfig) {
    let cors = &config.cors;
    if cors.enabled {
        tracing::info!(
            "CORS: origins={:?} methods={:?} headers={:?} credentials={}",
            cors.allowed_origins,
            cors.allowed_methods,
            cors.allowed_headers,
            cors.allow_credentials
        );
    } else {
        tracing::info!("CORS: 未启用");
    }
    tracing::info!(
        "处理并发: {}，超时: {}，上传上限: {} 字节",
        config.processing.effective_parallelism(),
        config
            .processing
            .timeout()
            .map(|d| format!("{}s", d.as_secs()))
            .unwrap_or_else(|| "无".to_string()),
        config.upload.max_bytes
    );
}

/// 对远端服务根路径发起一次短超时请求；任何 HTTP 响应都视为可达
async fn probe_remote_remover(url: &str) {
    let Ok(mut probe) = reqwest::Url::parse(url) else {
        return;
    };
    probe.set_path("/");
    probe.set_query(None);

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("⚠️ 构建探测客户端失败: {}", e);
            return;
        }
    };

    match client.get(probe.clone()).send().await {
        Ok(resp) => tracing::info!("✅ 远端抠图服务可达: {} ({})", probe, resp.status()),
        Err(e) => tracing::warn!("⚠️ 远端抠图服务暂不可达: {} ({})，请求将返回 500 直至恢复", probe, e),
    }
}
