//! 抠图引擎抽象
//!
//! 处理管线只依赖 [`BackgroundRemover`]：输入原始图片字节，输出 PNG 字节。
//! 引擎内部的模型/算法不属于本服务的职责，测试中可以替换为任意实现。

mod builtin;
mod remote;

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use thiserror::Error;

use crate::config::{RemoverConfig, RemoverEngine};

pub use builtin::BuiltinRemover;
pub use remote::RemoteRemover;

/// 引擎层错误，在处理阶段边界统一转换为 `AppError::ProcessingFailed`
#[derive(Error, Debug)]
pub enum RemoverError {
    /// 输入无法解码为图片
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// 输出编码失败
    #[error("failed to encode PNG: {0}")]
    Encode(String),

    /// 远端返回非 2xx
    #[error("remote remover responded with HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    /// 网络错误
    #[error("remote remover unreachable: {0}")]
    Network(String),

    /// 超时
    #[error("background removal timed out")]
    Timeout,

    /// 引擎任务异常终止（panic / 被取消）
    #[error("remover task aborted: {0}")]
    Crashed(String),

    /// 引擎初始化失败
    #[error("remover unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for RemoverError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RemoverError::Timeout
        } else {
            RemoverError::Network(err.to_string())
        }
    }
}

/// 外部抠图能力：`image bytes -> PNG bytes`，可失败。
#[async_trait]
pub trait BackgroundRemover: Send + Sync {
    /// 引擎名称（用于日志）
    fn name(&self) -> &'static str;

    /// 对单张图片执行抠图；不做缓存，每次调用都会真实执行。
    async fn remove_background(&self, image: Bytes) -> Result<Bytes, RemoverError>;
}

/// 处理器之间共享的引擎句柄
pub type SharedRemover = Arc<dyn BackgroundRemover>;

/// 按配置构建引擎
pub fn build_remover(cfg: &RemoverConfig) -> Result<SharedRemover, RemoverError> {
    let remover: SharedRemover = match cfg.engine {
        RemoverEngine::Builtin => Arc::new(BuiltinRemover::new(cfg.builtin.tolerance)),
        RemoverEngine::Remote => Arc::new(RemoteRemover::new(&cfg.remote)?),
    };
    tracing::info!("抠图引擎已就绪: {}", remover.name());
    Ok(remover)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RemoverConfig;

    #[test]
    fn builds_configured_engine() {
        let builtin = build_remover(&RemoverConfig::default()).expect("builtin");
        assert_eq!(builtin.name(), "builtin");

        let mut cfg = RemoverConfig::default();
        cfg.engine = RemoverEngine::Remote;
        let remote = build_remover(&cfg).expect("remote");
        assert_eq!(remote.name(), "remote");
    }

    #[test]
    fn upstream_error_mentions_status() {
        let err = RemoverError::Upstream {
            status: 503,
            body: "model loading".into(),
        };
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("model loading"));
    }
}
