use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::config::AppConfig;
use crate::features::remover::SharedRemover;

/// 聚合的应用共享状态（只读配置 + 引擎句柄，不含跨请求可变数据）
#[derive(Clone)]
pub struct AppState {
    /// 启动时构建、运行期只读的配置
    pub config: Arc<AppConfig>,
    /// 抠图引擎
    pub remover: SharedRemover,
    /// 控制并发抠图的信号量（限制 CPU/推理密集型任务数量）
    pub process_semaphore: Arc<Semaphore>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, remover: SharedRemover) -> Self {
        let permits = config.processing.effective_parallelism();
        Self {
            config,
            remover,
            process_semaphore: Arc::new(Semaphore::new(permits)),
        }
    }
}
