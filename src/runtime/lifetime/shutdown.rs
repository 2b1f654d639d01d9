use std::time::Duration;
use tokio::signal;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::analytics::ClickManager;
use crate::tasks::JobQueue;

/// 关闭超时时间（秒）
const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// 单个任务超时时间（秒）
const TASK_TIMEOUT_SECS: u64 = 10;

pub async fn listen_for_shutdown(clicks: &ClickManager, queue: &JobQueue) {
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received, flushing data...");
        }
        Err(e) => {
            warn!(
                "Failed to listen for Ctrl+C: {}. Proceeding with shutdown anyway.",
                e
            );
        }
    }

    let shutdown_result = timeout(
        Duration::from_secs(SHUTDOWN_TIMEOUT_SECS),
        perform_shutdown_tasks(clicks, queue),
    )
    .await;

    match shutdown_result {
        Ok(()) => info!("All shutdown tasks completed successfully"),
        Err(_) => error!(
            "Shutdown tasks timed out after {} seconds",
            SHUTDOWN_TIMEOUT_SECS
        ),
    }
}

/// 执行所有关闭任务（在超时内调用）
pub async fn perform_shutdown_tasks(clicks: &ClickManager, queue: &JobQueue) {
    // 先排空队列：点击落库任务完成后计数再刷盘
    if queue.wait_idle(Duration::from_secs(TASK_TIMEOUT_SECS)).await {
        info!("Background queue drained");
    } else {
        error!(
            "Background queue not drained after {} seconds, {} jobs pending",
            TASK_TIMEOUT_SECS,
            queue.pending()
        );
    }

    match timeout(Duration::from_secs(TASK_TIMEOUT_SECS), clicks.flush()).await {
        Ok(flushed) => info!("Flushed {} buffered clicks", flushed),
        Err(_) => error!(
            "Click flush timed out after {} seconds",
            TASK_TIMEOUT_SECS
        ),
    }
}
