use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, Semaphore, mpsc};
use tracing::{debug, error, warn};

use super::job::{BackgroundJob, JobHandler};
use crate::config::QueueConfig;
use crate::errors::Result;
use crate::storage::backend::retry::Backoff;

/// 重试耗尽或无法入队的任务
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    pub job_kind: String,
    pub payload: String,
    pub error: String,
    pub attempts: u32,
}

impl DeadLetter {
    fn from_job(job: &BackgroundJob, error: String, attempts: u32) -> Self {
        Self {
            job_kind: job.kind().to_string(),
            payload: serde_json::to_string(job).unwrap_or_else(|e| format!("<unserializable: {e}>")),
            error,
            attempts,
        }
    }
}

#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn store(&self, letter: DeadLetter) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
struct JobRetry {
    max_attempts: u32,
    backoff: Backoff,
}

/// 入队 + 空闲等待所需的共享状态
struct Inflight {
    count: AtomicUsize,
    idle: Notify,
}

impl Inflight {
    fn done(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// 有界后台任务队列
///
/// 分发器最多同时执行 `concurrency` 个任务；失败的任务按指数退避重试，
/// 重试 `max_attempts` 次后写入死信。队列满时任务直接进入死信。
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<BackgroundJob>,
    inflight: Arc<Inflight>,
    handler: Arc<dyn JobHandler>,
    dead_letters: Arc<dyn DeadLetterSink>,
}

impl JobQueue {
    /// 创建队列并启动分发器（需要在 tokio 运行时中调用）
    pub fn start(
        config: &QueueConfig,
        handler: Arc<dyn JobHandler>,
        dead_letters: Arc<dyn DeadLetterSink>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let inflight = Arc::new(Inflight {
            count: AtomicUsize::new(0),
            idle: Notify::new(),
        });
        let policy = JobRetry {
            max_attempts: config.max_attempts.max(1),
            backoff: Backoff::new(config.backoff_base_ms, config.backoff_max_ms),
        };

        tokio::spawn(dispatch(
            rx,
            Arc::new(Semaphore::new(config.concurrency.max(1))),
            Arc::clone(&handler),
            Arc::clone(&dead_letters),
            Arc::clone(&inflight),
            policy,
        ));

        Self {
            tx,
            inflight,
            handler,
            dead_letters,
        }
    }

    /// 非阻塞入队，不等待执行结果；任务先经 [`JobHandler::expand`] 拆分
    pub fn enqueue(&self, job: BackgroundJob) {
        for job in self.handler.expand(job) {
            self.push(job);
        }
    }

    fn push(&self, job: BackgroundJob) {
        self.inflight.count.fetch_add(1, Ordering::AcqRel);

        if let Err(e) = self.tx.try_send(job) {
            let (job, reason) = match e {
                mpsc::error::TrySendError::Full(job) => (job, "queue full"),
                mpsc::error::TrySendError::Closed(job) => (job, "queue closed"),
            };
            warn!("Background job {} not enqueued: {}", job.kind(), reason);

            let sink = Arc::clone(&self.dead_letters);
            let inflight = Arc::clone(&self.inflight);
            tokio::spawn(async move {
                bury(&*sink, DeadLetter::from_job(&job, reason.to_string(), 0)).await;
                inflight.done();
            });
        }
    }

    /// 尚未完成（排队中或执行中）的任务数
    pub fn pending(&self) -> usize {
        self.inflight.count.load(Ordering::Acquire)
    }

    /// 等待所有任务完成；超时返回 false
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let inflight = Arc::clone(&self.inflight);
        tokio::time::timeout(timeout, async move {
            loop {
                let notified = inflight.idle.notified();
                if inflight.count.load(Ordering::Acquire) == 0 {
                    return;
                }
                notified.await;
            }
        })
        .await
        .is_ok()
    }
}

async fn dispatch(
    mut rx: mpsc::Receiver<BackgroundJob>,
    sema: Arc<Semaphore>,
    handler: Arc<dyn JobHandler>,
    dead_letters: Arc<dyn DeadLetterSink>,
    inflight: Arc<Inflight>,
    policy: JobRetry,
) {
    while let Some(job) = rx.recv().await {
        let Ok(permit) = Arc::clone(&sema).acquire_owned().await else {
            break;
        };

        let handler = Arc::clone(&handler);
        let dead_letters = Arc::clone(&dead_letters);
        let inflight = Arc::clone(&inflight);
        tokio::spawn(async move {
            let _permit = permit;
            run_with_retry(&*handler, &*dead_letters, job, policy).await;
            inflight.done();
        });
    }
    debug!("Background job dispatcher stopped");
}

async fn run_with_retry(
    handler: &dyn JobHandler,
    dead_letters: &dyn DeadLetterSink,
    job: BackgroundJob,
    policy: JobRetry,
) {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match handler.handle(&job).await {
            Ok(()) => {
                if attempt > 1 {
                    debug!("Job {} succeeded after {} attempts", job.kind(), attempt);
                }
                return;
            }
            Err(e) if attempt < policy.max_attempts => {
                let delay = policy.backoff.delay(attempt);
                warn!(
                    "Job {} failed (attempt {}/{}): {}; retrying in {:?}",
                    job.kind(),
                    attempt,
                    policy.max_attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                error!(
                    "Job {} failed after {} attempts, moving to dead letters: {}",
                    job.kind(),
                    attempt,
                    e
                );
                bury(dead_letters, DeadLetter::from_job(&job, e.to_string(), attempt)).await;
                return;
            }
        }
    }
}

async fn bury(sink: &dyn DeadLetterSink, letter: DeadLetter) {
    let kind = letter.job_kind.clone();
    if let Err(e) = sink.store(letter).await {
        error!("Failed to store dead letter for {} job: {}", kind, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DubError;
    use crate::tasks::job::{WebhookEvent, WebhookTrigger};
    use std::sync::Mutex;
    use std::sync::atomic::AtomicU32;

    #[derive(Default)]
    struct MemoryDeadLetters(Mutex<Vec<DeadLetter>>);

    #[async_trait]
    impl DeadLetterSink for MemoryDeadLetters {
        async fn store(&self, letter: DeadLetter) -> Result<()> {
            self.0.lock().unwrap().push(letter);
            Ok(())
        }
    }

    /// 前 `fail_times` 次调用失败
    struct FlakyHandler {
        calls: AtomicU32,
        fail_times: u32,
    }

    #[async_trait]
    impl JobHandler for FlakyHandler {
        async fn handle(&self, _job: &BackgroundJob) -> Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                Err(DubError::internal("endpoint down"))
            } else {
                Ok(())
            }
        }
    }

    fn config(max_attempts: u32) -> QueueConfig {
        QueueConfig {
            capacity: 16,
            concurrency: 2,
            max_attempts,
            backoff_base_ms: 1,
            backoff_max_ms: 5,
        }
    }

    fn webhook_job() -> BackgroundJob {
        BackgroundJob::Webhook(WebhookEvent::new(
            WebhookTrigger::LinkCreated,
            serde_json::json!({"id": "link_1"}),
        ))
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let handler = Arc::new(FlakyHandler {
            calls: AtomicU32::new(0),
            fail_times: 2,
        });
        let dead = Arc::new(MemoryDeadLetters::default());
        let queue = JobQueue::start(&config(5), handler.clone(), dead.clone());

        queue.enqueue(webhook_job());
        assert!(queue.wait_idle(Duration::from_secs(5)).await);

        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
        assert!(dead.0.lock().unwrap().is_empty());
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn test_dead_letter_after_max_attempts() {
        let handler = Arc::new(FlakyHandler {
            calls: AtomicU32::new(0),
            fail_times: u32::MAX,
        });
        let dead = Arc::new(MemoryDeadLetters::default());
        let queue = JobQueue::start(&config(3), handler.clone(), dead.clone());

        queue.enqueue(webhook_job());
        assert!(queue.wait_idle(Duration::from_secs(5)).await);

        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
        let letters = dead.0.lock().unwrap();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].job_kind, "webhook");
        assert_eq!(letters[0].attempts, 3);
        assert!(letters[0].error.contains("endpoint down"));
        assert!(letters[0].payload.contains("link.created"));
    }

    #[tokio::test]
    async fn test_wait_idle_on_empty_queue() {
        let handler = Arc::new(FlakyHandler {
            calls: AtomicU32::new(0),
            fail_times: 0,
        });
        let queue = JobQueue::start(&config(1), handler, Arc::new(MemoryDeadLetters::default()));
        assert!(queue.wait_idle(Duration::from_millis(50)).await);
    }
}
