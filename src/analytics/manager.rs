//! 链接点击计数缓冲
//!
//! 热路径只在内存里累加 `link_id -> 新增点击`，计数定时或超过阈值时批量交给
//! [`ClickSink`]。写入失败的批次合并回缓冲区，下一轮再写。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

use crate::analytics::ClickSink;

struct Counters {
    by_link: DashMap<String, usize>,
    /// 缓冲中的点击总数
    buffered: AtomicUsize,
    /// 同一时刻只允许一个批次写入
    writing: Mutex<()>,
    /// 阈值触发的写入已排队
    threshold_armed: AtomicBool,
}

impl Counters {
    fn bump(&self, link_id: &str) -> usize {
        match self.by_link.get_mut(link_id) {
            Some(mut n) => *n += 1,
            None => *self.by_link.entry(link_id.to_string()).or_insert(0) += 1,
        }
        self.buffered.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// 取走全部计数；`retain` 在分片锁内读出并删除，并发自增只会落到下一批
    fn take(&self) -> Vec<(String, usize)> {
        let mut batch = Vec::new();
        self.by_link.retain(|link_id, n| {
            batch.push((link_id.clone(), *n));
            false
        });
        let taken: usize = batch.iter().map(|(_, n)| n).sum();
        self.buffered.fetch_sub(taken, Ordering::AcqRel);
        batch
    }

    fn merge_back(&self, batch: Vec<(String, usize)>) {
        let mut restored = 0;
        for (link_id, n) in batch {
            *self.by_link.entry(link_id).or_insert(0) += n;
            restored += n;
        }
        self.buffered.fetch_add(restored, Ordering::AcqRel);
    }
}

/// 点击计数器；clone 共享同一缓冲区
#[derive(Clone)]
pub struct ClickManager {
    counters: Arc<Counters>,
    sink: Arc<dyn ClickSink>,
    flush_interval: Duration,
    flush_threshold: usize,
}

impl ClickManager {
    pub fn new(sink: Arc<dyn ClickSink>, flush_interval: Duration, flush_threshold: usize) -> Self {
        Self {
            counters: Arc::new(Counters {
                by_link: DashMap::new(),
                buffered: AtomicUsize::new(0),
                writing: Mutex::new(()),
                threshold_armed: AtomicBool::new(false),
            }),
            sink,
            flush_interval,
            flush_threshold: flush_threshold.max(1),
        }
    }

    pub fn increment(&self, link_id: &str) {
        let buffered = self.counters.bump(link_id);
        trace!("{} clicks buffered", buffered);

        if buffered < self.flush_threshold {
            return;
        }
        // 只有把标志从 false 改成 true 的调用方负责 spawn
        if self
            .counters
            .threshold_armed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let this = self.clone();
        tokio::spawn(async move {
            if let Ok(_writing) = this.counters.writing.try_lock() {
                this.write_batch().await;
            }
            this.counters.threshold_armed.store(false, Ordering::Release);
        });
    }

    /// 按 `flush_interval` 周期写入，常驻任务
    pub async fn run_periodic_flush(&self) {
        let mut ticker = tokio::time::interval(self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // 第一次 tick 立即返回
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match self.counters.writing.try_lock() {
                Ok(_writing) => {
                    self.write_batch().await;
                }
                Err(_) => trace!("Click flush already running, skipping tick"),
            }
        }
    }

    /// 等待正在进行的写入结束后再写一批；返回写入成功的点击数
    pub async fn flush(&self) -> usize {
        let _writing = self.counters.writing.lock().await;
        self.write_batch().await
    }

    async fn write_batch(&self) -> usize {
        let batch = self.counters.take();
        if batch.is_empty() {
            return 0;
        }

        let clicks: usize = batch.iter().map(|(_, n)| n).sum();
        let links = batch.len();
        match self.sink.flush_clicks(batch.clone()).await {
            Ok(()) => {
                debug!("Flushed {} clicks across {} links", clicks, links);
                clicks
            }
            Err(e) => {
                warn!("Click flush failed, keeping {} clicks buffered: {}", clicks, e);
                self.counters.merge_back(batch);
                0
            }
        }
    }

    pub fn buffered(&self) -> usize {
        self.counters.buffered.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    #[derive(Default)]
    struct TallySink {
        totals: std::sync::Mutex<HashMap<String, usize>>,
        down: AtomicBool,
    }

    impl TallySink {
        fn total(&self, link_id: &str) -> usize {
            self.totals.lock().unwrap().get(link_id).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl ClickSink for TallySink {
        async fn flush_clicks(&self, updates: Vec<(String, usize)>) -> anyhow::Result<()> {
            if self.down.load(Ordering::SeqCst) {
                anyhow::bail!("database unavailable");
            }
            let mut totals = self.totals.lock().unwrap();
            for (link_id, n) in updates {
                *totals.entry(link_id).or_default() += n;
            }
            Ok(())
        }
    }

    fn counters(sink: &Arc<TallySink>, threshold: usize) -> ClickManager {
        ClickManager::new(sink.clone(), Duration::from_secs(3600), threshold)
    }

    #[tokio::test]
    async fn test_flush_groups_by_link() {
        let sink = Arc::new(TallySink::default());
        let clicks = counters(&sink, 100);

        clicks.increment("link_a");
        clicks.increment("link_a");
        clicks.increment("link_b");
        assert_eq!(clicks.buffered(), 3);

        assert_eq!(clicks.flush().await, 3);
        assert_eq!(clicks.buffered(), 0);
        assert_eq!(sink.total("link_a"), 2);
        assert_eq!(sink.total("link_b"), 1);
        assert_eq!(clicks.flush().await, 0);
    }

    #[tokio::test]
    async fn test_failed_flush_keeps_counts() {
        let sink = Arc::new(TallySink::default());
        sink.down.store(true, Ordering::SeqCst);
        let clicks = counters(&sink, 100);

        clicks.increment("link_a");
        clicks.increment("link_a");
        assert_eq!(clicks.flush().await, 0);
        assert_eq!(clicks.buffered(), 2);

        sink.down.store(false, Ordering::SeqCst);
        clicks.increment("link_a");
        assert_eq!(clicks.flush().await, 3);
        assert_eq!(sink.total("link_a"), 3);
    }

    #[tokio::test]
    async fn test_threshold_flushes_in_background() {
        let sink = Arc::new(TallySink::default());
        let clicks = counters(&sink, 3);

        for _ in 0..3 {
            clicks.increment("link_hot");
        }
        for _ in 0..50 {
            if sink.total("link_hot") == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(sink.total("link_hot"), 3);
    }

    #[tokio::test]
    async fn test_periodic_flush() {
        let sink = Arc::new(TallySink::default());
        let clicks = ClickManager::new(sink.clone(), Duration::from_millis(20), 1000);
        let runner = clicks.clone();
        let handle = tokio::spawn(async move { runner.run_periodic_flush().await });

        clicks.increment("link_a");
        for _ in 0..50 {
            if sink.total("link_a") == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();
        assert_eq!(sink.total("link_a"), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_clicks_lost_under_concurrency() {
        let sink = Arc::new(TallySink::default());
        let clicks = counters(&sink, usize::MAX);

        let writers: Vec<_> = (0..8)
            .map(|_| {
                let c = clicks.clone();
                tokio::spawn(async move {
                    for i in 0..500 {
                        c.increment("link_shared");
                        if i % 50 == 0 {
                            tokio::task::yield_now().await;
                        }
                    }
                })
            })
            .collect();
        let flusher = {
            let c = clicks.clone();
            tokio::spawn(async move {
                for _ in 0..5 {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    c.flush().await;
                }
            })
        };

        for w in writers {
            w.await.unwrap();
        }
        flusher.await.unwrap();
        clicks.flush().await;
        assert_eq!(sink.total("link_shared"), 8 * 500);
        assert_eq!(clicks.buffered(), 0);
    }
}
