//! 点击去重与记录
//!
//! 1. 按调用方类别限流（超额直接拒绝）
//! 2. 机器人不记录
//! 3. `recordClick:{link_id}:{ip}` 上原子 set-if-absent：已有值即为去重命中，
//!    返回旧 click ID
//! 4. 新点击：事件写入 `clickIdCache:{click_id}`，累加缓冲计数，投递后台任务

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use super::rate_limit::{CallerClass, ClickRateLimiter};
use crate::analytics::ClickManager;
use crate::cache::{CacheResult, KvStore};
use crate::errors::Result;
use crate::storage::{CachedLink, ClickEvent};
use crate::tasks::{BackgroundJob, JobQueue};
use crate::utils::create_click_id;
use crate::utils::request::VisitorInfo;

pub fn dedup_key(link_id: &str, ip: &str) -> String {
    format!("recordClick:{}:{}", link_id, ip)
}

pub fn click_cache_key(click_id: &str) -> String {
    format!("clickIdCache:{}", click_id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    Recorded(String),
    /// 去重窗口内的重复访问，返回首次的 click ID
    Deduplicated(String),
    Bot,
}

impl ClickOutcome {
    pub fn click_id(&self) -> Option<&str> {
        match self {
            ClickOutcome::Recorded(id) | ClickOutcome::Deduplicated(id) => Some(id),
            ClickOutcome::Bot => None,
        }
    }
}

pub struct ClickTracker {
    kv: Arc<dyn KvStore>,
    limiter: ClickRateLimiter,
    clicks: ClickManager,
    queue: JobQueue,
    dedup_ttl: u64,
    click_cache_ttl: u64,
}

impl ClickTracker {
    pub fn new(
        kv: Arc<dyn KvStore>,
        limiter: ClickRateLimiter,
        clicks: ClickManager,
        queue: JobQueue,
        dedup_ttl: u64,
        click_cache_ttl: u64,
    ) -> Self {
        Self {
            kv,
            limiter,
            clicks,
            queue,
            dedup_ttl,
            click_cache_ttl,
        }
    }

    pub fn limiter(&self) -> &ClickRateLimiter {
        &self.limiter
    }

    /// 记录一次点击；`url` 为实际跳转的目标
    ///
    /// 限流超额时返回 `rate_limit_exceeded`，此时什么都不写。
    pub async fn track(
        &self,
        link: &CachedLink,
        url: &str,
        visitor: VisitorInfo,
    ) -> Result<ClickOutcome> {
        self.limiter.check(
            CallerClass::for_workspace(link.workspace_id.as_deref()),
            &visitor.ip,
        )?;

        if visitor.bot {
            debug!("Skipping bot click on {}", link.id);
            return Ok(ClickOutcome::Bot);
        }

        let click_id = create_click_id();
        let key = dedup_key(&link.id, &visitor.ip);
        match self.kv.set_nx_get(&key, &click_id, self.dedup_ttl).await {
            CacheResult::Hit(existing) => {
                debug!("Deduplicated click on {} from {}", link.id, visitor.ip);
                return Ok(ClickOutcome::Deduplicated(existing));
            }
            CacheResult::Miss => {}
            CacheResult::Unavailable => {
                warn!("Click dedup unavailable for {}, recording as new", link.id);
            }
        }

        let event = ClickEvent {
            click_id: click_id.clone(),
            link_id: link.id.clone(),
            workspace_id: link.workspace_id.clone(),
            domain: link.domain.clone(),
            key: link.key.clone(),
            url: url.to_string(),
            visitor,
            timestamp: Utc::now(),
        };

        // 让线索追踪在事件落库之前也能查到该点击
        match serde_json::to_string(&event) {
            Ok(json) => {
                if let Err(e) = self
                    .kv
                    .set_ex(&click_cache_key(&click_id), &json, self.click_cache_ttl)
                    .await
                {
                    warn!("Failed to cache click {}: {}", click_id, e);
                }
            }
            Err(e) => warn!("Failed to encode click {}: {}", click_id, e),
        }

        self.clicks.increment(&link.id);
        self.queue.enqueue(BackgroundJob::RecordClick(event));

        Ok(ClickOutcome::Recorded(click_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::ClickSink;
    use crate::cache::kv::MokaKvStore;
    use crate::config::{CacheConfig, QueueConfig, RateLimitConfig, RateLimitRule};
    use crate::tasks::{DeadLetter, DeadLetterSink, JobHandler};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<BackgroundJob>>);

    #[async_trait]
    impl JobHandler for Recorder {
        async fn handle(&self, job: &BackgroundJob) -> Result<()> {
            self.0.lock().unwrap().push(job.clone());
            Ok(())
        }
    }

    #[async_trait]
    impl DeadLetterSink for Recorder {
        async fn store(&self, _letter: DeadLetter) -> Result<()> {
            Ok(())
        }
    }

    struct NullSink;

    #[async_trait]
    impl ClickSink for NullSink {
        async fn flush_clicks(&self, _updates: Vec<(String, usize)>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct Fixture {
        tracker: ClickTracker,
        jobs: Arc<Recorder>,
        queue: JobQueue,
        clicks: ClickManager,
        kv: Arc<dyn KvStore>,
    }

    async fn fixture(demo_burst: u32, dedup_ttl: u64) -> Fixture {
        let kv: Arc<dyn KvStore> = Arc::new(MokaKvStore::new(&CacheConfig::default()).await.unwrap());
        let jobs = Arc::new(Recorder::default());
        let queue = JobQueue::start(&QueueConfig::default(), jobs.clone(), jobs.clone());
        let clicks = ClickManager::new(Arc::new(NullSink), Duration::from_secs(3600), 1000);
        let limiter = ClickRateLimiter::new(&RateLimitConfig {
            demo: RateLimitRule {
                requests_per_minute: 1,
                burst: demo_burst,
            },
            ..RateLimitConfig::default()
        });
        let tracker = ClickTracker::new(
            kv.clone(),
            limiter,
            clicks.clone(),
            queue.clone(),
            dedup_ttl,
            600,
        );
        Fixture {
            tracker,
            jobs,
            queue,
            clicks,
            kv,
        }
    }

    fn link(workspace: Option<&str>) -> CachedLink {
        CachedLink {
            id: "link_1".to_string(),
            domain: "dub.sh".to_string(),
            key: "abc".to_string(),
            url: "https://example.com".to_string(),
            workspace_id: workspace.map(String::from),
            track_conversion: true,
            expires_at: None,
            expired_url: None,
            ios: None,
            android: None,
            geo: None,
            program_id: None,
            partner_id: None,
        }
    }

    fn visitor(ip: &str) -> VisitorInfo {
        VisitorInfo {
            ip: ip.to_string(),
            device: "Desktop".to_string(),
            ..VisitorInfo::default()
        }
    }

    #[tokio::test]
    async fn test_repeat_visit_is_deduplicated() {
        let f = fixture(100, 3600).await;
        let l = link(Some("ws_1"));

        let first = f.tracker.track(&l, &l.url, visitor("8.8.8.8")).await.unwrap();
        let second = f.tracker.track(&l, &l.url, visitor("8.8.8.8")).await.unwrap();

        let ClickOutcome::Recorded(id) = &first else {
            panic!("first click should be recorded: {first:?}");
        };
        assert_eq!(second, ClickOutcome::Deduplicated(id.clone()));

        assert!(f.queue.wait_idle(Duration::from_secs(5)).await);
        assert_eq!(f.jobs.0.lock().unwrap().len(), 1);
        assert_eq!(f.clicks.buffered(), 1);

        // clickIdCache 中可以查到事件
        let cached = f.kv.get(&click_cache_key(id)).await.hit().unwrap();
        let event: ClickEvent = serde_json::from_str(&cached).unwrap();
        assert_eq!(event.link_id, "link_1");
    }

    #[tokio::test]
    async fn test_other_visitor_gets_new_click() {
        let f = fixture(100, 3600).await;
        let l = link(Some("ws_1"));

        let a = f.tracker.track(&l, &l.url, visitor("8.8.8.8")).await.unwrap();
        let b = f.tracker.track(&l, &l.url, visitor("1.1.1.1")).await.unwrap();
        assert!(matches!(b, ClickOutcome::Recorded(_)));
        assert_ne!(a.click_id(), b.click_id());
    }

    #[tokio::test]
    async fn test_new_click_after_window() {
        let f = fixture(100, 1).await;
        let l = link(Some("ws_1"));

        let a = f.tracker.track(&l, &l.url, visitor("8.8.8.8")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        let b = f.tracker.track(&l, &l.url, visitor("8.8.8.8")).await.unwrap();

        assert!(matches!(b, ClickOutcome::Recorded(_)));
        assert_ne!(a.click_id(), b.click_id());
        assert!(f.queue.wait_idle(Duration::from_secs(5)).await);
        assert_eq!(f.jobs.0.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_bot_is_not_recorded() {
        let f = fixture(100, 3600).await;
        let l = link(Some("ws_1"));
        let bot = VisitorInfo {
            bot: true,
            ..visitor("8.8.8.8")
        };

        assert_eq!(f.tracker.track(&l, &l.url, bot).await.unwrap(), ClickOutcome::Bot);
        assert_eq!(f.clicks.buffered(), 0);
        assert_eq!(f.queue.pending(), 0);
    }

    #[tokio::test]
    async fn test_rate_limited_demo_link_writes_nothing() {
        let f = fixture(1, 3600).await;
        let demo = link(None);

        f.tracker.track(&demo, &demo.url, visitor("9.9.9.9")).await.unwrap();
        let err = f
            .tracker
            .track(&demo, &demo.url, visitor("9.9.9.9"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "rate_limit_exceeded");
        assert_eq!(f.clicks.buffered(), 1);
    }
}
