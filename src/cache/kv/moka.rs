use async_trait::async_trait;
use moka::future::Cache;
use moka::policy::Expiry;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::cache::{CacheResult, KvStore};
use crate::config::CacheConfig;
use crate::declare_kv_plugin;
use crate::errors::Result;

declare_kv_plugin!("memory", MokaKvStore);

/// 带绝对截止时间的条目，重命名时可以原样保留剩余 TTL
#[derive(Debug, Clone)]
struct Entry {
    value: String,
    deadline: Instant,
}

impl Entry {
    fn new(value: &str, ttl_secs: u64) -> Self {
        Self {
            value: value.to_string(),
            deadline: Instant::now() + Duration::from_secs(ttl_secs),
        }
    }

    fn is_live(&self) -> bool {
        self.deadline > Instant::now()
    }
}

/// 按条目自身的截止时间过期
struct DeadlineExpiry;

impl Expiry<String, Entry> for DeadlineExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Entry,
        created_at: Instant,
    ) -> Option<Duration> {
        Some(value.deadline.saturating_duration_since(created_at))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.deadline.saturating_duration_since(updated_at))
    }
}

/// 进程内 KV（单实例部署与测试使用）
pub struct MokaKvStore {
    inner: Cache<String, Entry>,
}

impl MokaKvStore {
    pub async fn new(config: &CacheConfig) -> Result<Self> {
        let inner = Cache::builder()
            .max_capacity(config.memory.max_capacity)
            .expire_after(DeadlineExpiry)
            .build();

        debug!(
            "MokaKvStore initialized with max capacity: {}",
            config.memory.max_capacity
        );
        Ok(Self { inner })
    }

    async fn live_entry(&self, key: &str) -> Option<Entry> {
        self.inner.get(key).await.filter(Entry::is_live)
    }
}

#[async_trait]
impl KvStore for MokaKvStore {
    async fn get(&self, key: &str) -> CacheResult<String> {
        match self.live_entry(key).await {
            Some(entry) => CacheResult::Hit(entry.value),
            None => CacheResult::Miss,
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        self.inner
            .insert(key.to_string(), Entry::new(value, ttl_secs))
            .await;
        Ok(())
    }

    async fn mset_ex(&self, entries: &[(String, String)], ttl_secs: u64) -> Result<()> {
        for (key, value) in entries {
            self.inner
                .insert(key.clone(), Entry::new(value, ttl_secs))
                .await;
        }
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<usize> {
        let mut removed = 0;
        for key in keys {
            if self.inner.remove(key).await.is_some_and(|e| e.is_live()) {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn set_nx_get(&self, key: &str, value: &str, ttl_secs: u64) -> CacheResult<String> {
        let candidate = Entry::new(value, ttl_secs);
        let entry = self
            .inner
            .entry(key.to_string())
            .or_insert(candidate.clone())
            .await;

        if entry.is_fresh() {
            return CacheResult::Miss;
        }

        let existing = entry.into_value();
        if existing.is_live() {
            CacheResult::Hit(existing.value)
        } else {
            // 已过期但尚未被驱逐
            self.inner.insert(key.to_string(), candidate).await;
            CacheResult::Miss
        }
    }

    async fn rename_nx_many(&self, pairs: &[(String, String)]) -> Result<usize> {
        let mut renamed = 0;
        for (from, to) in pairs {
            if from == to {
                continue;
            }
            let Some(source) = self.live_entry(from).await else {
                continue;
            };
            if self.live_entry(to).await.is_some() {
                continue;
            }
            let inserted = self.inner.entry(to.clone()).or_insert(source).await;
            if inserted.is_fresh() {
                self.inner.remove(from).await;
                renamed += 1;
            }
        }
        Ok(renamed)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
