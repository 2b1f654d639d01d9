//! 链接投影缓存
//!
//! 以小写的 `domain:key` 为键保存 [`CachedLink`] 的 JSON，TTL 为 `cache.link_ttl`。
//! 缓存只是加速层：写入失败只记录日志，读取失败返回 `Unavailable`，
//! 调用方自行回源。

use std::sync::Arc;

use tracing::{debug, warn};

use super::traits::{CacheResult, KvStore};
use crate::storage::CachedLink;

/// 缓存键：`domain:key` 的小写形式
pub fn cache_key(domain: &str, key: &str) -> String {
    format!("{}:{}", domain, key).to_lowercase()
}

#[derive(Clone)]
pub struct LinkCache {
    store: Arc<dyn KvStore>,
    ttl_secs: u64,
}

impl LinkCache {
    pub fn new(store: Arc<dyn KvStore>, ttl_secs: u64) -> Self {
        Self { store, ttl_secs }
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    pub async fn set(&self, link: &CachedLink) {
        let value = match serde_json::to_string(link) {
            Ok(v) => v,
            Err(e) => {
                warn!("LinkCache: failed to encode link {}: {}", link.id, e);
                return;
            }
        };
        let key = cache_key(&link.domain, &link.key);
        if let Err(e) = self.store.set_ex(&key, &value, self.ttl_secs).await {
            warn!("LinkCache: set {} failed: {}", key, e);
        }
    }

    /// 批量写入（一次管道往返）
    pub async fn mset(&self, links: &[CachedLink]) {
        if links.is_empty() {
            return;
        }
        let entries: Vec<(String, String)> = links
            .iter()
            .filter_map(|link| match serde_json::to_string(link) {
                Ok(v) => Some((cache_key(&link.domain, &link.key), v)),
                Err(e) => {
                    warn!("LinkCache: skipping link {}: {}", link.id, e);
                    None
                }
            })
            .collect();

        if let Err(e) = self.store.mset_ex(&entries, self.ttl_secs).await {
            warn!("LinkCache: mset of {} links failed: {}", entries.len(), e);
        } else {
            debug!("LinkCache: cached {} links", entries.len());
        }
    }

    pub async fn get(&self, domain: &str, key: &str) -> CacheResult<CachedLink> {
        let cache_key = cache_key(domain, key);
        match self.store.get(&cache_key).await {
            CacheResult::Hit(raw) => match serde_json::from_str::<CachedLink>(&raw) {
                Ok(link) => CacheResult::Hit(link),
                Err(e) => {
                    // 旧格式或损坏的条目，删除后按未命中处理
                    warn!("LinkCache: dropping undecodable entry {}: {}", cache_key, e);
                    let _ = self.store.del(std::slice::from_ref(&cache_key)).await;
                    CacheResult::Miss
                }
            },
            CacheResult::Miss => CacheResult::Miss,
            CacheResult::Unavailable => {
                warn!("LinkCache: backend unavailable while reading {}", cache_key);
                CacheResult::Unavailable
            }
        }
    }

    pub async fn delete(&self, domain: &str, key: &str) {
        self.delete_many(&[(domain.to_string(), key.to_string())]).await;
    }

    pub async fn delete_many(&self, pairs: &[(String, String)]) {
        if pairs.is_empty() {
            return;
        }
        let keys: Vec<String> = pairs.iter().map(|(d, k)| cache_key(d, k)).collect();
        if let Err(e) = self.store.del(&keys).await {
            warn!("LinkCache: delete of {} keys failed: {}", keys.len(), e);
        }
    }

    /// 域名变更：把 `old_domain:key` 移到 `link.domain:key`
    ///
    /// 目标已存在时跳过该条（源条目保留）。返回成功移动的条数；
    /// 后端故障时返回 0。
    pub async fn rename(&self, links: &[CachedLink], old_domain: &str) -> usize {
        let pairs: Vec<(String, String)> = links
            .iter()
            .map(|link| {
                (
                    cache_key(old_domain, &link.key),
                    cache_key(&link.domain, &link.key),
                )
            })
            .filter(|(from, to)| from != to)
            .collect();

        if pairs.is_empty() {
            return 0;
        }

        match self.store.rename_nx_many(&pairs).await {
            Ok(n) => {
                debug!(
                    "LinkCache: renamed {}/{} entries from {}",
                    n,
                    pairs.len(),
                    old_domain
                );
                n
            }
            Err(e) => {
                warn!("LinkCache: rename from {} failed: {}", old_domain, e);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::kv::MokaKvStore;
    use crate::config::CacheConfig;
    use crate::errors::{DubError, Result};
    use async_trait::async_trait;

    fn link(domain: &str, key: &str) -> CachedLink {
        CachedLink {
            id: format!("link_{key}"),
            domain: domain.to_string(),
            key: key.to_string(),
            url: format!("https://example.com/{key}"),
            workspace_id: Some("ws_1".to_string()),
            track_conversion: false,
            expires_at: None,
            expired_url: None,
            ios: None,
            android: None,
            geo: None,
            program_id: None,
            partner_id: None,
        }
    }

    async fn cache() -> LinkCache {
        let store = MokaKvStore::new(&CacheConfig::default()).await.unwrap();
        LinkCache::new(Arc::new(store), 60)
    }

    struct DownStore;

    #[async_trait]
    impl KvStore for DownStore {
        async fn get(&self, _key: &str) -> CacheResult<String> {
            CacheResult::Unavailable
        }
        async fn set_ex(&self, _: &str, _: &str, _: u64) -> Result<()> {
            Err(DubError::cache_connection("down"))
        }
        async fn mset_ex(&self, _: &[(String, String)], _: u64) -> Result<()> {
            Err(DubError::cache_connection("down"))
        }
        async fn del(&self, _: &[String]) -> Result<usize> {
            Err(DubError::cache_connection("down"))
        }
        async fn set_nx_get(&self, _: &str, _: &str, _: u64) -> CacheResult<String> {
            CacheResult::Unavailable
        }
        async fn rename_nx_many(&self, _: &[(String, String)]) -> Result<usize> {
            Err(DubError::cache_connection("down"))
        }
        async fn ping(&self) -> Result<()> {
            Err(DubError::cache_connection("down"))
        }
        fn backend_name(&self) -> &'static str {
            "down"
        }
    }

    #[test]
    fn test_cache_key_is_case_insensitive() {
        assert_eq!(cache_key("Dub.SH", "AbC"), "dub.sh:abc");
        assert_eq!(cache_key("dub.sh", "abc"), cache_key("DUB.sh", "ABC"));
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = cache().await;
        let l = link("dub.sh", "hello");
        cache.set(&l).await;

        assert_eq!(cache.get("DUB.SH", "HELLO").await, CacheResult::Hit(l));

        cache.delete("dub.sh", "hello").await;
        assert_eq!(cache.get("dub.sh", "hello").await, CacheResult::Miss);
    }

    #[tokio::test]
    async fn test_mset_and_delete_many() {
        let cache = cache().await;
        let links = vec![link("dub.sh", "a"), link("dub.sh", "b"), link("acme.com", "c")];
        cache.mset(&links).await;

        for l in &links {
            assert!(cache.get(&l.domain, &l.key).await.is_hit());
        }

        cache
            .delete_many(&[
                ("dub.sh".to_string(), "a".to_string()),
                ("acme.com".to_string(), "c".to_string()),
            ])
            .await;
        assert_eq!(cache.get("dub.sh", "a").await, CacheResult::Miss);
        assert!(cache.get("dub.sh", "b").await.is_hit());
        assert_eq!(cache.get("acme.com", "c").await, CacheResult::Miss);
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_miss_and_removed() {
        let cache = cache().await;
        let key = cache_key("dub.sh", "broken");
        cache.store().set_ex(&key, "{not json", 60).await.unwrap();

        assert_eq!(cache.get("dub.sh", "broken").await, CacheResult::Miss);
        assert_eq!(cache.store().get(&key).await, CacheResult::Miss);
    }

    #[tokio::test]
    async fn test_rename_is_idempotent_and_keeps_existing_destination() {
        let cache = cache().await;
        cache.mset(&[link("old.com", "a"), link("old.com", "b")]).await;

        // 新域名下已有 b
        let existing_b = CachedLink {
            url: "https://existing.example".to_string(),
            ..link("new.com", "b")
        };
        cache.set(&existing_b).await;

        let moved = vec![link("new.com", "a"), link("new.com", "b")];
        assert_eq!(cache.rename(&moved, "old.com").await, 1);

        assert_eq!(cache.get("old.com", "a").await, CacheResult::Miss);
        assert!(cache.get("new.com", "a").await.is_hit());
        // b: 目标保持不变，源保留
        assert_eq!(cache.get("new.com", "b").await, CacheResult::Hit(existing_b));
        assert!(cache.get("old.com", "b").await.is_hit());

        // 第二次重命名不改变状态
        assert_eq!(cache.rename(&moved, "old.com").await, 0);
        assert!(cache.get("new.com", "a").await.is_hit());
        assert!(cache.get("old.com", "b").await.is_hit());
    }

    #[tokio::test]
    async fn test_unavailable_backend_never_errors() {
        let cache = LinkCache::new(Arc::new(DownStore), 60);
        let l = link("dub.sh", "x");
        cache.set(&l).await;
        cache.mset(std::slice::from_ref(&l)).await;
        cache.delete("dub.sh", "x").await;

        assert_eq!(cache.get("dub.sh", "x").await, CacheResult::Unavailable);
        assert_eq!(cache.rename(&[l], "old.com").await, 0);
    }
}
