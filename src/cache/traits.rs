use async_trait::async_trait;

use crate::errors::Result;

/// 缓存查询结果
///
/// `Unavailable` 表示后端不可达，调用方应按未命中处理并回源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheResult<T> {
    Hit(T),
    Miss,
    Unavailable,
}

impl<T> CacheResult<T> {
    pub fn hit(self) -> Option<T> {
        match self {
            CacheResult::Hit(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, CacheResult::Hit(_))
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> CacheResult<U> {
        match self {
            CacheResult::Hit(v) => CacheResult::Hit(f(v)),
            CacheResult::Miss => CacheResult::Miss,
            CacheResult::Unavailable => CacheResult::Unavailable,
        }
    }
}

/// 托管 KV 存储的最小抽象（Redis 语义）
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<String>;

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    /// 批量写入，所有条目共用同一 TTL
    async fn mset_ex(&self, entries: &[(String, String)], ttl_secs: u64) -> Result<()>;

    /// 返回实际删除的条数
    async fn del(&self, keys: &[String]) -> Result<usize>;

    /// 原子地 "不存在才写入，并返回旧值"
    ///
    /// - `Hit(prior)`: key 已存在，未写入
    /// - `Miss`: key 不存在，已写入 `value`
    /// - `Unavailable`: 后端不可达，未知
    async fn set_nx_get(&self, key: &str, value: &str, ttl_secs: u64) -> CacheResult<String>;

    /// 对每个 `(from, to)`：仅当 `from` 存在且 `to` 不存在时重命名，保留剩余 TTL。
    /// 返回成功重命名的条数
    async fn rename_nx_many(&self, pairs: &[(String, String)]) -> Result<usize>;

    async fn ping(&self) -> Result<()>;

    fn backend_name(&self) -> &'static str;
}
