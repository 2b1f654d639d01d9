use async_trait::async_trait;
use redis::{AsyncCommands, Script, aio::MultiplexedConnection};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, trace, warn};

use crate::cache::{CacheResult, KvStore};
use crate::config::CacheConfig;
use crate::declare_kv_plugin;
use crate::errors::{DubError, Result};

declare_kv_plugin!("redis", RedisKvStore);

/// KEYS = [from1, to1, from2, to2, ...]，RENAMENX 保留原 TTL
const RENAME_NX_SCRIPT: &str = r#"
local renamed = 0
for i = 1, #KEYS, 2 do
  if redis.call('EXISTS', KEYS[i]) == 1 then
    renamed = renamed + redis.call('RENAMENX', KEYS[i], KEYS[i + 1])
  end
end
return renamed
"#;

pub struct RedisKvStore {
    client: redis::Client,
    /// 持久化连接，使用 RwLock 保护
    connection: Arc<RwLock<Option<MultiplexedConnection>>>,
    key_prefix: String,
    rename_script: Script,
}

impl RedisKvStore {
    pub async fn new(config: &CacheConfig) -> Result<Self> {
        let redis_config = &config.redis;

        let client = redis::Client::open(redis_config.url.clone()).map_err(|e| {
            DubError::cache_connection(format!("Invalid Redis URL '{}': {}", redis_config.url, e))
        })?;

        let store = Self {
            client,
            connection: Arc::new(RwLock::new(None)),
            key_prefix: redis_config.key_prefix.clone(),
            rename_script: Script::new(RENAME_NX_SCRIPT),
        };

        // 启动时测试连接
        if let Err(e) = store.ping().await {
            error!(
                "Failed to ping Redis server: {}. Check Redis server status and URL: {}",
                e, redis_config.url
            );
            return Err(e);
        }

        debug!(
            "RedisKvStore created with prefix: '{}'",
            redis_config.key_prefix
        );
        Ok(store)
    }

    /// 获取或建立持久连接
    async fn get_connection(&self) -> std::result::Result<MultiplexedConnection, redis::RedisError> {
        {
            let conn_guard = self.connection.read().await;
            if let Some(ref conn) = *conn_guard {
                return Ok(conn.clone());
            }
        }

        let mut conn_guard = self.connection.write().await;

        // 双重检查，避免竞态条件
        if let Some(ref conn) = *conn_guard {
            return Ok(conn.clone());
        }

        let new_conn = self.client.get_multiplexed_async_connection().await?;
        *conn_guard = Some(new_conn.clone());
        debug!("Redis connection established and cached");

        Ok(new_conn)
    }

    /// 重置连接（在连接错误时调用）
    async fn reset_connection(&self) {
        let mut conn_guard = self.connection.write().await;
        *conn_guard = None;
        debug!("Redis connection reset due to error");
    }

    /// 统一处理错误：IO 类错误时丢弃连接，下次重连
    async fn on_error(&self, op: &str, err: redis::RedisError) -> DubError {
        warn!("Redis {} failed: {}", op, err);
        if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
            self.reset_connection().await;
        }
        DubError::from(err)
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        match self.get_connection().await {
            Ok(conn) => Ok(conn),
            Err(e) => Err(self.on_error("connect", e).await),
        }
    }

    fn make_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn get(&self, key: &str) -> CacheResult<String> {
        let Ok(mut conn) = self.connection().await else {
            return CacheResult::Unavailable;
        };

        let result: redis::RedisResult<Option<String>> = conn.get(self.make_key(key)).await;
        match result {
            Ok(Some(value)) => {
                trace!("Redis hit: {}", key);
                CacheResult::Hit(value)
            }
            Ok(None) => CacheResult::Miss,
            Err(e) => {
                self.on_error("GET", e).await;
                CacheResult::Unavailable
            }
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.connection().await?;
        let result: redis::RedisResult<()> =
            conn.set_ex(self.make_key(key), value, ttl_secs).await;
        match result {
            Ok(()) => Ok(()),
            Err(e) => Err(self.on_error("SET EX", e).await),
        }
    }

    async fn mset_ex(&self, entries: &[(String, String)], ttl_secs: u64) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection().await?;

        let mut pipe = redis::pipe();
        for (key, value) in entries {
            pipe.set_ex(self.make_key(key), value, ttl_secs).ignore();
        }

        let result: redis::RedisResult<()> = pipe.query_async(&mut conn).await;
        match result {
            Ok(()) => {
                debug!("Redis pipelined {} SET EX", entries.len());
                Ok(())
            }
            Err(e) => Err(self.on_error("pipelined SET EX", e).await),
        }
    }

    async fn del(&self, keys: &[String]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection().await?;
        let keys: Vec<String> = keys.iter().map(|k| self.make_key(k)).collect();

        let result: redis::RedisResult<usize> = conn.del(keys).await;
        match result {
            Ok(n) => Ok(n),
            Err(e) => Err(self.on_error("DEL", e).await),
        }
    }

    async fn set_nx_get(&self, key: &str, value: &str, ttl_secs: u64) -> CacheResult<String> {
        let Ok(mut conn) = self.connection().await else {
            return CacheResult::Unavailable;
        };

        // SET key value NX GET EX ttl（Redis >= 7）
        let result: redis::RedisResult<Option<String>> = redis::cmd("SET")
            .arg(self.make_key(key))
            .arg(value)
            .arg("NX")
            .arg("GET")
            .arg("EX")
            .arg(ttl_secs.max(1))
            .query_async(&mut conn)
            .await;

        match result {
            Ok(Some(prior)) => CacheResult::Hit(prior),
            Ok(None) => CacheResult::Miss,
            Err(e) => {
                self.on_error("SET NX GET", e).await;
                CacheResult::Unavailable
            }
        }
    }

    async fn rename_nx_many(&self, pairs: &[(String, String)]) -> Result<usize> {
        if pairs.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection().await?;

        let mut invocation = self.rename_script.prepare_invoke();
        for (from, to) in pairs {
            invocation.key(self.make_key(from)).key(self.make_key(to));
        }

        let result: redis::RedisResult<usize> = invocation.invoke_async(&mut conn).await;
        match result {
            Ok(n) => Ok(n),
            Err(e) => Err(self.on_error("RENAMENX script", e).await),
        }
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        let result: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
        match result {
            Ok(_) => Ok(()),
            Err(e) => Err(self.on_error("PING", e).await),
        }
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
