pub mod kv;
pub mod link_cache;
pub mod macros;
pub mod register;
pub mod traits;

use std::sync::Arc;

use tracing::info;

use crate::config::CacheConfig;
use crate::errors::{DubError, Result};

pub use link_cache::LinkCache;
pub use traits::{CacheResult, KvStore};

/// 按 `cache.type` 从插件注册表创建 KV 后端
pub async fn create_kv_store(config: &CacheConfig) -> Result<Arc<dyn KvStore>> {
    register::debug_kv_registry();

    let name = config.cache_type.as_str();
    let ctor = register::get_kv_plugin(name).ok_or_else(|| {
        DubError::cache_plugin_not_found(format!(
            "Unknown cache backend '{}', available: {:?}",
            name,
            register::registered_kv_plugins()
        ))
    })?;

    let store = ctor(config.clone()).await?;
    info!("KV store backend: {}", store.backend_name());
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_memory_store_from_registry() {
        let config = CacheConfig::default();
        let store = create_kv_store(&config).await.unwrap();
        assert_eq!(store.backend_name(), "memory");
    }

    #[tokio::test]
    async fn test_unknown_backend_is_plugin_not_found() {
        let config = CacheConfig {
            cache_type: "memcached".to_string(),
            ..CacheConfig::default()
        };
        match create_kv_store(&config).await {
            Err(DubError::CachePluginNotFound(msg)) => assert!(msg.contains("memcached")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("memcached backend should not exist"),
        }
    }
}
