use once_cell::sync::Lazy;
use std::{
    collections::HashMap,
    future::Future,
    pin::Pin,
    sync::{Arc, RwLock},
};

use crate::cache::traits::KvStore;
use crate::config::CacheConfig;
use crate::errors::Result;

pub type BoxedKvStoreFuture = Pin<Box<dyn Future<Output = Result<Arc<dyn KvStore>>> + Send>>;
pub type KvStoreConstructor = Arc<dyn Fn(CacheConfig) -> BoxedKvStoreFuture + Send + Sync>;

static KV_STORE_REGISTRY: Lazy<RwLock<HashMap<String, KvStoreConstructor>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

pub fn register_kv_plugin<S: Into<String>>(name: S, constructor: KvStoreConstructor) {
    let name = name.into();
    let mut registry = KV_STORE_REGISTRY
        .write()
        .expect("KV registry RwLock poisoned - a thread panicked while holding the lock");
    registry.insert(name, constructor);
}

pub fn get_kv_plugin(name: &str) -> Option<KvStoreConstructor> {
    KV_STORE_REGISTRY
        .read()
        .expect("KV registry RwLock poisoned - a thread panicked while holding the lock")
        .get(name)
        .cloned()
}

pub fn registered_kv_plugins() -> Vec<String> {
    let registry = KV_STORE_REGISTRY
        .read()
        .expect("KV registry RwLock poisoned");
    let mut names: Vec<String> = registry.keys().cloned().collect();
    names.sort();
    names
}

pub fn debug_kv_registry() {
    let names = registered_kv_plugins();
    if names.is_empty() {
        tracing::debug!("No KV store plugins registered.");
    } else {
        tracing::debug!("Registered KV store plugins:");
        for name in names {
            tracing::debug!(" - {}", name);
        }
    }
}
