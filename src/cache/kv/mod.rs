//! KV 存储后端
//!
//! - `memory`: moka 进程内缓存
//! - `redis`: 多路复用连接，断线后懒重连

pub mod moka;
pub mod redis;

pub use self::moka::MokaKvStore;
pub use self::redis::RedisKvStore;
