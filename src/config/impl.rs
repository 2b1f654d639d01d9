use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;
use config::ConfigError;
use std::path::Path;

use super::StaticConfig;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

static CONFIG: OnceLock<ArcSwap<StaticConfig>> = OnceLock::new();

/// Get the global configuration instance
///
/// Returns an Arc pointer to the configuration, which is cheap to clone
/// and doesn't hold any locks.
pub fn get_config() -> Arc<StaticConfig> {
    CONFIG
        .get()
        .expect("Config not initialized. Call init_config() first.")
        .load_full()
}

/// Initialize the global configuration from `config.toml` plus `DUB__*` env.
///
/// A missing file means defaults; an unreadable or invalid one is an error.
pub fn init_config() -> Result<(), ConfigError> {
    init_config_from(DEFAULT_CONFIG_PATH)
}

/// Same as [`init_config`] but with an explicit file path (`-c/--config`).
pub fn init_config_from(path: &str) -> Result<(), ConfigError> {
    if CONFIG.get().is_some() {
        return Ok(());
    }
    let loaded = StaticConfig::load(path)?;
    if Path::new(path).exists() {
        eprintln!("Loaded configuration from {}", path);
    }
    // 并发初始化时以先到者为准
    let _ = CONFIG.set(ArcSwap::from_pointee(loaded));
    Ok(())
}

/// Replace the active configuration. Intended for tests and CLI overrides.
pub fn replace_config(config: StaticConfig) {
    match CONFIG.get() {
        Some(current) => current.store(Arc::new(config)),
        None => {
            let _ = CONFIG.set(ArcSwap::from_pointee(config));
        }
    }
}
