use serde::{Deserialize, Serialize};

/// 静态配置（从 TOML 加载，启动时使用）
///
/// 包含：
/// - server: 监听地址、端口、worker 数量
/// - database: 数据库连接与重试
/// - cache: KV 缓存后端与各类 TTL
/// - logging: 日志
/// - links: 域名归一化与短码规则
/// - rate_limit: 点击追踪限流
/// - payouts: 平台抽成
/// - webhooks / queue: 后台任务投递
/// - analytics: 点击计数缓冲
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub links: LinksConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub payouts: PayoutsConfig,
    #[serde(default)]
    pub webhooks: WebhooksConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

impl StaticConfig {
    /// 读取 `path`（可缺省）并叠加 `DUB__*` 环境变量
    ///
    /// 优先级：环境变量 > 配置文件 > 默认值，例如 `DUB__SERVER__PORT=9999`。
    /// 列表字段在环境变量中用逗号分隔。
    pub fn load(path: &str) -> Result<Self, config::ConfigError> {
        use config::{Config, Environment, File};

        let env = Environment::with_prefix("DUB")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("links.home_hostnames")
            .with_list_parse_key("links.case_sensitive_domains")
            .with_list_parse_key("webhooks.endpoints")
            .try_parsing(true);

        Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(env)
            .build()?
            .try_deserialize()
    }

    /// 默认值渲染成的 TOML，供 `config generate` 使用
    pub fn sample_toml() -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(&Self::default())
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

/// 数据库连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_database_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

/// KV 缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(rename = "type")]
    #[serde(default = "default_cache_type")]
    pub cache_type: String,
    /// 链接投影的过期时间（秒）
    #[serde(default = "default_link_ttl")]
    pub link_ttl: u64,
    /// 点击去重窗口（秒）
    #[serde(default = "default_click_dedup_ttl")]
    pub click_dedup_ttl: u64,
    /// clickIdCache 中点击事件的保留时间（秒）
    #[serde(default = "default_click_cache_ttl")]
    pub click_cache_ttl: u64,
    /// invoiceId 幂等窗口（秒）
    #[serde(default = "default_invoice_dedup_ttl")]
    pub invoice_dedup_ttl: u64,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// Redis 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default = "default_redis_key_prefix")]
    pub key_prefix: String,
}

/// 内存缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_memory_capacity")]
    pub max_capacity: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

/// 短链域名与短码规则
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksConfig {
    /// 平台默认短域名
    #[serde(default = "default_short_domain")]
    pub default_domain: String,
    /// 映射到默认域名的主机名；以 `.` 开头的条目按后缀匹配
    #[serde(default = "default_home_hostnames")]
    pub home_hostnames: Vec<String>,
    /// 区分大小写的域名，其短码以编码形式存储
    #[serde(default)]
    pub case_sensitive_domains: Vec<String>,
    #[serde(default = "default_random_key_length")]
    pub random_key_length: usize,
}

/// 单一调用方类别的限流参数
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitRule {
    pub requests_per_minute: u32,
    pub burst: u32,
}

/// 点击追踪限流
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_claimed_rule")]
    pub claimed: RateLimitRule,
    #[serde(default = "default_demo_rule")]
    pub demo: RateLimitRule,
}

/// Payout 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutsConfig {
    /// 平台抽成比例，0.02 = 2%
    #[serde(default = "default_platform_fee_rate")]
    pub platform_fee_rate: f64,
}

/// Webhook 投递配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhooksConfig {
    /// 为空时不投递
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,
}

/// 后台任务队列配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
    #[serde(default = "default_queue_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_queue_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_queue_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_queue_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

/// 点击计数缓冲配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default = "default_flush_interval")]
    pub flush_interval_secs: u64,
    #[serde(default = "default_max_clicks_before_flush")]
    pub max_clicks_before_flush: usize,
}

// ============================================================
// Default value functions
// ============================================================

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_database_url() -> String {
    "sqlite://dub.db?mode=rwc".to_string()
}

fn default_database_pool_size() -> u32 {
    10
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    2000
}

fn default_cache_type() -> String {
    "memory".to_string()
}

fn default_link_ttl() -> u64 {
    24 * 60 * 60
}

fn default_click_dedup_ttl() -> u64 {
    60 * 60
}

fn default_click_cache_ttl() -> u64 {
    7 * 24 * 60 * 60
}

fn default_invoice_dedup_ttl() -> u64 {
    7 * 24 * 60 * 60
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379/".to_string()
}

fn default_redis_key_prefix() -> String {
    "dub:".to_string()
}

fn default_memory_capacity() -> u64 {
    100_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

fn default_short_domain() -> String {
    "dub.sh".to_string()
}

fn default_home_hostnames() -> Vec<String> {
    vec!["dub.localhost:8888".to_string(), ".vercel.app".to_string()]
}

fn default_random_key_length() -> usize {
    7
}

fn default_claimed_rule() -> RateLimitRule {
    RateLimitRule {
        requests_per_minute: 600,
        burst: 100,
    }
}

fn default_demo_rule() -> RateLimitRule {
    RateLimitRule {
        requests_per_minute: 60,
        burst: 10,
    }
}

fn default_platform_fee_rate() -> f64 {
    0.02
}

fn default_webhook_timeout() -> u64 {
    10
}

fn default_queue_capacity() -> usize {
    10_000
}

fn default_queue_concurrency() -> usize {
    16
}

fn default_queue_max_attempts() -> u32 {
    5
}

fn default_queue_backoff_base_ms() -> u64 {
    200
}

fn default_queue_backoff_max_ms() -> u64 {
    30_000
}

fn default_flush_interval() -> u64 {
    30
}

fn default_max_clicks_before_flush() -> usize {
    100
}

// ============================================================
// Default implementations
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            workers: default_workers(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            pool_size: default_database_pool_size(),
            retry_count: default_retry_count(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_type: default_cache_type(),
            link_ttl: default_link_ttl(),
            click_dedup_ttl: default_click_dedup_ttl(),
            click_cache_ttl: default_click_cache_ttl(),
            invoice_dedup_ttl: default_invoice_dedup_ttl(),
            redis: RedisConfig::default(),
            memory: MemoryConfig::default(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            key_prefix: default_redis_key_prefix(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_memory_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            default_domain: default_short_domain(),
            home_hostnames: default_home_hostnames(),
            case_sensitive_domains: Vec::new(),
            random_key_length: default_random_key_length(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            claimed: default_claimed_rule(),
            demo: default_demo_rule(),
        }
    }
}

impl Default for PayoutsConfig {
    fn default() -> Self {
        Self {
            platform_fee_rate: default_platform_fee_rate(),
        }
    }
}

impl Default for WebhooksConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            timeout_secs: default_webhook_timeout(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            concurrency: default_queue_concurrency(),
            max_attempts: default_queue_max_attempts(),
            backoff_base_ms: default_queue_backoff_base_ms(),
            backoff_max_ms: default_queue_backoff_max_ms(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: default_flush_interval(),
            max_clicks_before_flush: default_max_clicks_before_flush(),
        }
    }
}
