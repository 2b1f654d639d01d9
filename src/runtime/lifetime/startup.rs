//! 组件装配
//!
//! 服务器、CLI 与集成测试共用同一套装配逻辑；只有服务器模式会启动周期性后台任务。

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::analytics::{ClickManager, EventStore};
use crate::api::middleware::WorkspaceAuthenticator;
use crate::cache::{self, KvStore, LinkCache};
use crate::config::{StaticConfig, get_config};
use crate::services::{
    ClickRateLimiter, ClickTracker, ConversionService, LinkResolver, LinkService, PartnerService,
    PayoutService,
};
use crate::storage::{SeaOrmStorage, StorageFactory};
use crate::tasks::{DefaultJobHandler, JobQueue, create_publisher};

/// 限流器清理周期
const LIMITER_RETAIN_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct StartupContext {
    pub storage: Arc<SeaOrmStorage>,
    pub kv: Arc<dyn KvStore>,
    pub link_cache: LinkCache,
    pub queue: JobQueue,
    pub clicks: ClickManager,
    pub resolver: Arc<LinkResolver>,
    pub tracker: Arc<ClickTracker>,
    pub conversions: Arc<ConversionService>,
    pub authenticator: Arc<WorkspaceAuthenticator>,
    pub link_service: Arc<LinkService>,
    pub partner_service: Arc<PartnerService>,
    pub payout_service: Arc<PayoutService>,
}

/// 安装 rustls 加密后端；重复安装不算错误
pub fn install_crypto_provider() {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }
}

/// 连接存储与缓存并装配全部组件
pub async fn build_context(config: &StaticConfig) -> Result<StartupContext> {
    let storage = StorageFactory::create(&config.database)
        .await
        .context("Failed to create storage backend")?;
    info!("Using storage backend: {}", storage.backend_name());

    let kv = cache::create_kv_store(&config.cache)
        .await
        .context("Failed to create cache backend")?;

    Ok(assemble(config, storage, kv))
}

/// 在已有存储与 KV 之上装配；会启动后台队列，须在 tokio 运行时内调用
pub fn assemble(
    config: &StaticConfig,
    storage: Arc<SeaOrmStorage>,
    kv: Arc<dyn KvStore>,
) -> StartupContext {
    let link_cache = LinkCache::new(kv.clone(), config.cache.link_ttl);

    let events: Arc<dyn EventStore> = storage.clone();
    let handler = Arc::new(DefaultJobHandler::new(
        events.clone(),
        create_publisher(&config.webhooks),
    ));
    let queue = JobQueue::start(&config.queue, handler, storage.clone());

    let clicks = ClickManager::new(
        storage.clone(),
        Duration::from_secs(config.analytics.flush_interval_secs),
        config.analytics.max_clicks_before_flush,
    );

    let resolver = Arc::new(LinkResolver::new(
        storage.clone(),
        link_cache.clone(),
        config.links.clone(),
    ));
    let tracker = Arc::new(ClickTracker::new(
        kv.clone(),
        ClickRateLimiter::new(&config.rate_limit),
        clicks.clone(),
        queue.clone(),
        config.cache.click_dedup_ttl,
        config.cache.click_cache_ttl,
    ));
    let conversions = Arc::new(ConversionService::new(
        storage.clone(),
        events,
        kv.clone(),
        queue.clone(),
        config.cache.invoice_dedup_ttl,
    ));
    let authenticator = Arc::new(WorkspaceAuthenticator::new(storage.clone()));
    let link_service = Arc::new(LinkService::new(
        storage.clone(),
        link_cache.clone(),
        queue.clone(),
        config.links.clone(),
    ));
    let partner_service = Arc::new(PartnerService::new(storage.clone(), queue.clone()));
    let payout_service = Arc::new(PayoutService::new(
        storage.clone(),
        config.payouts.platform_fee_rate,
    ));

    StartupContext {
        storage,
        kv,
        link_cache,
        queue,
        clicks,
        resolver,
        tracker,
        conversions,
        authenticator,
        link_service,
        partner_service,
        payout_service,
    }
}

/// 准备服务器启动的上下文
pub async fn prepare_server_startup() -> Result<StartupContext> {
    let start_time = std::time::Instant::now();
    debug!("Starting pre-startup processing...");

    install_crypto_provider();

    let config = get_config();
    let ctx = build_context(&config).await?;

    // 点击计数定期刷盘
    let clicks = ctx.clicks.clone();
    tokio::spawn(async move {
        clicks.run_periodic_flush().await;
    });

    // 回收限流器中不活跃的 key
    let tracker = ctx.tracker.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(LIMITER_RETAIN_INTERVAL);
        loop {
            interval.tick().await;
            tracker.limiter().retain_recent();
        }
    });

    info!(
        "Pre-startup processing completed in {} ms",
        start_time.elapsed().as_millis()
    );
    Ok(ctx)
}
