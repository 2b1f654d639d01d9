//! 重定向解析
//!
//! `(Host, path)` → 链接投影：域名别名归一化、短码解码与大小写编码、
//! 缓存优先查询，未命中或缓存不可用时回源数据库并回填缓存。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use crate::cache::{CacheResult, LinkCache};
use crate::config::LinksConfig;
use crate::errors::{DubError, Result};
use crate::storage::backend::{link_to_cached, link_to_stats};
use crate::storage::{CachedLink, LinkStats, SeaOrmStorage};
use crate::utils::request::VisitorInfo;
use crate::utils::{decode_key, encode_key};

/// 空路径对应的短码
pub const ROOT_KEY: &str = "_root";

/// 追加到目标 URL 的点击 ID 参数
pub const CLICK_ID_PARAM: &str = "dub_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSource {
    Cache,
    Store,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLink {
    pub link: CachedLink,
    pub source: LinkSource,
}

/// 重定向目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectTarget {
    Url(String),
    /// 已过期且没有配置过期跳转地址
    Gone,
}

fn matches_home_hostname(host: &str, links: &LinksConfig) -> bool {
    links.home_hostnames.iter().any(|entry| {
        let entry = entry.to_lowercase();
        match entry.strip_prefix('.') {
            Some(suffix) => host.ends_with(&format!(".{}", suffix)),
            None => host == entry,
        }
    })
}

fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        // IPv6 字面量 [::1]:8080
        return rest.split_once(']').map(|(ip, _)| ip).unwrap_or(host);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

/// Host 头归一化
///
/// 小写化、去掉末尾的 `.`、IDN 转 punycode；配置的主站主机名映射到默认短域名。
/// 端口只有在主机名原样出现在 `home_hostnames` 中时才参与匹配。
pub fn normalize_domain(host: &str, links: &LinksConfig) -> String {
    let host = host.trim().trim_end_matches('.').to_lowercase();
    if matches_home_hostname(&host, links) {
        return links.default_domain.clone();
    }

    let bare = strip_port(&host);
    if matches_home_hostname(bare, links) {
        return links.default_domain.clone();
    }

    match url::Host::parse(bare) {
        Ok(url::Host::Domain(ascii)) => ascii,
        _ => bare.to_string(),
    }
}

pub fn is_case_sensitive(domain: &str, links: &LinksConfig) -> bool {
    links
        .case_sensitive_domains
        .iter()
        .any(|d| d.eq_ignore_ascii_case(domain))
}

/// 路径段 → 存储形式的短码
///
/// 去掉前导 `/` 后做百分号解码（非法 UTF-8 时保留原文），空串映射为 `_root`；
/// 大小写敏感域名再做 [`encode_key`]。
pub fn normalize_key(domain: &str, raw: &str, links: &LinksConfig) -> String {
    let trimmed = raw.trim_start_matches('/');
    let decoded = urlencoding::decode(trimmed)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| trimmed.to_string());

    let key = if decoded.is_empty() {
        ROOT_KEY.to_string()
    } else {
        decoded
    };

    if is_case_sensitive(domain, links) {
        encode_key(&key)
    } else {
        key
    }
}

/// 存储形式 → 展示形式
pub fn display_key(domain: &str, stored: &str, links: &LinksConfig) -> String {
    if is_case_sensitive(domain, links) {
        decode_key(stored).unwrap_or_else(|| stored.to_string())
    } else {
        stored.to_string()
    }
}

/// 在目标 URL 上追加 `dub_id`；无法解析的 URL 原样返回
pub fn append_click_id(destination: &str, click_id: &str) -> String {
    match url::Url::parse(destination) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair(CLICK_ID_PARAM, click_id);
            url.to_string()
        }
        Err(_) => destination.to_string(),
    }
}

/// 选择重定向目标
///
/// 顺序：过期 → iOS/Android 覆盖 → 按国家的 geo 覆盖 → 默认 URL。
pub fn select_destination(
    link: &CachedLink,
    visitor: &VisitorInfo,
    now: DateTime<Utc>,
) -> RedirectTarget {
    if link.is_expired(now) {
        return match link.expired_url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => RedirectTarget::Url(url.to_string()),
            None => RedirectTarget::Gone,
        };
    }

    if visitor.is_ios()
        && let Some(ios) = link.ios.as_deref().filter(|u| !u.is_empty())
    {
        return RedirectTarget::Url(ios.to_string());
    }
    if visitor.is_android()
        && let Some(android) = link.android.as_deref().filter(|u| !u.is_empty())
    {
        return RedirectTarget::Url(android.to_string());
    }

    if let (Some(geo), Some(country)) = (link.geo.as_ref(), visitor.country.as_deref())
        && let Some(url) = geo.get(&country.to_uppercase())
    {
        return RedirectTarget::Url(url.clone());
    }

    RedirectTarget::Url(link.url.clone())
}

pub struct LinkResolver {
    storage: Arc<SeaOrmStorage>,
    cache: LinkCache,
    links: LinksConfig,
}

impl LinkResolver {
    pub fn new(storage: Arc<SeaOrmStorage>, cache: LinkCache, links: LinksConfig) -> Self {
        Self {
            storage,
            cache,
            links,
        }
    }

    pub fn links_config(&self) -> &LinksConfig {
        &self.links
    }

    /// 原始 Host 与路径段 → 链接
    #[instrument(skip(self))]
    pub async fn resolve(&self, host: &str, raw_key: &str) -> Result<Option<ResolvedLink>> {
        let domain = normalize_domain(host, &self.links);
        let key = normalize_key(&domain, raw_key, &self.links);
        self.lookup(&domain, &key).await
    }

    /// 已归一化的 `(domain, 存储形式 key)` 查询
    pub async fn lookup(&self, domain: &str, key: &str) -> Result<Option<ResolvedLink>> {
        match self.cache.get(domain, key).await {
            CacheResult::Hit(link) => {
                return Ok(Some(ResolvedLink {
                    link,
                    source: LinkSource::Cache,
                }));
            }
            CacheResult::Miss => debug!("Link cache miss for {}:{}", domain, key),
            // 已在 LinkCache 中记录 warn
            CacheResult::Unavailable => {}
        }

        let Some(model) = self.storage.find_link(domain, key).await? else {
            debug!("Link not found: {}:{}", domain, key);
            return Ok(None);
        };

        let link = link_to_cached(&model);
        // 回源命中一律回填
        self.cache.set(&link).await;

        Ok(Some(ResolvedLink {
            link,
            source: LinkSource::Store,
        }))
    }

    /// `GET /share/{domain}/{key}`：仅对开启 public_stats 的链接返回计数
    pub async fn public_stats(&self, domain: &str, raw_key: &str) -> Result<LinkStats> {
        let domain = normalize_domain(domain, &self.links);
        let key = normalize_key(&domain, raw_key, &self.links);

        let model = self
            .storage
            .find_link(&domain, &key)
            .await?
            .ok_or_else(|| DubError::not_found("Link not found."))?;

        if !model.public_stats {
            return Err(DubError::forbidden("Stats for this link are not public."));
        }

        let shown = display_key(&model.domain, &model.key, &self.links);
        Ok(link_to_stats(&model, shown))
    }
}
