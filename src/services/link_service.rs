//! Link management service
//!
//! Creation, deletion and domain renames keep the relational store and the
//! link cache in step. Used by the CLI; the HTTP surface never mutates links.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::ActiveValue::Set;
use tracing::{info, warn};

use super::resolver::{display_key, is_case_sensitive, normalize_domain};
use crate::cache::LinkCache;
use crate::config::LinksConfig;
use crate::errors::{DubError, Result};
use crate::storage::backend::link_to_cached;
use crate::storage::{CachedLink, LinkInput, LinkModel, SeaOrmStorage};
use crate::tasks::{BackgroundJob, JobQueue, WebhookEvent, WebhookTrigger};
use crate::utils::{
    create_id, encode_key, fold_key, generate_random_code, id_prefix, validate_url,
};
use migration::entities::link;

/// 生成随机短码时的最大重试次数
const MAX_KEY_ATTEMPTS: usize = 5;

/// Service for link management operations
pub struct LinkService {
    storage: Arc<SeaOrmStorage>,
    cache: LinkCache,
    queue: JobQueue,
    links: LinksConfig,
}

impl LinkService {
    pub fn new(
        storage: Arc<SeaOrmStorage>,
        cache: LinkCache,
        queue: JobQueue,
        links: LinksConfig,
    ) -> Self {
        Self {
            storage,
            cache,
            queue,
            links,
        }
    }

    fn optional_url(field: &str, value: Option<String>) -> Result<Option<String>> {
        match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            Some(v) => {
                validate_url(&v)
                    .map_err(|e| DubError::bad_request(format!("Invalid {}: {}", field, e.message())))?;
                Ok(Some(v))
            }
            None => Ok(None),
        }
    }

    /// Pick the stored key: user supplied (encoded on case-sensitive domains)
    /// or a random one that is not taken yet.
    async fn choose_key(&self, domain: &str, requested: Option<String>) -> Result<String> {
        let encode = |k: &str| {
            if is_case_sensitive(domain, &self.links) {
                encode_key(k)
            } else {
                k.to_string()
            }
        };

        if let Some(raw) = requested
            .map(|k| k.trim().trim_start_matches('/').to_string())
            .filter(|k| !k.is_empty())
        {
            let key = encode(&raw);
            if self.storage.find_link(domain, &key).await?.is_some() {
                return Err(DubError::conflict(format!(
                    "Duplicate key: {}:{} already exists.",
                    domain, raw
                )));
            }
            return Ok(key);
        }

        for _ in 0..MAX_KEY_ATTEMPTS {
            let key = encode(&generate_random_code(self.links.random_key_length));
            if self.storage.find_link(domain, &key).await?.is_none() {
                return Ok(key);
            }
        }
        Err(DubError::conflict(
            "Failed to generate a unique key, try a longer key length.",
        ))
    }

    /// Create a new short link
    pub async fn create(&self, input: LinkInput) -> Result<LinkModel> {
        let url = input.url.trim().to_string();
        validate_url(&url)?;
        // 与重定向时的 Host 归一化一致（IDN → punycode）
        let domain = match input.domain.trim() {
            "" => self.links.default_domain.to_lowercase(),
            d => normalize_domain(d, &self.links),
        };
        let key = self.choose_key(&domain, input.key).await?;

        let geo = match input.geo.filter(|g| !g.is_empty()) {
            Some(map) => {
                for target in map.values() {
                    validate_url(target)?;
                }
                let upper: std::collections::BTreeMap<String, String> = map
                    .into_iter()
                    .map(|(country, target)| (country.to_uppercase(), target))
                    .collect();
                Some(serde_json::to_string(&upper)?)
            }
            None => None,
        };

        let now = Utc::now();
        let model = link::ActiveModel {
            id: Set(create_id(id_prefix::LINK)),
            domain: Set(domain.clone()),
            key_lower: Set(fold_key(&key)),
            key: Set(key),
            url: Set(url),
            workspace_id: Set(input.workspace_id),
            public_stats: Set(input.public_stats),
            archived: Set(false),
            track_conversion: Set(input.track_conversion),
            expires_at: Set(input.expires_at),
            expired_url: Set(Self::optional_url("expiredUrl", input.expired_url)?),
            ios: Set(Self::optional_url("ios", input.ios)?),
            android: Set(Self::optional_url("android", input.android)?),
            geo: Set(geo),
            program_id: Set(input.program_id),
            partner_id: Set(input.partner_id),
            folder_id: Set(input.folder_id),
            clicks: Set(0),
            leads: Set(0),
            sales: Set(0),
            sale_amount: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let created = self.storage.insert_link(model, &input.tag_ids).await?;
        self.cache.set(&link_to_cached(&created)).await;

        let shown = display_key(&created.domain, &created.key, &self.links);
        self.queue.enqueue(BackgroundJob::Webhook(WebhookEvent::new(
            WebhookTrigger::LinkCreated,
            serde_json::json!({
                "id": created.id,
                "domain": created.domain,
                "key": shown,
                "url": created.url,
                "workspaceId": created.workspace_id,
                "tagIds": input.tag_ids,
                "createdAt": created.created_at,
            }),
        )));

        info!("Link created: {}/{} -> {}", created.domain, shown, created.url);
        Ok(created)
    }

    /// Delete a link by `(domain, key)`; `key` is in display form
    pub async fn delete(&self, domain: &str, key: &str) -> Result<LinkModel> {
        let domain = normalize_domain(domain, &self.links);
        let stored = if is_case_sensitive(&domain, &self.links) {
            encode_key(key)
        } else {
            key.to_string()
        };

        let found = self
            .storage
            .find_link(&domain, &stored)
            .await?
            .ok_or_else(|| DubError::not_found(format!("Link {}/{} not found", domain, key)))?;

        let mut deleted = self.delete_many(&[found.id]).await?;
        deleted
            .pop()
            .ok_or_else(|| DubError::not_found(format!("Link {}/{} not found", domain, key)))
    }

    pub async fn delete_many(&self, ids: &[String]) -> Result<Vec<LinkModel>> {
        let deleted = self.storage.delete_links(ids).await?;
        let pairs: Vec<(String, String)> = deleted
            .iter()
            .map(|l| (l.domain.clone(), l.key.clone()))
            .collect();
        self.cache.delete_many(&pairs).await;

        if deleted.len() < ids.len() {
            warn!("{} of {} links were already gone", ids.len() - deleted.len(), ids.len());
        }
        Ok(deleted)
    }

    /// Move every link of `old_domain` to `new_domain`
    ///
    /// Returns `(links moved in the store, cache entries renamed)`.
    pub async fn rename_domain(&self, old_domain: &str, new_domain: &str) -> Result<(usize, usize)> {
        let old_domain = normalize_domain(old_domain, &self.links);
        let new_domain = normalize_domain(new_domain, &self.links);
        let moved = self.storage.rename_domain(&old_domain, &new_domain).await?;

        let projections: Vec<CachedLink> = moved.iter().map(link_to_cached).collect();
        let renamed = self.cache.rename(&projections, &old_domain).await;

        info!(
            "Domain renamed {} -> {}: {} links, {} cache entries",
            old_domain,
            new_domain,
            moved.len(),
            renamed
        );
        Ok((moved.len(), renamed))
    }

    /// Load active links into the cache, optionally for one domain
    pub async fn warm_cache(&self, domain: Option<&str>) -> Result<usize> {
        let links = self.storage.list_active_links(domain).await?;
        let projections: Vec<CachedLink> = links.iter().map(link_to_cached).collect();
        self.cache.mset(&projections).await;
        Ok(projections.len())
    }
}
