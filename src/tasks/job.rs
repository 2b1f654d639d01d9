use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::trace;

use super::webhook::WebhookPublisher;
use crate::analytics::EventStore;
use crate::errors::Result;
use crate::storage::models::ClickEvent;
use crate::utils::{create_id, id_prefix};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum WebhookTrigger {
    #[serde(rename = "link.created")]
    #[strum(serialize = "link.created")]
    LinkCreated,
    #[serde(rename = "lead.created")]
    #[strum(serialize = "lead.created")]
    LeadCreated,
    #[serde(rename = "sale.created")]
    #[strum(serialize = "sale.created")]
    SaleCreated,
    #[serde(rename = "partner.created")]
    #[strum(serialize = "partner.created")]
    PartnerCreated,
}

/// webhook 负载：`{id, event, createdAt, data}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    pub id: String,
    pub event: WebhookTrigger,
    pub created_at: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl WebhookEvent {
    pub fn new(event: WebhookTrigger, data: serde_json::Value) -> Self {
        Self {
            id: create_id(id_prefix::WEBHOOK_EVENT),
            event,
            created_at: Utc::now(),
            data,
        }
    }
}

/// 单个端点的一次投递
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub endpoint: String,
    pub event: WebhookEvent,
}

/// 可序列化的后台任务（死信表中保存其 JSON）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum BackgroundJob {
    RecordClick(ClickEvent),
    /// 入队时按端点拆成 [`BackgroundJob::WebhookDelivery`]
    Webhook(WebhookEvent),
    WebhookDelivery(WebhookDelivery),
}

impl BackgroundJob {
    pub fn kind(&self) -> &'static str {
        match self {
            BackgroundJob::RecordClick(_) => "record_click",
            BackgroundJob::Webhook(_) | BackgroundJob::WebhookDelivery(_) => "webhook",
        }
    }
}

#[async_trait]
pub trait JobHandler: Send + Sync {
    /// 入队前拆分任务，拆出的每个任务独立重试；默认不拆
    fn expand(&self, job: BackgroundJob) -> Vec<BackgroundJob> {
        vec![job]
    }

    async fn handle(&self, job: &BackgroundJob) -> Result<()>;
}

/// 点击写入事件存储，webhook 交给发布器
pub struct DefaultJobHandler {
    events: Arc<dyn EventStore>,
    publisher: Arc<dyn WebhookPublisher>,
}

impl DefaultJobHandler {
    pub fn new(events: Arc<dyn EventStore>, publisher: Arc<dyn WebhookPublisher>) -> Self {
        Self { events, publisher }
    }
}

#[async_trait]
impl JobHandler for DefaultJobHandler {
    /// 每个端点一个投递任务，某个端点失败不会让已成功的端点重复收到事件
    fn expand(&self, job: BackgroundJob) -> Vec<BackgroundJob> {
        match job {
            BackgroundJob::Webhook(event) => {
                let endpoints = self.publisher.endpoints();
                if endpoints.is_empty() {
                    trace!("No webhook endpoints, dropping {}", event.event);
                }
                endpoints
                    .iter()
                    .map(|endpoint| {
                        BackgroundJob::WebhookDelivery(WebhookDelivery {
                            endpoint: endpoint.clone(),
                            event: event.clone(),
                        })
                    })
                    .collect()
            }
            other => vec![other],
        }
    }

    async fn handle(&self, job: &BackgroundJob) -> Result<()> {
        match job {
            BackgroundJob::RecordClick(click) => {
                trace!("Recording click {}", click.click_id);
                self.events.record_click(click).await
            }
            BackgroundJob::WebhookDelivery(delivery) => {
                self.publisher
                    .deliver(&delivery.endpoint, &delivery.event)
                    .await
            }
            // 未经 expand 的事件：逐个端点投递
            BackgroundJob::Webhook(event) => {
                for endpoint in self.publisher.endpoints() {
                    self.publisher.deliver(endpoint, event).await?;
                }
                Ok(())
            }
        }
    }
}
