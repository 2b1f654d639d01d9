//! 转化链：click → lead → sale
//!
//! 线索必须引用已存在的点击，销售必须能找到该客户此前的线索；
//! 查找失败时整个调用以 `not_found` 中止，不写入任何记录。

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::click_tracker::click_cache_key;
use super::commission::{calculate_earnings, select_reward};
use crate::analytics::EventStore;
use crate::cache::{CacheResult, KvStore};
use crate::errors::{DubError, Result};
use crate::storage::{
    ClickEvent, CommissionSale, Customer, CustomerInput, LeadEvent, PaymentProcessor, RewardEvent,
    SaleEvent, SaleStatus, SeaOrmStorage, Workspace,
};
use crate::tasks::{BackgroundJob, JobQueue, WebhookEvent, WebhookTrigger};
use crate::utils::{create_id, id_prefix};

pub const DEFAULT_SALE_EVENT_NAME: &str = "Purchase";
pub const DEFAULT_CURRENCY: &str = "usd";

/// 发票幂等键；不同 workspace 的发票号互不影响
pub fn invoice_key(workspace_id: &str, invoice_id: &str) -> String {
    format!("dub_sale_events:invoiceId:{}:{}", workspace_id, invoice_id)
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DubError::bad_request(format!("{} is required.", field)));
    }
    Ok(trimmed)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackLeadRequest {
    pub click_id: String,
    pub event_name: String,
    pub external_id: String,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_avatar: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSaleRequest {
    pub external_id: String,
    pub amount: i64,
    pub payment_processor: String,
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub invoice_id: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSummary {
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub external_id: String,
}

impl From<&Customer> for CustomerSummary {
    fn from(c: &Customer) -> Self {
        Self {
            name: c.name.clone(),
            email: c.email.clone(),
            avatar: c.avatar.clone(),
            external_id: c.external_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClickRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackLeadResponse {
    pub click: ClickRef,
    pub customer: CustomerSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleSummary {
    pub amount: i64,
    pub currency: String,
    pub payment_processor: PaymentProcessor,
    pub invoice_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// `customer` 与 `sale` 为 null 表示该 invoice 已经记录过
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSaleResponse {
    pub event_name: String,
    pub customer: Option<CustomerSummary>,
    pub sale: Option<SaleSummary>,
}

/// 校验后的销售请求
struct ValidSale {
    external_id: String,
    amount: i64,
    payment_processor: PaymentProcessor,
    event_name: String,
    invoice_id: Option<String>,
    currency: String,
    metadata: Option<serde_json::Value>,
}

impl TrackSaleRequest {
    fn validate(self) -> Result<ValidSale> {
        let external_id = required("externalId", &self.external_id)?.to_string();

        if self.amount < 0 {
            return Err(DubError::bad_request("amount must be greater than or equal to 0."));
        }

        let payment_processor = self
            .payment_processor
            .trim()
            .to_lowercase()
            .parse::<PaymentProcessor>()
            .map_err(|_| {
                DubError::bad_request(format!(
                    "Invalid paymentProcessor '{}'.",
                    self.payment_processor
                ))
            })?;

        let currency = match self.currency.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_CURRENCY.to_string(),
            Some(c) if c.len() == 3 && c.bytes().all(|b| b.is_ascii_alphabetic()) => c.to_lowercase(),
            Some(c) => {
                return Err(DubError::bad_request(format!("Invalid currency '{}'.", c)));
            }
        };

        let event_name = self
            .event_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_SALE_EVENT_NAME.to_string());

        Ok(ValidSale {
            external_id,
            amount: self.amount,
            payment_processor,
            event_name,
            invoice_id: self.invoice_id.map(|i| i.trim().to_string()).filter(|i| !i.is_empty()),
            currency,
            metadata: self.metadata,
        })
    }
}

pub struct ConversionService {
    storage: Arc<SeaOrmStorage>,
    events: Arc<dyn EventStore>,
    kv: Arc<dyn KvStore>,
    queue: JobQueue,
    invoice_dedup_ttl: u64,
}

impl ConversionService {
    pub fn new(
        storage: Arc<SeaOrmStorage>,
        events: Arc<dyn EventStore>,
        kv: Arc<dyn KvStore>,
        queue: JobQueue,
        invoice_dedup_ttl: u64,
    ) -> Self {
        Self {
            storage,
            events,
            kv,
            queue,
            invoice_dedup_ttl,
        }
    }

    /// 先查 clickIdCache，再查事件存储
    pub async fn find_click(&self, click_id: &str) -> Result<Option<ClickEvent>> {
        if let CacheResult::Hit(raw) = self.kv.get(&click_cache_key(click_id)).await {
            match serde_json::from_str::<ClickEvent>(&raw) {
                Ok(event) => return Ok(Some(event)),
                Err(e) => warn!("Ignoring undecodable cached click {}: {}", click_id, e),
            }
        }
        self.events.get_click_event(click_id).await
    }

    #[instrument(skip(self, workspace, req), fields(workspace = %workspace.id))]
    pub async fn track_lead(
        &self,
        workspace: &Workspace,
        req: TrackLeadRequest,
    ) -> Result<TrackLeadResponse> {
        let click_id = required("clickId", &req.click_id)?.to_string();
        let event_name = required("eventName", &req.event_name)?.to_string();
        let external_id = required("externalId", &req.external_id)?.to_string();

        let click = self.find_click(&click_id).await?.ok_or_else(|| {
            DubError::not_found(format!(
                "Click event not found for clickId: {}",
                click_id
            ))
        })?;

        if click.workspace_id.as_deref() != Some(workspace.id.as_str()) {
            return Err(DubError::forbidden(
                "Click does not belong to this workspace.",
            ));
        }

        let customer_input = CustomerInput {
            workspace_id: workspace.id.clone(),
            external_id,
            name: req.customer_name,
            email: req.customer_email,
            avatar: req.customer_avatar,
            link_id: Some(click.link_id.clone()),
            click_id: Some(click.click_id.clone()),
            country: click.visitor.country.clone(),
        };
        let lead = LeadEvent {
            event_id: create_id(id_prefix::EVENT),
            event_name,
            // upsert 后回填
            customer_id: String::new(),
            click_id: click.click_id.clone(),
            link_id: click.link_id.clone(),
            workspace_id: workspace.id.clone(),
            metadata: req.metadata,
            timestamp: Utc::now(),
        };
        let (customer, lead) = self
            .storage
            .record_lead_conversion(customer_input, lead)
            .await?;

        let summary = CustomerSummary::from(&customer);
        self.queue.enqueue(BackgroundJob::Webhook(WebhookEvent::new(
            WebhookTrigger::LeadCreated,
            serde_json::json!({
                "eventName": lead.event_name,
                "customer": summary,
                "click": {"id": click.click_id},
                "linkId": click.link_id,
            }),
        )));

        info!("Lead '{}' recorded for customer {}", lead.event_name, customer.id);
        Ok(TrackLeadResponse {
            click: ClickRef { id: click.click_id },
            customer: summary,
        })
    }

    #[instrument(skip(self, workspace, req), fields(workspace = %workspace.id))]
    pub async fn track_sale(
        &self,
        workspace: &Workspace,
        req: TrackSaleRequest,
    ) -> Result<TrackSaleResponse> {
        let sale = req.validate()?;

        let customer = self
            .storage
            .find_customer(&workspace.id, &sale.external_id)
            .await?
            .ok_or_else(|| {
                DubError::not_found(format!(
                    "Customer not found for externalId: {}",
                    sale.external_id
                ))
            })?;

        let lead = self
            .events
            .get_lead_event(&customer.id)
            .await?
            .ok_or_else(|| {
                DubError::not_found(format!(
                    "Lead event not found for externalId: {}",
                    sale.external_id
                ))
            })?;

        // 只有本次调用占到的键才在失败时释放
        let mut claimed_invoice = None;
        if let Some(invoice_id) = &sale.invoice_id {
            let key = invoice_key(&workspace.id, invoice_id);
            match self.kv.set_nx_get(&key, &customer.id, self.invoice_dedup_ttl).await {
                CacheResult::Hit(_) => {
                    debug!("Sale for invoice {} already recorded", invoice_id);
                    return Ok(TrackSaleResponse {
                        event_name: sale.event_name,
                        customer: None,
                        sale: None,
                    });
                }
                CacheResult::Miss => claimed_invoice = Some(key),
                CacheResult::Unavailable => {
                    warn!("Invoice dedup unavailable, recording sale for {}", invoice_id);
                }
            }
        }

        let event = SaleEvent {
            event_id: create_id(id_prefix::EVENT),
            event_name: sale.event_name.clone(),
            customer_id: customer.id.clone(),
            click_id: lead.click_id.clone(),
            link_id: lead.link_id.clone(),
            workspace_id: workspace.id.clone(),
            payment_processor: sale.payment_processor,
            amount: sale.amount,
            currency: sale.currency.clone(),
            invoice_id: sale.invoice_id.clone(),
            metadata: sale.metadata.clone(),
            timestamp: Utc::now(),
        };

        let written = async {
            let commission = self.build_commission(&event).await?;
            self.storage
                .record_sale_conversion(&event, commission.as_ref())
                .await?;
            Ok::<_, DubError>(commission)
        }
        .await;
        let commission = match written {
            Ok(commission) => commission,
            Err(e) => {
                // 事务已回滚，释放发票占位让调用方可以重试
                if let Some(key) = claimed_invoice
                    && let Err(del_err) = self.kv.del(&[key.clone()]).await
                {
                    warn!("Failed to release invoice key {}: {}", key, del_err);
                }
                return Err(e);
            }
        };

        let summary = CustomerSummary::from(&customer);
        let sale_summary = SaleSummary {
            amount: sale.amount,
            currency: sale.currency,
            payment_processor: sale.payment_processor,
            invoice_id: sale.invoice_id,
            metadata: sale.metadata,
        };

        self.queue.enqueue(BackgroundJob::Webhook(WebhookEvent::new(
            WebhookTrigger::SaleCreated,
            serde_json::json!({
                "eventName": event.event_name,
                "customer": summary,
                "sale": sale_summary,
                "linkId": event.link_id,
                "commission": commission.as_ref().map(|c| serde_json::json!({
                    "id": c.id,
                    "partnerId": c.partner_id,
                    "earnings": c.earnings,
                })),
            }),
        )));

        info!(
            "Sale {} ({} {}) recorded for customer {}",
            event.event_id, event.amount, event.currency, customer.id
        );
        Ok(TrackSaleResponse {
            event_name: event.event_name,
            customer: Some(summary),
            sale: Some(sale_summary),
        })
    }

    /// 链接属于某计划的合作伙伴且存在适用奖励时生成佣金记录（随销售事件一起写入）
    async fn build_commission(&self, event: &SaleEvent) -> Result<Option<CommissionSale>> {
        let Some(link) = self.storage.find_link_by_id(&event.link_id).await? else {
            return Ok(None);
        };
        let (Some(program_id), Some(partner_id)) = (link.program_id, link.partner_id) else {
            return Ok(None);
        };

        let rewards = self.storage.find_rewards(&program_id, RewardEvent::Sale).await?;
        let Some(reward) = select_reward(&rewards, &partner_id) else {
            debug!("No sale reward for partner {} in {}", partner_id, program_id);
            return Ok(None);
        };

        let earnings = calculate_earnings(reward, 1, event.amount);
        let now = Utc::now();
        let sale = CommissionSale {
            id: create_id(id_prefix::SALE),
            program_id,
            partner_id,
            link_id: event.link_id.clone(),
            customer_id: event.customer_id.clone(),
            event_id: event.event_id.clone(),
            invoice_id: event.invoice_id.clone(),
            amount: event.amount,
            earnings,
            currency: event.currency.clone(),
            status: SaleStatus::Pending,
            payout_id: None,
            created_at: now,
            updated_at: now,
        };

        debug!("Commission {} earns {} for {}", sale.id, earnings, sale.partner_id);
        Ok(Some(sale))
    }
}
