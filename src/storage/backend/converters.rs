//! Sea-ORM Model 与领域模型之间的转换

use std::str::FromStr;

use sea_orm::ActiveValue::Set;
use tracing::warn;

use crate::errors::{DubError, Result};
use crate::storage::models::*;
use crate::utils::request::VisitorInfo;
use migration::entities::{
    click_event, customer, lead_event, link, partner, payout, reward, sale, sale_event, workspace,
};

/// 数据库中的枚举字符串解析失败时直接报错
fn parse_enum<T: FromStr>(field: &str, value: &str) -> Result<T> {
    T::from_str(value)
        .map_err(|_| DubError::internal(format!("Unknown {} value in database: '{}'", field, value)))
}

fn parse_metadata(raw: Option<String>) -> Option<serde_json::Value> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
}

fn metadata_to_string(value: &Option<serde_json::Value>) -> Option<String> {
    value.as_ref().map(|v| v.to_string())
}

pub fn link_to_cached(model: &link::Model) -> CachedLink {
    let geo = model.geo.as_deref().and_then(|raw| match serde_json::from_str(raw) {
        Ok(map) => Some(map),
        Err(e) => {
            warn!("Ignoring malformed geo targeting on link {}: {}", model.id, e);
            None
        }
    });

    CachedLink {
        id: model.id.clone(),
        domain: model.domain.clone(),
        key: model.key.clone(),
        url: model.url.clone(),
        workspace_id: model.workspace_id.clone(),
        track_conversion: model.track_conversion,
        expires_at: model.expires_at,
        expired_url: model.expired_url.clone(),
        ios: model.ios.clone(),
        android: model.android.clone(),
        geo,
        program_id: model.program_id.clone(),
        partner_id: model.partner_id.clone(),
    }
}

pub fn link_to_stats(model: &link::Model, display_key: String) -> LinkStats {
    LinkStats {
        domain: model.domain.clone(),
        key: display_key,
        url: model.url.clone(),
        clicks: model.clicks,
        leads: model.leads,
        sales: model.sales,
        sale_amount: model.sale_amount,
    }
}

pub fn model_to_workspace(model: workspace::Model) -> Workspace {
    Workspace {
        id: model.id,
        slug: model.slug,
        name: model.name,
        usage: model.usage,
        leads_usage: model.leads_usage,
        sales_usage: model.sales_usage,
    }
}

pub fn model_to_customer(model: customer::Model) -> Customer {
    Customer {
        id: model.id,
        workspace_id: model.workspace_id,
        external_id: model.external_id,
        name: model.name,
        email: model.email,
        avatar: model.avatar,
        link_id: model.link_id,
        click_id: model.click_id,
        country: model.country,
        created_at: model.created_at,
    }
}

pub fn model_to_partner(model: partner::Model) -> Partner {
    Partner {
        id: model.id,
        name: model.name,
        email: model.email,
        created_at: model.created_at,
    }
}

pub fn model_to_reward(model: reward::Model) -> Result<Reward> {
    Ok(Reward {
        event: parse_enum("reward event", &model.event)?,
        kind: parse_enum("reward type", &model.kind)?,
        id: model.id,
        program_id: model.program_id,
        partner_id: model.partner_id,
        amount: model.amount,
    })
}

pub fn model_to_commission_sale(model: sale::Model) -> Result<CommissionSale> {
    Ok(CommissionSale {
        status: parse_enum("sale status", &model.status)?,
        id: model.id,
        program_id: model.program_id,
        partner_id: model.partner_id,
        link_id: model.link_id,
        customer_id: model.customer_id,
        event_id: model.event_id,
        invoice_id: model.invoice_id,
        amount: model.amount,
        earnings: model.earnings,
        currency: model.currency,
        payout_id: model.payout_id,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

pub fn commission_sale_to_active_model(s: &CommissionSale) -> sale::ActiveModel {
    sale::ActiveModel {
        id: Set(s.id.clone()),
        program_id: Set(s.program_id.clone()),
        partner_id: Set(s.partner_id.clone()),
        link_id: Set(s.link_id.clone()),
        customer_id: Set(s.customer_id.clone()),
        event_id: Set(s.event_id.clone()),
        invoice_id: Set(s.invoice_id.clone()),
        amount: Set(s.amount),
        earnings: Set(s.earnings),
        currency: Set(s.currency.clone()),
        status: Set(s.status.to_string()),
        payout_id: Set(s.payout_id.clone()),
        created_at: Set(s.created_at),
        updated_at: Set(s.updated_at),
    }
}

pub fn model_to_payout(model: payout::Model) -> Result<Payout> {
    Ok(Payout {
        status: parse_enum("payout status", &model.status)?,
        kind: parse_enum("payout type", &model.kind)?,
        id: model.id,
        program_id: model.program_id,
        partner_id: model.partner_id,
        amount: model.amount,
        fee: model.fee,
        total: model.total,
        currency: model.currency,
        description: model.description,
        quantity: model.quantity,
        period_start: model.period_start,
        period_end: model.period_end,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

pub fn click_event_to_active_model(e: &ClickEvent) -> click_event::ActiveModel {
    let v = &e.visitor;
    click_event::ActiveModel {
        click_id: Set(e.click_id.clone()),
        link_id: Set(e.link_id.clone()),
        workspace_id: Set(e.workspace_id.clone()),
        domain: Set(e.domain.clone()),
        key: Set(e.key.clone()),
        url: Set(e.url.clone()),
        ip: Set(v.ip.clone()),
        country: Set(v.country.clone()),
        city: Set(v.city.clone()),
        region: Set(v.region.clone()),
        continent: Set(v.continent.clone()),
        device: Set(v.device.clone()),
        browser: Set(v.browser.clone()),
        os: Set(v.os.clone()),
        bot: Set(v.bot),
        user_agent: Set(v.user_agent.clone()),
        referer: Set(v.referer.clone()),
        referer_url: Set(v.referer_url.clone()),
        timestamp: Set(e.timestamp),
    }
}

pub fn model_to_click_event(m: click_event::Model) -> ClickEvent {
    ClickEvent {
        click_id: m.click_id,
        link_id: m.link_id,
        workspace_id: m.workspace_id,
        domain: m.domain,
        key: m.key,
        url: m.url,
        visitor: VisitorInfo {
            ip: m.ip,
            country: m.country,
            city: m.city,
            region: m.region,
            continent: m.continent,
            device: m.device,
            browser: m.browser,
            os: m.os,
            bot: m.bot,
            user_agent: m.user_agent,
            referer: m.referer,
            referer_url: m.referer_url,
        },
        timestamp: m.timestamp,
    }
}

pub fn lead_event_to_active_model(e: &LeadEvent) -> lead_event::ActiveModel {
    lead_event::ActiveModel {
        event_id: Set(e.event_id.clone()),
        event_name: Set(e.event_name.clone()),
        customer_id: Set(e.customer_id.clone()),
        click_id: Set(e.click_id.clone()),
        link_id: Set(e.link_id.clone()),
        workspace_id: Set(e.workspace_id.clone()),
        metadata: Set(metadata_to_string(&e.metadata)),
        timestamp: Set(e.timestamp),
    }
}

pub fn model_to_lead_event(m: lead_event::Model) -> LeadEvent {
    LeadEvent {
        event_id: m.event_id,
        event_name: m.event_name,
        customer_id: m.customer_id,
        click_id: m.click_id,
        link_id: m.link_id,
        workspace_id: m.workspace_id,
        metadata: parse_metadata(m.metadata),
        timestamp: m.timestamp,
    }
}

pub fn sale_event_to_active_model(e: &SaleEvent) -> sale_event::ActiveModel {
    sale_event::ActiveModel {
        event_id: Set(e.event_id.clone()),
        event_name: Set(e.event_name.clone()),
        customer_id: Set(e.customer_id.clone()),
        click_id: Set(e.click_id.clone()),
        link_id: Set(e.link_id.clone()),
        workspace_id: Set(e.workspace_id.clone()),
        payment_processor: Set(e.payment_processor.to_string()),
        amount: Set(e.amount),
        currency: Set(e.currency.clone()),
        invoice_id: Set(e.invoice_id.clone()),
        metadata: Set(metadata_to_string(&e.metadata)),
        timestamp: Set(e.timestamp),
    }
}

pub fn model_to_sale_event(m: sale_event::Model) -> Result<SaleEvent> {
    Ok(SaleEvent {
        payment_processor: parse_enum("payment processor", &m.payment_processor)?,
        event_id: m.event_id,
        event_name: m.event_name,
        customer_id: m.customer_id,
        click_id: m.click_id,
        link_id: m.link_id,
        workspace_id: m.workspace_id,
        amount: m.amount,
        currency: m.currency,
        invoice_id: m.invoice_id,
        metadata: parse_metadata(m.metadata),
        timestamp: m.timestamp,
    })
}
