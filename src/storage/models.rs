use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::utils::request::VisitorInfo;

pub use migration::entities::link::Model as LinkModel;

/// 缓存中的链接投影（重定向所需的最小字段集）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedLink {
    pub id: String,
    pub domain: String,
    pub key: String,
    pub url: String,
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub track_conversion: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expired_url: Option<String>,
    #[serde(default)]
    pub ios: Option<String>,
    #[serde(default)]
    pub android: Option<String>,
    /// 国家代码 -> 目标 URL
    #[serde(default)]
    pub geo: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub program_id: Option<String>,
    #[serde(default)]
    pub partner_id: Option<String>,
}

impl CachedLink {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// 创建链接的输入
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkInput {
    pub domain: String,
    /// 为空时随机生成
    pub key: Option<String>,
    pub url: String,
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub public_stats: bool,
    #[serde(default)]
    pub track_conversion: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub expired_url: Option<String>,
    pub ios: Option<String>,
    pub android: Option<String>,
    pub geo: Option<BTreeMap<String, String>>,
    pub program_id: Option<String>,
    pub partner_id: Option<String>,
    pub folder_id: Option<String>,
    #[serde(default)]
    pub tag_ids: Vec<String>,
}

/// 公开统计
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkStats {
    pub domain: String,
    pub key: String,
    pub url: String,
    pub clicks: i64,
    pub leads: i64,
    pub sales: i64,
    pub sale_amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickEvent {
    pub click_id: String,
    pub link_id: String,
    pub workspace_id: Option<String>,
    pub domain: String,
    pub key: String,
    pub url: String,
    #[serde(flatten)]
    pub visitor: VisitorInfo,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadEvent {
    pub event_id: String,
    pub event_name: String,
    pub customer_id: String,
    pub click_id: String,
    pub link_id: String,
    pub workspace_id: String,
    pub metadata: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleEvent {
    pub event_id: String,
    pub event_name: String,
    pub customer_id: String,
    pub click_id: String,
    pub link_id: String,
    pub workspace_id: String,
    pub payment_processor: PaymentProcessor,
    pub amount: i64,
    pub currency: String,
    pub invoice_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub workspace_id: String,
    pub external_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub link_id: Option<String>,
    pub click_id: Option<String>,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// upsert 客户时的输入
#[derive(Debug, Clone, Default)]
pub struct CustomerInput {
    pub workspace_id: String,
    pub external_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub link_id: Option<String>,
    pub click_id: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub usage: i64,
    pub leads_usage: i64,
    pub sales_usage: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentProcessor {
    Stripe,
    Shopify,
    Polar,
    Paddle,
    Revenuecat,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RewardEvent {
    Click,
    Lead,
    Sale,
}

/// 佣金类型（封闭枚举，数据库中出现未知值时直接报错）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RewardKind {
    Percentage,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    pub id: String,
    pub program_id: String,
    pub partner_id: Option<String>,
    pub event: RewardEvent,
    #[serde(rename = "type")]
    pub kind: RewardKind,
    pub amount: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SaleStatus {
    Pending,
    Processed,
    Paid,
    Canceled,
}

/// 合作伙伴佣金记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionSale {
    pub id: String,
    pub program_id: String,
    pub partner_id: String,
    pub link_id: String,
    pub customer_id: String,
    pub event_id: String,
    pub invoice_id: Option<String>,
    pub amount: i64,
    pub earnings: i64,
    pub currency: String,
    pub status: SaleStatus,
    pub payout_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PayoutStatus {
    Pending,
    Processed,
    Completed,
    Canceled,
    Reversed,
}

impl PayoutStatus {
    /// 允许的状态迁移
    pub fn can_transition_to(self, next: PayoutStatus) -> bool {
        use PayoutStatus::*;
        matches!(
            (self, next),
            (Pending, Processed)
                | (Pending, Canceled)
                | (Processed, Completed)
                | (Processed, Canceled)
                | (Processed, Reversed)
                | (Completed, Reversed)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PayoutKind {
    Sales,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payout {
    pub id: String,
    pub program_id: String,
    pub partner_id: String,
    pub amount: i64,
    pub fee: i64,
    pub total: i64,
    pub currency: String,
    pub status: PayoutStatus,
    #[serde(rename = "type")]
    pub kind: PayoutKind,
    pub description: Option<String>,
    pub quantity: i32,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EnrollmentStatus {
    Pending,
    Approved,
    Banned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partner {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_payout_transitions() {
        use PayoutStatus::*;
        assert!(Pending.can_transition_to(Processed));
        assert!(Pending.can_transition_to(Canceled));
        assert!(Processed.can_transition_to(Completed));
        assert!(Completed.can_transition_to(Reversed));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Canceled.can_transition_to(Processed));
        assert!(!Reversed.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_enum_string_forms() {
        assert_eq!(RewardKind::from_str("percentage").unwrap(), RewardKind::Percentage);
        assert!(RewardKind::from_str("tiered").is_err());
        assert_eq!(SaleStatus::Processed.to_string(), "processed");
        assert_eq!(PaymentProcessor::Revenuecat.to_string(), "revenuecat");
    }

    #[test]
    fn test_cached_link_roundtrips_camel_case() {
        let json = r#"{"id":"link_1","domain":"dub.sh","key":"abc","url":"https://example.com","trackConversion":true}"#;
        let link: CachedLink = serde_json::from_str(json).unwrap();
        assert!(link.track_conversion);
        assert_eq!(link.workspace_id, None);
        assert!(!link.is_expired(Utc::now()));
    }
}
