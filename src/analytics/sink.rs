use async_trait::async_trait;

use crate::errors::Result;
use crate::storage::models::{ClickEvent, LeadEvent, SaleEvent};

/// 链接点击计数的批量落库
#[async_trait]
pub trait ClickSink: Send + Sync {
    /// `updates`: (link_id, 新增点击数)
    async fn flush_clicks(&self, updates: Vec<(String, usize)>) -> anyhow::Result<()>;
}

/// 事件存储：点击只追加写入，线索与销售只读
///
/// 线索、销售与计数需要同一事务写入，见 `SeaOrmStorage::record_lead_conversion`。
#[async_trait]
pub trait EventStore: Send + Sync {
    /// 同一 click_id 重复写入时保持幂等
    async fn record_click(&self, event: &ClickEvent) -> Result<()>;

    async fn get_click_event(&self, click_id: &str) -> Result<Option<ClickEvent>>;

    /// 客户最近一次线索事件
    async fn get_lead_event(&self, customer_id: &str) -> Result<Option<LeadEvent>>;

    async fn list_sale_events(&self, customer_id: &str) -> Result<Vec<SaleEvent>>;
}
