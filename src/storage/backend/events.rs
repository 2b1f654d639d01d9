//! EventStore implementation for SeaOrmStorage

use async_trait::async_trait;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DbErr, EntityTrait, QueryFilter, QueryOrder};
use tracing::trace;

use super::SeaOrmStorage;
use super::converters::{
    click_event_to_active_model, model_to_click_event, model_to_lead_event, model_to_sale_event,
};
use crate::analytics::EventStore;
use crate::errors::Result;
use crate::storage::models::{ClickEvent, LeadEvent, SaleEvent};
use migration::entities::{click_event, lead_event, sale_event};

#[async_trait]
impl EventStore for SeaOrmStorage {
    /// 后台队列至少投递一次，重复的 click_id 直接忽略
    async fn record_click(&self, event: &ClickEvent) -> Result<()> {
        let db = &self.db;
        let model = click_event_to_active_model(event);

        let inserted = self
            .retrying("record_click", || {
                let model = model.clone();
                async move {
                    match click_event::Entity::insert(model)
                        .on_conflict(
                            OnConflict::column(click_event::Column::ClickId)
                                .do_nothing()
                                .to_owned(),
                        )
                        .exec_without_returning(db)
                        .await
                    {
                        Err(DbErr::RecordNotInserted) => Ok(0),
                        other => other,
                    }
                }
            })
            .await?;

        trace!("Click {} recorded ({} rows)", event.click_id, inserted);
        Ok(())
    }

    async fn get_click_event(&self, click_id: &str) -> Result<Option<ClickEvent>> {
        let db = &self.db;
        let found = self
            .retrying("get_click_event", || async {
                click_event::Entity::find_by_id(click_id.to_string())
                    .one(db)
                    .await
            })
            .await?;
        Ok(found.map(model_to_click_event))
    }

    /// 客户最近一次线索事件
    async fn get_lead_event(&self, customer_id: &str) -> Result<Option<LeadEvent>> {
        let db = &self.db;
        let found = self
            .retrying("get_lead_event", || async {
                lead_event::Entity::find()
                    .filter(lead_event::Column::CustomerId.eq(customer_id))
                    .order_by_desc(lead_event::Column::Timestamp)
                    .one(db)
                    .await
            })
            .await?;
        Ok(found.map(model_to_lead_event))
    }

    async fn list_sale_events(&self, customer_id: &str) -> Result<Vec<SaleEvent>> {
        let models = sale_event::Entity::find()
            .filter(sale_event::Column::CustomerId.eq(customer_id))
            .order_by_asc(sale_event::Column::Timestamp)
            .all(&self.db)
            .await?;
        models.into_iter().map(model_to_sale_event).collect()
    }
}
