//! 客户、转化计数与佣金记录

use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ExprTrait, QueryFilter,
    TransactionTrait,
};
use tracing::debug;

use super::SeaOrmStorage;
use super::converters::{
    commission_sale_to_active_model, lead_event_to_active_model, model_to_commission_sale,
    model_to_customer, sale_event_to_active_model,
};
use crate::errors::{DubError, Result};
use crate::storage::models::{CommissionSale, Customer, CustomerInput, LeadEvent, SaleEvent};
use crate::utils::{create_id, id_prefix};
use migration::entities::{customer, lead_event, link, sale, sale_event, workspace};

impl SeaOrmStorage {
    pub async fn find_customer(&self, workspace_id: &str, external_id: &str) -> Result<Option<Customer>> {
        let db = &self.db;
        let found = self
            .retrying("find_customer", || async {
                customer::Entity::find()
                    .filter(customer::Column::WorkspaceId.eq(workspace_id))
                    .filter(customer::Column::ExternalId.eq(external_id))
                    .one(db)
                    .await
            })
            .await?;
        Ok(found.map(model_to_customer))
    }

    /// 线索转化：客户 upsert、线索事件、link.leads 与 workspace.leads_usage 同一事务写入
    ///
    /// 返回写入后的客户；`lead.customer_id` 以 upsert 结果为准。
    pub async fn record_lead_conversion(
        &self,
        input: CustomerInput,
        mut lead: LeadEvent,
    ) -> Result<(Customer, LeadEvent)> {
        let txn = self.db.begin().await?;

        let customer = upsert_customer(&txn, &input).await?;
        lead.customer_id = customer.id.clone();
        lead_event::Entity::insert(lead_event_to_active_model(&lead))
            .exec_without_returning(&txn)
            .await?;
        bump_link(&txn, &lead.link_id, &[(link::Column::Leads, 1)]).await?;
        bump_workspace(&txn, &lead.workspace_id, &[(workspace::Column::LeadsUsage, 1)]).await?;

        txn.commit().await?;
        Ok((model_to_customer(customer), lead))
    }

    /// 销售转化：销售事件、计数（link.sales +1，link.sale_amount 与
    /// workspace.sales_usage 加上金额）与佣金记录同一事务写入
    pub async fn record_sale_conversion(
        &self,
        event: &SaleEvent,
        commission: Option<&CommissionSale>,
    ) -> Result<()> {
        let txn = self.db.begin().await?;

        sale_event::Entity::insert(sale_event_to_active_model(event))
            .exec_without_returning(&txn)
            .await?;
        bump_link(
            &txn,
            &event.link_id,
            &[(link::Column::Sales, 1), (link::Column::SaleAmount, event.amount)],
        )
        .await?;
        bump_workspace(
            &txn,
            &event.workspace_id,
            &[(workspace::Column::SalesUsage, event.amount)],
        )
        .await?;
        if let Some(sale) = commission {
            commission_sale_to_active_model(sale).insert(&txn).await?;
        }

        txn.commit().await?;
        Ok(())
    }

    pub async fn insert_commission_sale(&self, sale: &CommissionSale) -> Result<CommissionSale> {
        let inserted = commission_sale_to_active_model(sale).insert(&self.db).await?;
        model_to_commission_sale(inserted)
    }

    pub async fn sales_for_partner(&self, program_id: &str, partner_id: &str) -> Result<Vec<CommissionSale>> {
        let models = sale::Entity::find()
            .filter(sale::Column::ProgramId.eq(program_id))
            .filter(sale::Column::PartnerId.eq(partner_id))
            .all(&self.db)
            .await?;
        models.into_iter().map(model_to_commission_sale).collect()
    }
}

/// 按 `(workspace_id, external_id)` upsert；冲突时只覆盖输入中给出的字段
async fn upsert_customer<C: ConnectionTrait>(conn: &C, input: &CustomerInput) -> Result<customer::Model> {
    // external_id 恒在更新列中，保证冲突时总是走 UPDATE 而不是 DO NOTHING
    let mut update_columns = vec![customer::Column::ExternalId];
    for (column, given) in [
        (customer::Column::Name, input.name.is_some()),
        (customer::Column::Email, input.email.is_some()),
        (customer::Column::Avatar, input.avatar.is_some()),
        (customer::Column::LinkId, input.link_id.is_some()),
        (customer::Column::ClickId, input.click_id.is_some()),
        (customer::Column::Country, input.country.is_some()),
    ] {
        if given {
            update_columns.push(column);
        }
    }

    let model = customer::ActiveModel {
        id: Set(create_id(id_prefix::CUSTOMER)),
        workspace_id: Set(input.workspace_id.clone()),
        external_id: Set(input.external_id.clone()),
        name: Set(input.name.clone()),
        email: Set(input.email.clone()),
        avatar: Set(input.avatar.clone()),
        link_id: Set(input.link_id.clone()),
        click_id: Set(input.click_id.clone()),
        country: Set(input.country.clone()),
        created_at: Set(Utc::now()),
    };

    customer::Entity::insert(model)
        .on_conflict(
            OnConflict::columns([customer::Column::WorkspaceId, customer::Column::ExternalId])
                .update_columns(update_columns)
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;

    debug!("Customer {} upserted", input.external_id);
    customer::Entity::find()
        .filter(customer::Column::WorkspaceId.eq(input.workspace_id.as_str()))
        .filter(customer::Column::ExternalId.eq(input.external_id.as_str()))
        .one(conn)
        .await?
        .ok_or_else(|| DubError::internal("Customer missing after upsert"))
}

async fn bump_link<C: ConnectionTrait>(
    conn: &C,
    link_id: &str,
    deltas: &[(link::Column, i64)],
) -> Result<()> {
    let mut update = link::Entity::update_many()
        .col_expr(link::Column::UpdatedAt, Expr::val(Utc::now()).into());
    for (column, delta) in deltas {
        update = update.col_expr(*column, Expr::col(*column).add(*delta));
    }
    let result = update.filter(link::Column::Id.eq(link_id)).exec(conn).await?;
    if result.rows_affected == 0 {
        return Err(DubError::not_found(format!("Link {} not found", link_id)));
    }
    Ok(())
}

async fn bump_workspace<C: ConnectionTrait>(
    conn: &C,
    workspace_id: &str,
    deltas: &[(workspace::Column, i64)],
) -> Result<()> {
    let mut update = workspace::Entity::update_many();
    for (column, delta) in deltas {
        update = update.col_expr(*column, Expr::col(*column).add(*delta));
    }
    update
        .filter(workspace::Column::Id.eq(workspace_id))
        .exec(conn)
        .await?;
    Ok(())
}
