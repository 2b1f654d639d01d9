//! 佣金结算单

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, TransactionTrait,
};
use tracing::info;

use super::SeaOrmStorage;
use super::converters::{model_to_commission_sale, model_to_payout};
use crate::errors::{DubError, Result};
use crate::storage::models::{CommissionSale, Payout, PayoutKind, PayoutStatus, SaleStatus};
use crate::utils::{create_id, id_prefix};
use migration::entities::{payout, sale};

/// 平台手续费，四舍五入到最小货币单位
pub fn platform_fee(amount: i64, fee_rate: f64) -> i64 {
    (amount as f64 * fee_rate).round() as i64
}

impl SeaOrmStorage {
    /// 汇总周期内待结算的销售生成结算单
    ///
    /// 全部在一个事务内完成；没有可结算的销售时返回 `None`。
    pub async fn create_sales_payout(
        &self,
        program_id: &str,
        partner_id: &str,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        fee_rate: f64,
    ) -> Result<Option<Payout>> {
        if period_end < period_start {
            return Err(DubError::bad_request("periodEnd must not be before periodStart"));
        }

        let txn = self.db.begin().await?;

        let sales = sale::Entity::find()
            .filter(sale::Column::ProgramId.eq(program_id))
            .filter(sale::Column::PartnerId.eq(partner_id))
            .filter(sale::Column::Status.eq(SaleStatus::Pending.to_string()))
            .filter(sale::Column::PayoutId.is_null())
            .filter(sale::Column::CreatedAt.gte(period_start))
            .filter(sale::Column::CreatedAt.lte(period_end))
            .all(&txn)
            .await?;

        if sales.is_empty() {
            txn.rollback().await?;
            return Ok(None);
        }

        let currency = sales[0].currency.clone();
        if sales.iter().any(|s| s.currency != currency) {
            txn.rollback().await?;
            return Err(DubError::unprocessable_entity(
                "Pending sales use more than one currency",
            ));
        }

        let amount: i64 = sales.iter().map(|s| s.earnings).sum();
        let fee = platform_fee(amount, fee_rate);
        let now = Utc::now();
        let payout_id = create_id(id_prefix::PAYOUT);
        let sale_ids: Vec<String> = sales.iter().map(|s| s.id.clone()).collect();

        let inserted = payout::ActiveModel {
            id: Set(payout_id.clone()),
            program_id: Set(program_id.to_string()),
            partner_id: Set(partner_id.to_string()),
            amount: Set(amount),
            fee: Set(fee),
            total: Set(amount + fee),
            currency: Set(currency),
            status: Set(PayoutStatus::Pending.to_string()),
            kind: Set(PayoutKind::Sales.to_string()),
            description: Set(Some(format!(
                "Sales payout {} - {}",
                period_start.format("%Y-%m-%d"),
                period_end.format("%Y-%m-%d")
            ))),
            quantity: Set(sales.len() as i32),
            period_start: Set(period_start),
            period_end: Set(period_end),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        // 重复过滤条件：并发的另一次结算已认领的行不会被再次计入
        let claimed = sale::Entity::update_many()
            .col_expr(sale::Column::Status, Expr::val(SaleStatus::Processed.to_string()).into())
            .col_expr(sale::Column::PayoutId, Expr::val(payout_id.as_str()).into())
            .col_expr(sale::Column::UpdatedAt, Expr::val(now).into())
            .filter(sale::Column::Id.is_in(sale_ids))
            .filter(sale::Column::Status.eq(SaleStatus::Pending.to_string()))
            .filter(sale::Column::PayoutId.is_null())
            .exec(&txn)
            .await?;
        if claimed.rows_affected != sales.len() as u64 {
            txn.rollback().await?;
            return Err(DubError::conflict(format!(
                "Sales for partner {} changed during payout creation ({} of {} still pending)",
                partner_id,
                claimed.rows_affected,
                sales.len()
            )));
        }

        txn.commit().await?;

        info!(
            "Payout {} created for partner {}: {} sales, amount {} fee {}",
            payout_id,
            partner_id,
            sales.len(),
            amount,
            fee
        );
        model_to_payout(inserted).map(Some)
    }

    pub async fn find_payout(&self, payout_id: &str) -> Result<Option<Payout>> {
        let found = payout::Entity::find_by_id(payout_id.to_string())
            .one(&self.db)
            .await?;
        found.map(model_to_payout).transpose()
    }

    pub async fn sales_for_payout(&self, payout_id: &str) -> Result<Vec<CommissionSale>> {
        let models = sale::Entity::find()
            .filter(sale::Column::PayoutId.eq(payout_id))
            .all(&self.db)
            .await?;
        models.into_iter().map(model_to_commission_sale).collect()
    }

    /// 更新结算单状态，并同步关联销售的状态
    ///
    /// - completed: 销售标记为 paid
    /// - canceled: 销售退回 pending 并解除关联
    pub async fn update_payout_status(&self, payout_id: &str, next: PayoutStatus) -> Result<Payout> {
        let txn = self.db.begin().await?;

        let model = payout::Entity::find_by_id(payout_id.to_string())
            .one(&txn)
            .await?
            .ok_or_else(|| DubError::not_found(format!("Payout {} not found", payout_id)))?;
        let current = model_to_payout(model.clone())?.status;

        if !current.can_transition_to(next) {
            return Err(DubError::bad_request(format!(
                "Cannot change payout status from {} to {}",
                current, next
            )));
        }

        let now = Utc::now();
        let mut active = model.into_active_model();
        active.status = Set(next.to_string());
        active.updated_at = Set(now);
        let updated = active.update(&txn).await?;

        match next {
            PayoutStatus::Completed => {
                sale::Entity::update_many()
                    .col_expr(sale::Column::Status, Expr::val(SaleStatus::Paid.to_string()).into())
                    .col_expr(sale::Column::UpdatedAt, Expr::val(now).into())
                    .filter(sale::Column::PayoutId.eq(payout_id))
                    .exec(&txn)
                    .await?;
            }
            PayoutStatus::Canceled => {
                sale::Entity::update_many()
                    .col_expr(sale::Column::Status, Expr::val(SaleStatus::Pending.to_string()).into())
                    .col_expr(sale::Column::PayoutId, Expr::val(Option::<String>::None).into())
                    .col_expr(sale::Column::UpdatedAt, Expr::val(now).into())
                    .filter(sale::Column::PayoutId.eq(payout_id))
                    .exec(&txn)
                    .await?;
            }
            _ => {}
        }

        txn.commit().await?;
        info!("Payout {} status: {} -> {}", payout_id, current, next);
        model_to_payout(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_fee_rounding() {
        assert_eq!(platform_fee(10_000, 0.02), 200);
        assert_eq!(platform_fee(125, 0.02), 3); // 2.5 -> 3
        assert_eq!(platform_fee(0, 0.02), 0);
        assert_eq!(platform_fee(999, 0.0), 0);
    }
}
