//! 合作伙伴结算

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::errors::{DubError, Result};
use crate::storage::{Payout, PayoutStatus, SeaOrmStorage};

pub struct PayoutService {
    storage: Arc<SeaOrmStorage>,
    /// 平台抽成比例，结算时读取
    fee_rate: f64,
}

impl PayoutService {
    pub fn new(storage: Arc<SeaOrmStorage>, fee_rate: f64) -> Self {
        Self { storage, fee_rate }
    }

    /// 汇总 `[period_start, period_end]` 内待结算的销售；无可结算销售时返回 `None`
    pub async fn create_sales_payout(
        &self,
        program_id: &str,
        partner_id: &str,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<Option<Payout>> {
        if self.storage.find_program(program_id).await?.is_none() {
            return Err(DubError::not_found(format!("Program {} not found", program_id)));
        }
        if self.storage.find_partner(partner_id).await?.is_none() {
            return Err(DubError::not_found(format!("Partner {} not found", partner_id)));
        }

        let payout = self
            .storage
            .create_sales_payout(program_id, partner_id, period_start, period_end, self.fee_rate)
            .await?;

        if let Some(p) = &payout {
            info!(
                "Payout {} created for {}: amount={} fee={} total={} ({} sales)",
                p.id, partner_id, p.amount, p.fee, p.total, p.quantity
            );
        }
        Ok(payout)
    }

    pub async fn update_status(&self, payout_id: &str, status: PayoutStatus) -> Result<Payout> {
        let payout = self.storage.update_payout_status(payout_id, status).await?;
        info!("Payout {} is now {}", payout.id, payout.status);
        Ok(payout)
    }
}
