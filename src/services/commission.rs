//! 佣金计算

use crate::storage::{Reward, RewardKind};

/// 根据奖励规则计算佣金（最小货币单位）
///
/// - percentage: `round(sale_amount × amount / 100)`
/// - flat: `sales × amount`
pub fn calculate_earnings(reward: &Reward, sales: i64, sale_amount: i64) -> i64 {
    if reward.amount == 0 {
        return 0;
    }
    match reward.kind {
        RewardKind::Percentage => (sale_amount as f64 * reward.amount as f64 / 100.0).round() as i64,
        RewardKind::Flat => sales * reward.amount,
    }
}

/// 选择适用的奖励规则：合作伙伴专属规则优先于计划级规则；金额为 0 视为无规则
pub fn select_reward<'a>(rewards: &'a [Reward], partner_id: &str) -> Option<&'a Reward> {
    let partner_rule = rewards
        .iter()
        .find(|r| r.partner_id.as_deref() == Some(partner_id));
    let program_rule = rewards.iter().find(|r| r.partner_id.is_none());

    partner_rule.or(program_rule).filter(|r| r.amount != 0)
}
