//! ClickSink implementation for SeaOrmStorage
//!
//! 一次 `CASE WHEN` 批量更新链接点击数，并在同一事务里累加工作区用量。
//! 所有值都通过参数绑定传入。

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{CaseStatement, Expr, Query};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, ExprTrait, QueryFilter, TransactionTrait};
use tracing::debug;

use super::SeaOrmStorage;
use crate::analytics::ClickSink;
use migration::entities::{link, workspace};

impl SeaOrmStorage {
    async fn apply_click_updates(&self, updates: &[(String, usize)]) -> Result<usize, sea_orm::DbErr> {
        let link_ids: Vec<String> = updates.iter().map(|(id, _)| id.clone()).collect();
        let txn = self.db.begin().await?;

        // link_id -> workspace_id，用于累加工作区用量
        let owners: HashMap<String, Option<String>> = link::Entity::find()
            .filter(link::Column::Id.is_in(link_ids.clone()))
            .all(&txn)
            .await?
            .into_iter()
            .map(|l| (l.id, l.workspace_id))
            .collect();

        let mut case_stmt = CaseStatement::new();
        for (id, count) in updates {
            case_stmt = case_stmt.case(
                Expr::col(link::Column::Id).eq(Expr::val(id.as_str())),
                Expr::col(link::Column::Clicks).add(Expr::val(*count as i64)),
            );
        }
        case_stmt = case_stmt.finally(Expr::col(link::Column::Clicks));

        let stmt = Query::update()
            .table(link::Entity)
            .value(link::Column::Clicks, case_stmt)
            .value(link::Column::UpdatedAt, Expr::val(Utc::now()))
            .and_where(Expr::col(link::Column::Id).is_in(link_ids))
            .to_owned();
        txn.execute(&stmt).await?;

        let mut usage: HashMap<&str, i64> = HashMap::new();
        for (id, count) in updates {
            if let Some(Some(ws)) = owners.get(id) {
                *usage.entry(ws.as_str()).or_insert(0) += *count as i64;
            }
        }

        if !usage.is_empty() {
            let mut ws_case = CaseStatement::new();
            for (ws, count) in &usage {
                ws_case = ws_case.case(
                    Expr::col(workspace::Column::Id).eq(Expr::val(*ws)),
                    Expr::col(workspace::Column::Usage).add(Expr::val(*count)),
                );
            }
            ws_case = ws_case.finally(Expr::col(workspace::Column::Usage));

            let ws_ids: Vec<String> = usage.keys().map(|k| k.to_string()).collect();
            let stmt = Query::update()
                .table(workspace::Entity)
                .value(workspace::Column::Usage, ws_case)
                .and_where(Expr::col(workspace::Column::Id).is_in(ws_ids))
                .to_owned();
            txn.execute(&stmt).await?;
        }

        txn.commit().await?;
        Ok(usage.len())
    }
}

#[async_trait]
impl ClickSink for SeaOrmStorage {
    async fn flush_clicks(&self, updates: Vec<(String, usize)>) -> anyhow::Result<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let workspaces = self
            .retrying("flush_clicks", || self.apply_click_updates(&updates))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to batch update click counts: {}", e))?;

        debug!(
            "Click counts flushed to {} database ({} links, {} workspaces)",
            self.backend_name.to_uppercase(),
            updates.len(),
            workspaces
        );
        Ok(())
    }
}
