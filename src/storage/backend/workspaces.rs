//! 工作区、令牌、合作伙伴计划

use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, TransactionTrait};

use super::SeaOrmStorage;
use super::converters::{model_to_partner, model_to_reward, model_to_workspace};
use crate::errors::{DubError, Result};
use crate::storage::models::{EnrollmentStatus, Partner, Reward, RewardEvent, RewardKind, Workspace};
use crate::utils::{create_id, id_prefix};
use migration::entities::{
    partner, program, program_enrollment, reward, workspace, workspace_token,
};

impl SeaOrmStorage {
    pub async fn create_workspace(&self, slug: &str, name: &str) -> Result<Workspace> {
        let model = workspace::ActiveModel {
            id: Set(create_id(id_prefix::WORKSPACE)),
            slug: Set(slug.to_string()),
            name: Set(name.to_string()),
            usage: Set(0),
            leads_usage: Set(0),
            sales_usage: Set(0),
            created_at: Set(Utc::now()),
        };
        Ok(model_to_workspace(model.insert(&self.db).await?))
    }

    pub async fn find_workspace(&self, id: &str) -> Result<Option<Workspace>> {
        let db = &self.db;
        let found = self
            .retrying("find_workspace", || async {
                workspace::Entity::find_by_id(id.to_string()).one(db).await
            })
            .await?;
        Ok(found.map(model_to_workspace))
    }

    pub async fn find_workspace_by_slug(&self, slug: &str) -> Result<Option<Workspace>> {
        let found = workspace::Entity::find()
            .filter(workspace::Column::Slug.eq(slug))
            .one(&self.db)
            .await?;
        Ok(found.map(model_to_workspace))
    }

    /// 保存令牌哈希（明文令牌不落库）
    pub async fn create_workspace_token(
        &self,
        workspace_id: &str,
        name: &str,
        hashed_key: &str,
    ) -> Result<String> {
        if self.find_workspace(workspace_id).await?.is_none() {
            return Err(DubError::not_found(format!("Workspace {} not found", workspace_id)));
        }

        let model = workspace_token::ActiveModel {
            id: Set(create_id(id_prefix::TOKEN)),
            workspace_id: Set(workspace_id.to_string()),
            name: Set(name.to_string()),
            hashed_key: Set(hashed_key.to_string()),
            created_at: Set(Utc::now()),
        };
        Ok(model.insert(&self.db).await?.id)
    }

    pub async fn find_workspace_by_token_hash(&self, hashed_key: &str) -> Result<Option<Workspace>> {
        let db = &self.db;
        let token = self
            .retrying("find_workspace_token", || async {
                workspace_token::Entity::find()
                    .filter(workspace_token::Column::HashedKey.eq(hashed_key))
                    .one(db)
                    .await
            })
            .await?;

        match token {
            Some(token) => self.find_workspace(&token.workspace_id).await,
            None => Ok(None),
        }
    }

    pub async fn create_program(&self, workspace_id: &str, name: &str, slug: &str) -> Result<program::Model> {
        let model = program::ActiveModel {
            id: Set(create_id(id_prefix::PROGRAM)),
            workspace_id: Set(workspace_id.to_string()),
            name: Set(name.to_string()),
            slug: Set(slug.to_string()),
            created_at: Set(Utc::now()),
        };
        Ok(model.insert(&self.db).await?)
    }

    pub async fn find_program(&self, id: &str) -> Result<Option<program::Model>> {
        Ok(program::Entity::find_by_id(id.to_string()).one(&self.db).await?)
    }

    /// 创建合作伙伴并加入计划（同一事务）
    pub async fn create_partner_with_enrollment(
        &self,
        program_id: &str,
        name: &str,
        email: Option<&str>,
    ) -> Result<Partner> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let partner = partner::ActiveModel {
            id: Set(create_id(id_prefix::PARTNER)),
            name: Set(name.to_string()),
            email: Set(email.map(String::from)),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        program_enrollment::ActiveModel {
            id: Set(create_id(id_prefix::ENROLLMENT)),
            program_id: Set(program_id.to_string()),
            partner_id: Set(partner.id.clone()),
            status: Set(EnrollmentStatus::Approved.to_string()),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(model_to_partner(partner))
    }

    pub async fn find_partner(&self, id: &str) -> Result<Option<Partner>> {
        let found = partner::Entity::find_by_id(id.to_string()).one(&self.db).await?;
        Ok(found.map(model_to_partner))
    }

    pub async fn create_reward(
        &self,
        program_id: &str,
        partner_id: Option<&str>,
        event: RewardEvent,
        kind: RewardKind,
        amount: i64,
    ) -> Result<Reward> {
        let model = reward::ActiveModel {
            id: Set(create_id(id_prefix::REWARD)),
            program_id: Set(program_id.to_string()),
            partner_id: Set(partner_id.map(String::from)),
            event: Set(event.to_string()),
            kind: Set(kind.to_string()),
            amount: Set(amount),
            created_at: Set(Utc::now()),
        };
        model_to_reward(model.insert(&self.db).await?)
    }

    /// 计划下某事件的全部奖励规则（含计划级与合作伙伴级）
    pub async fn find_rewards(&self, program_id: &str, event: RewardEvent) -> Result<Vec<Reward>> {
        let db = &self.db;
        let event = event.to_string();
        let models = self
            .retrying("find_rewards", || async {
                reward::Entity::find()
                    .filter(reward::Column::ProgramId.eq(program_id))
                    .filter(reward::Column::Event.eq(event.as_str()))
                    .all(db)
                    .await
            })
            .await?;

        models.into_iter().map(model_to_reward).collect()
    }
}
