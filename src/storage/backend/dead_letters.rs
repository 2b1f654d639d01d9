//! DeadLetterSink implementation for SeaOrmStorage

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder};

use super::SeaOrmStorage;
use crate::errors::Result;
use crate::tasks::{DeadLetter, DeadLetterSink};
use migration::entities::dead_letter;

#[async_trait]
impl DeadLetterSink for SeaOrmStorage {
    async fn store(&self, letter: DeadLetter) -> Result<()> {
        dead_letter::ActiveModel {
            id: NotSet,
            job_kind: Set(letter.job_kind),
            payload: Set(letter.payload),
            error: Set(letter.error),
            attempts: Set(letter.attempts as i32),
            created_at: Set(Utc::now()),
        }
        .insert(&self.db)
        .await?;
        Ok(())
    }
}

impl SeaOrmStorage {
    pub async fn list_dead_letters(&self) -> Result<Vec<DeadLetter>> {
        let models = dead_letter::Entity::find()
            .order_by_asc(dead_letter::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models
            .into_iter()
            .map(|m| DeadLetter {
                job_kind: m.job_kind,
                payload: m.payload,
                error: m.error,
                attempts: m.attempts.max(0) as u32,
            })
            .collect())
    }
}
