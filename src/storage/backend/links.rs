//! 链接读写

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, TransactionTrait};
use tracing::debug;

use super::SeaOrmStorage;
use crate::errors::{DubError, Result};
use crate::storage::models::LinkModel;
use crate::utils::fold_key;
use migration::entities::{link, link_tag, tag};

impl SeaOrmStorage {
    /// 按 `(domain, key)` 查找，key 大小写不敏感比较
    ///
    /// 比较的是写入时折叠好的 `key_lower`，不依赖数据库的 `LOWER()`。
    /// 大小写敏感域名的 key 以编码形式存储，编码结果本身只含小写字符。
    pub async fn find_link(&self, domain: &str, key: &str) -> Result<Option<LinkModel>> {
        let domain = domain.to_lowercase();
        let key = fold_key(key);
        let db = &self.db;

        self.retrying("find_link", || async {
            link::Entity::find()
                .filter(link::Column::Domain.eq(domain.as_str()))
                .filter(link::Column::KeyLower.eq(key.as_str()))
                .one(db)
                .await
        })
        .await
    }

    pub async fn find_link_by_id(&self, id: &str) -> Result<Option<LinkModel>> {
        let db = &self.db;
        self.retrying("find_link_by_id", || async {
            link::Entity::find_by_id(id.to_string()).one(db).await
        })
        .await
    }

    /// 插入链接及其标签（同一事务）
    pub async fn insert_link(&self, model: link::ActiveModel, tag_ids: &[String]) -> Result<LinkModel> {
        let txn = self.db.begin().await?;

        let inserted = model.insert(&txn).await?;

        if !tag_ids.is_empty() {
            let rows: Vec<link_tag::ActiveModel> = tag_ids
                .iter()
                .map(|tag_id| link_tag::ActiveModel {
                    link_id: sea_orm::ActiveValue::Set(inserted.id.clone()),
                    tag_id: sea_orm::ActiveValue::Set(tag_id.clone()),
                })
                .collect();
            link_tag::Entity::insert_many(rows).exec(&txn).await?;
        }

        txn.commit().await?;
        debug!("Link inserted: {}:{}", inserted.domain, inserted.key);
        Ok(inserted)
    }

    pub async fn create_tag(&self, workspace_id: &str, name: &str) -> Result<tag::Model> {
        use sea_orm::ActiveValue::Set;
        let model = tag::ActiveModel {
            id: Set(crate::utils::create_id(crate::utils::id_prefix::TAG)),
            workspace_id: Set(workspace_id.to_string()),
            name: Set(name.to_string()),
        };
        Ok(model.insert(&self.db).await?)
    }

    pub async fn link_tag_ids(&self, link_id: &str) -> Result<Vec<String>> {
        let rows = link_tag::Entity::find()
            .filter(link_tag::Column::LinkId.eq(link_id))
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(|r| r.tag_id).collect())
    }

    /// 删除链接，返回被删除的记录
    pub async fn delete_links(&self, ids: &[String]) -> Result<Vec<LinkModel>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let txn = self.db.begin().await?;
        let links = link::Entity::find()
            .filter(link::Column::Id.is_in(ids.iter().cloned()))
            .all(&txn)
            .await?;

        link_tag::Entity::delete_many()
            .filter(link_tag::Column::LinkId.is_in(ids.iter().cloned()))
            .exec(&txn)
            .await?;
        link::Entity::delete_many()
            .filter(link::Column::Id.is_in(ids.iter().cloned()))
            .exec(&txn)
            .await?;
        txn.commit().await?;

        Ok(links)
    }

    /// 将 `old_domain` 下的全部链接迁移到 `new_domain`，返回迁移后的记录
    pub async fn rename_domain(&self, old_domain: &str, new_domain: &str) -> Result<Vec<LinkModel>> {
        let old_domain = old_domain.to_lowercase();
        let new_domain = new_domain.to_lowercase();
        if old_domain == new_domain {
            return Err(DubError::bad_request("New domain must differ from the old one"));
        }

        let txn = self.db.begin().await?;
        let ids: Vec<String> = link::Entity::find()
            .filter(link::Column::Domain.eq(old_domain.as_str()))
            .all(&txn)
            .await?
            .into_iter()
            .map(|l| l.id)
            .collect();

        if ids.is_empty() {
            txn.commit().await?;
            return Ok(Vec::new());
        }

        link::Entity::update_many()
            .col_expr(link::Column::Domain, Expr::val(new_domain.as_str()).into())
            .col_expr(link::Column::UpdatedAt, Expr::val(Utc::now()).into())
            .filter(link::Column::Id.is_in(ids.iter().cloned()))
            .exec(&txn)
            .await?;

        let moved = link::Entity::find()
            .filter(link::Column::Id.is_in(ids))
            .all(&txn)
            .await?;
        txn.commit().await?;

        Ok(moved)
    }

    /// 缓存预热用：未归档的链接，可按域名过滤
    pub async fn list_active_links(&self, domain: Option<&str>) -> Result<Vec<LinkModel>> {
        let db = &self.db;
        let domain = domain.map(str::to_lowercase);

        self.retrying("list_active_links", || async {
            let mut query = link::Entity::find()
                .filter(link::Column::Archived.eq(false))
                .order_by_asc(link::Column::CreatedAt);
            if let Some(d) = &domain {
                query = query.filter(link::Column::Domain.eq(d.as_str()));
            }
            query.all(db).await
        })
        .await
    }
}
