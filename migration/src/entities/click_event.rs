//! Append-only click events

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "click_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub click_id: String,
    pub link_id: String,
    pub workspace_id: Option<String>,
    pub domain: String,
    pub key: String,
    #[sea_orm(column_type = "Text")]
    pub url: String,
    pub ip: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub continent: Option<String>,
    pub device: String,
    pub browser: String,
    pub os: String,
    pub bot: bool,
    #[sea_orm(column_type = "Text", nullable)]
    pub user_agent: Option<String>,
    pub referer: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub referer_url: Option<String>,
    pub timestamp: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
