//! Commissioned sale owed to a program partner

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "sales")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub program_id: String,
    pub partner_id: String,
    pub link_id: String,
    pub customer_id: String,
    pub event_id: String,
    pub invoice_id: Option<String>,
    pub amount: i64,
    pub earnings: i64,
    pub currency: String,
    /// pending | processed | paid | canceled
    pub status: String,
    pub payout_id: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
