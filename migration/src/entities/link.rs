use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "links")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub domain: String,
    /// Stored in encoded form for case-sensitive domains
    pub key: String,
    /// `key` folded with Unicode lowercase; lookups compare against this column
    pub key_lower: String,
    #[sea_orm(column_type = "Text")]
    pub url: String,
    pub workspace_id: Option<String>,
    pub public_stats: bool,
    pub archived: bool,
    pub track_conversion: bool,
    pub expires_at: Option<DateTimeUtc>,
    #[sea_orm(column_type = "Text", nullable)]
    pub expired_url: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub ios: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub android: Option<String>,
    /// JSON object: country code -> url
    #[sea_orm(column_type = "Text", nullable)]
    pub geo: Option<String>,
    pub program_id: Option<String>,
    pub partner_id: Option<String>,
    pub folder_id: Option<String>,
    pub clicks: i64,
    pub leads: i64,
    pub sales: i64,
    pub sale_amount: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
