use sea_orm::entity::prelude::*;

/// Append-only audit row for every SMS dispatch attempt, successful or not.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "sms_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub phone: String,
    #[sea_orm(column_type = "Text")]
    pub message: String,
    pub provider: String,
    /// `sent`, `failed` or `test`.
    pub status: String,
    pub provider_message_id: Option<String>,
    pub cost: Option<f64>,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    pub test_mode: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
