use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Stored warranty row. Status and days remaining are derived at read time,
/// see `crate::models::warranty`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "warranties")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub company_id: Uuid,
    pub sale_id: Uuid,
    pub sale_item_id: Uuid,
    pub product_id: Uuid,
    pub serial_number: String,
    pub start_date: DateTime<Utc>,
    pub warranty_months: i32,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub invoice_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::sale::Entity",
        from = "Column::SaleId",
        to = "super::sale::Column::Id"
    )]
    Sale,
    #[sea_orm(has_many = "super::service_history::Entity")]
    ServiceHistories,
}

impl Related<super::sale::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sale.def()
    }
}

impl Related<super::service_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ServiceHistories.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
