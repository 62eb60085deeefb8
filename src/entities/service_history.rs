use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "service_histories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub warranty_id: Uuid,
    pub company_id: Uuid,
    pub serial_number: String,
    pub status: ServiceStatus,
    pub reason: String,
    pub observations: Option<String>,
    /// JSON array of opaque photo references
    #[sea_orm(column_type = "Json")]
    pub photos: Json,
    pub entry_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Repair workflow state. Only forward moves to the immediate successor are legal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    #[sea_orm(string_value = "received")]
    Received,
    #[sea_orm(string_value = "in_repair")]
    InRepair,
    #[sea_orm(string_value = "delivered")]
    Delivered,
}

impl ServiceStatus {
    pub fn next(self) -> Option<ServiceStatus> {
        match self {
            ServiceStatus::Received => Some(ServiceStatus::InRepair),
            ServiceStatus::InRepair => Some(ServiceStatus::Delivered),
            ServiceStatus::Delivered => None,
        }
    }

    pub fn is_open(self) -> bool {
        !matches!(self, ServiceStatus::Delivered)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Received => "received",
            ServiceStatus::InRepair => "in_repair",
            ServiceStatus::Delivered => "delivered",
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::warranty::Entity",
        from = "Column::WarrantyId",
        to = "super::warranty::Column::Id"
    )]
    Warranty,
}

impl Related<super::warranty::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Warranty.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
