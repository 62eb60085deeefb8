use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    sea_query::{Expr, Func, LikeExpr},
    ColumnTrait, Condition, EntityTrait, JoinType, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, RelationTrait, Select,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Query;
use crate::{
    common::PageRequest,
    db::DbPool,
    entities::{sale, sale_item, service_history, warranty},
    errors::ServiceError,
    models::warranty::{WarrantyStatus, WarrantyView},
};

/// Optional filters, AND-combined
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarrantyFilters {
    pub status: Option<WarrantyStatus>,
    pub serial_number: Option<String>,
    pub customer_name: Option<String>,
}

/// One product line of the owning sale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SaleProduct {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
}

/// Warranty row as listed: derived fields plus denormalised sale details
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WarrantyListItem {
    #[serde(flatten)]
    pub warranty: WarrantyView,
    pub customer_name: String,
    pub sale_products: Vec<SaleProduct>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarrantyPage {
    pub items: Vec<WarrantyListItem>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
}

/// Paginated, filtered listing of one company's warranties.
///
/// Ordering is `created_at DESC, id DESC`. Pages are read independently, so a
/// concurrent insert can shift rows between pages; there is no snapshot.
#[derive(Debug, Clone)]
pub struct ListWarrantiesQuery {
    pub company_id: Uuid,
    pub filters: WarrantyFilters,
    pub page: PageRequest,
    pub now: DateTime<Utc>,
    pub expiring_soon_threshold_days: i64,
}

/// SQL form of [`crate::models::warranty::derive_status`]. With
/// `boundary = now + (threshold + 1) days`, "whole days left <= threshold"
/// holds exactly when `expires_at < boundary`.
pub fn status_condition(
    status: WarrantyStatus,
    now: DateTime<Utc>,
    threshold_days: i64,
) -> Condition {
    let boundary = now + Duration::days(threshold_days.max(0) + 1);
    match status {
        WarrantyStatus::Expired => Condition::any()
            .add(warranty::Column::IsActive.eq(false))
            .add(warranty::Column::ExpiresAt.lte(now)),
        WarrantyStatus::ExpiringSoon => Condition::all()
            .add(warranty::Column::IsActive.eq(true))
            .add(warranty::Column::ExpiresAt.gt(now))
            .add(warranty::Column::ExpiresAt.lt(boundary)),
        WarrantyStatus::Active => Condition::all()
            .add(warranty::Column::IsActive.eq(true))
            .add(warranty::Column::ExpiresAt.gte(boundary)),
    }
}

fn like_pattern(needle: &str) -> LikeExpr {
    let escaped = needle
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    LikeExpr::new(format!("%{}%", escaped)).escape('\\')
}

impl ListWarrantiesQuery {
    fn filtered_select(&self) -> Select<warranty::Entity> {
        let mut select =
            warranty::Entity::find().filter(warranty::Column::CompanyId.eq(self.company_id));

        if let Some(status) = self.filters.status {
            select = select.filter(status_condition(
                status,
                self.now,
                self.expiring_soon_threshold_days,
            ));
        }

        if let Some(serial) = non_blank(&self.filters.serial_number) {
            select = select.filter(
                Expr::expr(Func::lower(Expr::col((
                    warranty::Entity,
                    warranty::Column::SerialNumber,
                ))))
                .like(like_pattern(serial)),
            );
        }

        if let Some(customer) = non_blank(&self.filters.customer_name) {
            select = select
                .join(JoinType::InnerJoin, warranty::Relation::Sale.def())
                .filter(
                    Expr::expr(Func::lower(Expr::col((
                        sale::Entity,
                        sale::Column::CustomerName,
                    ))))
                    .like(like_pattern(customer)),
                );
        }

        select
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[async_trait]
impl Query for ListWarrantiesQuery {
    type Result = WarrantyPage;

    #[instrument(skip(self, db), fields(company_id = %self.company_id, page = self.page.page))]
    async fn execute(&self, db: &DbPool) -> Result<Self::Result, ServiceError> {
        let select = self.filtered_select();

        let total = select.clone().count(db).await?;
        let offset = self.page.offset();
        let rows = if offset >= total {
            Vec::new()
        } else {
            select
                .order_by_desc(warranty::Column::CreatedAt)
                .order_by_desc(warranty::Column::Id)
                .offset(offset)
                .limit(self.page.page_size)
                .all(db)
                .await?
        };

        debug!(total, returned = rows.len(), "warranty page loaded");

        let ids: Vec<Uuid> = rows.iter().map(|w| w.id).collect();
        let counts = ServiceCountsQuery {
            company_id: self.company_id,
            warranty_ids: ids,
        }
        .execute(db)
        .await?;

        let mut sale_ids: Vec<Uuid> = rows.iter().map(|w| w.sale_id).collect();
        sale_ids.sort_unstable();
        sale_ids.dedup();
        let sales = load_sale_snapshots(db, self.company_id, &sale_ids).await?;

        let items = rows
            .into_iter()
            .map(|model| {
                let (customer_name, sale_products) = sales
                    .get(&model.sale_id)
                    .cloned()
                    .unwrap_or_default();
                let service_count = counts.get(&model.id).copied().unwrap_or(0);
                WarrantyListItem {
                    warranty: WarrantyView::from_model(
                        model,
                        self.now,
                        self.expiring_soon_threshold_days,
                        service_count,
                    ),
                    customer_name,
                    sale_products,
                }
            })
            .collect();

        Ok(WarrantyPage {
            items,
            total,
            page: self.page.page,
            page_size: self.page.page_size,
            total_pages: self.page.total_pages(total),
        })
    }
}

/// Number of service records per warranty, by grouped count.
#[derive(Debug, Clone)]
pub struct ServiceCountsQuery {
    pub company_id: Uuid,
    pub warranty_ids: Vec<Uuid>,
}

#[async_trait]
impl Query for ServiceCountsQuery {
    type Result = HashMap<Uuid, u64>;

    async fn execute(&self, db: &DbPool) -> Result<Self::Result, ServiceError> {
        if self.warranty_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(Uuid, i64)> = service_history::Entity::find()
            .select_only()
            .column(service_history::Column::WarrantyId)
            .column_as(
                Expr::col((service_history::Entity, service_history::Column::Id)).count(),
                "service_count",
            )
            .filter(service_history::Column::CompanyId.eq(self.company_id))
            .filter(service_history::Column::WarrantyId.is_in(self.warranty_ids.clone()))
            .group_by(service_history::Column::WarrantyId)
            .into_tuple()
            .all(db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, count)| (id, count.max(0) as u64))
            .collect())
    }
}

/// customer name and product lines per sale
async fn load_sale_snapshots(
    db: &DbPool,
    company_id: Uuid,
    sale_ids: &[Uuid],
) -> Result<HashMap<Uuid, (String, Vec<SaleProduct>)>, ServiceError> {
    if sale_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let sales = sale::Entity::find()
        .filter(sale::Column::CompanyId.eq(company_id))
        .filter(sale::Column::Id.is_in(sale_ids.to_vec()))
        .all(db)
        .await?;

    let items = sale_item::Entity::find()
        .filter(sale_item::Column::CompanyId.eq(company_id))
        .filter(sale_item::Column::SaleId.is_in(sale_ids.to_vec()))
        .order_by_asc(sale_item::Column::ProductName)
        .all(db)
        .await?;

    let mut snapshots: HashMap<Uuid, (String, Vec<SaleProduct>)> = sales
        .into_iter()
        .map(|s| (s.id, (s.customer_name, Vec::new())))
        .collect();

    for item in items {
        if let Some((_, products)) = snapshots.get_mut(&item.sale_id) {
            products.push(SaleProduct {
                product_id: item.product_id,
                product_name: item.product_name,
                quantity: item.quantity,
            });
        }
    }

    Ok(snapshots)
}
