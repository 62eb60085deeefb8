use crate::{
    common::{Clock, PageRequest},
    db::{with_timeout, DbPool},
    entities::{sale, sale_item, warranty},
    errors::ServiceError,
    events::{Event, EventSender},
    models::warranty::{compute_expires_at, WarrantyView},
    queries::{
        warranty_queries::{ListWarrantiesQuery, ServiceCountsQuery, WarrantyFilters, WarrantyPage},
        Query,
    },
};
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use slog::Logger;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Warranty record store: creation from sales, deactivation and reads
#[derive(Clone)]
pub struct WarrantyService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    clock: Arc<dyn Clock>,
    store_timeout: Duration,
    expiring_soon_threshold_days: i64,
    logger: Logger,
}

impl WarrantyService {
    /// Creates a new warranty service instance
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        clock: Arc<dyn Clock>,
        store_timeout: Duration,
        expiring_soon_threshold_days: i64,
        logger: Logger,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            clock,
            store_timeout,
            expiring_soon_threshold_days,
            logger,
        }
    }

    /// Inserts one warranty per (line with months > 0, serial number) on the
    /// caller's connection, normally the sale's transaction. A line without
    /// serial numbers gets a single warranty with an empty serial. The first
    /// failing insert aborts the batch.
    pub async fn create_for_sale<C>(
        conn: &C,
        sale: &sale::Model,
        lines: &[sale_item::Model],
        now: DateTime<Utc>,
    ) -> Result<Vec<warranty::Model>, ServiceError>
    where
        C: ConnectionTrait,
    {
        let start_date = sale.created_at;
        let mut created = Vec::new();

        for line in lines.iter().filter(|line| line.warranty_months > 0) {
            let expires_at = compute_expires_at(start_date, line.warranty_months).ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "warranty of {} months on line {} is out of range",
                    line.warranty_months, line.id
                ))
            })?;

            let mut serials = line.serials();
            if serials.is_empty() {
                serials.push(String::new());
            }

            for serial_number in serials {
                let model = warranty::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    company_id: Set(sale.company_id),
                    sale_id: Set(sale.id),
                    sale_item_id: Set(line.id),
                    product_id: Set(line.product_id),
                    serial_number: Set(serial_number),
                    start_date: Set(start_date),
                    warranty_months: Set(line.warranty_months),
                    expires_at: Set(expires_at),
                    is_active: Set(true),
                    invoice_number: Set(sale.invoice_number.clone()),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(conn)
                .await?;
                created.push(model);
            }
        }

        Ok(created)
    }

    /// Revokes a warranty. Already-deactivated warranties are returned as is.
    #[instrument(skip(self))]
    pub async fn deactivate(
        &self,
        warranty_id: Uuid,
        company_id: Uuid,
    ) -> Result<WarrantyView, ServiceError> {
        let db = &*self.db_pool;
        let now = self.clock.now();

        let (model, changed) = with_timeout(self.store_timeout, "warranty.deactivate", async {
            let result = warranty::Entity::update_many()
                .col_expr(warranty::Column::IsActive, Expr::value(false))
                .col_expr(warranty::Column::UpdatedAt, Expr::value(now))
                .filter(warranty::Column::Id.eq(warranty_id))
                .filter(warranty::Column::CompanyId.eq(company_id))
                .filter(warranty::Column::IsActive.eq(true))
                .exec(db)
                .await?;

            let model = self.find_scoped(warranty_id, company_id).await?;
            Ok((model, result.rows_affected > 0))
        })
        .await?;

        if changed {
            slog::info!(self.logger, "Warranty deactivated"; "warranty_id" => %warranty_id);
            info!(%warranty_id, %company_id, "warranty deactivated");
            self.event_sender
                .publish(Event::WarrantyDeactivated {
                    warranty_id,
                    company_id,
                })
                .await;
        }

        self.to_view(model).await
    }

    #[instrument(skip(self))]
    pub async fn get_by_id(
        &self,
        warranty_id: Uuid,
        company_id: Uuid,
    ) -> Result<WarrantyView, ServiceError> {
        let model = with_timeout(self.store_timeout, "warranty.get", async {
            self.find_scoped(warranty_id, company_id).await
        })
        .await?;
        self.to_view(model).await
    }

    /// Paginated listing with derived fields applied at read time
    #[instrument(skip(self, filters))]
    pub async fn list(
        &self,
        company_id: Uuid,
        filters: WarrantyFilters,
        page: PageRequest,
    ) -> Result<WarrantyPage, ServiceError> {
        let query = ListWarrantiesQuery {
            company_id,
            filters,
            page,
            now: self.clock.now(),
            expiring_soon_threshold_days: self.expiring_soon_threshold_days,
        };
        with_timeout(self.store_timeout, "warranty.list", query.execute(&self.db_pool)).await
    }

    /// Warranties created for one sale, oldest first
    pub async fn list_for_sale(
        &self,
        sale_id: Uuid,
        company_id: Uuid,
    ) -> Result<Vec<WarrantyView>, ServiceError> {
        let db = &*self.db_pool;
        let models = with_timeout(self.store_timeout, "warranty.list_for_sale", async {
            Ok(warranty::Entity::find()
                .filter(warranty::Column::SaleId.eq(sale_id))
                .filter(warranty::Column::CompanyId.eq(company_id))
                .order_by_asc(warranty::Column::CreatedAt)
                .order_by_asc(warranty::Column::SerialNumber)
                .all(db)
                .await?)
        })
        .await?;

        self.to_views(company_id, models).await
    }

    /// Applies derived fields to freshly created rows, which have no services yet.
    pub fn fresh_views(&self, models: Vec<warranty::Model>) -> Vec<WarrantyView> {
        let now = self.clock.now();
        models
            .into_iter()
            .map(|m| WarrantyView::from_model(m, now, self.expiring_soon_threshold_days, 0))
            .collect()
    }

    /// Loads a warranty only if it belongs to `company_id`.
    pub(crate) async fn find_scoped(
        &self,
        warranty_id: Uuid,
        company_id: Uuid,
    ) -> Result<warranty::Model, ServiceError> {
        warranty::Entity::find()
            .filter(warranty::Column::Id.eq(warranty_id))
            .filter(warranty::Column::CompanyId.eq(company_id))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Warranty {} not found", warranty_id)))
    }

    async fn to_view(&self, model: warranty::Model) -> Result<WarrantyView, ServiceError> {
        let company_id = model.company_id;
        let mut views = self.to_views(company_id, vec![model]).await?;
        views
            .pop()
            .ok_or_else(|| ServiceError::InternalError("warranty view lost".into()))
    }

    async fn to_views(
        &self,
        company_id: Uuid,
        models: Vec<warranty::Model>,
    ) -> Result<Vec<WarrantyView>, ServiceError> {
        let counts = with_timeout(
            self.store_timeout,
            "warranty.service_counts",
            ServiceCountsQuery {
                company_id,
                warranty_ids: models.iter().map(|m| m.id).collect(),
            }
            .execute(&self.db_pool),
        )
        .await?;

        let now = self.clock.now();
        Ok(models
            .into_iter()
            .map(|m| {
                let count = counts.get(&m.id).copied().unwrap_or(0);
                WarrantyView::from_model(m, now, self.expiring_soon_threshold_days, count)
            })
            .collect())
    }
}
