use crate::{
    common::Clock,
    db::{with_timeout, DbPool},
    entities::{
        service_history::{self, ServiceStatus},
        warranty,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::SERVICE_CONFLICTS,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use slog::Logger;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct OpenServiceInput {
    #[validate(length(min = 1, max = 2000))]
    pub reason: String,
    #[validate(length(max = 4000))]
    pub observations: Option<String>,
    /// Opaque photo references
    #[serde(default)]
    pub photos: Vec<String>,
}

/// Repair record as returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ServiceRecordView {
    pub id: Uuid,
    pub warranty_id: Uuid,
    pub serial_number: String,
    pub status: ServiceStatus,
    pub reason: String,
    pub observations: Option<String>,
    pub photos: Vec<String>,
    pub entry_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<service_history::Model> for ServiceRecordView {
    fn from(model: service_history::Model) -> Self {
        Self {
            id: model.id,
            warranty_id: model.warranty_id,
            serial_number: model.serial_number,
            status: model.status,
            reason: model.reason,
            observations: model.observations,
            photos: serde_json::from_value(model.photos).unwrap_or_default(),
            entry_date: model.entry_date,
            updated_at: model.updated_at,
        }
    }
}

/// Repair tracking with one open record per warranty
#[derive(Clone)]
pub struct ServiceHistoryService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    clock: Arc<dyn Clock>,
    store_timeout: Duration,
    allow_service_on_inactive_warranty: bool,
    logger: Logger,
}

impl ServiceHistoryService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        clock: Arc<dyn Clock>,
        store_timeout: Duration,
        allow_service_on_inactive_warranty: bool,
        logger: Logger,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            clock,
            store_timeout,
            allow_service_on_inactive_warranty,
            logger,
        }
    }

    /// Opens a repair in `received`. The open-record check and the insert
    /// share a transaction; the partial unique index catches the race the
    /// check cannot see.
    #[instrument(skip(self, input))]
    pub async fn open(
        &self,
        warranty_id: Uuid,
        company_id: Uuid,
        input: OpenServiceInput,
    ) -> Result<ServiceRecordView, ServiceError> {
        input.validate()?;
        let reason = input.reason.trim().to_string();
        if reason.is_empty() {
            return Err(ServiceError::ValidationError("reason is required".into()));
        }

        let now = self.clock.now();
        let db = &*self.db_pool;
        let allow_inactive = self.allow_service_on_inactive_warranty;

        let result = with_timeout(self.store_timeout, "service.open", async {
            let txn = db.begin().await?;

            let warranty = warranty::Entity::find()
                .filter(warranty::Column::Id.eq(warranty_id))
                .filter(warranty::Column::CompanyId.eq(company_id))
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Warranty {} not found", warranty_id))
                })?;

            if !warranty.is_active && !allow_inactive {
                return Err(ServiceError::InvalidOperation(format!(
                    "warranty {} is deactivated",
                    warranty_id
                )));
            }

            let open = service_history::Entity::find()
                .filter(service_history::Column::WarrantyId.eq(warranty_id))
                .filter(service_history::Column::Status.ne(ServiceStatus::Delivered))
                .one(&txn)
                .await?;
            if let Some(open) = open {
                return Err(ServiceError::Conflict(format!(
                    "warranty {} already has an open service {} ({})",
                    warranty_id, open.id, open.status
                )));
            }

            let record = service_history::ActiveModel {
                id: Set(Uuid::new_v4()),
                warranty_id: Set(warranty.id),
                company_id: Set(warranty.company_id),
                serial_number: Set(warranty.serial_number.clone()),
                status: Set(ServiceStatus::Received),
                reason: Set(reason),
                observations: Set(input.observations.clone()),
                photos: Set(serde_json::json!(input.photos)),
                entry_date: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await
            .map_err(|e| {
                let err = ServiceError::from(e);
                if err.is_unique_violation() {
                    ServiceError::Conflict(format!(
                        "warranty {} already has an open service",
                        warranty_id
                    ))
                } else {
                    err
                }
            })?;

            txn.commit().await?;
            Ok(record)
        })
        .await;

        let record = match result {
            Ok(record) => record,
            Err(err @ ServiceError::Conflict(_)) => {
                SERVICE_CONFLICTS.inc();
                warn!(%warranty_id, "service already open");
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        slog::info!(self.logger, "Service opened";
            "service_id" => %record.id,
            "warranty_id" => %warranty_id);
        info!(service_id = %record.id, %warranty_id, "service opened");
        self.event_sender
            .publish(Event::ServiceOpened {
                service_id: record.id,
                warranty_id,
                company_id,
            })
            .await;

        Ok(record.into())
    }

    /// Moves a repair to its immediate successor. The write is conditional on
    /// the status that was read, so two racing advances cannot both apply.
    #[instrument(skip(self))]
    pub async fn advance(
        &self,
        service_id: Uuid,
        company_id: Uuid,
        next_status: ServiceStatus,
    ) -> Result<ServiceRecordView, ServiceError> {
        let now = self.clock.now();
        let db = &*self.db_pool;

        let (mut record, from) = with_timeout(self.store_timeout, "service.advance", async {
            let record = service_history::Entity::find()
                .filter(service_history::Column::Id.eq(service_id))
                .filter(service_history::Column::CompanyId.eq(company_id))
                .one(db)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Service {} not found", service_id))
                })?;

            let current = record.status;
            if current.next() != Some(next_status) {
                return Err(ServiceError::InvalidTransition(format!(
                    "cannot move service from {} to {}",
                    current, next_status
                )));
            }

            let result = service_history::Entity::update_many()
                .col_expr(service_history::Column::Status, Expr::value(next_status))
                .col_expr(service_history::Column::UpdatedAt, Expr::value(now))
                .filter(service_history::Column::Id.eq(service_id))
                .filter(service_history::Column::CompanyId.eq(company_id))
                .filter(service_history::Column::Status.eq(current))
                .exec(db)
                .await?;

            if result.rows_affected == 0 {
                return Err(ServiceError::InvalidTransition(format!(
                    "service {} changed status concurrently",
                    service_id
                )));
            }

            Ok((record, current))
        })
        .await?;

        record.status = next_status;
        record.updated_at = now;

        info!(%service_id, from = %from, to = %next_status, "service advanced");
        self.event_sender
            .publish(Event::ServiceAdvanced {
                service_id,
                company_id,
                from: from.to_string(),
                to: next_status.to_string(),
            })
            .await;

        Ok(record.into())
    }

    /// Repair history of one warranty, oldest entry first
    #[instrument(skip(self))]
    pub async fn list_for_warranty(
        &self,
        warranty_id: Uuid,
        company_id: Uuid,
    ) -> Result<Vec<ServiceRecordView>, ServiceError> {
        let db = &*self.db_pool;
        let records = with_timeout(self.store_timeout, "service.list", async {
            warranty::Entity::find()
                .filter(warranty::Column::Id.eq(warranty_id))
                .filter(warranty::Column::CompanyId.eq(company_id))
                .one(db)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Warranty {} not found", warranty_id))
                })?;

            Ok(service_history::Entity::find()
                .filter(service_history::Column::WarrantyId.eq(warranty_id))
                .filter(service_history::Column::CompanyId.eq(company_id))
                .order_by_asc(service_history::Column::EntryDate)
                .order_by_asc(service_history::Column::Id)
                .all(db)
                .await?)
        })
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }
}
