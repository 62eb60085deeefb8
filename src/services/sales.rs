use crate::{
    common::Clock,
    db::{with_timeout, DbPool},
    entities::{sale, sale_item},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::{WARRANTIES_CREATED, WARRANTY_CREATION_FAILURES},
    models::warranty::WarrantyView,
    services::warranties::WarrantyService,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use slog::Logger;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Upper bound on a single line's warranty term (50 years)
pub const MAX_WARRANTY_MONTHS: i32 = 600;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateSaleInput {
    #[validate(length(max = 64))]
    pub invoice_number: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub customer_name: String,
    #[validate(length(max = 64))]
    pub customer_document: Option<String>,
    pub items: Vec<SaleLineInput>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SaleLineInput {
    pub product_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub product_name: String,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub unit_price: Decimal,
    #[validate(range(min = 0, max = 600))]
    #[serde(default)]
    pub warranty_months: i32,
    #[serde(default)]
    pub serial_numbers: Vec<String>,
}

impl CreateSaleInput {
    fn check(&self) -> Result<(), ServiceError> {
        self.validate()?;
        if self.customer_name.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "customer_name must not be blank".into(),
            ));
        }
        if self.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "a sale needs at least one item".into(),
            ));
        }
        for (index, line) in self.items.iter().enumerate() {
            line.validate()?;
            if line.unit_price.is_sign_negative() {
                return Err(ServiceError::ValidationError(format!(
                    "items[{}].unit_price must not be negative",
                    index
                )));
            }
            if line.serial_numbers.iter().any(|s| s.trim().is_empty()) {
                return Err(ServiceError::ValidationError(format!(
                    "items[{}] has a blank serial number",
                    index
                )));
            }
            let mut seen = HashSet::new();
            if let Some(dup) = line
                .serial_numbers
                .iter()
                .map(|s| s.trim())
                .find(|s| !seen.insert(*s))
            {
                return Err(ServiceError::ValidationError(format!(
                    "items[{}] repeats serial number '{}'",
                    index, dup
                )));
            }
            if line.serial_numbers.len() > line.quantity as usize {
                return Err(ServiceError::ValidationError(format!(
                    "items[{}] lists {} serial numbers for a quantity of {}",
                    index,
                    line.serial_numbers.len(),
                    line.quantity
                )));
            }
        }
        Ok(())
    }

    fn total(&self) -> Decimal {
        self.items
            .iter()
            .map(|line| line.unit_price * Decimal::from(line.quantity))
            .sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SaleLineView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub warranty_months: i32,
    pub serial_numbers: Vec<String>,
}

impl From<sale_item::Model> for SaleLineView {
    fn from(model: sale_item::Model) -> Self {
        let serial_numbers = model.serials();
        Self {
            id: model.id,
            product_id: model.product_id,
            product_name: model.product_name,
            quantity: model.quantity,
            unit_price: model.unit_price,
            warranty_months: model.warranty_months,
            serial_numbers,
        }
    }
}

/// A sale with its lines and the warranties it produced
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SaleView {
    pub id: Uuid,
    pub company_id: Uuid,
    pub invoice_number: Option<String>,
    pub customer_name: String,
    pub customer_document: Option<String>,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub items: Vec<SaleLineView>,
    pub warranties: Vec<WarrantyView>,
}

impl SaleView {
    fn assemble(
        sale: sale::Model,
        items: Vec<sale_item::Model>,
        warranties: Vec<WarrantyView>,
    ) -> Self {
        Self {
            id: sale.id,
            company_id: sale.company_id,
            invoice_number: sale.invoice_number,
            customer_name: sale.customer_name,
            customer_document: sale.customer_document,
            total: sale.total,
            created_at: sale.created_at,
            items: items.into_iter().map(Into::into).collect(),
            warranties,
        }
    }
}

/// Minimal sale recording; its job here is to trigger warranty creation
#[derive(Clone)]
pub struct SaleService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    clock: Arc<dyn Clock>,
    store_timeout: Duration,
    warranties: Arc<WarrantyService>,
    logger: Logger,
}

impl SaleService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        clock: Arc<dyn Clock>,
        store_timeout: Duration,
        warranties: Arc<WarrantyService>,
        logger: Logger,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            clock,
            store_timeout,
            warranties,
            logger,
        }
    }

    /// Records a sale, its lines and their warranties in one transaction.
    /// Nothing is persisted unless every row is written.
    #[instrument(skip(self, input), fields(items = input.items.len()))]
    pub async fn create_sale(
        &self,
        company_id: Uuid,
        input: CreateSaleInput,
    ) -> Result<SaleView, ServiceError> {
        input.check()?;

        let now = self.clock.now();
        let db = &*self.db_pool;
        let total = input.total();

        let result = with_timeout(self.store_timeout, "sale.create", async {
            let txn = db.begin().await?;

            let sale = sale::ActiveModel {
                id: Set(Uuid::new_v4()),
                company_id: Set(company_id),
                invoice_number: Set(input.invoice_number.clone()),
                customer_name: Set(input.customer_name.trim().to_string()),
                customer_document: Set(input.customer_document.clone()),
                total: Set(total),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;

            let mut items = Vec::with_capacity(input.items.len());
            for line in &input.items {
                let serials: Vec<String> = line
                    .serial_numbers
                    .iter()
                    .map(|s| s.trim().to_string())
                    .collect();
                let item = sale_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    sale_id: Set(sale.id),
                    company_id: Set(company_id),
                    product_id: Set(line.product_id),
                    product_name: Set(line.product_name.trim().to_string()),
                    quantity: Set(line.quantity),
                    unit_price: Set(line.unit_price),
                    warranty_months: Set(line.warranty_months),
                    serial_numbers: Set(serde_json::json!(serials)),
                }
                .insert(&txn)
                .await?;
                items.push(item);
            }

            let warranties = match WarrantyService::create_for_sale(&txn, &sale, &items, now).await {
                Ok(warranties) => warranties,
                Err(e) => {
                    WARRANTY_CREATION_FAILURES.inc();
                    error!(sale_id = %sale.id, error = %e, "warranty creation failed, rolling back sale");
                    // dropping the transaction rolls it back
                    return Err(e);
                }
            };

            txn.commit().await?;
            Ok((sale, items, warranties))
        })
        .await;

        let (sale, items, warranties) = result?;

        WARRANTIES_CREATED.inc_by(warranties.len() as u64);
        slog::info!(self.logger, "Sale recorded";
            "sale_id" => %sale.id,
            "warranties" => warranties.len());
        info!(sale_id = %sale.id, warranties = warranties.len(), "sale created");

        self.event_sender
            .publish(Event::SaleCreated {
                sale_id: sale.id,
                company_id,
                warranty_count: warranties.len(),
            })
            .await;
        for warranty in &warranties {
            self.event_sender
                .publish(Event::WarrantyCreated {
                    warranty_id: warranty.id,
                    company_id,
                    expires_at: warranty.expires_at,
                })
                .await;
        }

        let views = self.warranties.fresh_views(warranties);
        Ok(SaleView::assemble(sale, items, views))
    }

    #[instrument(skip(self))]
    pub async fn get_sale(&self, sale_id: Uuid, company_id: Uuid) -> Result<SaleView, ServiceError> {
        let db = &*self.db_pool;
        let (sale, items) = with_timeout(self.store_timeout, "sale.get", async {
            let sale = sale::Entity::find()
                .filter(sale::Column::Id.eq(sale_id))
                .filter(sale::Column::CompanyId.eq(company_id))
                .one(db)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Sale {} not found", sale_id)))?;

            let items = sale_item::Entity::find()
                .filter(sale_item::Column::SaleId.eq(sale_id))
                .filter(sale_item::Column::CompanyId.eq(company_id))
                .order_by_asc(sale_item::Column::ProductName)
                .all(db)
                .await?;

            Ok((sale, items))
        })
        .await?;

        let warranties = self.warranties.list_for_sale(sale_id, company_id).await?;
        Ok(SaleView::assemble(sale, items, warranties))
    }
}
