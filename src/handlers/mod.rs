pub mod companies;
pub mod sales;
pub mod services;
pub mod warranties;

use crate::{
    common::Clock,
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    logging::component_logger,
    services::{
        sales::SaleService, service_history::ServiceHistoryService, tenancy::TenancyService,
        warranties::WarrantyService,
    },
};
use slog::Logger;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub tenancy: Arc<TenancyService>,
    pub sales: Arc<SaleService>,
    pub warranties: Arc<WarrantyService>,
    pub service_history: Arc<ServiceHistoryService>,
}

impl AppServices {
    /// Wires every service over one pool, event channel and clock.
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        clock: Arc<dyn Clock>,
        config: &AppConfig,
        root_logger: &Logger,
    ) -> Self {
        let store_timeout = config.store_timeout();

        let tenancy = Arc::new(TenancyService::new(
            db_pool.clone(),
            event_sender.clone(),
            clock.clone(),
            store_timeout,
            component_logger(root_logger, "tenancy_service"),
        ));

        let warranties = Arc::new(WarrantyService::new(
            db_pool.clone(),
            event_sender.clone(),
            clock.clone(),
            store_timeout,
            config.expiring_soon_threshold_days,
            component_logger(root_logger, "warranties_service"),
        ));

        let sales = Arc::new(SaleService::new(
            db_pool.clone(),
            event_sender.clone(),
            clock.clone(),
            store_timeout,
            warranties.clone(),
            component_logger(root_logger, "sales_service"),
        ));

        let service_history = Arc::new(ServiceHistoryService::new(
            db_pool,
            event_sender,
            clock,
            store_timeout,
            config.allow_service_on_inactive_warranty,
            component_logger(root_logger, "service_history_service"),
        ));

        Self {
            tenancy,
            sales,
            warranties,
            service_history,
        }
    }
}
