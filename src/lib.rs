//! Backoffice API library
//!
//! Multi-tenant back office for retail and service shops. The core is the
//! warranty lifecycle: warranties created atomically with sales, status
//! derived from dates at read time, and one open repair per warranty.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod common;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod middleware_helpers;
pub mod migrator;
pub mod models;
pub mod openapi;
pub mod queries;
pub mod services;
pub mod tracing;

use axum::{
    http::HeaderValue,
    response::Json,
    routing::{delete, get, patch, post},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use slog::Logger;
use std::{sync::Arc, time::Duration};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};
use utoipa::ToSchema;

use crate::auth::AuthRouterExt;
use crate::handlers::{companies, sales, services as service_handlers, warranties};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<db::DbPool>,
    pub config: config::AppConfig,
    pub event_sender: Arc<events::EventSender>,
    pub services: handlers::AppServices,
    pub auth: Arc<auth::AuthService>,
}

impl AppState {
    pub fn new(
        db: Arc<db::DbPool>,
        config: config::AppConfig,
        event_sender: Arc<events::EventSender>,
        clock: Arc<dyn common::Clock>,
        logger: &Logger,
    ) -> Self {
        let services =
            handlers::AppServices::new(db.clone(), event_sender.clone(), clock, &config, logger);
        let auth = Arc::new(auth::AuthService::new(auth::AuthConfig::from(&config)));
        Self {
            db,
            config,
            event_sender,
            services,
            auth,
        }
    }
}

// Common response wrapper
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Every `/api/v1` route, behind bearer authentication
pub fn api_v1_routes(auth_service: Arc<auth::AuthService>) -> Router<AppState> {
    Router::new()
        .route(
            "/companies",
            get(companies::list_companies).post(companies::create_company),
        )
        .route(
            "/companies/:company_id/members",
            get(companies::list_members),
        )
        .route(
            "/companies/:company_id/invite",
            post(companies::invite_member),
        )
        .route(
            "/companies/:company_id/members/:user_id/role",
            patch(companies::change_member_role),
        )
        .route(
            "/companies/:company_id/members/:user_id",
            delete(companies::remove_member),
        )
        .route("/companies/:company_id/sales", post(sales::create_sale))
        .route(
            "/companies/:company_id/sales/:sale_id",
            get(sales::get_sale),
        )
        .route(
            "/companies/:company_id/warranties",
            get(warranties::list_warranties),
        )
        .route(
            "/companies/:company_id/warranties/:id",
            get(warranties::get_warranty),
        )
        .route(
            "/companies/:company_id/warranties/:id/deactivate",
            post(warranties::deactivate_warranty),
        )
        .route(
            "/companies/:company_id/warranties/:id/services",
            get(service_handlers::list_services).post(service_handlers::open_service),
        )
        .route(
            "/companies/:company_id/services/:id/status",
            patch(service_handlers::advance_service),
        )
        .with_auth(auth_service)
}

/// CORS from configuration; permissive when no origins are listed
pub fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .cors_origins()
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if origins.is_empty() {
        if cfg.is_production() {
            ::tracing::warn!("no CORS origins configured in production, allowing any origin");
        }
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Upper bound for a whole request; store calls have their own, shorter limit.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Full application router: API, health, metrics and docs with the
/// request-id, tracing, access-log and metrics layers applied.
pub fn build_router(state: AppState, logger: &Logger) -> Router {
    let logging_state = Arc::new(logging::LoggingState::new(logging::component_logger(
        logger, "http",
    )));
    let cors = cors_layer(&state.config);
    let db = state.db.clone();

    Router::<AppState>::new()
        .route("/metrics", get(metrics::metrics_handler))
        .nest("/api/v1", api_v1_routes(state.auth.clone()))
        .merge(openapi::swagger_ui())
        .with_state(state)
        .nest("/health", health::health_routes(db))
        .layer(axum::middleware::from_fn(metrics::track_requests))
        .layer(axum::middleware::from_fn_with_state(
            logging_state,
            logging::logging_middleware,
        ))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(crate::tracing::configure_http_tracing())
        .layer(cors)
        // Outermost, so every inner layer and handler sees the request id
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[test]
    fn success_response_without_scope_has_no_request_id() {
        let response = ApiResponse::success(1);
        assert!(response.success);
        assert!(response.meta.unwrap().request_id.is_none());
    }
}
