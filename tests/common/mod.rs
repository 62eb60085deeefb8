#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use backoffice_api::{
    auth::{AuthUser, Claims},
    common::FixedClock,
    config::AppConfig,
    db::{self, DbConfig},
    entities::membership::Role,
    events,
    handlers::AppServices,
    logging::discard_logger,
    services::{
        sales::{CreateSaleInput, SaleLineInput, SaleView},
        tenancy::{CreateCompanyInput, InviteMemberInput},
    },
    AppState,
};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal_macros::dec;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "integration_test_secret_that_is_long_enough_42";

/// A company created through the service layer, with its owner
#[derive(Debug, Clone)]
pub struct SeededCompany {
    pub company_id: Uuid,
    pub owner: AuthUser,
}

/// Application state over a private in-memory SQLite database with a
/// controllable clock.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub clock: Arc<FixedClock>,
    _event_task: tokio::task::JoinHandle<()>,
}

pub fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            JWT_SECRET.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        adjust(&mut cfg);

        // One connection: every query sees the same in-memory database.
        let pool = db::establish_connection_with_config(&DbConfig {
            url: cfg.database_url.clone(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        })
        .await
        .expect("failed to open in-memory database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_sender, event_rx) = events::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let clock = Arc::new(FixedClock::new(utc(2024, 1, 1)));
        let logger = discard_logger();
        let state = AppState::new(
            Arc::new(pool),
            cfg,
            Arc::new(event_sender),
            clock.clone(),
            &logger,
        );
        let router = backoffice_api::build_router(state.clone(), &logger);

        Self {
            router,
            state,
            clock,
            _event_task: event_task,
        }
    }

    pub fn services(&self) -> &AppServices {
        &self.state.services
    }

    /// Signs a token the way the external issuer would.
    pub fn token_for(&self, user: &AuthUser) -> String {
        let now = Utc::now();
        let claims = Claims {
            sub: user.user_id.to_string(),
            email: user.email.clone(),
            name: user.name.clone(),
            jti: Some(Uuid::new_v4().to_string()),
            iat: now.timestamp(),
            exp: (now + chrono::Duration::hours(1)).timestamp(),
            iss: self.state.config.auth_issuer.clone(),
            aud: self.state.config.auth_audience.clone(),
        };
        jsonwebtoken::encode(
            &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(JWT_SECRET.as_bytes()),
        )
        .expect("encode access token")
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).expect("serialize request body"))
            }
            None => Body::empty(),
        };

        self.router
            .clone()
            .oneshot(builder.body(body).expect("build request"))
            .await
            .expect("router error during test request")
    }

    pub async fn request_as(
        &self,
        user: &AuthUser,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        let token = self.token_for(user);
        self.request(method, uri, body, Some(&token)).await
    }

    pub async fn seed_company(&self, name: &str) -> SeededCompany {
        let owner = AuthUser {
            user_id: Uuid::new_v4(),
            email: Some(format!("owner-{}@example.com", Uuid::new_v4().simple())),
            name: Some(format!("{} owner", name)),
        };
        let company = self
            .services()
            .tenancy
            .create_company(
                &owner,
                CreateCompanyInput {
                    name: name.to_string(),
                },
            )
            .await
            .expect("create company");
        SeededCompany {
            company_id: company.company_id,
            owner,
        }
    }

    /// Invites a fresh user with `role` and returns them as a token subject.
    pub async fn seed_member(&self, company_id: Uuid, role: Role) -> AuthUser {
        let email = format!("{}-{}@example.com", role, Uuid::new_v4().simple());
        let member = self
            .services()
            .tenancy
            .invite(
                company_id,
                InviteMemberInput {
                    email: email.clone(),
                    role,
                    name: None,
                    phone: None,
                    password: None,
                },
            )
            .await
            .expect("invite member");
        AuthUser {
            user_id: member.user_id,
            email: Some(email),
            name: None,
        }
    }

    /// Records a sale of one line, stamped with the current clock.
    pub async fn seed_sale(
        &self,
        company_id: Uuid,
        customer_name: &str,
        warranty_months: i32,
        serials: &[&str],
    ) -> SaleView {
        let quantity = serials.len().max(1) as i32;
        self.services()
            .sales
            .create_sale(
                company_id,
                CreateSaleInput {
                    invoice_number: Some(format!("INV-{}", Uuid::new_v4().simple())),
                    customer_name: customer_name.to_string(),
                    customer_document: None,
                    items: vec![line("Cordless drill", quantity, warranty_months, serials)],
                },
            )
            .await
            .expect("create sale")
    }
}

pub fn line(product_name: &str, quantity: i32, warranty_months: i32, serials: &[&str]) -> SaleLineInput {
    SaleLineInput {
        product_id: Uuid::new_v4(),
        product_name: product_name.to_string(),
        quantity,
        unit_price: dec!(149.90),
        warranty_months,
        serial_numbers: serials.iter().map(|s| s.to_string()).collect(),
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
