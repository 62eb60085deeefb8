/*!
 * # Tenant Context Resolver
 *
 * Binds a request to one company and the caller's role inside it. Handlers
 * that take a [`TenantContext`] never run unless the company exists and the
 * authenticated caller is a member.
 */

use super::{policy, AuthUser, Operation};
use crate::entities::membership::Role;
use crate::errors::ServiceError;
use crate::AppState;
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use uuid::Uuid;

/// Resolved company scope for the current request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext {
    pub company_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
}

impl TenantContext {
    pub fn authorize(&self, operation: Operation) -> Result<(), ServiceError> {
        policy::authorize(self.role, operation)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for TenantContext {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        let Path(params) = Path::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        let raw = params.get("company_id").map(String::as_str).unwrap_or_default();
        // An unparseable id cannot name an existing company.
        let company_id = Uuid::parse_str(raw).map_err(|_| {
            ServiceError::CompanyNotFound(format!("Company {} not found", raw)).into_response()
        })?;

        state
            .services
            .tenancy
            .resolve(company_id, user.user_id)
            .await
            .map_err(IntoResponse::into_response)
    }
}
