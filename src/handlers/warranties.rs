use crate::{
    auth::{Operation, TenantContext},
    common::PageRequest,
    errors::ServiceError,
    models::warranty::{WarrantyStatus, WarrantyView},
    queries::warranty_queries::{WarrantyFilters, WarrantyListItem},
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Deserialize, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WarrantyListQuery {
    /// One of `active`, `expiring_soon`, `expired`
    pub status: Option<String>,
    /// Substring of the serial number, case-insensitive
    pub serial_number: Option<String>,
    /// Substring of the owning sale's customer name, case-insensitive
    pub customer_name: Option<String>,
    /// 1-based page; 0 is treated as 1
    pub page: Option<u64>,
    /// Page size, clamped to the configured maximum
    pub limit: Option<u64>,
}

impl WarrantyListQuery {
    fn filters(&self) -> Result<WarrantyFilters, ServiceError> {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                raw.parse::<WarrantyStatus>()
                    .map_err(ServiceError::ValidationError)?,
            ),
        };
        Ok(WarrantyFilters {
            status,
            serial_number: self.serial_number.clone(),
            customer_name: self.customer_name.clone(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    #[serde(rename = "totalPages")]
    pub total_pages: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WarrantyListResponse {
    pub data: Vec<WarrantyListItem>,
    pub pagination: Pagination,
}

#[utoipa::path(
    get,
    path = "/api/v1/companies/:company_id/warranties",
    params(("company_id" = Uuid, Path, description = "Company ID"), WarrantyListQuery),
    responses(
        (status = 200, description = "Warranties listed", body = WarrantyListResponse),
        (status = 400, description = "Unknown status filter", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not a member", body = crate::errors::ErrorResponse),
        (status = 404, description = "Company not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "warranties"
)]
pub async fn list_warranties(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(query): Query<WarrantyListQuery>,
) -> Result<Json<WarrantyListResponse>, ServiceError> {
    ctx.authorize(Operation::ReadWarranties)?;

    let filters = query.filters()?;
    let page = PageRequest::new(
        query.page,
        query.limit,
        state.config.api_default_page_size,
        state.config.api_max_page_size,
    );

    let result = state
        .services
        .warranties
        .list(ctx.company_id, filters, page)
        .await?;

    Ok(Json(WarrantyListResponse {
        data: result.items,
        pagination: Pagination {
            page: result.page,
            limit: result.page_size,
            total: result.total,
            total_pages: result.total_pages,
        },
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/companies/:company_id/warranties/:id",
    params(
        ("company_id" = Uuid, Path, description = "Company ID"),
        ("id" = Uuid, Path, description = "Warranty ID")
    ),
    responses(
        (status = 200, description = "Warranty fetched", body = ApiResponse<WarrantyView>),
        (status = 404, description = "Warranty not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "warranties"
)]
pub async fn get_warranty(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path((_company_id, id)): Path<(Uuid, Uuid)>,
) -> ApiResult<WarrantyView> {
    ctx.authorize(Operation::ReadWarranties)?;
    let warranty = state
        .services
        .warranties
        .get_by_id(id, ctx.company_id)
        .await?;
    Ok(Json(ApiResponse::success(warranty)))
}

#[utoipa::path(
    post,
    path = "/api/v1/companies/:company_id/warranties/:id/deactivate",
    params(
        ("company_id" = Uuid, Path, description = "Company ID"),
        ("id" = Uuid, Path, description = "Warranty ID")
    ),
    responses(
        (status = 200, description = "Warranty deactivated (idempotent)", body = ApiResponse<WarrantyView>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Warranty not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "warranties"
)]
pub async fn deactivate_warranty(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path((_company_id, id)): Path<(Uuid, Uuid)>,
) -> ApiResult<WarrantyView> {
    ctx.authorize(Operation::DeactivateWarranty)?;
    let warranty = state
        .services
        .warranties
        .deactivate(id, ctx.company_id)
        .await?;
    Ok(Json(ApiResponse::success(warranty)))
}
