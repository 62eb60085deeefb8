use crate::{
    auth::{Operation, TenantContext},
    entities::service_history::ServiceStatus,
    errors::ServiceError,
    services::service_history::{OpenServiceInput, ServiceRecordView},
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct AdvanceServiceRequest {
    /// Must be the immediate successor of the current status
    pub status: ServiceStatus,
}

#[utoipa::path(
    get,
    path = "/api/v1/companies/:company_id/warranties/:id/services",
    params(
        ("company_id" = Uuid, Path, description = "Company ID"),
        ("id" = Uuid, Path, description = "Warranty ID")
    ),
    responses(
        (status = 200, description = "Repair history, oldest first", body = ApiResponse<Vec<ServiceRecordView>>),
        (status = 404, description = "Warranty not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "services"
)]
pub async fn list_services(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path((_company_id, warranty_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Vec<ServiceRecordView>> {
    ctx.authorize(Operation::ReadServices)?;
    let records = state
        .services
        .service_history
        .list_for_warranty(warranty_id, ctx.company_id)
        .await?;
    Ok(Json(ApiResponse::success(records)))
}

#[utoipa::path(
    post,
    path = "/api/v1/companies/:company_id/warranties/:id/services",
    params(
        ("company_id" = Uuid, Path, description = "Company ID"),
        ("id" = Uuid, Path, description = "Warranty ID")
    ),
    request_body = OpenServiceInput,
    responses(
        (status = 201, description = "Repair opened as received", body = ApiResponse<ServiceRecordView>),
        (status = 400, description = "Invalid request or deactivated warranty", body = crate::errors::ErrorResponse),
        (status = 404, description = "Warranty not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "A repair is already open", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "services"
)]
pub async fn open_service(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path((_company_id, warranty_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<OpenServiceInput>,
) -> Result<(StatusCode, Json<ApiResponse<ServiceRecordView>>), ServiceError> {
    ctx.authorize(Operation::OpenService)?;
    let record = state
        .services
        .service_history
        .open(warranty_id, ctx.company_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(record))))
}

#[utoipa::path(
    patch,
    path = "/api/v1/companies/:company_id/services/:id/status",
    params(
        ("company_id" = Uuid, Path, description = "Company ID"),
        ("id" = Uuid, Path, description = "Service record ID")
    ),
    request_body = AdvanceServiceRequest,
    responses(
        (status = 200, description = "Status advanced", body = ApiResponse<ServiceRecordView>),
        (status = 404, description = "Service record not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Not the next status", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "services"
)]
pub async fn advance_service(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path((_company_id, service_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<AdvanceServiceRequest>,
) -> ApiResult<ServiceRecordView> {
    ctx.authorize(Operation::AdvanceService)?;
    let record = state
        .services
        .service_history
        .advance(service_id, ctx.company_id, payload.status)
        .await?;
    Ok(Json(ApiResponse::success(record)))
}
