use crate::{
    auth::{Operation, TenantContext},
    errors::ServiceError,
    services::sales::{CreateSaleInput, SaleView},
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

#[utoipa::path(
    post,
    path = "/api/v1/companies/:company_id/sales",
    params(("company_id" = Uuid, Path, description = "Company ID")),
    request_body = CreateSaleInput,
    responses(
        (status = 201, description = "Sale and its warranties recorded", body = ApiResponse<SaleView>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 500, description = "Nothing was persisted", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "sales"
)]
pub async fn create_sale(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(payload): Json<CreateSaleInput>,
) -> Result<(StatusCode, Json<ApiResponse<SaleView>>), ServiceError> {
    ctx.authorize(Operation::CreateSale)?;
    let sale = state.services.sales.create_sale(ctx.company_id, payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(sale))))
}

#[utoipa::path(
    get,
    path = "/api/v1/companies/:company_id/sales/:sale_id",
    params(
        ("company_id" = Uuid, Path, description = "Company ID"),
        ("sale_id" = Uuid, Path, description = "Sale ID")
    ),
    responses(
        (status = 200, description = "Sale fetched", body = ApiResponse<SaleView>),
        (status = 404, description = "Sale not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "sales"
)]
pub async fn get_sale(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path((_company_id, sale_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<SaleView> {
    ctx.authorize(Operation::ReadSales)?;
    let sale = state.services.sales.get_sale(sale_id, ctx.company_id).await?;
    Ok(Json(ApiResponse::success(sale)))
}
