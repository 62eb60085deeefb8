use crate::{
    auth::{AuthUser, Operation, TenantContext},
    entities::membership::Role,
    errors::ServiceError,
    services::tenancy::{CompanyMembershipView, CreateCompanyInput, InviteMemberInput, MemberView},
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
pub struct ChangeRoleRequest {
    /// New role; `owner` is never accepted
    pub role: Role,
}

#[utoipa::path(
    get,
    path = "/api/v1/companies",
    responses(
        (status = 200, description = "Companies the caller belongs to", body = ApiResponse<Vec<CompanyMembershipView>>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "companies"
)]
pub async fn list_companies(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Vec<CompanyMembershipView>> {
    let companies = state.services.tenancy.list_companies(&user).await?;
    Ok(Json(ApiResponse::success(companies)))
}

#[utoipa::path(
    post,
    path = "/api/v1/companies",
    request_body = CreateCompanyInput,
    responses(
        (status = 201, description = "Company created, caller is owner", body = ApiResponse<CompanyMembershipView>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "companies"
)]
pub async fn create_company(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateCompanyInput>,
) -> Result<(StatusCode, Json<ApiResponse<CompanyMembershipView>>), ServiceError> {
    let company = state.services.tenancy.create_company(&user, payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(company))))
}

#[utoipa::path(
    get,
    path = "/api/v1/companies/:company_id/members",
    params(("company_id" = Uuid, Path, description = "Company ID")),
    responses(
        (status = 200, description = "Members listed", body = ApiResponse<Vec<MemberView>>),
        (status = 403, description = "Not a member", body = crate::errors::ErrorResponse),
        (status = 404, description = "Company not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "members"
)]
pub async fn list_members(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> ApiResult<Vec<MemberView>> {
    ctx.authorize(Operation::ListMembers)?;
    let members = state.services.tenancy.list_members(ctx.company_id).await?;
    Ok(Json(ApiResponse::success(members)))
}

#[utoipa::path(
    post,
    path = "/api/v1/companies/:company_id/invite",
    params(("company_id" = Uuid, Path, description = "Company ID")),
    request_body = InviteMemberInput,
    responses(
        (status = 201, description = "Member added", body = ApiResponse<MemberView>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already a member", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "members"
)]
pub async fn invite_member(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(payload): Json<InviteMemberInput>,
) -> Result<(StatusCode, Json<ApiResponse<MemberView>>), ServiceError> {
    ctx.authorize(Operation::InviteMember)?;
    let member = state.services.tenancy.invite(ctx.company_id, payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(member))))
}

#[utoipa::path(
    patch,
    path = "/api/v1/companies/:company_id/members/:user_id/role",
    params(
        ("company_id" = Uuid, Path, description = "Company ID"),
        ("user_id" = Uuid, Path, description = "Member's user ID")
    ),
    request_body = ChangeRoleRequest,
    responses(
        (status = 200, description = "Role changed", body = ApiResponse<MemberView>),
        (status = 400, description = "Owner role requested or owner targeted", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Member not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "members"
)]
pub async fn change_member_role(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path((_company_id, user_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ChangeRoleRequest>,
) -> ApiResult<MemberView> {
    ctx.authorize(Operation::ChangeMemberRole)?;
    let member = state
        .services
        .tenancy
        .change_role(ctx.company_id, user_id, payload.role)
        .await?;
    Ok(Json(ApiResponse::success(member)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/companies/:company_id/members/:user_id",
    params(
        ("company_id" = Uuid, Path, description = "Company ID"),
        ("user_id" = Uuid, Path, description = "Member's user ID")
    ),
    responses(
        (status = 204, description = "Member removed"),
        (status = 400, description = "The owner cannot be removed", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Member not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "members"
)]
pub async fn remove_member(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path((_company_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ServiceError> {
    ctx.authorize(Operation::RemoveMember)?;
    state.services.tenancy.remove(ctx.company_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
