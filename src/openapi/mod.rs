use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Backoffice API",
        version = "1.0.0",
        description = r#"
# Back office for retail and service shops

Sales, warranties and repair tracking, scoped per company.

## Authentication

Every `/api/v1` endpoint expects a bearer token issued by the identity
service:

```
Authorization: Bearer <jwt>
```

Company routes additionally require a membership in the company named in the
path. A missing company answers `404`, a non-member `403`.

## Warranty status

`warranty_status`, `days_remaining` and `service_count` are computed on every
read from the stored dates and the current time. They are never stored.

## Pagination

`GET /companies/{company_id}/warranties` takes `page` (1-based) and `limit`
(clamped to the configured maximum) and answers
`{ data, pagination: { page, limit, total, totalPages } }`.
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "companies", description = "Companies the caller belongs to"),
        (name = "members", description = "Company membership management"),
        (name = "sales", description = "Sales that create warranties"),
        (name = "warranties", description = "Warranty records and listing"),
        (name = "services", description = "Repair tracking per warranty")
    ),
    paths(
        crate::handlers::companies::list_companies,
        crate::handlers::companies::create_company,
        crate::handlers::companies::list_members,
        crate::handlers::companies::invite_member,
        crate::handlers::companies::change_member_role,
        crate::handlers::companies::remove_member,
        crate::handlers::sales::create_sale,
        crate::handlers::sales::get_sale,
        crate::handlers::warranties::list_warranties,
        crate::handlers::warranties::get_warranty,
        crate::handlers::warranties::deactivate_warranty,
        crate::handlers::services::list_services,
        crate::handlers::services::open_service,
        crate::handlers::services::advance_service,
    ),
    components(
        schemas(
            crate::entities::membership::Role,
            crate::entities::service_history::ServiceStatus,
            crate::models::warranty::WarrantyStatus,
            crate::models::warranty::WarrantyView,
            crate::queries::warranty_queries::WarrantyListItem,
            crate::queries::warranty_queries::SaleProduct,
            crate::handlers::warranties::WarrantyListResponse,
            crate::handlers::warranties::Pagination,
            crate::handlers::companies::ChangeRoleRequest,
            crate::handlers::services::AdvanceServiceRequest,
            crate::services::tenancy::CreateCompanyInput,
            crate::services::tenancy::InviteMemberInput,
            crate::services::tenancy::MemberView,
            crate::services::tenancy::CompanyMembershipView,
            crate::services::sales::CreateSaleInput,
            crate::services::sales::SaleLineInput,
            crate::services::sales::SaleLineView,
            crate::services::sales::SaleView,
            crate::services::service_history::OpenServiceInput,
            crate::services::service_history::ServiceRecordView,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDocV1;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDocV1::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_tenant_routes_and_bearer_scheme() {
        let json = serde_json::to_string(&ApiDocV1::openapi()).unwrap();
        assert!(json.contains("Backoffice API"));
        assert!(json.contains("/api/v1/companies/:company_id/warranties"));
        assert!(json.contains("bearer_auth"));
    }
}
