//! Rows of one company are invisible to every other company, whatever the
//! operation.

mod common;

use assert_matches::assert_matches;
use backoffice_api::{
    common::PageRequest,
    entities::{membership::Role, service_history::ServiceStatus},
    errors::ServiceError,
    queries::warranty_queries::WarrantyFilters,
    services::service_history::OpenServiceInput,
};
use common::TestApp;

fn open_input() -> OpenServiceInput {
    OpenServiceInput {
        reason: "noisy fan".into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn foreign_company_gets_not_found_everywhere() {
    let app = TestApp::new().await;
    let acme = app.seed_company("Acme").await;
    let globex = app.seed_company("Globex").await;

    let sale = app.seed_sale(acme.company_id, "Ana", 12, &["A-1"]).await;
    let warranty_id = sale.warranties[0].id;
    let record = app
        .services()
        .service_history
        .open(warranty_id, acme.company_id, open_input())
        .await
        .unwrap();

    let warranties = &app.services().warranties;
    let services = &app.services().service_history;

    assert_matches!(
        warranties.get_by_id(warranty_id, globex.company_id).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        warranties.deactivate(warranty_id, globex.company_id).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        services
            .open(warranty_id, globex.company_id, open_input())
            .await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        services
            .advance(record.id, globex.company_id, ServiceStatus::InRepair)
            .await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        services.list_for_warranty(warranty_id, globex.company_id).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        app.services()
            .sales
            .get_sale(sale.id, globex.company_id)
            .await,
        Err(ServiceError::NotFound(_))
    );

    let page = warranties
        .list(
            globex.company_id,
            WarrantyFilters::default(),
            PageRequest::new(None, None, 20, 100),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 0);
    assert!(page.items.is_empty());

    // The owner's view is untouched by the failed foreign calls.
    let own = warranties.get_by_id(warranty_id, acme.company_id).await.unwrap();
    assert!(own.is_active);
    assert_eq!(own.service_count, 1);
}

#[tokio::test]
async fn membership_decides_the_tenant_context() {
    let app = TestApp::new().await;
    let acme = app.seed_company("Acme").await;
    let globex = app.seed_company("Globex").await;
    let tenancy = &app.services().tenancy;

    let ctx = tenancy
        .resolve(acme.company_id, acme.owner.user_id)
        .await
        .unwrap();
    assert_eq!(ctx.role, Role::Owner);
    assert_eq!(ctx.company_id, acme.company_id);

    assert_matches!(
        tenancy.resolve(globex.company_id, acme.owner.user_id).await,
        Err(ServiceError::NotMember(_))
    );
    assert_matches!(
        tenancy
            .resolve(uuid::Uuid::new_v4(), acme.owner.user_id)
            .await,
        Err(ServiceError::CompanyNotFound(_))
    );
}
