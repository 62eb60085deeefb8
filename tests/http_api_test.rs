//! End-to-end checks through the router: authentication, tenant
//! resolution, the policy gate and the response envelopes.

mod common;

use axum::http::{Method, StatusCode};
use backoffice_api::entities::membership::Role;
use common::{response_json, TestApp};
use serde_json::json;
use uuid::Uuid;

fn sale_body(serial: &str) -> serde_json::Value {
    json!({
        "customer_name": "Rita Alves",
        "customer_document": "987.654.321-00",
        "items": [{
            "product_id": Uuid::new_v4(),
            "product_name": "Espresso machine",
            "quantity": 1,
            "unit_price": "899.00",
            "warranty_months": 12,
            "serial_numbers": [serial]
        }]
    })
}

#[tokio::test]
async fn requests_without_a_valid_token_are_unauthorized() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/companies", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response).await;
    assert_eq!(body["error"]["code"], "AUTH_MISSING");

    let response = app
        .request(Method::GET, "/api/v1/companies", None, Some("not-a-jwt"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn company_creation_and_listing() {
    let app = TestApp::new().await;
    let user = backoffice_api::auth::AuthUser {
        user_id: Uuid::new_v4(),
        email: Some("founder@example.com".into()),
        name: Some("Founder".into()),
    };

    let response = app
        .request_as(
            &user,
            Method::POST,
            "/api/v1/companies",
            Some(json!({ "name": "Corner Electronics" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = response_json(response).await;
    assert_eq!(created["success"], true);
    assert_eq!(created["data"]["role"], "owner");

    let response = app
        .request_as(&user, Method::GET, "/api/v1/companies", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let listed = response_json(response).await;
    assert_eq!(listed["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(listed["data"][0]["name"], "Corner Electronics");
}

#[tokio::test]
async fn tenant_resolution_failures() {
    let app = TestApp::new().await;
    let acme = app.seed_company("Acme").await;
    let globex = app.seed_company("Globex").await;

    let uri = format!("/api/v1/companies/{}/warranties", globex.company_id);
    let response = app.request_as(&acme.owner, Method::GET, &uri, None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let uri = format!("/api/v1/companies/{}/warranties", Uuid::new_v4());
    let response = app.request_as(&acme.owner, Method::GET, &uri, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .request_as(
            &acme.owner,
            Method::GET,
            "/api/v1/companies/not-a-uuid/warranties",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn policy_gate_limits_sellers() {
    let app = TestApp::new().await;
    let acme = app.seed_company("Acme").await;
    let seller = app.seed_member(acme.company_id, Role::Seller).await;

    let uri = format!("/api/v1/companies/{}/sales", acme.company_id);
    let response = app
        .request_as(&seller, Method::POST, &uri, Some(sale_body("EM-1")))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let sale = response_json(response).await;
    let warranty_id = sale["data"]["warranties"][0]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let uri = format!(
        "/api/v1/companies/{}/warranties/{}/deactivate",
        acme.company_id, warranty_id
    );
    let response = app.request_as(&seller, Method::POST, &uri, None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let uri = format!("/api/v1/companies/{}/invite", acme.company_id);
    let response = app
        .request_as(
            &seller,
            Method::POST,
            &uri,
            Some(json!({ "email": "friend@example.com", "role": "seller" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // The owner may do both.
    let response = app
        .request_as(
            &acme.owner,
            Method::POST,
            &uri,
            Some(json!({ "email": "friend@example.com", "role": "seller" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn warranty_listing_envelope() {
    let app = TestApp::new().await;
    let acme = app.seed_company("Acme").await;
    for i in 0..3 {
        app.seed_sale(acme.company_id, "Rita Alves", 12, &[format!("L-{}", i).as_str()])
            .await;
    }

    let uri = format!(
        "/api/v1/companies/{}/warranties?page=2&limit=2&customer_name=rita",
        acme.company_id
    );
    let response = app.request_as(&acme.owner, Method::GET, &uri, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["pagination"]["page"], 2);
    assert_eq!(body["pagination"]["limit"], 2);
    assert_eq!(body["pagination"]["total"], 3);
    assert_eq!(body["pagination"]["totalPages"], 2);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["data"][0]["customer_name"], "Rita Alves");
    assert_eq!(body["data"][0]["warranty_status"], "active");

    // Far past the end: empty page, same totals.
    let uri = format!(
        "/api/v1/companies/{}/warranties?page=18446744073709551615&limit=10",
        acme.company_id
    );
    let response = app.request_as(&acme.owner, Method::GET, &uri, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));
    assert_eq!(body["pagination"]["total"], 3);
    assert_eq!(body["pagination"]["totalPages"], 1);

    let uri = format!(
        "/api/v1/companies/{}/warranties?status=forever",
        acme.company_id
    );
    let response = app.request_as(&acme.owner, Method::GET, &uri, None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn repeated_serials_are_a_bad_request() {
    let app = TestApp::new().await;
    let acme = app.seed_company("Acme").await;

    let mut body = sale_body("DUP");
    body["items"][0]["quantity"] = json!(2);
    body["items"][0]["serial_numbers"] = json!(["DUP", "DUP"]);

    let uri = format!("/api/v1/companies/{}/sales", acme.company_id);
    let response = app
        .request_as(&acme.owner, Method::POST, &uri, Some(body))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn nested_resource_routes_resolve_the_second_path_segment() {
    let app = TestApp::new().await;
    let acme = app.seed_company("Acme").await;
    let sale = app.seed_sale(acme.company_id, "Rita Alves", 12, &["N-1"]).await;
    let warranty_id = sale.warranties[0].id;

    let uri = format!("/api/v1/companies/{}/sales/{}", acme.company_id, sale.id);
    let response = app.request_as(&acme.owner, Method::GET, &uri, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["id"], sale.id.to_string());

    let uri = format!(
        "/api/v1/companies/{}/warranties/{}",
        acme.company_id, warranty_id
    );
    let response = app.request_as(&acme.owner, Method::GET, &uri, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["serial_number"], "N-1");

    let uri = format!(
        "/api/v1/companies/{}/warranties/{}/deactivate",
        acme.company_id, warranty_id
    );
    let response = app.request_as(&acme.owner, Method::POST, &uri, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let member = app.seed_member(acme.company_id, Role::Seller).await;
    let uri = format!(
        "/api/v1/companies/{}/members/{}/role",
        acme.company_id, member.user_id
    );
    let response = app
        .request_as(&acme.owner, Method::PATCH, &uri, Some(json!({ "role": "admin" })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["role"], "admin");

    let uri = format!(
        "/api/v1/companies/{}/members/{}",
        acme.company_id, member.user_id
    );
    let response = app.request_as(&acme.owner, Method::DELETE, &uri, None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = app.request_as(&acme.owner, Method::DELETE, &uri, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn repair_flow_over_http() {
    let app = TestApp::new().await;
    let acme = app.seed_company("Acme").await;
    let sale = app.seed_sale(acme.company_id, "Rita Alves", 12, &["R-1"]).await;
    let warranty_id = sale.warranties[0].id;

    let uri = format!(
        "/api/v1/companies/{}/warranties/{}/services",
        acme.company_id, warranty_id
    );
    let response = app
        .request_as(
            &acme.owner,
            Method::POST,
            &uri,
            Some(json!({ "reason": "leaks water", "photos": ["a.jpg", "b.jpg"] })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let opened = response_json(response).await;
    assert_eq!(opened["data"]["status"], "received");
    let service_id = opened["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .request_as(
            &acme.owner,
            Method::POST,
            &uri,
            Some(json!({ "reason": "still leaking" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let status_uri = format!(
        "/api/v1/companies/{}/services/{}/status",
        acme.company_id, service_id
    );
    let response = app
        .request_as(
            &acme.owner,
            Method::PATCH,
            &status_uri,
            Some(json!({ "status": "delivered" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .request_as(
            &acme.owner,
            Method::PATCH,
            &status_uri,
            Some(json!({ "status": "in_repair" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let advanced = response_json(response).await;
    assert_eq!(advanced["data"]["status"], "in_repair");

    let response = app.request_as(&acme.owner, Method::GET, &uri, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let history = response_json(response).await;
    assert_eq!(history["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(history["data"][0]["photos"], json!(["a.jpg", "b.jpg"]));
}

#[tokio::test]
async fn health_and_metrics_are_public() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.request(Method::GET, "/health/ready", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "up");

    let response = app.request(Method::GET, "/metrics", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}
