//! Counterparty and asset registers with their typeahead endpoints.

mod common;

use axum::http::Method;
use bizdesk_api::entities::counterparty::CounterpartyKind;
use chrono::Utc;
use common::{response_json, TestApp, CLERK_EMAIL, VIEWER_EMAIL};
use serde_json::{json, Value};

fn hits(body: &Value) -> Vec<String> {
    body["data"]
        .as_array()
        .expect("hit list")
        .iter()
        .map(|h| h["code"].as_str().or(h["asset_tag"].as_str()).unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn codes_are_upper_cased_and_unique() {
    let app = TestApp::new().await;
    let cookie = app.login(CLERK_EMAIL).await;

    let created = app
        .request(
            Method::POST,
            "/api/v1/counterparties",
            Some(json!({
                "code": " c-0042 ",
                "name": "Siam Logistics Co., Ltd.",
                "kind": "Customer",
                "email": "ap@siamlogistics.example"
            })),
            Some(&cookie),
        )
        .await;
    assert_eq!(created.status(), 201);
    assert_eq!(response_json(created).await["data"]["code"], "C-0042");

    let duplicate = app
        .request(
            Method::POST,
            "/api/v1/counterparties",
            Some(json!({ "code": "C-0042", "name": "Someone else", "kind": "Vendor" })),
            Some(&cookie),
        )
        .await;
    assert_eq!(duplicate.status(), 409);

    let bad_email = app
        .request(
            Method::POST,
            "/api/v1/counterparties",
            Some(json!({ "code": "C-0043", "name": "Typo", "kind": "Vendor", "email": "nope" })),
            Some(&cookie),
        )
        .await;
    assert_eq!(bad_email.status(), 400);
}

#[tokio::test]
async fn typeahead_matches_code_and_name_and_filters_by_role() {
    let app = TestApp::new().await;
    app.seed_counterparty("SIAM-01", CounterpartyKind::Customer).await;
    app.seed_counterparty("SIAM-02", CounterpartyKind::Vendor).await;
    app.seed_counterparty("SIAM-03", CounterpartyKind::Both).await;
    app.seed_counterparty("KORAT-01", CounterpartyKind::Vendor).await;
    let cookie = app.login(VIEWER_EMAIL).await;

    let all = response_json(
        app.request(Method::GET, "/api/v1/search/counterparties?q=siam", None, Some(&cookie))
            .await,
    )
    .await;
    assert_eq!(hits(&all), vec!["SIAM-01", "SIAM-02", "SIAM-03"]);

    let vendors = response_json(
        app.request(
            Method::GET,
            "/api/v1/search/counterparties?q=siam&role=Vendor",
            None,
            Some(&cookie),
        )
        .await,
    )
    .await;
    assert_eq!(hits(&vendors), vec!["SIAM-02", "SIAM-03"]);

    let empty = response_json(
        app.request(Method::GET, "/api/v1/search/counterparties?q=%20", None, Some(&cookie))
            .await,
    )
    .await;
    assert!(hits(&empty).is_empty());
}

#[tokio::test]
async fn typeahead_returns_at_most_25_hits() {
    let app = TestApp::new().await;
    for i in 0..30 {
        app.seed_counterparty(&format!("BULK-{:02}", i), CounterpartyKind::Customer)
            .await;
    }
    let cookie = app.login(VIEWER_EMAIL).await;

    let capped = response_json(
        app.request(
            Method::GET,
            "/api/v1/search/counterparties?q=bulk&limit=100",
            None,
            Some(&cookie),
        )
        .await,
    )
    .await;
    assert_eq!(hits(&capped).len(), 25);

    let small = response_json(
        app.request(
            Method::GET,
            "/api/v1/search/counterparties?q=bulk&limit=5",
            None,
            Some(&cookie),
        )
        .await,
    )
    .await;
    assert_eq!(hits(&small).len(), 5);
}

#[tokio::test]
async fn referenced_counterparty_cannot_be_deleted() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let customer = app.seed_counterparty("C-900", CounterpartyKind::Customer).await;
    let spare = app.seed_counterparty("C-901", CounterpartyKind::Customer).await;

    let document = app
        .request(
            Method::POST,
            "/api/v1/documents",
            Some(json!({
                "kind": "Invoice",
                "document_date": "2024-03-15",
                "counterparty_id": customer,
                "items": [{"description": "Service", "quantity": "1", "unit_price": "10"}]
            })),
            Some(&admin),
        )
        .await;
    assert_eq!(document.status(), 201);

    let refused = app
        .request(
            Method::DELETE,
            &format!("/api/v1/counterparties/{}", customer),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(refused.status(), 409);

    let removed = app
        .request(
            Method::DELETE,
            &format!("/api/v1/counterparties/{}", spare),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(removed.status(), 204);
}

#[tokio::test]
async fn assets_get_monthly_tags_and_are_searchable() {
    let app = TestApp::new().await;
    let cookie = app.login(CLERK_EMAIL).await;
    let month = Utc::now().format("%Y%m").to_string();

    let mut tags = Vec::new();
    for (name, serial) in [("Forklift FD25", "FD25-889201"), ("Pallet jack", "PJ-1100")] {
        let response = app
            .request(
                Method::POST,
                "/api/v1/assets",
                Some(json!({ "name": name, "serial_number": serial, "purchase_cost": "685000.00" })),
                Some(&cookie),
            )
            .await;
        assert_eq!(response.status(), 201);
        let body = response_json(response).await;
        assert_eq!(body["data"]["status"], "InService");
        tags.push(body["data"]["asset_tag"].as_str().unwrap().to_string());
    }
    assert_eq!(
        tags,
        vec![format!("AS-{}-0001", month), format!("AS-{}-0002", month)]
    );

    let negative = app
        .request(
            Method::POST,
            "/api/v1/assets",
            Some(json!({ "name": "Bad", "purchase_cost": "-1" })),
            Some(&cookie),
        )
        .await;
    assert_eq!(negative.status(), 400);

    let found = response_json(
        app.request(Method::GET, "/api/v1/search/assets?q=FD25", None, Some(&cookie))
            .await,
    )
    .await;
    assert_eq!(hits(&found), vec![tags[0].clone()]);
}

#[tokio::test]
async fn kind_change_must_keep_issued_documents_valid() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let customer = app.seed_counterparty("C-910", CounterpartyKind::Customer).await;

    let invoice = app
        .request(
            Method::POST,
            "/api/v1/documents",
            Some(json!({
                "kind": "Invoice",
                "document_date": "2024-03-15",
                "counterparty_id": customer,
                "items": [{"description": "Service", "quantity": "1", "unit_price": "10"}]
            })),
            Some(&admin),
        )
        .await;
    assert_eq!(invoice.status(), 201);

    let path = format!("/api/v1/counterparties/{}", customer);
    let to_vendor = app
        .request(Method::PUT, &path, Some(json!({ "kind": "Vendor" })), Some(&admin))
        .await;
    assert_eq!(to_vendor.status(), 409);

    let to_both = app
        .request(Method::PUT, &path, Some(json!({ "kind": "Both" })), Some(&admin))
        .await;
    assert_eq!(to_both.status(), 200);
    assert_eq!(response_json(to_both).await["data"]["kind"], "Both");

    let renamed = app
        .request(Method::PUT, &path, Some(json!({ "name": "Renamed Co." })), Some(&admin))
        .await;
    assert_eq!(renamed.status(), 200);
}

#[tokio::test]
async fn assets_on_repair_tickets_cannot_be_deleted() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let customer = app.seed_counterparty("C-920", CounterpartyKind::Customer).await;

    let mut ids = Vec::new();
    for name in ["Hilux service van", "Spare compressor"] {
        let created = app
            .request(Method::POST, "/api/v1/assets", Some(json!({ "name": name })), Some(&admin))
            .await;
        assert_eq!(created.status(), 201);
        ids.push(response_json(created).await["data"]["id"].as_str().unwrap().to_string());
    }

    let ticket = app
        .request(
            Method::POST,
            "/api/v1/documents",
            Some(json!({
                "kind": "RepairTicket",
                "document_date": "2024-03-15",
                "counterparty_id": customer,
                "asset_id": ids[0],
                "items": [{"description": "Brake pads", "quantity": "4", "unit_price": "850"}]
            })),
            Some(&admin),
        )
        .await;
    assert_eq!(ticket.status(), 201);
    assert_eq!(response_json(ticket).await["data"]["asset_id"], ids[0].as_str());

    let refused = app
        .request(Method::DELETE, &format!("/api/v1/assets/{}", ids[0]), None, Some(&admin))
        .await;
    assert_eq!(refused.status(), 409);

    let removed = app
        .request(Method::DELETE, &format!("/api/v1/assets/{}", ids[1]), None, Some(&admin))
        .await;
    assert_eq!(removed.status(), 204);
}

#[tokio::test]
async fn typeahead_treats_like_wildcards_literally() {
    let app = TestApp::new().await;
    app.seed_counterparty("AB_01", CounterpartyKind::Customer).await;
    app.seed_counterparty("ABX01", CounterpartyKind::Customer).await;
    let cookie = app.login(VIEWER_EMAIL).await;

    let underscore = response_json(
        app.request(Method::GET, "/api/v1/search/counterparties?q=ab_", None, Some(&cookie))
            .await,
    )
    .await;
    assert_eq!(hits(&underscore), vec!["AB_01"]);

    let percent = response_json(
        app.request(Method::GET, "/api/v1/search/counterparties?q=%25", None, Some(&cookie))
            .await,
    )
    .await;
    assert!(hits(&percent).is_empty());
}
