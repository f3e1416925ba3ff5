//! Document writes, status changes and deletes end to end.

mod common;

use std::str::FromStr;

use axum::http::Method;
use bizdesk_api::{
    entities::{counterparty::CounterpartyKind, document, document::DocumentKind, document_item},
    errors::ServiceError,
    services::document_writer::{DocumentWriter, NewDocument, NewLineItem},
};
use chrono::NaiveDate;
use common::{response_json, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::{json, Value};
use uuid::Uuid;

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        other => Decimal::from_str(&other.to_string()).expect("decimal number"),
    }
}

async fn create_invoice(app: &TestApp, cookie: &str, customer: Uuid) -> Value {
    let response = app
        .request(
            Method::POST,
            "/api/v1/documents",
            Some(json!({
                "kind": "Invoice",
                "document_date": "2024-03-15",
                "due_date": "2024-04-15",
                "counterparty_id": customer,
                "reference": "PO-ACME-77",
                "items": [
                    {"description": "Oil change", "quantity": "2", "unit_price": "450.25"},
                    {"description": "Air filter", "quantity": "1.5", "unit_price": "199.99"},
                    {"description": "Labour", "quantity": "3", "unit_price": "300"}
                ]
            })),
            Some(cookie),
        )
        .await;
    assert_eq!(response.status(), 201);
    response_json(response).await["data"].clone()
}

async fn set_status(app: &TestApp, cookie: &str, id: &str, status: &str) -> axum::response::Response {
    app.request(
        Method::PUT,
        &format!("/api/v1/documents/{}/status", id),
        Some(json!({ "status": status })),
        Some(cookie),
    )
    .await
}

#[tokio::test]
async fn create_computes_line_totals_and_document_total() {
    let app = TestApp::new().await;
    let cookie = app.login(common::CLERK_EMAIL).await;
    let customer = app.seed_counterparty("ACME", CounterpartyKind::Customer).await;

    let created = create_invoice(&app, &cookie, customer).await;
    assert_eq!(created["number"], "INV-202403-0001");
    assert_eq!(created["status"], "Draft");
    assert_eq!(created["currency"], "THB");

    let items = created["items"].as_array().expect("items");
    assert_eq!(items.len(), 3);
    let line_numbers: Vec<i64> = items.iter().map(|i| i["line_no"].as_i64().unwrap()).collect();
    assert_eq!(line_numbers, vec![1, 2, 3]);
    assert_eq!(decimal(&items[0]["line_total"]), dec!(900.50));
    assert_eq!(decimal(&items[1]["line_total"]), dec!(299.985));
    assert_eq!(decimal(&created["total_amount"]), dec!(2100.485));

    let exact_sum: Decimal = items
        .iter()
        .map(|i| decimal(&i["quantity"]) * decimal(&i["unit_price"]))
        .sum();
    assert_eq!(decimal(&created["total_amount"]), exact_sum);

    let id = created["id"].as_str().unwrap();
    let fetched = app
        .request(Method::GET, &format!("/api/v1/documents/{}", id), None, Some(&cookie))
        .await;
    assert_eq!(fetched.status(), 200);
    let fetched = response_json(fetched).await;
    assert_eq!(fetched["data"]["number"], "INV-202403-0001");
    assert_eq!(fetched["data"]["items"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn document_without_items_keeps_the_given_total() {
    let app = TestApp::new().await;
    let cookie = app.admin().await;
    let vendor = app.seed_counterparty("V-01", CounterpartyKind::Vendor).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/documents",
            Some(json!({
                "kind": "PaymentVoucher",
                "document_date": "2024-06-01",
                "counterparty_id": vendor,
                "total_amount": "15000.00"
            })),
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status(), 201);
    let body = response_json(response).await;
    assert_eq!(body["data"]["number"], "PV-202406-0001");
    assert_eq!(body["data"]["status"], "Completed");
    assert_eq!(decimal(&body["data"]["total_amount"]), dec!(15000));
    assert!(body["data"]["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn replacing_items_recomputes_the_total() {
    let app = TestApp::new().await;
    let cookie = app.admin().await;
    let customer = app.seed_counterparty("ACME", CounterpartyKind::Customer).await;
    let created = create_invoice(&app, &cookie, customer).await;
    let id = created["id"].as_str().unwrap();

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/documents/{}/items", id),
            Some(json!({
                "items": [{"description": "Full service", "quantity": "1", "unit_price": "2500"}]
            })),
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"]["number"], "INV-202403-0001");
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["items"][0]["line_no"], 1);
    assert_eq!(decimal(&body["data"]["total_amount"]), dec!(2500));

    let stored = document_item::Entity::find()
        .count(app.state.db.as_ref())
        .await
        .unwrap();
    assert_eq!(stored, 1);

    let empty = app
        .request(
            Method::PUT,
            &format!("/api/v1/documents/{}/items", id),
            Some(json!({ "items": [] })),
            Some(&cookie),
        )
        .await;
    assert_eq!(empty.status(), 400);
}

#[tokio::test]
async fn status_flow_and_locking() {
    let app = TestApp::new().await;
    let cookie = app.admin().await;
    let customer = app.seed_counterparty("ACME", CounterpartyKind::Customer).await;
    let created = create_invoice(&app, &cookie, customer).await;
    let id = created["id"].as_str().unwrap();

    let sent = set_status(&app, &cookie, id, "Sent").await;
    assert_eq!(sent.status(), 200);
    let sent = response_json(sent).await;
    assert_eq!(sent["data"]["old_status"], "Draft");
    assert_eq!(sent["data"]["status"], "Sent");
    assert_eq!(sent["data"]["changed"], true);

    let again = response_json(set_status(&app, &cookie, id, "Sent").await).await;
    assert_eq!(again["data"]["changed"], false);

    // Approved is not an invoice status
    assert_eq!(set_status(&app, &cookie, id, "Approved").await.status(), 400);

    assert_eq!(set_status(&app, &cookie, id, "Paid").await.status(), 200);

    let locked = app
        .request(
            Method::PUT,
            &format!("/api/v1/documents/{}/items", id),
            Some(json!({
                "items": [{"description": "Late fee", "quantity": "1", "unit_price": "100"}]
            })),
            Some(&cookie),
        )
        .await;
    assert_eq!(locked.status(), 409);

    assert_eq!(set_status(&app, &cookie, id, "Void").await.status(), 200);
    assert_eq!(set_status(&app, &cookie, id, "Draft").await.status(), 409);
}

#[tokio::test]
async fn receipt_cannot_go_back_to_draft() {
    let app = TestApp::new().await;
    let cookie = app.admin().await;
    let customer = app.seed_counterparty("ACME", CounterpartyKind::Customer).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/documents",
            Some(json!({
                "kind": "Receipt",
                "document_date": "2024-03-20",
                "counterparty_id": customer,
                "items": [{"description": "Payment received", "quantity": "1", "unit_price": "2100.48"}]
            })),
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status(), 201);
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], "Completed");
    let id = body["data"]["id"].as_str().unwrap();

    assert_eq!(set_status(&app, &cookie, id, "Draft").await.status(), 400);
}

#[tokio::test]
async fn delete_removes_document_and_items() {
    let app = TestApp::new().await;
    let cookie = app.admin().await;
    let customer = app.seed_counterparty("ACME", CounterpartyKind::Customer).await;
    let created = create_invoice(&app, &cookie, customer).await;
    let uri = format!("/api/v1/documents/{}", created["id"].as_str().unwrap());

    assert_eq!(app.request(Method::DELETE, &uri, None, Some(&cookie)).await.status(), 204);
    assert_eq!(app.request(Method::GET, &uri, None, Some(&cookie)).await.status(), 404);
    assert_eq!(app.request(Method::DELETE, &uri, None, Some(&cookie)).await.status(), 404);

    let items = document_item::Entity::find()
        .count(app.state.db.as_ref())
        .await
        .unwrap();
    assert_eq!(items, 0);
}

#[tokio::test]
async fn failed_item_insert_rolls_back_the_whole_document() {
    let app = TestApp::new().await;
    let customer = app.seed_counterparty("ACME", CounterpartyKind::Customer).await;
    let admin_id = app.user_id(common::ADMIN_EMAIL).await;
    let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();

    // Bypasses request validation so the quantity check constraint fires mid-write
    let writer = DocumentWriter::new(app.state.db.clone());
    let result = writer
        .create(NewDocument {
            kind: DocumentKind::Invoice,
            document_date: date,
            due_date: None,
            counterparty_id: customer,
            asset_id: None,
            reference: None,
            currency: "THB".to_string(),
            notes: None,
            total_amount: None,
            created_by: admin_id,
            items: vec![
                NewLineItem {
                    description: "Valid line".to_string(),
                    quantity: dec!(1),
                    unit_price: dec!(100),
                },
                NewLineItem {
                    description: "Broken line".to_string(),
                    quantity: dec!(0),
                    unit_price: dec!(100),
                },
            ],
        })
        .await;
    assert!(matches!(result, Err(ServiceError::TransactionFailed(_))), "{:?}", result);

    let db = app.state.db.as_ref();
    assert_eq!(document::Entity::find().count(db).await.unwrap(), 0);
    assert_eq!(document_item::Entity::find().count(db).await.unwrap(), 0);

    let preview = app
        .state
        .numbering_service()
        .preview(DocumentKind::Invoice, date)
        .await
        .unwrap();
    assert_eq!(preview, "INV-202403-0001");
}

#[tokio::test]
async fn counterparty_role_must_match_the_kind() {
    let app = TestApp::new().await;
    let cookie = app.admin().await;
    let customer = app.seed_counterparty("ACME", CounterpartyKind::Customer).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/documents",
            Some(json!({
                "kind": "PurchaseOrder",
                "document_date": "2024-03-15",
                "counterparty_id": customer,
                "items": [{"description": "Tyres", "quantity": "4", "unit_price": "3200"}]
            })),
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status(), 400);

    let missing = app
        .request(
            Method::POST,
            "/api/v1/documents",
            Some(json!({
                "kind": "Invoice",
                "document_date": "2024-03-15",
                "counterparty_id": Uuid::new_v4(),
                "items": [{"description": "Tyres", "quantity": "4", "unit_price": "3200"}]
            })),
            Some(&cookie),
        )
        .await;
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn invalid_lines_are_rejected_before_numbering() {
    let app = TestApp::new().await;
    let cookie = app.admin().await;
    let customer = app.seed_counterparty("ACME", CounterpartyKind::Customer).await;

    for items in [
        json!([{"description": "Zero", "quantity": "0", "unit_price": "10"}]),
        json!([{"description": "Negative", "quantity": "1", "unit_price": "-10"}]),
        json!([{"description": "", "quantity": "1", "unit_price": "10"}]),
    ] {
        let response = app
            .request(
                Method::POST,
                "/api/v1/documents",
                Some(json!({
                    "kind": "Invoice",
                    "document_date": "2024-03-15",
                    "counterparty_id": customer,
                    "items": items
                })),
                Some(&cookie),
            )
            .await;
        assert_eq!(response.status(), 400);
        let body = response_json(response).await;
        assert_eq!(body["error"], "Bad Request");
    }

    let first = create_invoice(&app, &cookie, customer).await;
    assert_eq!(first["number"], "INV-202403-0001");
}

#[tokio::test]
async fn list_filters_by_kind() {
    let app = TestApp::new().await;
    let cookie = app.admin().await;
    let customer = app.seed_counterparty("ACME", CounterpartyKind::Both).await;

    create_invoice(&app, &cookie, customer).await;
    create_invoice(&app, &cookie, customer).await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/documents",
            Some(json!({
                "kind": "PurchaseRequest",
                "document_date": "2024-03-15",
                "counterparty_id": customer,
                "items": [{"description": "Spare parts", "quantity": "1", "unit_price": "80"}]
            })),
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status(), 201);

    let listed = app
        .request(Method::GET, "/api/v1/documents?kind=Invoice", None, Some(&cookie))
        .await;
    assert_eq!(listed.status(), 200);
    let body = response_json(listed).await;
    assert_eq!(body["data"]["total"], 2);
    let numbers: Vec<&str> = body["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["number"].as_str().unwrap())
        .collect();
    assert!(numbers.iter().all(|n| n.starts_with("INV-")));

    let all = response_json(
        app.request(Method::GET, "/api/v1/documents", None, Some(&cookie))
            .await,
    )
    .await;
    assert_eq!(all["data"]["total"], 3);

    let hits = response_json(
        app.request(Method::GET, "/api/v1/search/documents?q=PR-2024", None, Some(&cookie))
            .await,
    )
    .await;
    let hits = hits["data"].as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["number"], "PR-202403-0001");
}

#[tokio::test]
async fn sub_cent_line_amounts_are_kept_exactly() {
    let app = TestApp::new().await;
    let cookie = app.admin().await;
    let customer = app.seed_counterparty("ACME", CounterpartyKind::Customer).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/documents",
            Some(json!({
                "kind": "Invoice",
                "document_date": "2024-03-15",
                "counterparty_id": customer,
                "items": [
                    {"description": "Filter", "quantity": "1.5", "unit_price": "199.99"},
                    {"description": "Washer", "quantity": "0.5", "unit_price": "0.01"}
                ]
            })),
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status(), 201);
    let body = response_json(response).await;
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(decimal(&items[0]["line_total"]), dec!(299.985));
    assert_eq!(decimal(&items[1]["line_total"]), dec!(0.005));
    assert_eq!(decimal(&body["data"]["total_amount"]), dec!(299.99));

    let sub_cent_price = app
        .request(
            Method::POST,
            "/api/v1/documents",
            Some(json!({
                "kind": "Invoice",
                "document_date": "2024-03-15",
                "counterparty_id": customer,
                "items": [{"description": "Rounding", "quantity": "1", "unit_price": "0.005"}]
            })),
            Some(&cookie),
        )
        .await;
    assert_eq!(sub_cent_price.status(), 400);
}

#[tokio::test]
async fn unknown_asset_is_rejected_and_nothing_is_written() {
    let app = TestApp::new().await;
    let cookie = app.admin().await;
    let customer = app.seed_counterparty("ACME", CounterpartyKind::Customer).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/documents",
            Some(json!({
                "kind": "RepairTicket",
                "document_date": "2024-03-15",
                "counterparty_id": customer,
                "asset_id": Uuid::new_v4(),
                "items": [{"description": "Inspection", "quantity": "1", "unit_price": "500"}]
            })),
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status(), 404);
    assert_eq!(
        document::Entity::find().count(app.state.db.as_ref()).await.unwrap(),
        0
    );
}
