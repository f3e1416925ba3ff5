//! Upload, download and path protection for stored files.

mod common;

use axum::{
    body::Body,
    http::{header, Method, Request},
    response::Response,
};
use common::{response_bytes, response_json, TestApp, CLERK_EMAIL, VIEWER_EMAIL};
use serde_json::Value;

const BOUNDARY: &str = "bizdesk-test-boundary";

fn multipart_body(area: &str, file_name: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"area\"\r\n\r\n{area}\r\n",
            b = BOUNDARY,
            area = area
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: {ct}\r\n\r\n",
            b = BOUNDARY,
            name = file_name,
            ct = content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

async fn upload(
    app: &TestApp,
    cookie: &str,
    area: &str,
    file_name: &str,
    data: &[u8],
) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/attachments")
        .header(header::COOKIE, cookie)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(
            area,
            file_name,
            "application/pdf",
            data,
        )))
        .unwrap();
    app.send(request).await
}

async fn uploaded(app: &TestApp, cookie: &str, data: &[u8]) -> Value {
    let response = upload(app, cookie, "documents", "quotation.pdf", data).await;
    assert_eq!(response.status(), 201);
    response_json(response).await["data"].clone()
}

#[tokio::test]
async fn upload_stores_file_under_a_random_name() {
    let app = TestApp::new().await;
    let cookie = app.login(CLERK_EMAIL).await;

    let data = b"%PDF-1.4 quotation";
    let summary = uploaded(&app, &cookie, data).await;

    let stored_name = summary["stored_name"].as_str().unwrap();
    assert!(stored_name.ends_with(".pdf"));
    assert_ne!(stored_name, "quotation.pdf");
    assert_eq!(summary["original_name"], "quotation.pdf");
    assert_eq!(summary["size_bytes"], data.len());
    assert_eq!(
        summary["download_url"],
        format!("/api/v1/files/documents/{}", stored_name)
    );

    let on_disk = app
        .state
        .config
        .upload_dir
        .join("documents")
        .join(stored_name);
    assert_eq!(std::fs::read(on_disk).unwrap(), data);
}

#[tokio::test]
async fn download_returns_bytes_with_headers() {
    let app = TestApp::new().await;
    let cookie = app.login(CLERK_EMAIL).await;
    let data = b"%PDF-1.4 receipt scan";
    let summary = uploaded(&app, &cookie, data).await;

    let viewer = app.login(VIEWER_EMAIL).await;
    let response = app
        .request(
            Method::GET,
            summary["download_url"].as_str().unwrap(),
            None,
            Some(&viewer),
        )
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/pdf"
    );
    assert_eq!(
        response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "inline; filename=\"quotation.pdf\""
    );
    assert_eq!(response_bytes(response).await, data);
}

#[tokio::test]
async fn traversal_and_unknown_areas_are_rejected() {
    let app = TestApp::new().await;
    let cookie = app.login(VIEWER_EMAIL).await;

    for uri in [
        "/api/v1/files/documents/..%2F..%2Fbizdesk.db",
        "/api/v1/files/documents/..%2Fassets%2Fx.pdf",
        "/api/v1/files/documents/.hidden",
        "/api/v1/files/documents/%2Fetc%2Fpasswd",
        "/api/v1/files/secrets/report.pdf",
    ] {
        let response = app.request(Method::GET, uri, None, Some(&cookie)).await;
        assert_eq!(response.status(), 400, "{}", uri);
    }

    let missing = app
        .request(
            Method::GET,
            "/api/v1/files/documents/0f0e0d0c0b0a09080706050403020100.pdf",
            None,
            Some(&cookie),
        )
        .await;
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn files_without_metadata_are_not_served() {
    let app = TestApp::new().await;
    let cookie = app.login(VIEWER_EMAIL).await;

    let dir = app.state.config.upload_dir.join("documents");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("planted.txt"), b"not registered").unwrap();

    let response = app
        .request(
            Method::GET,
            "/api/v1/files/documents/planted.txt",
            None,
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn upload_rejects_bad_areas_and_empty_files() {
    let app = TestApp::new().await;
    let cookie = app.login(CLERK_EMAIL).await;

    let unknown = upload(&app, &cookie, "../etc", "a.pdf", b"data").await;
    assert_eq!(unknown.status(), 400);

    let empty = upload(&app, &cookie, "assets", "a.pdf", b"").await;
    assert_eq!(empty.status(), 400);
}

#[tokio::test]
async fn oversized_upload_is_payload_too_large() {
    let app = TestApp::with_config(|cfg| cfg.max_upload_bytes = 1024).await;
    let cookie = app.login(CLERK_EMAIL).await;

    let response = upload(&app, &cookie, "documents", "big.pdf", &[b'x'; 4096]).await;
    assert_eq!(response.status(), 413);

    let dir = app.state.config.upload_dir.join("documents");
    let leftovers = std::fs::read_dir(&dir).map(|d| d.count()).unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn delete_removes_row_and_file() {
    let app = TestApp::new().await;
    let cookie = app.login(CLERK_EMAIL).await;
    let summary = uploaded(&app, &cookie, b"%PDF-1.4 to delete").await;
    let stored_name = summary["stored_name"].as_str().unwrap();
    let on_disk = app
        .state
        .config
        .upload_dir
        .join("documents")
        .join(stored_name);
    assert!(on_disk.exists());

    let uri = format!("/api/v1/attachments/{}", summary["id"].as_str().unwrap());
    assert_eq!(app.request(Method::DELETE, &uri, None, Some(&cookie)).await.status(), 204);
    assert!(!on_disk.exists());
    assert_eq!(app.request(Method::GET, &uri, None, Some(&cookie)).await.status(), 404);

    let download = app
        .request(
            Method::GET,
            summary["download_url"].as_str().unwrap(),
            None,
            Some(&cookie),
        )
        .await;
    assert_eq!(download.status(), 404);
}

#[tokio::test]
async fn viewers_cannot_upload() {
    let app = TestApp::new().await;
    let cookie = app.login(VIEWER_EMAIL).await;

    let response = upload(&app, &cookie, "documents", "quotation.pdf", b"%PDF").await;
    assert_eq!(response.status(), 403);

    let listed = app
        .request(Method::GET, "/api/v1/attachments?area=documents", None, Some(&cookie))
        .await;
    assert_eq!(listed.status(), 200);
    assert!(response_json(listed).await["data"].as_array().unwrap().is_empty());
}
