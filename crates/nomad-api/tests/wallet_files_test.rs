//! Signed download tests.
//!
//! Run with: `cargo test -p nomad-api --test wallet_files_test`

mod helpers;

use axum::http::{header, StatusCode};
use helpers::auth::bearer;
use helpers::{file_form, fixtures, setup_test_app, wallet_form, TestApp, MEMBER};
use serde_json::{json, Value};
use std::time::Duration;

async fn upload_passport(app: &TestApp, pdf: Vec<u8>) -> Value {
    let response = app
        .client()
        .post("/v1/wallet/documents")
        .add_header("Authorization", bearer(MEMBER))
        .multipart(wallet_form(
            pdf,
            "passport.pdf",
            "application/pdf",
            &json!({ "name": "Passport", "documentType": "passport" }),
        ))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json()
}

#[tokio::test]
async fn test_download_wallet_document() {
    let app = setup_test_app().await;
    let pdf = fixtures::pdf(3000);
    let uploaded = upload_passport(&app, pdf.clone()).await;
    let url = uploaded["downloadUrl"].as_str().unwrap();

    // No session: the token is the credential
    let response = app.client().get(url).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.header(header::CONTENT_TYPE), "application/pdf");
    let disposition = response.header(header::CONTENT_DISPOSITION);
    let disposition = disposition.to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\""));
    assert!(disposition.ends_with("_passport.pdf\""));
    assert_eq!(response.header(header::CACHE_CONTROL), "no-store");
    assert_eq!(response.header(header::X_CONTENT_TYPE_OPTIONS), "nosniff");
    assert_eq!(&response.as_bytes()[..], &pdf[..]);
}

#[tokio::test]
async fn test_download_poll_image_is_sniffed() {
    let app = setup_test_app().await;
    let image = fixtures::png();
    let uploaded = app
        .client()
        .post(&format!("/v1/trips/{}/poll-images", app.trip_id))
        .add_header("Authorization", bearer(MEMBER))
        .multipart(file_form(image.clone(), "option.png", "image/png"))
        .await;
    assert_eq!(uploaded.status_code(), StatusCode::CREATED);
    let body: Value = uploaded.json();

    let response = app.client().get(body["imageUrl"].as_str().unwrap()).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.header(header::CONTENT_TYPE), "image/png");
    assert_eq!(&response.as_bytes()[..], &image[..]);
}

#[tokio::test]
async fn test_tampered_token_is_rejected() {
    let app = setup_test_app().await;
    let uploaded = upload_passport(&app, fixtures::pdf(64)).await;
    let url = uploaded["downloadUrl"].as_str().unwrap();

    let mut tampered = url.to_string();
    let last = tampered.pop().unwrap();
    tampered.push(if last == 'A' { 'B' } else { 'A' });

    let response = app.client().get(&tampered).await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error"], "Invalid or expired download link");
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let app = setup_test_app().await;
    let uploaded = upload_passport(&app, fixtures::pdf(64)).await;
    let path = app.documents.documents()[0].file_path.clone();
    assert!(uploaded["downloadUrl"].is_string());

    let url = app.state.url_signer.issue_url(&path, Duration::ZERO).unwrap();
    let response = app.client().get(&url).await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_document_without_row_is_not_served() {
    let app = setup_test_app().await;
    let path = "wallet/personal/user-1/1700000000000000000_orphan.pdf";
    app.storage.insert(path, fixtures::pdf(64));

    let url = app
        .state
        .url_signer
        .issue_url(path, Duration::from_secs(60))
        .unwrap();
    let response = app.client().get(&url).await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"], "document has been deleted or does not exist");
}

#[tokio::test]
async fn test_missing_object_is_not_found() {
    let app = setup_test_app().await;
    let url = app
        .state
        .url_signer
        .issue_url("poll-images/trip/user-1/1_gone.png", Duration::from_secs(60))
        .unwrap();

    let response = app.client().get(&url).await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_blank_token() {
    let app = setup_test_app().await;

    let response = app.client().get("/v1/wallet/files/%20").await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "missing_token");
}

#[tokio::test]
async fn test_health() {
    let app = setup_test_app().await;

    let response = app.client().get("/health").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert!(response.maybe_header("X-Request-ID").is_some());
}
