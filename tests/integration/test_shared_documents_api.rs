//! Church-wide shared documents

use axum::http::{header, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use serde_json::{json, Value};

use crate::common::{authorized, TestApp};

const SLIDES: &[u8] = b"sermon slides";

fn shared_form(filename: &str, is_public: &str) -> MultipartForm {
    MultipartForm::new()
        .add_text("description", "Sunday service")
        .add_text("is_public", is_public)
        .add_part("file", Part::bytes(SLIDES.to_vec()).file_name(filename))
}

#[tokio::test]
async fn test_shared_upload_listing_and_download() {
    let app = TestApp::new().await;
    let father = app.father_of("Bethel").await;
    let other = app.father_of("Zion").await;

    let response = authorized(app.server.post("/api/shared-documents/upload"), &father.token)
        .multipart(shared_form("sermon.pptx", "true"))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED, "{}", response.text());
    let public: Value = response.json();
    assert_eq!(public["name"], "sermon.pptx");
    assert_eq!(public["downloads"], 0);
    assert!(public.get("stored_path").is_none());

    let response = authorized(app.server.post("/api/shared-documents/upload"), &father.token)
        .multipart(shared_form("draft.docx", "false"))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let private: Value = response.json();

    let listed: Value = authorized(app.server.get("/api/shared-documents?search=sermon"), &other.token)
        .await
        .json();
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["total_pages"], 1);

    let response = authorized(
        app.server.get(&format!("/api/shared-documents/{}", private["id"])),
        &other.token,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = authorized(
        app.server.get(&format!("/api/shared-documents/{}/download", public["id"])),
        &other.token,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(
        response.header(header::CONTENT_TYPE),
        "application/vnd.openxmlformats-officedocument.presentationml.presentation"
    );
    assert_eq!(response.as_bytes().as_ref(), SLIDES);

    let stats: Value = authorized(app.server.get("/api/shared-documents/stats"), &other.token)
        .await
        .json();
    assert_eq!(stats["total_documents"], 2);
    assert_eq!(stats["total_downloads"], 1);
    assert_eq!(stats["recent_uploads"], 2);
}

#[tokio::test]
async fn test_only_the_uploader_manages_a_shared_document() {
    let app = TestApp::new().await;
    let father = app.father_of("Bethel").await;
    let other = app.father_of("Zion").await;

    let created: Value = authorized(app.server.post("/api/shared-documents/upload"), &father.token)
        .multipart(shared_form("hymns.pdf", "true"))
        .await
        .json();
    let path = format!("/api/shared-documents/{}", created["id"]);

    let response = authorized(app.server.put(&path), &other.token)
        .json(&json!({ "name": "Renamed" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["message"], "Not authorized to update this document");

    let updated: Value = authorized(app.server.put(&path), &father.token)
        .json(&json!({ "name": "Hymn book", "is_public": false }))
        .await
        .json();
    assert_eq!(updated["name"], "Hymn book");
    assert_eq!(updated["is_public"], false);

    let response = authorized(app.server.delete(&path), &other.token).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = authorized(app.server.delete(&path), &father.token).await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);
    let response = authorized(app.server.get(&path), &father.token).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let response = authorized(app.server.post("/api/shared-documents/upload"), &father.token)
        .multipart(shared_form("setup.exe", "true"))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}
