//! Document uploads and downloads over multipart

use axum::http::{header, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use serde_json::Value;

use crate::common::{authorized, TestApp};

const REPORT_BYTES: &[u8] = b"%PDF-1.4 quarterly family report";

fn report_form(document_type: &str, filename: &str, bytes: &[u8]) -> MultipartForm {
    MultipartForm::new().add_text("document_type", document_type).add_part(
        "file",
        Part::bytes(bytes.to_vec())
            .file_name(filename)
            .mime_type("application/pdf"),
    )
}

#[tokio::test]
async fn test_upload_then_download() {
    let app = TestApp::new().await;
    let father = app.father_of("Bethel").await;

    let response = authorized(app.server.post("/api/documents/upload"), &father.token)
        .multipart(report_form("report", "q2 report.pdf", REPORT_BYTES))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED, "{}", response.text());

    let document: Value = response.json();
    assert_eq!(document["document_type"], "report");
    assert_eq!(document["status"], "pending");
    assert_eq!(document["file_size"], REPORT_BYTES.len());
    assert_eq!(document["family_id"], father.family_id.unwrap());
    assert!(document.get("stored_path").is_none());

    let response = authorized(
        app.server.get(&format!("/api/documents/{}/download", document["id"])),
        &father.token,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.header(header::CONTENT_TYPE), "application/pdf");
    let disposition = response.header(header::CONTENT_DISPOSITION);
    assert!(disposition.to_str().unwrap().starts_with("attachment; filename="));
    assert_eq!(response.as_bytes().as_ref(), REPORT_BYTES);
}

#[tokio::test]
async fn test_upload_rejects_bad_input() {
    let app = TestApp::new().await;
    let father = app.father_of("Bethel").await;

    let response = authorized(app.server.post("/api/documents/upload"), &father.token)
        .multipart(report_form("report", "script.exe", REPORT_BYTES))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = authorized(app.server.post("/api/documents/upload"), &father.token)
        .multipart(report_form("minutes", "notes.pdf", REPORT_BYTES))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = authorized(app.server.post("/api/documents/upload"), &father.token)
        .multipart(MultipartForm::new().add_text("document_type", "letter"))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["message"], "Missing 'file' file");

    let oversized = vec![b'a'; 70 * 1024];
    let response = authorized(app.server.post("/api/documents/upload"), &father.token)
        .multipart(report_form("letter", "long.txt", &oversized))
        .await;
    assert_eq!(response.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_document_visibility() {
    let app = TestApp::new().await;
    let pastor = app.pastor().await;
    let bethel = app.father_of("Bethel").await;
    let zion = app.father_of("Zion").await;

    let document: Value = authorized(app.server.post("/api/documents/upload"), &bethel.token)
        .multipart(report_form("letter", "letter.pdf", REPORT_BYTES))
        .await
        .json();

    // Pastors read but do not upload
    let response = authorized(app.server.post("/api/documents/upload"), &pastor.token)
        .multipart(report_form("letter", "letter.pdf", REPORT_BYTES))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let listed: Value = authorized(
        app.server
            .get("/api/documents")
            .add_query_param("family_id", bethel.family_id.unwrap()),
        &pastor.token,
    )
    .await
    .json();
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let own: Value = authorized(app.server.get("/api/documents"), &zion.token)
        .await
        .json();
    assert!(own.as_array().unwrap().is_empty());

    let response = authorized(
        app.server.get(&format!("/api/documents/{}/download", document["id"])),
        &zion.token,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = authorized(
        app.server.delete(&format!("/api/documents/{}", document["id"])),
        &bethel.token,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);
}
