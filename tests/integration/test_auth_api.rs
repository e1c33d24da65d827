//! Authentication, role gates and account management

use axum::http::StatusCode;
use serde_json::{json, Value};

use crate::common::{authorized, login, TestApp, ADMIN_EMAIL};

#[tokio::test]
async fn test_health_reports_database_and_connections() {
    let app = TestApp::new().await;

    let response = app.server.get("/api/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
    assert_eq!(body["websocket_connections"], 0);
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let app = TestApp::new().await;

    let response = app
        .server
        .post("/api/auth/token")
        .json(&json!({ "email": ADMIN_EMAIL, "password": "wrong-password" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["message"], "Incorrect email or password");

    let response = app
        .server
        .post("/api/auth/token")
        .json(&json!({ "email": "nobody@church.org", "password": "whatever" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_routes_need_a_valid_token() {
    let app = TestApp::new().await;

    let response = app.server.get("/api/users/me").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = authorized(app.server.get("/api/users/me"), "not-a-jwt").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = authorized(app.server.get("/api/users/me"), &app.admin_token).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let me: Value = response.json();
    assert_eq!(me["email"], ADMIN_EMAIL);
    assert_eq!(me["role"], "admin");
    assert!(me.get("hashed_password").is_none());
}

#[tokio::test]
async fn test_access_code_login_and_admin_gate() {
    let app = TestApp::new().await;
    let father = app.father_of("Bethel").await;

    let response = authorized(app.server.get("/api/users"), &father.token).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = authorized(app.server.get("/api/users"), &app.admin_token).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let users: Value = response.json();
    assert_eq!(users.as_array().unwrap().len(), 2);

    // Reading someone else's account is admin only
    let response = authorized(app.server.get("/api/users/1"), &father.token).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_duplicate_email_conflicts() {
    let app = TestApp::new().await;
    app.father_of("Bethel").await;

    let response = authorized(app.server.post("/api/users"), &app.admin_token)
        .json(&json!({
            "full_name": "Another Father",
            "email": "pere.bethel@church.org",
            "phone": "0788000000",
            "gender": "Male",
            "role": "Père",
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_reset_access_code_replaces_password() {
    let app = TestApp::new().await;
    let father = app.father_of("Bethel").await;

    let response = authorized(
        app.server.put(&format!("/api/users/{}/access-code", father.id)),
        &app.admin_token,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    let code = body["access_code"].as_str().unwrap();
    assert_eq!(code.len(), 4);

    let token = login(&app.server, "pere.bethel@church.org", code).await;
    assert!(!token.is_empty());
}

#[tokio::test]
async fn test_admin_cannot_delete_self() {
    let app = TestApp::new().await;
    let me: Value = authorized(app.server.get("/api/users/me"), &app.admin_token)
        .await
        .json();

    let response = authorized(
        app.server.delete(&format!("/api/users/{}", me["id"])),
        &app.admin_token,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_inactive_account_is_refused() {
    let app = TestApp::new().await;
    let father = app.father_of("Bethel").await;

    let response = authorized(
        app.server.put(&format!("/api/users/{}", father.id)),
        &app.admin_token,
    )
    .json(&json!({ "is_active": false }))
    .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response = authorized(app.server.get("/api/users/me"), &father.token).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}
