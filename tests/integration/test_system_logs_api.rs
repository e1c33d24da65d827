//! Audit trail written by the handlers and read back through /system-logs

use axum::http::{HeaderName, HeaderValue, StatusCode};
use serde_json::{json, Value};

use crate::common::{authorized, TestApp};

#[tokio::test]
async fn test_writes_are_audited() {
    let app = TestApp::new().await;
    let pastor = app.pastor().await;
    let father = app.father_of("Bethel").await;

    let response = authorized(app.server.post("/api/prayer-chains"), &pastor.token)
        .add_header(
            HeaderName::from_static("x-forwarded-for"),
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        )
        .json(&json!({
            "family_id": father.family_id,
            "schedules": [{ "day": "Monday", "start_time": "08:00", "end_time": "09:00" }],
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);

    let logs: Value = authorized(
        app.server
            .get("/api/system-logs")
            .add_query_param("table_name", "prayer_chains"),
        &app.admin_token,
    )
    .await
    .json();
    let logs = logs.as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["action"], "CREATE");
    assert_eq!(logs[0]["user_id"], pastor.id);
    assert_eq!(logs[0]["ip_address"], "203.0.113.7");

    let logins: Value = authorized(
        app.server.get("/api/system-logs").add_query_param("action", "LOGIN"),
        &app.admin_token,
    )
    .await
    .json();
    // Admin, pastor and father each logged in once
    assert_eq!(logins.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_non_admins_see_only_their_own_entries() {
    let app = TestApp::new().await;
    let father = app.father_of("Bethel").await;

    let logs: Value = authorized(
        app.server.get("/api/system-logs").add_query_param("user_id", 1),
        &father.token,
    )
    .await
    .json();
    let logs = logs.as_array().unwrap();
    assert!(!logs.is_empty());
    assert!(logs.iter().all(|log| log["user_id"] == father.id));
    assert_eq!(logs[0]["family_name"], "Bethel");

    let response = authorized(
        app.server.get("/api/system-logs").add_query_param("limit", 0),
        &father.token,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_summary_is_admin_only() {
    let app = TestApp::new().await;
    let father = app.father_of("Bethel").await;

    let response = authorized(app.server.get("/api/system-logs/summary"), &father.token).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = authorized(app.server.get("/api/system-logs/summary"), &app.admin_token).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let summary: Value = response.json();
    assert_eq!(summary["period_days"], 30);
    // Admin login, father's account creation and father's login
    assert_eq!(summary["total_actions"], 3);
    assert_eq!(summary["daily_activity"][0]["name"], "2025-06-20");

    let response = authorized(
        app.server.get("/api/system-logs/summary").add_query_param("days", 400),
        &app.admin_token,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}
