//! Prayer chain API: collision checks on every write path

use axum::http::StatusCode;
use serde_json::{json, Value};

use crate::common::{authorized, TestApp};

fn slot(day: &str, start: &str, end: &str) -> Value {
    json!({ "day": day, "start_time": start, "end_time": end })
}

#[tokio::test]
async fn test_create_chain_then_append() {
    let app = TestApp::new().await;
    let pastor = app.pastor().await;
    let father = app.father_of("Bethel").await;
    let family_id = father.family_id.unwrap();

    let response = authorized(app.server.post("/api/prayer-chains"), &pastor.token)
        .json(&json!({
            "family_id": family_id,
            "schedules": [slot("Monday", "08:00", "09:00"), slot("Monday", "09:00", "10:00")],
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let chain: Value = response.json();
    assert_eq!(chain["family_name"], "Bethel");
    assert_eq!(chain["schedules"].as_array().unwrap().len(), 2);
    assert_eq!(chain["schedules"][0]["start_time"], "08:00:00");

    // Second call for the same family appends instead of creating
    let response = authorized(app.server.post("/api/prayer-chains"), &pastor.token)
        .json(&json!({
            "family_id": family_id,
            "schedules": [slot("Sunday", "06:00", "07:00")],
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let appended: Value = response.json();
    assert_eq!(appended["id"], chain["id"]);
    assert_eq!(appended["schedules"].as_array().unwrap().len(), 3);
    assert_eq!(appended["family_details"]["pere"]["id"], father.id);
}

#[tokio::test]
async fn test_overlapping_batch_is_rejected() {
    let app = TestApp::new().await;
    let pastor = app.pastor().await;
    let father = app.father_of("Shiloh").await;

    let response = authorized(app.server.post("/api/prayer-chains"), &pastor.token)
        .json(&json!({
            "family_id": father.family_id,
            "schedules": [slot("Tuesday", "08:00", "09:30"), slot("Tuesday", "09:00", "10:00")],
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let body: Value = response.json();
    let message = body["message"].as_str().unwrap();
    assert!(message.starts_with("Schedule conflicts detected: "), "{}", message);
    assert!(message.contains("Tuesday"));
    assert_eq!(body["details"].as_array().unwrap().len(), 1);

    // Nothing was written
    let chains: Value = authorized(app.server.get("/api/prayer-chains"), &pastor.token)
        .await
        .json();
    assert!(chains.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_append_colliding_with_stored_schedule() {
    let app = TestApp::new().await;
    let pastor = app.pastor().await;
    let father = app.father_of("Zion").await;

    authorized(app.server.post("/api/prayer-chains"), &pastor.token)
        .json(&json!({
            "family_id": father.family_id,
            "schedules": [slot("Friday", "18:00", "19:00")],
        }))
        .await;

    let response = authorized(app.server.post("/api/prayer-chains"), &pastor.token)
        .json(&json!({
            "family_id": father.family_id,
            "schedules": [slot("Friday", "18:30", "19:30")],
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("Schedule conflicts with existing schedules: "));
}

#[tokio::test]
async fn test_schedule_update_ignores_itself() {
    let app = TestApp::new().await;
    let pastor = app.pastor().await;
    let father = app.father_of("Hebron").await;

    let chain: Value = authorized(app.server.post("/api/prayer-chains"), &pastor.token)
        .json(&json!({
            "family_id": father.family_id,
            "schedules": [slot("Monday", "08:00", "09:00"), slot("Monday", "12:00", "13:00")],
        }))
        .await
        .json();
    let first_id = chain["schedules"][0]["id"].as_i64().unwrap();

    // Growing a window over its own old range is fine
    let response = authorized(
        app.server.put(&format!("/api/prayer-chains/schedules/{}", first_id)),
        &pastor.token,
    )
    .json(&json!({ "end_time": "10:00" }))
    .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let updated: Value = response.json();
    assert_eq!(updated["end_time"], "10:00:00");

    // Reaching into the other schedule is not
    let response = authorized(
        app.server.put(&format!("/api/prayer-chains/schedules/{}", first_id)),
        &pastor.token,
    )
    .json(&json!({ "end_time": "12:30" }))
    .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("Schedule conflicts detected: "));

    let response = authorized(app.server.put("/api/prayer-chains/schedules/9999"), &pastor.token)
        .json(&json!({ "end_time": "12:30" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["message"], "Schedule not found");

    let response = authorized(
        app.server.put(&format!("/api/prayer-chains/schedules/{}", first_id)),
        &pastor.token,
    )
    .json(&json!({ "start_time": "11:00", "end_time": "10:00" }))
    .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["message"], "Start time must be before end time");
}

#[tokio::test]
async fn test_check_is_a_dry_run() {
    let app = TestApp::new().await;
    let pastor = app.pastor().await;

    let response = authorized(app.server.post("/api/prayer-chains/check"), &pastor.token)
        .json(&json!({
            "schedules": [
                slot("Monday", "08:00", "09:00"),
                slot("Monday", "08:30", "09:30"),
                slot("Wednesday", "08:00", "09:00"),
            ],
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let report: Value = response.json();
    assert_eq!(report["has_collision"], true);
    assert_eq!(report["conflicting_schedules"].as_array().unwrap().len(), 2);
    assert_eq!(report["valid_schedules"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_summary_and_delete() {
    let app = TestApp::new().await;
    let pastor = app.pastor().await;
    let father = app.father_of("Salem").await;

    let chain: Value = authorized(app.server.post("/api/prayer-chains"), &pastor.token)
        .json(&json!({
            "family_id": father.family_id,
            "schedules": [slot("Sunday", "06:00", "07:00"), slot("Monday", "20:00", "21:00")],
        }))
        .await
        .json();
    let chain_id = chain["id"].as_i64().unwrap();

    let summary: Value = authorized(
        app.server.get(&format!("/api/prayer-chains/{}/summary", chain_id)),
        &pastor.token,
    )
    .await
    .json();
    assert_eq!(summary["Monday"], json!(["20:00 - 21:00"]));
    assert_eq!(summary["Sunday"], json!(["06:00 - 07:00"]));

    let response = authorized(
        app.server.delete(&format!("/api/prayer-chains/{}", chain_id)),
        &pastor.token,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

    let response = authorized(
        app.server.get(&format!("/api/prayer-chains/{}", chain_id)),
        &pastor.token,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_parents_cannot_manage_chains() {
    let app = TestApp::new().await;
    let father = app.father_of("Bethany").await;

    let response = authorized(app.server.post("/api/prayer-chains"), &father.token)
        .json(&json!({
            "family_id": father.family_id,
            "schedules": [slot("Monday", "08:00", "09:00")],
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = app.server.get("/api/prayer-chains").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}
