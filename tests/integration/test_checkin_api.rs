//! Activity check-in links and public attendance

use axum::http::StatusCode;
use serde_json::{json, Value};

use crate::common::{authorized, TestApp, TestUser};

async fn morning_activity(app: &TestApp, father: &TestUser) -> i64 {
    let response = authorized(app.server.post("/api/activities"), &father.token)
        .json(&json!({
            "date": "2025-06-20",
            "status": "Planned",
            "category": "Spiritual",
            "activity_type": "Overnights",
            "start_time": "10:00",
            "end_time": "12:00",
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED, "{}", response.text());
    let activity: Value = response.json();
    assert_eq!(activity["start_time"], "10:00:00");
    activity["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_attendance_through_the_public_link() {
    let app = TestApp::new().await;
    let father = app.father_of("Bethel").await;
    let activity_id = morning_activity(&app, &father).await;

    let response = authorized(
        app.server.post(&format!("/api/activities/{}/checkin", activity_id)),
        &father.token,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::OK, "{}", response.text());
    let session: Value = response.json();
    let token = session["token"].as_str().unwrap().to_string();
    assert_eq!(token.len(), 64);
    assert_eq!(
        session["checkin_url"],
        format!("http://localhost:8080/checkin/{}", token)
    );

    // 09:00, an hour before the start
    let info: Value = app
        .server
        .get(&format!("/api/public/activity-checkin/{}", token))
        .await
        .json();
    assert_eq!(info["checkin_status"], "not_started");
    assert_eq!(info["family_name"], "Bethel");
    assert_eq!(info["seconds_until_open"], 3600);

    let attend = format!("/api/public/activity-checkin/{}/attend", token);
    let response = app.server.post(&attend).json(&json!({ "attendee_name": "Grace" })).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    app.clock.advance(chrono::Duration::hours(2));
    let families: Value = app.server.get("/api/public/families").await.json();
    let bethel_id = families[0]["id"].as_i64().unwrap();
    let response = app
        .server
        .post(&attend)
        .json(&json!({ "attendee_name": " Grace ", "family_of_origin_id": bethel_id }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED, "{}", response.text());
    let attendance: Value = response.json();
    assert_eq!(attendance["attendee_name"], "Grace");
    assert_eq!(attendance["family_of_origin_name"], "Bethel");

    let listed: Value = authorized(
        app.server.get(&format!("/api/activities/{}/attendances", activity_id)),
        &father.token,
    )
    .await
    .json();
    assert_eq!(listed.as_array().unwrap().len(), 1);

    // Closing the session kills the link but keeps the token
    let response = authorized(
        app.server.delete(&format!("/api/activities/{}/checkin", activity_id)),
        &father.token,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let response = app.server.get(&format!("/api/public/activity-checkin/{}", token)).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let reopened: Value = authorized(
        app.server.post(&format!("/api/activities/{}/checkin", activity_id)),
        &father.token,
    )
    .await
    .json();
    assert_eq!(reopened["token"], token.as_str());
    assert_eq!(reopened["is_active"], true);
}

#[tokio::test]
async fn test_checkin_sessions_belong_to_the_family() {
    let app = TestApp::new().await;
    let bethel = app.father_of("Bethel").await;
    let zion = app.father_of("Zion").await;
    let activity_id = morning_activity(&app, &bethel).await;

    let response = authorized(
        app.server.post(&format!("/api/activities/{}/checkin", activity_id)),
        &zion.token,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = authorized(
        app.server.get(&format!("/api/activities/{}/checkin", activity_id)),
        &bethel.token,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let response = app.server.get("/api/public/activity-checkin/not-a-token").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["message"], "Invalid or inactive check-in token");
}
