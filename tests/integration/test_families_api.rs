//! Families, members, activities, BCC, announcements and dashboards

use axum::http::StatusCode;
use serde_json::{json, Value};

use crate::common::{authorized, TestApp};

async fn add_member(app: &TestApp, token: &str, name: &str, phone: &str, gender: &str, dob: &str) -> Value {
    let response = authorized(app.server.post("/api/family-members"), token)
        .json(&json!({
            "name": name,
            "phone": phone,
            "gender": gender,
            "date_of_birth": dob,
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED, "{}", response.text());
    response.json()
}

#[tokio::test]
async fn test_family_crud_is_admin_only() {
    let app = TestApp::new().await;
    let father = app.father_of("Bethel").await;

    let response = authorized(app.server.post("/api/families"), &father.token)
        .json(&json!({ "category": "Mature", "name": "Canaan" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = authorized(app.server.post("/api/families"), &app.admin_token)
        .json(&json!({ "category": "Mature", "name": "Canaan" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);

    let response = authorized(app.server.post("/api/families"), &app.admin_token)
        .json(&json!({ "category": "Mature", "name": "Canaan" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);

    // Parents only see their own family
    let families: Value = authorized(app.server.get("/api/families"), &father.token)
        .await
        .json();
    let families = families.as_array().unwrap();
    assert_eq!(families.len(), 1);
    assert_eq!(families[0]["name"], "Bethel");
    assert_eq!(families[0]["pere_name"], "pere.bethel");

    let all: Value = authorized(app.server.get("/api/families"), &app.admin_token)
        .await
        .json();
    assert_eq!(all.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_members_are_scoped_to_the_parents_family() {
    let app = TestApp::new().await;
    let bethel = app.father_of("Bethel").await;
    let zion = app.father_of("Zion").await;

    let member = add_member(&app, &bethel.token, "Grace", "0788111222", "Female", "2010-01-15").await;
    assert_eq!(member["age"], 15);
    assert_eq!(member["family_id"], bethel.family_id.unwrap());

    // Age follows the clock
    app.clock.advance_days(365);
    let reread: Value = authorized(
        app.server.get(&format!("/api/family-members/{}", member["id"])),
        &bethel.token,
    )
    .await
    .json();
    assert_eq!(reread["age"], 16);

    // Same name twice in one family
    let response = authorized(app.server.post("/api/family-members"), &bethel.token)
        .json(&json!({ "name": "grace", "phone": "0788111333" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);

    // Another family's parent can neither read nor edit it
    let member_id = member["id"].as_i64().unwrap();
    let response = authorized(
        app.server.get(&format!("/api/family-members/{}", member_id)),
        &zion.token,
    )
    .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = authorized(
        app.server.put(&format!("/api/family-members/{}", member_id)),
        &zion.token,
    )
    .json(&json!({ "name": "Hijacked" }))
    .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    // A birth date in the future is rejected
    let response = authorized(app.server.post("/api/family-members"), &bethel.token)
        .json(&json!({ "name": "Future", "phone": "0788111444", "date_of_birth": "2030-01-01" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_activity_type_must_match_category() {
    let app = TestApp::new().await;
    let father = app.father_of("Bethel").await;

    let response = authorized(app.server.post("/api/activities"), &father.token)
        .json(&json!({
            "date": "2025-06-25",
            "status": "Planned",
            "category": "Spiritual",
            "activity_type": "Weddings",
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = authorized(app.server.post("/api/activities"), &father.token)
        .json(&json!({
            "date": "2025-06-25",
            "status": "Planned",
            "category": "Spiritual",
            "activity_type": "Overnights",
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);

    let activities: Value = authorized(
        app.server.get(&format!("/api/activities/family/{}", father.family_id.unwrap())),
        &father.token,
    )
    .await
    .json();
    assert_eq!(activities.as_array().unwrap().len(), 1);

    let stats: Value = authorized(
        app.server.get(&format!("/api/dashboard/family/{}/stats", father.family_id.unwrap())),
        &father.token,
    )
    .await
    .json();
    assert_eq!(stats["activities_by_status"]["planned"], 1);
    assert_eq!(stats["upcoming_activities"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_bcc_progress_recorded_by_youth_committee() {
    let app = TestApp::new().await;
    let father = app.father_of("Bethel").await;
    let leader = app
        .create_user("leader@church.org", "Other", None, Some("Youth Leader"))
        .await;

    let member = add_member(&app, &father.token, "Grace", "0788111222", "Female", "2009-03-01").await;
    let member_id = member["id"].as_i64().unwrap();

    // Parents are not on the youth committee
    let response = authorized(
        app.server.post(&format!("/api/bcc/members/{}/classes", member_id)),
        &father.token,
    )
    .json(&json!({ "class_number": 1 }))
    .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    for class_number in [1, 2, 2] {
        let response = authorized(
            app.server.post(&format!("/api/bcc/members/{}/classes", member_id)),
            &leader.token,
        )
        .json(&json!({ "class_number": class_number }))
        .await;
        assert_eq!(response.status_code(), StatusCode::OK);
    }

    let response = authorized(
        app.server.post(&format!("/api/bcc/members/{}/classes", member_id)),
        &leader.token,
    )
    .json(&json!({ "class_number": 8 }))
    .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let progress: Value = authorized(
        app.server.get(&format!("/api/bcc/members/{}/progress", member_id)),
        &father.token,
    )
    .await
    .json();
    assert_eq!(progress["completed_classes"], json!([1, 2]));
    assert_eq!(progress["completion_percent"], 28.6);
    assert_eq!(progress["is_complete"], false);

    let incomplete: Value = authorized(app.server.get("/api/bcc/incomplete"), &leader.token)
        .await
        .json();
    assert_eq!(incomplete.as_array().unwrap().len(), 1);
    assert_eq!(incomplete[0]["family_name"], "Bethel");
}

#[tokio::test]
async fn test_church_overview_for_pastors() {
    let app = TestApp::new().await;
    let pastor = app.pastor().await;
    let father = app.father_of("Bethel").await;
    add_member(&app, &father.token, "Grace", "0788111222", "Female", "2011-02-01").await;
    add_member(&app, &father.token, "Daniel", "0788111333", "Male", "2005-09-10").await;

    let response = authorized(app.server.get("/api/dashboard/church-overview"), &father.token).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = authorized(app.server.get("/api/dashboard/church-overview"), &pastor.token).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let overview: Value = response.json();
    assert_eq!(overview["overall_stats"]["total_youth"], 2);
    assert_eq!(overview["overall_stats"]["total_families"], 1);
    assert_eq!(overview["overall_stats"]["male_ratio"], 50.0);
    assert_eq!(overview["monthly_progress"].as_array().unwrap().len(), 6);
    assert_eq!(overview["department_data"][0]["name"], "Bethel");
}

#[tokio::test]
async fn test_announcement_views_and_ownership() {
    let app = TestApp::new().await;
    let father = app.father_of("Bethel").await;
    let other = app.father_of("Zion").await;

    let response = authorized(app.server.post("/api/announcements"), &father.token)
        .json(&json!({ "title": "Youth camp", "content": "Registration opens Monday" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let created: Value = response.json();
    assert_eq!(created["announcement_type"], "announcement");
    let id = created["id"].as_i64().unwrap();

    for token in [&father.token, &other.token, &other.token] {
        authorized(app.server.get(&format!("/api/announcements/{}", id)), token).await;
    }
    let viewed: Value = authorized(app.server.get(&format!("/api/announcements/{}", id)), &father.token)
        .await
        .json();
    assert_eq!(viewed["view_count"], 2);

    let response = authorized(app.server.delete(&format!("/api/announcements/{}", id)), &other.token).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = authorized(app.server.delete(&format!("/api/announcements/{}", id)), &father.token).await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);
}
