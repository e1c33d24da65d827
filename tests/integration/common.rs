//! Shared setup for the HTTP integration tests
//!
//! Every test gets its own in-memory database, upload directory and clock.

use std::sync::Arc;

use axum::http::{header, HeaderValue, StatusCode};
use axum_test::{TestRequest, TestServer};
use church_office::app::{build_app, AppState};
use church_office::config::Config;
use church_office::services::time_provider::MockTimeProvider;
use serde_json::{json, Value};
use tempfile::TempDir;

pub const ADMIN_EMAIL: &str = "admin@church.org";
pub const ADMIN_PASSWORD: &str = "admin-secret";

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub clock: Arc<MockTimeProvider>,
    pub admin_token: String,
    _uploads: TempDir,
}

/// A logged-in account created through the API
pub struct TestUser {
    pub id: i64,
    pub family_id: Option<i64>,
    pub token: String,
}

pub fn test_config(uploads: &TempDir) -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        upload_dir: uploads.path().to_path_buf(),
        max_upload_bytes: 64 * 1024,
        password_hash_iterations: 1_000,
        cors_origins: Vec::new(),
        admin_email: Some(ADMIN_EMAIL.to_string()),
        admin_password: Some(ADMIN_PASSWORD.to_string()),
        ..Config::default()
    }
}

impl TestApp {
    pub async fn new() -> Self {
        let uploads = tempfile::tempdir().unwrap();
        let clock = Arc::new(MockTimeProvider::at(2025, 6, 20, 9, 0, 0).unwrap());
        let state = AppState::initialize(test_config(&uploads), clock.clone())
            .await
            .unwrap();
        let server = TestServer::new(build_app(state.clone())).unwrap();
        let admin_token = login(&server, ADMIN_EMAIL, ADMIN_PASSWORD).await;

        Self {
            server,
            state,
            clock,
            admin_token,
            _uploads: uploads,
        }
    }

    /// Create an account as admin and log in with its access code.
    /// `family` is `(category, name)`; the family is created on first use.
    pub async fn create_user(
        &self,
        email: &str,
        role: &str,
        family: Option<(&str, &str)>,
        family_role: Option<&str>,
    ) -> TestUser {
        let mut body = json!({
            "full_name": email.split('@').next().unwrap_or(email),
            "email": email,
            "phone": "0788123456",
            "gender": "Male",
            "role": role,
            "family_role": family_role,
        });
        if let Some((category, name)) = family {
            body["family_category"] = json!(category);
            body["family_name"] = json!(name);
        }

        let response = authorized(self.server.post("/api/users"), &self.admin_token)
            .json(&body)
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED, "{}", response.text());

        let created: Value = response.json();
        let access_code = created["access_code"].as_str().unwrap().to_string();
        let token = login(&self.server, email, &access_code).await;

        TestUser {
            id: created["user"]["id"].as_i64().unwrap(),
            family_id: created["user"]["family_id"].as_i64(),
            token,
        }
    }

    pub async fn pastor(&self) -> TestUser {
        self.create_user("pastor@church.org", "church_pastor", None, None)
            .await
    }

    pub async fn father_of(&self, family_name: &str) -> TestUser {
        let email = format!("pere.{}@church.org", family_name.to_lowercase());
        self.create_user(&email, "Père", Some(("Young", family_name)), None)
            .await
    }
}

pub async fn login(server: &TestServer, email: &str, password: &str) -> String {
    let response = server
        .post("/api/auth/token")
        .json(&json!({ "email": email, "password": password }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK, "{}", response.text());

    let body: Value = response.json();
    assert_eq!(body["token_type"], "bearer");
    body["access_token"].as_str().unwrap().to_string()
}

pub fn authorized(request: TestRequest, token: &str) -> TestRequest {
    let value = HeaderValue::from_str(&format!("Bearer {}", token)).unwrap();
    request.add_header(header::AUTHORIZATION, value)
}
