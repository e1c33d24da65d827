//! Account management endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, put},
    Router,
};
use serde_json::json;

use crate::api::extractors::{AdminUser, CurrentUser};
use crate::app::AppState;
use crate::error::{AppError, AppResult};
use crate::models::system_log::AuditAction;
use crate::models::user::{
    AccessCodeResponse, AdminUpdateUserRequest, CreateUserRequest, CreatedUserResponse,
    UpdateProfileRequest, User,
};
use crate::services::audit_service::AuditEntry;

const TABLE: &str = "users";

pub fn create_user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/me", get(get_me).put(update_me))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
        .route("/:id/access-code", put(reset_access_code))
}

pub async fn create_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(request): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<CreatedUserResponse>)> {
    let created = state.users.create(request).await?;

    let entry = AuditEntry::new(
        AuditAction::Create,
        TABLE,
        format!("Created user {}", created.user.full_name),
    )
    .record(created.user.id)
    .details(json!({ "email": created.user.email, "role": created.user.role }));
    state.audit.record(&admin.user, &admin.client, entry).await;

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_users(State(state): State<AppState>, _admin: AdminUser) -> AppResult<Json<Vec<User>>> {
    Ok(Json(state.users.list().await?))
}

pub async fn get_me(current: CurrentUser) -> Json<User> {
    Json(current.user)
}

pub async fn update_me(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<UpdateProfileRequest>,
) -> AppResult<Json<User>> {
    let password_changed = request.new_password.is_some();
    let user = state.users.update_profile(&current.user, request).await?;

    let entry = AuditEntry::new(AuditAction::Update, TABLE, "Updated own profile")
        .record(user.id)
        .details(json!({ "password_changed": password_changed }));
    state.audit.record(&current.user, &current.client, entry).await;

    Ok(Json(user))
}

/// Admins read any account, everyone else only their own
pub async fn get_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<i64>,
) -> AppResult<Json<User>> {
    if !current.user.is_admin() && current.user.id != user_id {
        return Err(AppError::access_denied());
    }
    Ok(Json(state.users.get(user_id).await?))
}

pub async fn update_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<i64>,
    Json(request): Json<AdminUpdateUserRequest>,
) -> AppResult<Json<User>> {
    let user = state.users.admin_update(user_id, request).await?;

    let entry = AuditEntry::new(AuditAction::Update, TABLE, format!("Updated user {}", user.full_name))
        .record(user.id)
        .details(json!({ "role": user.role, "family_id": user.family_id, "is_active": user.is_active }));
    state.audit.record(&admin.user, &admin.client, entry).await;

    Ok(Json(user))
}

pub async fn reset_access_code(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<i64>,
) -> AppResult<Json<AccessCodeResponse>> {
    let response = state.users.reset_access_code(user_id).await?;

    let entry = AuditEntry::new(AuditAction::Update, TABLE, "Reset access code").record(user_id);
    state.audit.record(&admin.user, &admin.client, entry).await;

    Ok(Json(response))
}

pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<i64>,
) -> AppResult<StatusCode> {
    state.users.delete(&admin.user, user_id).await?;

    let entry = AuditEntry::new(AuditAction::Delete, TABLE, format!("Deleted user {}", user_id)).record(user_id);
    state.audit.record(&admin.user, &admin.client, entry).await;

    Ok(StatusCode::NO_CONTENT)
}
