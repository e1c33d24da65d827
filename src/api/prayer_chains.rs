//! Prayer chain endpoints
//!
//! All routes require pastor-level access. Schedule writes are collision
//! checked by the service; conflicts come back as 400 with `details`.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde_json::json;

use crate::api::extractors::PastorUser;
use crate::app::AppState;
use crate::error::AppResult;
use crate::models::prayer_chain::{
    CollisionReport, CreatePrayerChainRequest, PrayerChainResponse, PrayerSchedule,
    ScheduleCheckRequest, ScheduleSlot, UpdatePrayerChainRequest, UpdateScheduleRequest, Weekday,
};
use crate::models::system_log::AuditAction;
use crate::services::audit_service::AuditEntry;

const CHAINS: &str = "prayer_chains";
const SCHEDULES: &str = "prayer_schedules";

pub fn create_prayer_chain_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_chains).post(create_chain))
        .route("/check", post(check_schedules))
        .route("/:id", get(get_chain).put(update_chain).delete(delete_chain))
        .route("/:id/schedules", post(add_schedule))
        .route("/:id/summary", get(chain_summary))
        .route("/schedules/:id", put(update_schedule).delete(delete_schedule))
}

pub async fn list_chains(
    State(state): State<AppState>,
    _pastor: PastorUser,
) -> AppResult<Json<Vec<PrayerChainResponse>>> {
    Ok(Json(state.prayer_chains.list().await?))
}

pub async fn get_chain(
    State(state): State<AppState>,
    _pastor: PastorUser,
    Path(chain_id): Path<i64>,
) -> AppResult<Json<PrayerChainResponse>> {
    Ok(Json(state.prayer_chains.get(chain_id).await?))
}

/// Create the family's chain, or append to the one it already has.
/// Answers 201 for a new chain and 200 for an append.
pub async fn create_chain(
    State(state): State<AppState>,
    PastorUser(pastor): PastorUser,
    Json(request): Json<CreatePrayerChainRequest>,
) -> AppResult<(StatusCode, Json<PrayerChainResponse>)> {
    let (chain, created) = state
        .prayer_chains
        .create_or_add(request.family_id, &request.schedules)
        .await?;

    let (action, description) = if created {
        (AuditAction::Create, format!("Created prayer chain for {}", chain.family_name))
    } else {
        (AuditAction::Update, format!("Added prayer schedules for {}", chain.family_name))
    };
    let entry = AuditEntry::new(action, CHAINS, description)
        .record(chain.id)
        .details(json!({
            "family_id": chain.family_id,
            "schedules_added": request.schedules.len(),
        }));
    state.audit.record(&pastor.user, &pastor.client, entry).await;

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(chain)))
}

pub async fn update_chain(
    State(state): State<AppState>,
    PastorUser(pastor): PastorUser,
    Path(chain_id): Path<i64>,
    Json(request): Json<UpdatePrayerChainRequest>,
) -> AppResult<Json<PrayerChainResponse>> {
    let chain = state.prayer_chains.update(chain_id, request.family_id).await?;

    let entry = AuditEntry::new(
        AuditAction::Update,
        CHAINS,
        format!("Assigned prayer chain to {}", chain.family_name),
    )
    .record(chain.id)
    .details(json!({ "family_id": chain.family_id }));
    state.audit.record(&pastor.user, &pastor.client, entry).await;

    Ok(Json(chain))
}

pub async fn delete_chain(
    State(state): State<AppState>,
    PastorUser(pastor): PastorUser,
    Path(chain_id): Path<i64>,
) -> AppResult<StatusCode> {
    let family_id = state.prayer_chains.family_of(chain_id).await?;
    state.prayer_chains.delete(chain_id).await?;

    let entry = AuditEntry::new(AuditAction::Delete, CHAINS, "Deleted prayer chain")
        .record(chain_id)
        .details(json!({ "family_id": family_id }));
    state.audit.record(&pastor.user, &pastor.client, entry).await;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_schedule(
    State(state): State<AppState>,
    PastorUser(pastor): PastorUser,
    Path(chain_id): Path<i64>,
    Json(slot): Json<ScheduleSlot>,
) -> AppResult<(StatusCode, Json<PrayerSchedule>)> {
    let schedule = state.prayer_chains.add_schedule(chain_id, slot).await?;

    let entry = AuditEntry::new(AuditAction::Create, SCHEDULES, "Added prayer schedule")
        .record(schedule.id)
        .details(schedule_details(&schedule));
    state.audit.record(&pastor.user, &pastor.client, entry).await;

    Ok((StatusCode::CREATED, Json(schedule)))
}

pub async fn update_schedule(
    State(state): State<AppState>,
    PastorUser(pastor): PastorUser,
    Path(schedule_id): Path<i64>,
    Json(request): Json<UpdateScheduleRequest>,
) -> AppResult<Json<PrayerSchedule>> {
    let schedule = state.prayer_chains.update_schedule(schedule_id, &request).await?;

    let entry = AuditEntry::new(AuditAction::Update, SCHEDULES, "Updated prayer schedule")
        .record(schedule.id)
        .details(schedule_details(&schedule));
    state.audit.record(&pastor.user, &pastor.client, entry).await;

    Ok(Json(schedule))
}

pub async fn delete_schedule(
    State(state): State<AppState>,
    PastorUser(pastor): PastorUser,
    Path(schedule_id): Path<i64>,
) -> AppResult<StatusCode> {
    let chain_id = state.prayer_chains.delete_schedule(schedule_id).await?;

    let entry = AuditEntry::new(AuditAction::Delete, SCHEDULES, "Deleted prayer schedule")
        .record(schedule_id)
        .details(json!({ "prayer_chain_id": chain_id }));
    state.audit.record(&pastor.user, &pastor.client, entry).await;

    Ok(StatusCode::NO_CONTENT)
}

/// Dry run; nothing is written
pub async fn check_schedules(
    State(state): State<AppState>,
    _pastor: PastorUser,
    Json(request): Json<ScheduleCheckRequest>,
) -> AppResult<Json<CollisionReport>> {
    let report = state
        .prayer_chains
        .check(request.prayer_chain_id, &request.schedules)
        .await?;
    Ok(Json(report))
}

pub async fn chain_summary(
    State(state): State<AppState>,
    _pastor: PastorUser,
    Path(chain_id): Path<i64>,
) -> AppResult<Json<BTreeMap<Weekday, Vec<String>>>> {
    Ok(Json(state.prayer_chains.summary(chain_id).await?))
}

fn schedule_details(schedule: &PrayerSchedule) -> serde_json::Value {
    json!({
        "prayer_chain_id": schedule.prayer_chain_id,
        "day": schedule.day,
        "start_time": schedule.start_time.format("%H:%M").to_string(),
        "end_time": schedule.end_time.format("%H:%M").to_string(),
    })
}
