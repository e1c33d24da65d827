//! Prayer Chain Service
//!
//! Stores weekly prayer schedules per family. Every write that adds or moves
//! a schedule runs the collision checker against the chain's stored
//! schedules inside the same transaction as the insert or update.

use std::collections::BTreeMap;
use std::sync::Arc;

use sqlx::{query, query_as, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::logging::log_schedule_collision;
use crate::models::prayer_chain::{
    CollisionReport, FamilyDetails, FamilyMemberInfo, PersistedSlot, PrayerChain,
    PrayerChainResponse, PrayerSchedule, ScheduleSlot, UpdateScheduleRequest, Weekday,
};
use crate::models::user::Role;
use crate::services::family_service::fetch_family;
use crate::services::schedule_checker::{check_against_persisted, schedule_summary, validate_batch};
use crate::services::time_provider::TimeProvider;

const CONFLICT_DETECTED: &str = "Schedule conflicts detected";
const EXISTING_CONFLICT: &str = "Schedule conflicts with existing schedules";

/// Prayer chain persistence and collision-checked writes
#[derive(Clone)]
pub struct PrayerChainService {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl PrayerChainService {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    /// All chains with family details and sorted schedules
    pub async fn list(&self) -> AppResult<Vec<PrayerChainResponse>> {
        let mut conn = self.pool.acquire().await?;
        let chains: Vec<PrayerChain> = query_as("SELECT * FROM prayer_chains ORDER BY id")
            .fetch_all(&mut *conn)
            .await?;

        let mut responses = Vec::with_capacity(chains.len());
        for chain in chains {
            responses.push(build_response(&mut conn, chain).await?);
        }
        Ok(responses)
    }

    pub async fn get(&self, chain_id: i64) -> AppResult<PrayerChainResponse> {
        let mut conn = self.pool.acquire().await?;
        let chain = fetch_chain(&mut conn, chain_id).await?;
        build_response(&mut conn, chain).await
    }

    /// Create a chain for the family, or append to its existing chain.
    ///
    /// Returns the chain and whether it was newly created.
    pub async fn create_or_add(
        &self,
        family_id: i64,
        slots: &[ScheduleSlot],
    ) -> AppResult<(PrayerChainResponse, bool)> {
        let mut tx = self.pool.begin().await?;

        fetch_family(&mut tx, family_id).await?;

        if slots.is_empty() {
            return Err(AppError::bad_request("At least one schedule is required"));
        }

        let batch = validate_batch(slots);
        if batch.has_collision {
            log_schedule_collision(None, Some(family_id), batch.details());
            return Err(conflict(CONFLICT_DETECTED, batch));
        }

        let now = self.time_provider.now_utc();
        let existing: Option<PrayerChain> =
            query_as("SELECT * FROM prayer_chains WHERE family_id = ?")
                .bind(family_id)
                .fetch_optional(&mut *tx)
                .await?;

        let (chain_id, created) = match existing {
            Some(chain) => {
                let stored = load_persisted(&mut tx, chain.id).await?;
                let report = check_against_persisted(slots, &stored, None);
                if report.has_collision {
                    log_schedule_collision(Some(chain.id), Some(family_id), report.details());
                    return Err(conflict(EXISTING_CONFLICT, report));
                }

                query("UPDATE prayer_chains SET updated_at = ? WHERE id = ?")
                    .bind(now)
                    .bind(chain.id)
                    .execute(&mut *tx)
                    .await?;
                (chain.id, false)
            }
            None => {
                let id = query(
                    "INSERT INTO prayer_chains (family_id, created_at, updated_at) VALUES (?, ?, ?)",
                )
                .bind(family_id)
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await?
                .last_insert_rowid();
                (id, true)
            }
        };

        for slot in slots {
            insert_schedule(&mut tx, chain_id, slot, now).await?;
        }

        let chain = fetch_chain(&mut tx, chain_id).await?;
        let response = build_response(&mut tx, chain).await?;
        tx.commit().await?;

        info!(
            prayer_chain_id = chain_id,
            family_id,
            schedules_added = slots.len(),
            created,
            "Prayer schedules saved"
        );
        Ok((response, created))
    }

    /// Reassign a chain to another family
    pub async fn update(&self, chain_id: i64, family_id: Option<i64>) -> AppResult<PrayerChainResponse> {
        let mut tx = self.pool.begin().await?;
        let chain = fetch_chain(&mut tx, chain_id).await?;

        if let Some(family_id) = family_id.filter(|id| *id != chain.family_id) {
            let family = fetch_family(&mut tx, family_id).await?;

            let (taken,): (i64,) =
                query_as("SELECT COUNT(*) FROM prayer_chains WHERE family_id = ? AND id != ?")
                    .bind(family_id)
                    .bind(chain_id)
                    .fetch_one(&mut *tx)
                    .await?;
            if taken > 0 {
                return Err(AppError::BadRequest(format!(
                    "Family '{}' already has a prayer chain assigned",
                    family.name
                )));
            }

            query("UPDATE prayer_chains SET family_id = ?, updated_at = ? WHERE id = ?")
                .bind(family_id)
                .bind(self.time_provider.now_utc())
                .bind(chain_id)
                .execute(&mut *tx)
                .await?;
        }

        let chain = fetch_chain(&mut tx, chain_id).await?;
        let response = build_response(&mut tx, chain).await?;
        tx.commit().await?;
        Ok(response)
    }

    /// Delete a chain together with its schedules
    pub async fn delete(&self, chain_id: i64) -> AppResult<()> {
        let result = query("DELETE FROM prayer_chains WHERE id = ?")
            .bind(chain_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Prayer chain"));
        }
        debug!(prayer_chain_id = chain_id, "Prayer chain deleted");
        Ok(())
    }

    pub async fn add_schedule(&self, chain_id: i64, slot: ScheduleSlot) -> AppResult<PrayerSchedule> {
        let mut tx = self.pool.begin().await?;
        let chain = fetch_chain(&mut tx, chain_id).await?;

        if !slot.is_well_formed() {
            return Err(AppError::bad_request("Start time must be before end time"));
        }

        let stored = load_persisted(&mut tx, chain_id).await?;
        let report = check_against_persisted(&[slot], &stored, None);
        if report.has_collision {
            log_schedule_collision(Some(chain_id), Some(chain.family_id), report.details());
            return Err(conflict(CONFLICT_DETECTED, report));
        }

        let now = self.time_provider.now_utc();
        let schedule_id = insert_schedule(&mut tx, chain_id, &slot, now).await?;
        touch_chain(&mut tx, chain_id, now).await?;
        let schedule = fetch_schedule(&mut tx, schedule_id).await?;
        tx.commit().await?;
        Ok(schedule)
    }

    /// Partially update one schedule. The merged window is checked against
    /// the rest of the chain, never against itself.
    pub async fn update_schedule(
        &self,
        schedule_id: i64,
        changes: &UpdateScheduleRequest,
    ) -> AppResult<PrayerSchedule> {
        let mut tx = self.pool.begin().await?;
        let current = fetch_schedule(&mut tx, schedule_id).await?;

        let merged = ScheduleSlot::new(
            changes.day.unwrap_or(current.day),
            changes.start_time.unwrap_or(current.start_time),
            changes.end_time.unwrap_or(current.end_time),
        );
        if !merged.is_well_formed() {
            return Err(AppError::bad_request("Start time must be before end time"));
        }

        if changes.touches_window() {
            let stored = load_persisted(&mut tx, current.prayer_chain_id).await?;
            let report = check_against_persisted(&[merged], &stored, Some(schedule_id));
            if report.has_collision {
                log_schedule_collision(Some(current.prayer_chain_id), None, report.details());
                return Err(conflict(CONFLICT_DETECTED, report));
            }
        }

        let now = self.time_provider.now_utc();
        query(
            "UPDATE prayer_schedules SET day = ?, start_time = ?, end_time = ?, updated_at = ? WHERE id = ?",
        )
        .bind(merged.day)
        .bind(merged.start_time)
        .bind(merged.end_time)
        .bind(now)
        .bind(schedule_id)
        .execute(&mut *tx)
        .await?;
        touch_chain(&mut tx, current.prayer_chain_id, now).await?;

        let schedule = fetch_schedule(&mut tx, schedule_id).await?;
        tx.commit().await?;
        Ok(schedule)
    }

    /// Returns the id of the chain the schedule belonged to
    pub async fn delete_schedule(&self, schedule_id: i64) -> AppResult<i64> {
        let mut tx = self.pool.begin().await?;
        let schedule = fetch_schedule(&mut tx, schedule_id).await?;
        query("DELETE FROM prayer_schedules WHERE id = ?")
            .bind(schedule_id)
            .execute(&mut *tx)
            .await?;
        touch_chain(&mut tx, schedule.prayer_chain_id, self.time_provider.now_utc()).await?;
        tx.commit().await?;
        Ok(schedule.prayer_chain_id)
    }

    /// Dry-run collision check; nothing is written
    pub async fn check(&self, chain_id: Option<i64>, slots: &[ScheduleSlot]) -> AppResult<CollisionReport> {
        match chain_id {
            Some(chain_id) => {
                let mut conn = self.pool.acquire().await?;
                fetch_chain(&mut conn, chain_id).await?;
                let stored = load_persisted(&mut conn, chain_id).await?;
                Ok(check_against_persisted(slots, &stored, None))
            }
            None => Ok(validate_batch(slots)),
        }
    }

    /// Human readable ranges per weekday
    pub async fn summary(&self, chain_id: i64) -> AppResult<BTreeMap<Weekday, Vec<String>>> {
        let mut conn = self.pool.acquire().await?;
        fetch_chain(&mut conn, chain_id).await?;
        let slots: Vec<ScheduleSlot> = load_schedules(&mut conn, chain_id)
            .await?
            .iter()
            .map(|schedule| ScheduleSlot::new(schedule.day, schedule.start_time, schedule.end_time))
            .collect();
        Ok(schedule_summary(&slots))
    }

    /// Family id of a chain, for audit records
    pub async fn family_of(&self, chain_id: i64) -> AppResult<i64> {
        let mut conn = self.pool.acquire().await?;
        Ok(fetch_chain(&mut conn, chain_id).await?.family_id)
    }
}

fn conflict(prefix: &str, report: CollisionReport) -> AppError {
    AppError::schedule_conflict(prefix, report.collision_details.unwrap_or_default())
}

async fn fetch_chain(conn: &mut SqliteConnection, chain_id: i64) -> AppResult<PrayerChain> {
    query_as("SELECT * FROM prayer_chains WHERE id = ?")
        .bind(chain_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Prayer chain"))
}

async fn fetch_schedule(conn: &mut SqliteConnection, schedule_id: i64) -> AppResult<PrayerSchedule> {
    query_as("SELECT * FROM prayer_schedules WHERE id = ?")
        .bind(schedule_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Schedule"))
}

/// Schedules of a chain, sorted by weekday then start time
async fn load_schedules(conn: &mut SqliteConnection, chain_id: i64) -> AppResult<Vec<PrayerSchedule>> {
    let mut schedules: Vec<PrayerSchedule> =
        query_as("SELECT * FROM prayer_schedules WHERE prayer_chain_id = ? ORDER BY id")
            .bind(chain_id)
            .fetch_all(&mut *conn)
            .await?;
    schedules.sort_by_key(|schedule| (schedule.day, schedule.start_time));
    Ok(schedules)
}

async fn load_persisted(conn: &mut SqliteConnection, chain_id: i64) -> AppResult<Vec<PersistedSlot>> {
    let slots = query_as(
        "SELECT id, day, start_time, end_time FROM prayer_schedules WHERE prayer_chain_id = ?",
    )
    .bind(chain_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(slots)
}

async fn insert_schedule(
    conn: &mut SqliteConnection,
    chain_id: i64,
    slot: &ScheduleSlot,
    now: chrono::DateTime<chrono::Utc>,
) -> AppResult<i64> {
    let id = query(
        "INSERT INTO prayer_schedules (prayer_chain_id, day, start_time, end_time, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(chain_id)
    .bind(slot.day)
    .bind(slot.start_time)
    .bind(slot.end_time)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();
    Ok(id)
}

async fn touch_chain(
    conn: &mut SqliteConnection,
    chain_id: i64,
    now: chrono::DateTime<chrono::Utc>,
) -> AppResult<()> {
    query("UPDATE prayer_chains SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(chain_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn build_response(conn: &mut SqliteConnection, chain: PrayerChain) -> AppResult<PrayerChainResponse> {
    let family = fetch_family(conn, chain.family_id).await?;
    let members: Vec<FamilyMemberInfo> = query_as(
        "SELECT id, full_name, email, gender, phone, role, other, profile_pic, biography
         FROM users WHERE family_id = ? ORDER BY id",
    )
    .bind(family.id)
    .fetch_all(&mut *conn)
    .await?;

    let pere = members.iter().find(|member| member.role == Role::Pere).cloned();
    let mere = members.iter().find(|member| member.role == Role::Mere).cloned();
    let schedules = load_schedules(conn, chain.id).await?;

    Ok(PrayerChainResponse {
        id: chain.id,
        family_id: family.id,
        family_name: family.name.clone(),
        family_details: FamilyDetails {
            id: family.id,
            category: family.category,
            name: family.name,
            pere,
            mere,
            members,
        },
        schedules,
        created_at: chain.created_at,
        updated_at: chain.updated_at,
    })
}
