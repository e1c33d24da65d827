//! Family Activity Service

use std::sync::Arc;

use sqlx::{query, query_as, SqliteConnection, SqlitePool};

use crate::error::{AppError, AppResult};
use crate::models::activity::{
    ActivityCategory, CreateActivityRequest, FamilyActivity, UpdateActivityRequest,
};
use crate::models::user::User;
use crate::services::family_service::fetch_family;
use crate::services::time_provider::TimeProvider;
use crate::services::validation::required;

#[derive(Clone)]
pub struct ActivityService {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl ActivityService {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    pub async fn create(&self, actor: &User, request: CreateActivityRequest) -> AppResult<FamilyActivity> {
        let family_id = if actor.is_admin() {
            request
                .family_id
                .ok_or_else(|| AppError::validation_error("family_id is required"))?
        } else if actor.role.is_parent() {
            actor
                .family_id
                .ok_or_else(|| AppError::bad_request("You are not assigned to a family"))?
        } else {
            return Err(AppError::forbidden("Only parents and admins can record activities"));
        };

        let activity_type = required("Activity type", &request.activity_type)?;
        check_type(request.category, &activity_type)?;

        let mut conn = self.pool.acquire().await?;
        fetch_family(&mut conn, family_id).await?;

        let now = self.time_provider.now_utc();
        let id = query(
            "INSERT INTO family_activities (family_id, date, status, category, activity_type, description,
                                            start_time, end_time, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(family_id)
        .bind(request.date)
        .bind(request.status)
        .bind(request.category)
        .bind(&activity_type)
        .bind(&request.description)
        .bind(request.start_time)
        .bind(request.end_time)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

        fetch_activity(&mut conn, id).await
    }

    /// Activities of a family, most recent date first
    pub async fn list_for_family(&self, viewer: &User, family_id: i64) -> AppResult<Vec<FamilyActivity>> {
        if !viewer.can_view_family(family_id) {
            return Err(AppError::access_denied());
        }
        let mut conn = self.pool.acquire().await?;
        fetch_family(&mut conn, family_id).await?;

        let activities = query_as(
            "SELECT * FROM family_activities WHERE family_id = ? ORDER BY date DESC, id DESC",
        )
        .bind(family_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(activities)
    }

    pub async fn get(&self, viewer: &User, activity_id: i64) -> AppResult<FamilyActivity> {
        let mut conn = self.pool.acquire().await?;
        let activity = fetch_activity(&mut conn, activity_id).await?;
        if !viewer.can_view_family(activity.family_id) {
            return Err(AppError::access_denied());
        }
        Ok(activity)
    }

    pub async fn update(
        &self,
        actor: &User,
        activity_id: i64,
        request: UpdateActivityRequest,
    ) -> AppResult<FamilyActivity> {
        let mut conn = self.pool.acquire().await?;
        let activity = fetch_activity(&mut conn, activity_id).await?;
        if !actor.can_manage_family(activity.family_id) {
            return Err(AppError::access_denied());
        }

        let category = request.category.unwrap_or(activity.category);
        let activity_type = match request.activity_type.as_deref() {
            Some(activity_type) => required("Activity type", activity_type)?,
            None => activity.activity_type.clone(),
        };
        check_type(category, &activity_type)?;

        query(
            "UPDATE family_activities SET date = ?, status = ?, category = ?, activity_type = ?,
                                          description = ?, start_time = ?, end_time = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(request.date.unwrap_or(activity.date))
        .bind(request.status.unwrap_or(activity.status))
        .bind(category)
        .bind(&activity_type)
        .bind(request.description.as_ref().or(activity.description.as_ref()))
        .bind(request.start_time.or(activity.start_time))
        .bind(request.end_time.or(activity.end_time))
        .bind(self.time_provider.now_utc())
        .bind(activity_id)
        .execute(&mut *conn)
        .await?;

        fetch_activity(&mut conn, activity_id).await
    }

    pub async fn delete(&self, actor: &User, activity_id: i64) -> AppResult<FamilyActivity> {
        let mut conn = self.pool.acquire().await?;
        let activity = fetch_activity(&mut conn, activity_id).await?;
        if !actor.can_manage_family(activity.family_id) {
            return Err(AppError::access_denied());
        }
        query("DELETE FROM family_activities WHERE id = ?")
            .bind(activity_id)
            .execute(&mut *conn)
            .await?;
        Ok(activity)
    }
}

fn check_type(category: ActivityCategory, activity_type: &str) -> AppResult<()> {
    if !category.allows(activity_type) {
        return Err(AppError::Validation(format!(
            "Activity type '{}' is not valid for category {}. Allowed: {}",
            activity_type,
            category,
            category.allowed_types().join(", ")
        )));
    }
    Ok(())
}

pub(crate) async fn fetch_activity(conn: &mut SqliteConnection, activity_id: i64) -> AppResult<FamilyActivity> {
    query_as("SELECT * FROM family_activities WHERE id = ?")
        .bind(activity_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Activity"))
}
