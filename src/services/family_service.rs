//! Family Service

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{query, query_as, SqliteConnection, SqlitePool};

use crate::error::{AppError, AppResult};
use crate::models::activity::FamilyActivity;
use crate::models::family::{CreateFamilyRequest, Family, FamilyResponse, UpdateFamilyRequest};
use crate::models::user::{FamilyCategory, User};
use crate::services::time_provider::TimeProvider;
use crate::services::validation::required;

#[derive(Clone)]
pub struct FamilyService {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl FamilyService {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    /// Families visible to `viewer`: all for pastor level, otherwise their own
    pub async fn list(&self, viewer: &User) -> AppResult<Vec<FamilyResponse>> {
        let mut conn = self.pool.acquire().await?;

        let families: Vec<Family> = if viewer.is_pastor_level() {
            query_as("SELECT * FROM families ORDER BY category, name")
                .fetch_all(&mut *conn)
                .await?
        } else {
            query_as("SELECT * FROM families WHERE id = ?")
                .bind(viewer.family_id)
                .fetch_all(&mut *conn)
                .await?
        };

        let mut responses = Vec::with_capacity(families.len());
        for family in families {
            responses.push(build_response(&mut conn, family).await?);
        }
        Ok(responses)
    }

    pub async fn get(&self, viewer: &User, family_id: i64) -> AppResult<FamilyResponse> {
        let mut conn = self.pool.acquire().await?;
        let family = fetch_family(&mut conn, family_id).await?;
        if !viewer.can_view_family(family.id) {
            return Err(AppError::access_denied());
        }
        build_response(&mut conn, family).await
    }

    pub async fn create(&self, request: CreateFamilyRequest) -> AppResult<Family> {
        let name = required("Family name", &request.name)?;
        let mut conn = self.pool.acquire().await?;

        if find_family(&mut conn, request.category, &name).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "Family '{}' already exists in category {}",
                name, request.category
            )));
        }

        let now = self.time_provider.now_utc();
        insert_family(&mut conn, request.category, &name, now).await
    }

    pub async fn update(&self, family_id: i64, request: UpdateFamilyRequest) -> AppResult<Family> {
        let mut tx = self.pool.begin().await?;
        let family = fetch_family(&mut tx, family_id).await?;

        let category = request.category.unwrap_or(family.category);
        let name = match request.name.as_deref() {
            Some(name) => required("Family name", name)?,
            None => family.name.clone(),
        };

        if let Some(existing) = find_family(&mut tx, category, &name).await? {
            if existing.id != family_id {
                return Err(AppError::Conflict(format!(
                    "Family '{}' already exists in category {}",
                    name, category
                )));
            }
        }

        query("UPDATE families SET category = ?, name = ?, updated_at = ? WHERE id = ?")
            .bind(category)
            .bind(&name)
            .bind(self.time_provider.now_utc())
            .bind(family_id)
            .execute(&mut *tx)
            .await?;

        let updated = fetch_family(&mut tx, family_id).await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Delete a family; members, activities, documents and the prayer chain
    /// go with it, user accounts are detached
    pub async fn delete(&self, family_id: i64) -> AppResult<Family> {
        let mut conn = self.pool.acquire().await?;
        let family = fetch_family(&mut conn, family_id).await?;
        query("DELETE FROM families WHERE id = ?")
            .bind(family_id)
            .execute(&mut *conn)
            .await?;
        Ok(family)
    }

    pub async fn find(&self, family_id: i64) -> AppResult<Family> {
        let mut conn = self.pool.acquire().await?;
        fetch_family(&mut conn, family_id).await
    }
}

pub(crate) async fn fetch_family(conn: &mut SqliteConnection, family_id: i64) -> AppResult<Family> {
    query_as("SELECT * FROM families WHERE id = ?")
        .bind(family_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Family"))
}

async fn find_family(
    conn: &mut SqliteConnection,
    category: FamilyCategory,
    name: &str,
) -> AppResult<Option<Family>> {
    let family = query_as("SELECT * FROM families WHERE category = ? AND name = ?")
        .bind(category)
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(family)
}

async fn insert_family(
    conn: &mut SqliteConnection,
    category: FamilyCategory,
    name: &str,
    now: DateTime<Utc>,
) -> AppResult<Family> {
    let id = query("INSERT INTO families (category, name, created_at, updated_at) VALUES (?, ?, ?, ?)")
        .bind(category)
        .bind(name)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
    fetch_family(conn, id).await
}

/// Look a family up by category and name, creating it when missing
pub(crate) async fn get_or_create_family(
    conn: &mut SqliteConnection,
    category: FamilyCategory,
    name: &str,
    now: DateTime<Utc>,
) -> AppResult<Family> {
    match find_family(conn, category, name).await? {
        Some(family) => Ok(family),
        None => insert_family(conn, category, name, now).await,
    }
}

async fn build_response(conn: &mut SqliteConnection, family: Family) -> AppResult<FamilyResponse> {
    let pere_name: Option<(String,)> = query_as(
        "SELECT full_name FROM users WHERE family_id = ? AND role = 'Père' ORDER BY id LIMIT 1",
    )
    .bind(family.id)
    .fetch_optional(&mut *conn)
    .await?;
    let mere_name: Option<(String,)> = query_as(
        "SELECT full_name FROM users WHERE family_id = ? AND role = 'Mère' ORDER BY id LIMIT 1",
    )
    .bind(family.id)
    .fetch_optional(&mut *conn)
    .await?;

    let members: Vec<(String,)> =
        query_as("SELECT name FROM family_members WHERE family_id = ? ORDER BY name")
            .bind(family.id)
            .fetch_all(&mut *conn)
            .await?;

    let activities: Vec<FamilyActivity> =
        query_as("SELECT * FROM family_activities WHERE family_id = ? ORDER BY date DESC, id DESC")
            .bind(family.id)
            .fetch_all(&mut *conn)
            .await?;
    let last_activity_date = activities.iter().map(|activity| activity.date).max();

    Ok(FamilyResponse {
        id: family.id,
        category: family.category,
        name: family.name,
        pere_name: pere_name.map(|(name,)| name),
        mere_name: mere_name.map(|(name,)| name),
        members: members.into_iter().map(|(name,)| name).collect(),
        activities,
        last_activity_date,
        created_at: family.created_at,
    })
}
