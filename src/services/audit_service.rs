//! Audit Service
//!
//! Writes and reads the system log. Recording never fails the caller: a
//! failed write is logged and dropped.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde_json::Value;
use sqlx::{query, query_as, query_scalar, QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, warn, Instrument};

use crate::error::{AppError, AppResult};
use crate::models::system_log::{
    ActiveFamily, ActiveUser, AuditAction, NamedCount, SystemLog, SystemLogQuery, SystemLogRow, SystemLogSummary,
};
use crate::models::user::User;
use crate::services::time_provider::TimeProvider;

pub const DEFAULT_QUERY_LIMIT: i64 = 100;
pub const MAX_QUERY_LIMIT: i64 = 1000;
const TOP_N: i64 = 10;

/// Where a request came from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// One audit record before denormalization
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub table_name: &'static str,
    pub record_id: Option<i64>,
    pub description: String,
    pub details: Option<Value>,
}

impl AuditEntry {
    pub fn new(action: AuditAction, table_name: &'static str, description: impl Into<String>) -> Self {
        Self {
            action,
            table_name,
            record_id: None,
            description: description.into(),
            details: None,
        }
    }

    pub fn record(mut self, record_id: i64) -> Self {
        self.record_id = Some(record_id);
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Clone)]
pub struct AuditService {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl AuditService {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self { pool, time_provider }
    }

    /// Record an action by `actor`. Errors are logged, never returned.
    pub async fn record(&self, actor: &User, client: &ClientInfo, entry: AuditEntry) {
        let action = entry.action;
        let table = entry.table_name;
        if let Err(e) = self.try_record(actor, client, entry).await {
            warn!(error = %e, user_id = actor.id, %action, table, "Failed to write audit record");
        }
    }

    async fn try_record(&self, actor: &User, client: &ClientInfo, entry: AuditEntry) -> AppResult<i64> {
        let mut conn = self.pool.acquire().await?;

        let family: Option<(String, String)> = match actor.family_id {
            Some(family_id) => {
                query_as("SELECT name, category FROM families WHERE id = ?")
                    .bind(family_id)
                    .fetch_optional(&mut *conn)
                    .await?
            }
            None => None,
        };
        let (family_name, family_category) = family.unzip();

        let details = entry.details.as_ref().map(serde_json::to_string).transpose()?;

        let id = query(
            "INSERT INTO system_logs (user_id, user_name, family_id, family_name, family_category, action,
                                      description, table_name, record_id, details, ip_address, user_agent, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(actor.id)
        .bind(&actor.full_name)
        .bind(family_name.as_ref().and(actor.family_id))
        .bind(family_name)
        .bind(family_category)
        .bind(entry.action.to_string())
        .bind(&entry.description)
        .bind(entry.table_name)
        .bind(entry.record_id)
        .bind(details)
        .bind(&client.ip_address)
        .bind(&client.user_agent)
        .bind(self.time_provider.now_utc())
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

        debug!(log_id = id, action = %entry.action, table = entry.table_name, "Audit record written");
        Ok(id)
    }

    /// Filtered listing, newest first. Non-admins only see their own records.
    pub async fn query(&self, viewer: &User, filters: &SystemLogQuery) -> AppResult<Vec<SystemLog>> {
        let skip = filters.skip.unwrap_or(0);
        if skip < 0 {
            return Err(AppError::validation_error("skip must be zero or more"));
        }
        let limit = filters.limit.unwrap_or(DEFAULT_QUERY_LIMIT);
        if !(1..=MAX_QUERY_LIMIT).contains(&limit) {
            return Err(AppError::validation_error("limit must be between 1 and 1000"));
        }

        let user_id = if viewer.is_admin() {
            filters.user_id
        } else {
            Some(viewer.id)
        };

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM system_logs WHERE 1 = 1");
        if let Some(user_id) = user_id {
            builder.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(family_id) = filters.family_id {
            builder.push(" AND family_id = ").push_bind(family_id);
        }
        if let Some(action) = non_empty(&filters.action) {
            builder.push(" AND action LIKE ").push_bind(format!("%{}%", action));
        }
        if let Some(table_name) = non_empty(&filters.table_name) {
            builder.push(" AND table_name = ").push_bind(table_name.to_string());
        }
        if let Some(start) = filters.start_date {
            builder.push(" AND created_at >= ").push_bind(start_of_day(start));
        }
        if let Some(end) = filters.end_date {
            builder
                .push(" AND created_at < ")
                .push_bind(start_of_day(end) + Duration::days(1));
        }
        if let Some(search) = non_empty(&filters.search) {
            let pattern = format!("%{}%", search);
            builder
                .push(" AND (description LIKE ")
                .push_bind(pattern.clone())
                .push(" OR user_name LIKE ")
                .push_bind(pattern.clone())
                .push(" OR family_name LIKE ")
                .push_bind(pattern.clone())
                .push(" OR action LIKE ")
                .push_bind(pattern)
                .push(")");
        }
        builder
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(skip);

        let rows = builder.build_query_as::<SystemLogRow>().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(SystemLog::from).collect())
    }

    /// Activity over the last `days` days
    pub async fn summary(&self, days: i64) -> AppResult<SystemLogSummary> {
        if !(1..=365).contains(&days) {
            return Err(AppError::validation_error("days must be between 1 and 365"));
        }
        let since = self.time_provider.now_utc() - Duration::days(days);
        let mut conn = self.pool.acquire().await?;

        let total_actions: i64 = query_scalar("SELECT COUNT(*) FROM system_logs WHERE created_at >= ?")
            .bind(since)
            .fetch_one(&mut *conn)
            .await?;

        let actions_by_type: Vec<NamedCount> = query_as(
            "SELECT action AS name, COUNT(*) AS count FROM system_logs
             WHERE created_at >= ? GROUP BY action ORDER BY count DESC, name",
        )
        .bind(since)
        .fetch_all(&mut *conn)
        .await?;

        let actions_by_table: Vec<NamedCount> = query_as(
            "SELECT table_name AS name, COUNT(*) AS count FROM system_logs
             WHERE created_at >= ? AND table_name IS NOT NULL GROUP BY table_name ORDER BY count DESC, name",
        )
        .bind(since)
        .fetch_all(&mut *conn)
        .await?;

        let most_active_users: Vec<ActiveUser> = query_as(
            "SELECT user_id, MAX(user_name) AS user_name, COUNT(*) AS count FROM system_logs
             WHERE created_at >= ? GROUP BY user_id ORDER BY count DESC, user_id LIMIT ?",
        )
        .bind(since)
        .bind(TOP_N)
        .fetch_all(&mut *conn)
        .await?;

        let most_active_families: Vec<ActiveFamily> = query_as(
            "SELECT family_id, COALESCE(MAX(family_name), '') AS family_name, COUNT(*) AS count FROM system_logs
             WHERE created_at >= ? AND family_id IS NOT NULL GROUP BY family_id ORDER BY count DESC, family_id LIMIT ?",
        )
        .bind(since)
        .bind(TOP_N)
        .fetch_all(&mut *conn)
        .await?;

        let daily_activity: Vec<NamedCount> = query_as(
            "SELECT substr(created_at, 1, 10) AS name, COUNT(*) AS count FROM system_logs
             WHERE created_at >= ? GROUP BY name ORDER BY name",
        )
        .bind(since)
        .fetch_all(&mut *conn)
        .await?;

        Ok(SystemLogSummary {
            period_days: days,
            total_actions,
            actions_by_type,
            actions_by_table,
            most_active_users,
            most_active_families,
            daily_activity,
        })
    }

    /// Delete records older than `days`; 0 keeps everything
    pub async fn purge_older_than(&self, days: u32) -> AppResult<u64> {
        if days == 0 {
            return Ok(0);
        }
        let cutoff = self.time_provider.now_utc() - Duration::days(i64::from(days));
        let span = crate::db_span!("DELETE", "system_logs");
        let result = query("DELETE FROM system_logs WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .instrument(span.clone())
            .await?;
        span.record("rows_affected", result.rows_affected());
        Ok(result.rows_affected())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn start_of_day(date: NaiveDate) -> chrono::DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}
