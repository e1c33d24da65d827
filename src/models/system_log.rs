//! System Log Model
//!
//! Audit records of user actions against named database tables.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    View,
    Login,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemLog {
    pub id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub family_id: Option<i64>,
    pub family_name: Option<String>,
    pub family_category: Option<String>,
    pub action: String,
    pub description: String,
    pub table_name: Option<String>,
    pub record_id: Option<i64>,
    pub details: Option<Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Stored form of a `SystemLog`; `details` is JSON text
#[derive(Debug, Clone, FromRow)]
pub struct SystemLogRow {
    pub id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub family_id: Option<i64>,
    pub family_name: Option<String>,
    pub family_category: Option<String>,
    pub action: String,
    pub description: String,
    pub table_name: Option<String>,
    pub record_id: Option<i64>,
    pub details: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<SystemLogRow> for SystemLog {
    fn from(row: SystemLogRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            user_name: row.user_name,
            family_id: row.family_id,
            family_name: row.family_name,
            family_category: row.family_category,
            action: row.action,
            description: row.description,
            table_name: row.table_name,
            record_id: row.record_id,
            details: row
                .details
                .and_then(|raw| serde_json::from_str(&raw).ok()),
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            created_at: row.created_at,
        }
    }
}

/// Filters for listing audit records
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SystemLogQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub user_id: Option<i64>,
    pub family_id: Option<i64>,
    pub action: Option<String>,
    pub table_name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryQuery {
    #[serde(default = "default_summary_days")]
    pub days: i64,
}

impl Default for SummaryQuery {
    fn default() -> Self {
        Self {
            days: default_summary_days(),
        }
    }
}

fn default_summary_days() -> i64 {
    30
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NamedCount {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ActiveUser {
    pub user_id: i64,
    pub user_name: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ActiveFamily {
    pub family_id: i64,
    pub family_name: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemLogSummary {
    pub period_days: i64,
    pub total_actions: i64,
    pub actions_by_type: Vec<NamedCount>,
    pub actions_by_table: Vec<NamedCount>,
    pub most_active_users: Vec<ActiveUser>,
    pub most_active_families: Vec<ActiveFamily>,
    pub daily_activity: Vec<NamedCount>,
}
