//! Activity Check-in Model
//!
//! A check-in session hands out a public token for one activity. Anyone
//! holding the token can record attendance while the activity's window
//! is open.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum::Display;

use super::user::FamilyCategory;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CheckinSession {
    pub id: i64,
    pub activity_id: i64,
    pub token: String,
    pub is_active: bool,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Session as shown to the family managing the activity
#[derive(Debug, Clone, Serialize)]
pub struct CheckinSessionResponse {
    pub activity_id: i64,
    pub token: String,
    pub checkin_url: String,
    pub is_active: bool,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CheckinStatus {
    NotStarted,
    Open,
    Closed,
}

/// What the public check-in page shows before submitting
#[derive(Debug, Clone, Serialize)]
pub struct CheckinInfo {
    pub activity_id: i64,
    pub family_id: i64,
    pub family_name: String,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub checkin_status: CheckinStatus,
    pub server_time: DateTime<Utc>,
    pub opens_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
    pub seconds_until_open: Option<i64>,
    pub seconds_until_close: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceRequest {
    pub attendee_name: String,
    pub family_of_origin_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Attendance {
    pub id: i64,
    pub activity_id: i64,
    pub attendee_name: String,
    pub family_of_origin_id: Option<i64>,
    pub family_of_origin_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Family picker entry for the public form
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PublicFamily {
    pub id: i64,
    pub name: String,
    pub category: FamilyCategory,
}
