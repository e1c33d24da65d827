//! Family Activity Model
//!
//! Spiritual and social activities with a fixed vocabulary of types per category.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum::Display;

use crate::models::prayer_chain::wall_clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Display)]
#[sqlx(type_name = "text")]
pub enum ActivityStatus {
    Planned,
    Ongoing,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Display)]
#[sqlx(type_name = "text")]
pub enum ActivityCategory {
    Spiritual,
    Social,
}

impl ActivityCategory {
    /// Activity types allowed in this category
    pub fn allowed_types(&self) -> &'static [&'static str] {
        match self {
            ActivityCategory::Spiritual => {
                &["Prayer calendars", "Overnights", "Crusades", "Agape events"]
            }
            ActivityCategory::Social => &[
                "Contributions",
                "Illnesses",
                "Bereavements",
                "Weddings",
                "Transfers",
            ],
        }
    }

    pub fn allows(&self, activity_type: &str) -> bool {
        self.allowed_types().contains(&activity_type)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FamilyActivity {
    pub id: i64,
    pub family_id: i64,
    pub date: NaiveDate,
    pub status: ActivityStatus,
    pub category: ActivityCategory,
    pub activity_type: String,
    pub description: Option<String>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateActivityRequest {
    pub family_id: Option<i64>,
    pub date: NaiveDate,
    pub status: ActivityStatus,
    pub category: ActivityCategory,
    pub activity_type: String,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "wall_clock::deserialize_option")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, deserialize_with = "wall_clock::deserialize_option")]
    pub end_time: Option<NaiveTime>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateActivityRequest {
    pub date: Option<NaiveDate>,
    pub status: Option<ActivityStatus>,
    pub category: Option<ActivityCategory>,
    pub activity_type: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "wall_clock::deserialize_option")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, deserialize_with = "wall_clock::deserialize_option")]
    pub end_time: Option<NaiveTime>,
}
