//! Announcement Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type, Display)]
#[sqlx(type_name = "text")]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AnnouncementType {
    Important,
    #[default]
    Announcement,
    Event,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Announcement {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub announcement_type: AnnouncementType,
    #[serde(skip_serializing)]
    pub flyer_path: Option<String>,
    pub flyer_filename: Option<String>,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnouncementResponse {
    #[serde(flatten)]
    pub announcement: Announcement,
    pub author_name: Option<String>,
    pub has_flyer: bool,
    pub view_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAnnouncementRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub announcement_type: AnnouncementType,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAnnouncementRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub announcement_type: Option<AnnouncementType>,
}
