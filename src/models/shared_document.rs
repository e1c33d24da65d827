//! Shared Document Model
//!
//! Church-wide files any member can upload. Public documents are visible to
//! everyone signed in; private ones only to their uploader.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SharedDocument {
    pub id: i64,
    pub name: String,
    pub original_filename: String,
    #[serde(skip_serializing)]
    pub stored_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub description: Option<String>,
    pub uploaded_by: Option<i64>,
    pub is_public: bool,
    pub downloads: i64,
    pub uploaded_at: DateTime<Utc>,
}

/// Listing filters. `search` matches name or description, `mime_type` is a prefix.
#[derive(Debug, Clone, Deserialize)]
pub struct SharedDocumentQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
    pub search: Option<String>,
    pub mime_type: Option<String>,
    pub uploaded_by: Option<i64>,
}

impl Default for SharedDocumentQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
            search: None,
            mime_type: None,
            uploaded_by: None,
        }
    }
}

impl SharedDocumentQuery {
    pub fn limit(&self) -> i64 {
        self.per_page.clamp(1, 100)
    }

    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.limit())
    }
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    20
}

#[derive(Debug, Clone, Serialize)]
pub struct SharedDocumentList {
    pub documents: Vec<SharedDocument>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSharedDocumentRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SharedDocumentStats {
    pub total_documents: i64,
    pub total_downloads: i64,
    /// Uploads in the last seven days
    pub recent_uploads: i64,
    pub types: BTreeMap<String, i64>,
}
