//! Family Document Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Display, EnumString)]
#[sqlx(type_name = "text")]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DocumentType {
    Report,
    Letter,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FamilyDocument {
    pub id: i64,
    pub family_id: i64,
    pub document_type: DocumentType,
    pub original_filename: String,
    #[serde(skip_serializing)]
    pub stored_path: String,
    pub file_size: i64,
    pub checksum: String,
    pub status: String,
    pub uploaded_by: Option<i64>,
    pub uploaded_at: DateTime<Utc>,
}

/// Query for listing documents; pastor-level users may pick the family
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentListQuery {
    pub family_id: Option<i64>,
}
