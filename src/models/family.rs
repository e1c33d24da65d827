//! Family Model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::activity::FamilyActivity;
use super::user::FamilyCategory;

/// A household unit grouping members, activities and documents
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Family {
    pub id: i64,
    pub category: FamilyCategory,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFamilyRequest {
    pub category: FamilyCategory,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateFamilyRequest {
    pub category: Option<FamilyCategory>,
    pub name: Option<String>,
}

/// Family with its parents, member names and activity history
#[derive(Debug, Clone, Serialize)]
pub struct FamilyResponse {
    pub id: i64,
    pub category: FamilyCategory,
    pub name: String,
    pub pere_name: Option<String>,
    pub mere_name: Option<String>,
    pub members: Vec<String>,
    pub activities: Vec<FamilyActivity>,
    pub last_activity_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}
