//! Family Member Model
//!
//! Youth records attached to a family, with BCC participation.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::user::Gender;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FamilyMember {
    pub id: i64,
    pub family_id: i64,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub gender: Option<Gender>,
    pub date_of_birth: Option<NaiveDate>,
    pub home_address: Option<String>,
    pub education_level: Option<String>,
    pub employment_status: Option<String>,
    pub bcc_class_participation: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FamilyMember {
    /// Age in whole years on `today`, if the birth date is known
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        self.date_of_birth.map(|dob| age_on(dob, today))
    }
}

/// Whole years between `date_of_birth` and `today`
pub fn age_on(date_of_birth: NaiveDate, today: NaiveDate) -> u32 {
    let mut years = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        years -= 1;
    }
    u32::try_from(years).unwrap_or(0)
}

#[derive(Debug, Clone, Serialize)]
pub struct FamilyMemberResponse {
    #[serde(flatten)]
    pub member: FamilyMember,
    pub age: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFamilyMemberRequest {
    /// Admins must say which family; parents default to their own
    pub family_id: Option<i64>,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub gender: Option<Gender>,
    pub date_of_birth: Option<NaiveDate>,
    pub home_address: Option<String>,
    pub education_level: Option<String>,
    pub employment_status: Option<String>,
    #[serde(default)]
    pub bcc_class_participation: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateFamilyMemberRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub gender: Option<Gender>,
    pub date_of_birth: Option<NaiveDate>,
    pub home_address: Option<String>,
    pub education_level: Option<String>,
    pub employment_status: Option<String>,
    pub bcc_class_participation: Option<bool>,
}
