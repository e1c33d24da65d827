//! BCC Model
//!
//! The seven-class completion program tracked per family member.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::user::FamilyCategory;

/// Class numbers of the program, in order
pub const BCC_CLASSES: [i64; 7] = [1, 2, 3, 4, 5, 6, 7];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BccClassCompletion {
    pub id: i64,
    pub member_id: i64,
    pub class_number: i64,
    pub recorded_by_user_id: Option<i64>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordCompletionRequest {
    pub class_number: i64,
}

/// Completed and missing classes for one member
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BccProgress {
    pub completed_classes: Vec<i64>,
    pub missing_classes: Vec<i64>,
    pub is_complete: bool,
    pub completion_percent: f64,
}

impl BccProgress {
    /// Compute progress from the participation flag and recorded class numbers.
    /// The flag marks the whole program as done regardless of records.
    pub fn compute(participation: bool, recorded: &[i64]) -> Self {
        if participation {
            return Self {
                completed_classes: BCC_CLASSES.to_vec(),
                missing_classes: Vec::new(),
                is_complete: true,
                completion_percent: 100.0,
            };
        }

        let completed: Vec<i64> = BCC_CLASSES
            .iter()
            .copied()
            .filter(|class| recorded.contains(class))
            .collect();
        let missing: Vec<i64> = BCC_CLASSES
            .iter()
            .copied()
            .filter(|class| !recorded.contains(class))
            .collect();

        let percent = completed.len() as f64 / BCC_CLASSES.len() as f64 * 100.0;

        Self {
            is_complete: missing.is_empty(),
            completion_percent: round1(percent),
            completed_classes: completed,
            missing_classes: missing,
        }
    }
}

/// Round to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Serialize)]
pub struct BccMemberProgress {
    pub member_id: i64,
    pub member_name: String,
    pub family_id: i64,
    #[serde(flatten)]
    pub progress: BccProgress,
}

#[derive(Debug, Clone, Serialize)]
pub struct BccIncompleteMember {
    pub member_id: i64,
    pub member_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub family_id: i64,
    pub family_name: String,
    pub family_category: FamilyCategory,
    pub completed_classes: Vec<i64>,
    pub missing_classes: Vec<i64>,
    pub completion_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BccFamilyStatus {
    pub family_id: i64,
    pub is_complete: bool,
    pub incomplete_members: Vec<BccMemberProgress>,
}
