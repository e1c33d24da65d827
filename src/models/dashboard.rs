//! Dashboard Model
//!
//! Aggregated views for the church overview and per-family statistics.

use chrono::NaiveDate;
use serde::Serialize;

use super::activity::FamilyActivity;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverallStats {
    pub total_youth: i64,
    pub total_families: i64,
    pub male_ratio: f64,
    pub female_ratio: f64,
    pub bcc_completion: f64,
    pub program_implementation: f64,
    pub active_programs: i64,
    pub pending_approvals: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentData {
    pub name: String,
    pub youth: i64,
    pub completion: f64,
    pub implementation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenderSlice {
    pub name: String,
    /// Percent of members with a recorded gender
    pub value: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyProgress {
    pub month: String,
    pub implementation: f64,
    pub bcc: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeBucket {
    pub range: String,
    pub count: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChurchOverview {
    pub overall_stats: OverallStats,
    pub department_data: Vec<DepartmentData>,
    pub gender_distribution: Vec<GenderSlice>,
    pub monthly_progress: Vec<MonthlyProgress>,
    pub age_distribution: Vec<AgeBucket>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActivityStatusCounts {
    pub planned: i64,
    pub ongoing: i64,
    pub completed: i64,
    pub cancelled: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FamilyStats {
    pub family_id: i64,
    pub family_name: String,
    pub total_members: i64,
    pub male_members: i64,
    pub female_members: i64,
    pub bcc_completed: i64,
    pub bcc_completion: f64,
    pub activities_by_status: ActivityStatusCounts,
    pub upcoming_activities: Vec<FamilyActivity>,
    pub documents_count: i64,
    pub generated_on: NaiveDate,
}
