//! Dashboard Service
//!
//! Church-wide and per-family aggregates. Calendar boundaries (months,
//! "today", ages) are taken in the configured timezone.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use sqlx::{query_as, query_scalar, SqliteConnection, SqlitePool};

use crate::error::{AppError, AppResult};
use crate::models::activity::{ActivityStatus, FamilyActivity};
use crate::models::dashboard::{
    ActivityStatusCounts, AgeBucket, ChurchOverview, DepartmentData, FamilyStats, GenderSlice, MonthlyProgress,
    OverallStats,
};
use crate::models::family_member::age_on;
use crate::models::user::{Gender, User};
use crate::services::family_service::fetch_family;
use crate::services::time_provider::TimeProvider;

const MONTHS_OF_PROGRESS: u32 = 6;
const TOP_DEPARTMENTS: i64 = 10;
const UPCOMING_LIMIT: i64 = 5;

/// `part / whole` as a percentage rounded to one decimal, 0 when `whole` is 0
pub fn percent(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 1000.0).round() / 10.0
}

fn gender_color(gender: Gender) -> &'static str {
    match gender {
        Gender::Male => "#8884d8",
        Gender::Female => "#82ca9d",
    }
}

#[derive(Clone)]
pub struct DashboardService {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
    timezone: Tz,
}

impl DashboardService {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>, timezone: Tz) -> Self {
        Self {
            pool,
            time_provider,
            timezone,
        }
    }

    pub async fn church_overview(&self) -> AppResult<ChurchOverview> {
        let mut conn = self.pool.acquire().await?;
        let today = self.time_provider.today_in(self.timezone);

        let genders = gender_counts(&mut conn, None).await?;
        let overall_stats = self.overall_stats(&mut conn, &genders).await?;
        let with_gender: i64 = genders.iter().map(|(_, count)| count).sum();

        let gender_distribution = genders
            .iter()
            .filter(|(_, count)| *count > 0)
            .map(|(gender, count)| GenderSlice {
                name: gender.to_string(),
                value: percent(*count, with_gender),
                color: gender_color(*gender).to_string(),
            })
            .collect();

        Ok(ChurchOverview {
            overall_stats,
            department_data: department_data(&mut conn).await?,
            gender_distribution,
            monthly_progress: self.monthly_progress(&mut conn, today).await?,
            age_distribution: age_distribution(&mut conn, today).await?,
        })
    }

    async fn overall_stats(&self, conn: &mut SqliteConnection, genders: &[(Gender, i64)]) -> AppResult<OverallStats> {
        let total_youth: i64 = query_scalar("SELECT COUNT(*) FROM family_members")
            .fetch_one(&mut *conn)
            .await?;
        let total_families: i64 = query_scalar("SELECT COUNT(*) FROM families")
            .fetch_one(&mut *conn)
            .await?;
        let bcc_participants: i64 =
            query_scalar("SELECT COUNT(*) FROM family_members WHERE bcc_class_participation = TRUE")
                .fetch_one(&mut *conn)
                .await?;

        let with_gender: i64 = genders.iter().map(|(_, count)| count).sum();
        let count_of = |wanted: Gender| {
            genders
                .iter()
                .find(|(gender, _)| *gender == wanted)
                .map_or(0, |(_, count)| *count)
        };

        let activities = status_counts(conn, None).await?;
        let total_activities = activities.planned + activities.ongoing + activities.completed + activities.cancelled;

        Ok(OverallStats {
            total_youth,
            total_families,
            male_ratio: percent(count_of(Gender::Male), with_gender),
            female_ratio: percent(count_of(Gender::Female), with_gender),
            bcc_completion: percent(bcc_participants, total_youth),
            program_implementation: percent(activities.completed, total_activities),
            active_programs: activities.ongoing,
            pending_approvals: activities.planned,
        })
    }

    /// The last six calendar months, oldest first, ending with the current one
    async fn monthly_progress(&self, conn: &mut SqliteConnection, today: NaiveDate) -> AppResult<Vec<MonthlyProgress>> {
        let current = today.with_day(1).unwrap_or(today);
        let mut progress = Vec::with_capacity(MONTHS_OF_PROGRESS as usize);

        for back in (0..MONTHS_OF_PROGRESS).rev() {
            let Some(first) = current.checked_sub_months(Months::new(back)) else {
                continue;
            };
            let Some(next) = first.checked_add_months(Months::new(1)) else {
                continue;
            };

            let (total, completed): (i64, i64) = query_as(
                "SELECT COUNT(*), COALESCE(SUM(CASE WHEN status = ? THEN 1 ELSE 0 END), 0)
                 FROM family_activities WHERE date >= ? AND date < ?",
            )
            .bind(ActivityStatus::Completed)
            .bind(first)
            .bind(next)
            .fetch_one(&mut *conn)
            .await?;

            let cutoff = self.start_of_day_utc(next);
            let (members, participants): (i64, i64) = query_as(
                "SELECT COUNT(*), COALESCE(SUM(CASE WHEN bcc_class_participation THEN 1 ELSE 0 END), 0)
                 FROM family_members WHERE created_at < ?",
            )
            .bind(cutoff)
            .fetch_one(&mut *conn)
            .await?;

            progress.push(MonthlyProgress {
                month: first.format("%b").to_string(),
                implementation: percent(completed, total),
                bcc: percent(participants, members),
            });
        }
        Ok(progress)
    }

    /// Aggregates for one family. Pastor level, or a parent of that family.
    pub async fn family_stats(&self, viewer: &User, family_id: i64) -> AppResult<FamilyStats> {
        if !viewer.is_pastor_level() && !(viewer.role.is_parent() && viewer.family_id == Some(family_id)) {
            return Err(AppError::access_denied());
        }

        let mut conn = self.pool.acquire().await?;
        let family = fetch_family(&mut conn, family_id).await?;
        let today = self.time_provider.today_in(self.timezone);

        let total_members: i64 = query_scalar("SELECT COUNT(*) FROM family_members WHERE family_id = ?")
            .bind(family_id)
            .fetch_one(&mut *conn)
            .await?;
        let genders = gender_counts(&mut conn, Some(family_id)).await?;
        let count_of = |wanted: Gender| {
            genders
                .iter()
                .find(|(gender, _)| *gender == wanted)
                .map_or(0, |(_, count)| *count)
        };
        let bcc_completed: i64 = query_scalar(
            "SELECT COUNT(*) FROM family_members WHERE family_id = ? AND bcc_class_participation = TRUE",
        )
        .bind(family_id)
        .fetch_one(&mut *conn)
        .await?;

        let upcoming_activities: Vec<FamilyActivity> = query_as(
            "SELECT * FROM family_activities
             WHERE family_id = ? AND date >= ? AND status IN (?, ?)
             ORDER BY date, id LIMIT ?",
        )
        .bind(family_id)
        .bind(today)
        .bind(ActivityStatus::Planned)
        .bind(ActivityStatus::Ongoing)
        .bind(UPCOMING_LIMIT)
        .fetch_all(&mut *conn)
        .await?;

        let documents_count: i64 = query_scalar("SELECT COUNT(*) FROM family_documents WHERE family_id = ?")
            .bind(family_id)
            .fetch_one(&mut *conn)
            .await?;

        Ok(FamilyStats {
            family_id,
            family_name: family.name,
            total_members,
            male_members: count_of(Gender::Male),
            female_members: count_of(Gender::Female),
            bcc_completed,
            bcc_completion: percent(bcc_completed, total_members),
            activities_by_status: status_counts(&mut conn, Some(family_id)).await?,
            upcoming_activities,
            documents_count,
            generated_on: today,
        })
    }

    fn start_of_day_utc(&self, date: NaiveDate) -> DateTime<Utc> {
        let local = date.and_time(NaiveTime::MIN);
        match self.timezone.from_local_datetime(&local).earliest() {
            Some(start) => start.with_timezone(&Utc),
            None => Utc.from_utc_datetime(&local),
        }
    }
}

async fn gender_counts(conn: &mut SqliteConnection, family_id: Option<i64>) -> AppResult<Vec<(Gender, i64)>> {
    Ok(query_as(
        "SELECT gender, COUNT(*) FROM family_members
         WHERE gender IS NOT NULL AND (? IS NULL OR family_id = ?)
         GROUP BY gender ORDER BY gender DESC",
    )
    .bind(family_id)
    .bind(family_id)
    .fetch_all(&mut *conn)
    .await?)
}

async fn status_counts(conn: &mut SqliteConnection, family_id: Option<i64>) -> AppResult<ActivityStatusCounts> {
    let rows: Vec<(ActivityStatus, i64)> = query_as(
        "SELECT status, COUNT(*) FROM family_activities WHERE (? IS NULL OR family_id = ?) GROUP BY status",
    )
    .bind(family_id)
    .bind(family_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut counts = ActivityStatusCounts::default();
    for (status, count) in rows {
        match status {
            ActivityStatus::Planned => counts.planned = count,
            ActivityStatus::Ongoing => counts.ongoing = count,
            ActivityStatus::Completed => counts.completed = count,
            ActivityStatus::Cancelled => counts.cancelled = count,
        }
    }
    Ok(counts)
}

/// Largest families first
async fn department_data(conn: &mut SqliteConnection) -> AppResult<Vec<DepartmentData>> {
    let rows: Vec<(String, i64, i64, i64, i64)> = query_as(
        "SELECT f.name,
                COUNT(m.id) AS youth,
                COALESCE(SUM(CASE WHEN m.bcc_class_participation THEN 1 ELSE 0 END), 0),
                (SELECT COUNT(*) FROM family_activities a WHERE a.family_id = f.id),
                (SELECT COUNT(*) FROM family_activities a WHERE a.family_id = f.id AND a.status = ?)
         FROM families f JOIN family_members m ON m.family_id = f.id
         GROUP BY f.id, f.name
         ORDER BY youth DESC, f.name
         LIMIT ?",
    )
    .bind(ActivityStatus::Completed)
    .bind(TOP_DEPARTMENTS)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(name, youth, participants, activities, completed)| DepartmentData {
            name,
            youth,
            completion: percent(participants, youth),
            implementation: percent(completed, activities),
        })
        .collect())
}

/// Members with a birth date, bucketed by age on `today`.
/// Percentages are over every member with a birth date, so under-12s count
/// towards the total without a bucket of their own.
async fn age_distribution(conn: &mut SqliteConnection, today: NaiveDate) -> AppResult<Vec<AgeBucket>> {
    let births: Vec<NaiveDate> =
        query_scalar("SELECT date_of_birth FROM family_members WHERE date_of_birth IS NOT NULL")
            .fetch_all(&mut *conn)
            .await?;
    if births.is_empty() {
        return Ok(Vec::new());
    }

    let mut buckets = [0_i64; 3];
    for birth in &births {
        match age_on(*birth, today) {
            12..=14 => buckets[0] += 1,
            15..=17 => buckets[1] += 1,
            18.. => buckets[2] += 1,
            _ => {}
        }
    }

    let total = births.len() as i64;
    Ok(["12-14 years", "15-17 years", "18+ years"]
        .into_iter()
        .zip(buckets)
        .map(|(range, count)| AgeBucket {
            range: range.to_string(),
            count,
            percentage: percent(count, total),
        })
        .collect())
}
