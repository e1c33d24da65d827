//! Activity Check-in Service
//!
//! Families open a check-in for one of their activities and share the
//! resulting link. Attendance is submitted anonymously through that link
//! while the activity's window is open. The window is always recomputed
//! from the activity, so moving the activity moves the window too.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use rand::RngCore;
use sqlx::{query, query_as, query_scalar, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::activity::FamilyActivity;
use crate::models::checkin::{
    Attendance, AttendanceRequest, CheckinInfo, CheckinSession, CheckinSessionResponse, CheckinStatus,
    PublicFamily,
};
use crate::models::user::User;
use crate::services::activity_service::fetch_activity;
use crate::services::family_service::fetch_family;
use crate::services::time_provider::TimeProvider;

const TOKEN_BYTES: usize = 32;
const TOKEN_ATTEMPTS: usize = 10;
const INVALID_TOKEN: &str = "Invalid or inactive check-in token";

const ATTENDANCE_SELECT: &str = "SELECT a.id, a.activity_id, a.attendee_name, a.family_of_origin_id,
                                        f.name AS family_of_origin_name, a.created_at
                                 FROM activity_attendances a
                                 LEFT JOIN families f ON f.id = a.family_of_origin_id";

#[derive(Clone)]
pub struct CheckinService {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
    frontend_url: String,
}

impl CheckinService {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>, frontend_url: &str) -> Self {
        Self {
            pool,
            time_provider,
            frontend_url: frontend_url.to_string(),
        }
    }

    /// Create the activity's session, or refresh and reactivate the existing one.
    /// The token never changes once issued.
    pub async fn open_session(&self, actor: &User, activity_id: i64) -> AppResult<CheckinSessionResponse> {
        let mut conn = self.pool.acquire().await?;
        let activity = fetch_activity(&mut conn, activity_id).await?;
        if !actor.can_manage_family(activity.family_id) {
            return Err(AppError::access_denied());
        }

        let (opens_at, closes_at) = checkin_window(&activity);
        if find_session(&mut conn, activity_id).await?.is_some() {
            query(
                "UPDATE activity_checkin_sessions SET is_active = TRUE, valid_from = ?, valid_until = ?
                 WHERE activity_id = ?",
            )
            .bind(opens_at)
            .bind(closes_at)
            .bind(activity_id)
            .execute(&mut *conn)
            .await?;
        } else {
            let token = unique_token(&mut conn).await?;
            query(
                "INSERT INTO activity_checkin_sessions (activity_id, token, is_active, valid_from, valid_until, created_at)
                 VALUES (?, ?, TRUE, ?, ?, ?)",
            )
            .bind(activity_id)
            .bind(&token)
            .bind(opens_at)
            .bind(closes_at)
            .bind(self.time_provider.now_utc())
            .execute(&mut *conn)
            .await?;
            info!(activity_id, "Check-in session created");
        }

        let session = require_session(&mut conn, activity_id).await?;
        Ok(self.describe(session))
    }

    pub async fn session(&self, viewer: &User, activity_id: i64) -> AppResult<CheckinSessionResponse> {
        let mut conn = self.pool.acquire().await?;
        let activity = fetch_activity(&mut conn, activity_id).await?;
        if !viewer.can_view_family(activity.family_id) {
            return Err(AppError::access_denied());
        }
        let session = require_session(&mut conn, activity_id).await?;
        Ok(self.describe(session))
    }

    /// Deactivate the link; opening the session again restores the same token
    pub async fn close_session(&self, actor: &User, activity_id: i64) -> AppResult<CheckinSessionResponse> {
        let mut conn = self.pool.acquire().await?;
        let activity = fetch_activity(&mut conn, activity_id).await?;
        if !actor.can_manage_family(activity.family_id) {
            return Err(AppError::access_denied());
        }
        require_session(&mut conn, activity_id).await?;

        query("UPDATE activity_checkin_sessions SET is_active = FALSE WHERE activity_id = ?")
            .bind(activity_id)
            .execute(&mut *conn)
            .await?;
        debug!(activity_id, "Check-in session closed");

        let session = require_session(&mut conn, activity_id).await?;
        Ok(self.describe(session))
    }

    /// Attendance for an activity in submission order
    pub async fn attendances(&self, viewer: &User, activity_id: i64) -> AppResult<Vec<Attendance>> {
        let mut conn = self.pool.acquire().await?;
        let activity = fetch_activity(&mut conn, activity_id).await?;
        if !viewer.can_view_family(activity.family_id) {
            return Err(AppError::access_denied());
        }

        let attendances = query_as(&format!(
            "{} WHERE a.activity_id = ? ORDER BY a.created_at ASC, a.id ASC",
            ATTENDANCE_SELECT
        ))
        .bind(activity_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(attendances)
    }

    /// What the public page needs to render before anyone submits
    pub async fn public_info(&self, token: &str) -> AppResult<CheckinInfo> {
        let mut conn = self.pool.acquire().await?;
        let session = active_session(&mut conn, token).await?;
        let activity = fetch_activity(&mut conn, session.activity_id).await?;
        let family = fetch_family(&mut conn, activity.family_id).await?;

        let now = self.time_provider.now_utc();
        let (opens_at, closes_at) = checkin_window(&activity);
        let status = checkin_status(now, opens_at, closes_at);

        Ok(CheckinInfo {
            activity_id: activity.id,
            family_id: activity.family_id,
            family_name: family.name,
            date: activity.date,
            start_time: activity.start_time,
            end_time: activity.end_time,
            checkin_status: status,
            server_time: now,
            opens_at,
            closes_at,
            seconds_until_open: (status == CheckinStatus::NotStarted).then(|| (opens_at - now).num_seconds()),
            seconds_until_close: (status == CheckinStatus::Open).then(|| (closes_at - now).num_seconds()),
        })
    }

    /// Record one attendee through the public link
    pub async fn attend(&self, token: &str, request: AttendanceRequest) -> AppResult<Attendance> {
        let mut conn = self.pool.acquire().await?;
        let session = active_session(&mut conn, token).await?;
        let activity = fetch_activity(&mut conn, session.activity_id).await?;

        let now = self.time_provider.now_utc();
        let (opens_at, closes_at) = checkin_window(&activity);
        match checkin_status(now, opens_at, closes_at) {
            CheckinStatus::NotStarted => return Err(AppError::bad_request("Check-in is not open yet")),
            CheckinStatus::Closed => return Err(AppError::bad_request("Check-in is closed")),
            CheckinStatus::Open => {}
        }

        let attendee_name = request.attendee_name.trim();
        if attendee_name.is_empty() {
            return Err(AppError::validation_error("Attendee name is required"));
        }
        if let Some(family_id) = request.family_of_origin_id {
            let exists: Option<i64> = query_scalar("SELECT id FROM families WHERE id = ?")
                .bind(family_id)
                .fetch_optional(&mut *conn)
                .await?;
            if exists.is_none() {
                return Err(AppError::bad_request("Family of origin not found"));
            }
        }

        let id = query(
            "INSERT INTO activity_attendances (activity_id, attendee_name, family_of_origin_id, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(activity.id)
        .bind(attendee_name)
        .bind(request.family_of_origin_id)
        .bind(now)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
        info!(activity_id = activity.id, attendance_id = id, "Attendance recorded");

        let attendance = query_as(&format!("{} WHERE a.id = ?", ATTENDANCE_SELECT))
            .bind(id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(attendance)
    }

    /// Every family, for the "family of origin" picker
    pub async fn public_families(&self) -> AppResult<Vec<PublicFamily>> {
        let families = query_as("SELECT id, name, category FROM families ORDER BY category ASC, name ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(families)
    }

    fn describe(&self, session: CheckinSession) -> CheckinSessionResponse {
        CheckinSessionResponse {
            checkin_url: checkin_url(&self.frontend_url, &session.token),
            activity_id: session.activity_id,
            token: session.token,
            is_active: session.is_active,
            valid_from: session.valid_from,
            valid_until: session.valid_until,
        }
    }
}

/// UTC window on the activity's date. A missing start means midnight and a
/// missing end means 23:59:59. An end before the start rolls into the next day.
pub fn checkin_window(activity: &FamilyActivity) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = activity.start_time.unwrap_or(NaiveTime::MIN);
    // wraps to 23:59:59
    let end = activity.end_time.unwrap_or(NaiveTime::MIN - Duration::seconds(1));

    let opens_at = activity.date.and_time(start).and_utc();
    let mut closes_at = activity.date.and_time(end).and_utc();
    if closes_at < opens_at {
        closes_at += Duration::days(1);
    }
    (opens_at, closes_at)
}

/// Both window edges count as open
pub fn checkin_status(now: DateTime<Utc>, opens_at: DateTime<Utc>, closes_at: DateTime<Utc>) -> CheckinStatus {
    if now < opens_at {
        CheckinStatus::NotStarted
    } else if now > closes_at {
        CheckinStatus::Closed
    } else {
        CheckinStatus::Open
    }
}

/// `<base>/checkin/<token>`, defaulting the base to https when it has no scheme
pub fn checkin_url(base: &str, token: &str) -> String {
    let base = base.trim().trim_end_matches('/');
    if base.starts_with("http://") || base.starts_with("https://") {
        format!("{}/checkin/{}", base, token)
    } else {
        format!("https://{}/checkin/{}", base.trim_start_matches('/'), token)
    }
}

async fn unique_token(conn: &mut SqliteConnection) -> AppResult<String> {
    for _ in 0..TOKEN_ATTEMPTS {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        let taken: Option<i64> = query_scalar("SELECT id FROM activity_checkin_sessions WHERE token = ?")
            .bind(&token)
            .fetch_optional(&mut *conn)
            .await?;
        if taken.is_none() {
            return Ok(token);
        }
    }
    Err(AppError::internal_error("Unable to generate a unique check-in token"))
}

async fn find_session(conn: &mut SqliteConnection, activity_id: i64) -> AppResult<Option<CheckinSession>> {
    let session = query_as("SELECT * FROM activity_checkin_sessions WHERE activity_id = ?")
        .bind(activity_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(session)
}

async fn require_session(conn: &mut SqliteConnection, activity_id: i64) -> AppResult<CheckinSession> {
    find_session(conn, activity_id)
        .await?
        .ok_or_else(|| AppError::not_found("Check-in session"))
}

async fn active_session(conn: &mut SqliteConnection, token: &str) -> AppResult<CheckinSession> {
    let session: Option<CheckinSession> = query_as("SELECT * FROM activity_checkin_sessions WHERE token = ?")
        .bind(token)
        .fetch_optional(&mut *conn)
        .await?;
    match session {
        Some(session) if session.is_active => Ok(session),
        _ => Err(AppError::NotFound(INVALID_TOKEN.to_string())),
    }
}
