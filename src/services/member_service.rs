//! Family Member Service
//!
//! Parents manage the members of their own family; admins manage any family.

use std::sync::Arc;

use chrono::NaiveDate;
use chrono_tz::Tz;
use sqlx::{query, query_as, SqliteConnection, SqlitePool};

use crate::error::{AppError, AppResult};
use crate::models::family_member::{
    CreateFamilyMemberRequest, FamilyMember, FamilyMemberResponse, UpdateFamilyMemberRequest,
};
use crate::models::user::User;
use crate::services::family_service::fetch_family;
use crate::services::time_provider::TimeProvider;
use crate::services::validation::{normalize_email, normalize_phone, required};

#[derive(Clone)]
pub struct MemberService {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
    timezone: Tz,
}

/// Validated member fields, ready to write
struct MemberFields {
    name: String,
    phone: String,
    email: Option<String>,
}

impl MemberService {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>, timezone: Tz) -> Self {
        Self {
            pool,
            time_provider,
            timezone,
        }
    }

    fn today(&self) -> NaiveDate {
        self.time_provider.today_in(self.timezone)
    }

    fn respond(&self, member: FamilyMember) -> FamilyMemberResponse {
        let age = member.age_on(self.today());
        FamilyMemberResponse { member, age }
    }

    pub async fn create(&self, actor: &User, request: CreateFamilyMemberRequest) -> AppResult<FamilyMemberResponse> {
        let family_id = if actor.is_admin() {
            request
                .family_id
                .ok_or_else(|| AppError::validation_error("family_id is required"))?
        } else if actor.role.is_parent() {
            actor
                .family_id
                .ok_or_else(|| AppError::bad_request("You are not assigned to a family"))?
        } else {
            return Err(AppError::forbidden("Only parents and admins can add family members"));
        };

        let mut tx = self.pool.begin().await?;
        fetch_family(&mut tx, family_id).await?;

        let fields = MemberFields {
            name: required("Name", &request.name)?,
            phone: normalize_phone(&request.phone)?,
            email: request.email.as_deref().map(normalize_email).transpose()?,
        };
        self.check_birth_date(request.date_of_birth)?;
        check_uniqueness(&mut tx, family_id, &fields, None).await?;

        let now = self.time_provider.now_utc();
        let id = query(
            "INSERT INTO family_members (family_id, name, phone, email, gender, date_of_birth, home_address,
                                         education_level, employment_status, bcc_class_participation,
                                         created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(family_id)
        .bind(&fields.name)
        .bind(&fields.phone)
        .bind(&fields.email)
        .bind(request.gender)
        .bind(request.date_of_birth)
        .bind(&request.home_address)
        .bind(&request.education_level)
        .bind(&request.employment_status)
        .bind(request.bcc_class_participation)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let member = fetch_member(&mut tx, id).await?;
        tx.commit().await?;
        Ok(self.respond(member))
    }

    /// Members of one family, or of every family for pastor level with no filter
    pub async fn list(&self, viewer: &User, family_id: Option<i64>) -> AppResult<Vec<FamilyMemberResponse>> {
        let scope = if viewer.is_pastor_level() {
            family_id
        } else {
            match (family_id, viewer.family_id) {
                (Some(requested), Some(own)) if requested != own => {
                    return Err(AppError::access_denied())
                }
                (_, Some(own)) => Some(own),
                (_, None) => return Ok(Vec::new()),
            }
        };

        let members: Vec<FamilyMember> = match scope {
            Some(family_id) => {
                query_as("SELECT * FROM family_members WHERE family_id = ? ORDER BY name")
                    .bind(family_id)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                query_as("SELECT * FROM family_members ORDER BY family_id, name")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(members.into_iter().map(|member| self.respond(member)).collect())
    }

    pub async fn get(&self, viewer: &User, member_id: i64) -> AppResult<FamilyMemberResponse> {
        let mut conn = self.pool.acquire().await?;
        let member = fetch_member(&mut conn, member_id).await?;
        if !viewer.can_view_family(member.family_id) {
            return Err(AppError::access_denied());
        }
        Ok(self.respond(member))
    }

    pub async fn update(
        &self,
        actor: &User,
        member_id: i64,
        request: UpdateFamilyMemberRequest,
    ) -> AppResult<FamilyMemberResponse> {
        let mut tx = self.pool.begin().await?;
        let member = fetch_member(&mut tx, member_id).await?;
        if !actor.can_manage_family(member.family_id) {
            return Err(AppError::access_denied());
        }

        let fields = MemberFields {
            name: match request.name.as_deref() {
                Some(name) => required("Name", name)?,
                None => member.name.clone(),
            },
            phone: match request.phone.as_deref() {
                Some(phone) => normalize_phone(phone)?,
                None => member.phone.clone(),
            },
            email: match request.email.as_deref() {
                Some(email) => Some(normalize_email(email)?),
                None => member.email.clone(),
            },
        };
        let date_of_birth = request.date_of_birth.or(member.date_of_birth);
        self.check_birth_date(date_of_birth)?;
        check_uniqueness(&mut tx, member.family_id, &fields, Some(member_id)).await?;

        query(
            "UPDATE family_members SET name = ?, phone = ?, email = ?, gender = ?, date_of_birth = ?,
                                      home_address = ?, education_level = ?, employment_status = ?,
                                      bcc_class_participation = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&fields.name)
        .bind(&fields.phone)
        .bind(&fields.email)
        .bind(request.gender.or(member.gender))
        .bind(date_of_birth)
        .bind(request.home_address.as_ref().or(member.home_address.as_ref()))
        .bind(request.education_level.as_ref().or(member.education_level.as_ref()))
        .bind(request.employment_status.as_ref().or(member.employment_status.as_ref()))
        .bind(request.bcc_class_participation.unwrap_or(member.bcc_class_participation))
        .bind(self.time_provider.now_utc())
        .bind(member_id)
        .execute(&mut *tx)
        .await?;

        let updated = fetch_member(&mut tx, member_id).await?;
        tx.commit().await?;
        Ok(self.respond(updated))
    }

    pub async fn delete(&self, actor: &User, member_id: i64) -> AppResult<FamilyMember> {
        let mut conn = self.pool.acquire().await?;
        let member = fetch_member(&mut conn, member_id).await?;
        if !actor.can_manage_family(member.family_id) {
            return Err(AppError::access_denied());
        }
        query("DELETE FROM family_members WHERE id = ?")
            .bind(member_id)
            .execute(&mut *conn)
            .await?;
        Ok(member)
    }

    fn check_birth_date(&self, date_of_birth: Option<NaiveDate>) -> AppResult<()> {
        match date_of_birth {
            Some(date) if date > self.today() => {
                Err(AppError::validation_error("Date of birth cannot be in the future"))
            }
            _ => Ok(()),
        }
    }
}

pub(crate) async fn fetch_member(conn: &mut SqliteConnection, member_id: i64) -> AppResult<FamilyMember> {
    query_as("SELECT * FROM family_members WHERE id = ?")
        .bind(member_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Family member"))
}

async fn check_uniqueness(
    conn: &mut SqliteConnection,
    family_id: i64,
    fields: &MemberFields,
    exclude_id: Option<i64>,
) -> AppResult<()> {
    let exclude = exclude_id.unwrap_or(-1);

    let (phone_taken,): (i64,) =
        query_as("SELECT COUNT(*) FROM family_members WHERE phone = ? AND id != ?")
            .bind(&fields.phone)
            .bind(exclude)
            .fetch_one(&mut *conn)
            .await?;
    if phone_taken > 0 {
        return Err(AppError::conflict("Phone number already registered"));
    }

    if let Some(email) = &fields.email {
        let (email_taken,): (i64,) =
            query_as("SELECT COUNT(*) FROM family_members WHERE email = ? AND id != ?")
                .bind(email)
                .bind(exclude)
                .fetch_one(&mut *conn)
                .await?;
        if email_taken > 0 {
            return Err(AppError::conflict("Email already registered"));
        }
    }

    let (name_taken,): (i64,) = query_as(
        "SELECT COUNT(*) FROM family_members WHERE family_id = ? AND lower(name) = lower(?) AND id != ?",
    )
    .bind(family_id)
    .bind(&fields.name)
    .bind(exclude)
    .fetch_one(&mut *conn)
    .await?;
    if name_taken > 0 {
        return Err(AppError::Conflict(format!(
            "A member named '{}' already exists in this family",
            fields.name
        )));
    }

    Ok(())
}
