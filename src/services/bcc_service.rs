//! BCC Service
//!
//! Tracks completion of the seven BCC classes per family member.

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::{query, query_as, FromRow, SqliteConnection, SqlitePool};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::bcc::{
    BccClassCompletion, BccFamilyStatus, BccIncompleteMember, BccMemberProgress, BccProgress,
    BCC_CLASSES,
};
use crate::models::family_member::FamilyMember;
use crate::models::user::{FamilyCategory, User};
use crate::services::family_service::fetch_family;
use crate::services::member_service::fetch_member;
use crate::services::time_provider::TimeProvider;

#[derive(Clone)]
pub struct BccService {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

#[derive(FromRow)]
struct MemberWithFamily {
    id: i64,
    name: String,
    phone: String,
    email: Option<String>,
    bcc_class_participation: bool,
    family_id: i64,
    family_name: String,
    family_category: FamilyCategory,
}

impl BccService {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    pub async fn progress(&self, viewer: &User, member_id: i64) -> AppResult<BccMemberProgress> {
        let mut conn = self.pool.acquire().await?;
        let member = fetch_member(&mut conn, member_id).await?;
        if !viewer.can_view_family(member.family_id) {
            return Err(AppError::access_denied());
        }
        member_progress(&mut conn, member).await
    }

    /// Record one class. Recording a class twice returns the first record.
    pub async fn record_completion(
        &self,
        actor: &User,
        member_id: i64,
        class_number: i64,
    ) -> AppResult<BccClassCompletion> {
        if !actor.is_youth_committee() {
            return Err(AppError::forbidden("Only the youth committee can record BCC classes"));
        }
        if !BCC_CLASSES.contains(&class_number) {
            return Err(AppError::validation_error("Class number must be between 1 and 7"));
        }

        let mut tx = self.pool.begin().await?;
        fetch_member(&mut tx, member_id).await?;

        let existing: Option<BccClassCompletion> = query_as(
            "SELECT * FROM bcc_class_completions WHERE member_id = ? AND class_number = ?",
        )
        .bind(member_id)
        .bind(class_number)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(existing) = existing {
            return Ok(existing);
        }

        let now = self.time_provider.now_utc();
        let id = query(
            "INSERT INTO bcc_class_completions (member_id, class_number, recorded_by_user_id, completed_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(member_id)
        .bind(class_number)
        .bind(actor.id)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let (recorded,): (i64,) =
            query_as("SELECT COUNT(*) FROM bcc_class_completions WHERE member_id = ?")
                .bind(member_id)
                .fetch_one(&mut *tx)
                .await?;
        if recorded as usize >= BCC_CLASSES.len() {
            query("UPDATE family_members SET bcc_class_participation = TRUE, updated_at = ? WHERE id = ?")
                .bind(now)
                .bind(member_id)
                .execute(&mut *tx)
                .await?;
            info!(member_id, "BCC program completed");
        }

        let completion = query_as("SELECT * FROM bcc_class_completions WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(completion)
    }

    /// Members who have not finished the program, sorted by family category,
    /// family name, then member name
    pub async fn incomplete(&self, actor: &User, family_id: Option<i64>) -> AppResult<Vec<BccIncompleteMember>> {
        if !actor.is_youth_committee() {
            return Err(AppError::forbidden("Only the youth committee can view BCC reports"));
        }

        let mut conn = self.pool.acquire().await?;
        let mut members: Vec<MemberWithFamily> = query_as(
            "SELECT m.id, m.name, m.phone, m.email, m.bcc_class_participation,
                    f.id AS family_id, f.name AS family_name, f.category AS family_category
             FROM family_members m JOIN families f ON f.id = m.family_id
             WHERE m.bcc_class_participation = FALSE AND (? IS NULL OR f.id = ?)",
        )
        .bind(family_id)
        .bind(family_id)
        .fetch_all(&mut *conn)
        .await?;
        members.sort_by(|a, b| {
            (a.family_category, &a.family_name, &a.name).cmp(&(b.family_category, &b.family_name, &b.name))
        });

        let recorded = recorded_classes(&mut conn).await?;
        let report = members
            .into_iter()
            .filter_map(|member| {
                let classes = recorded.get(&member.id).map(Vec::as_slice).unwrap_or(&[]);
                let progress = BccProgress::compute(member.bcc_class_participation, classes);
                (!progress.is_complete).then(|| BccIncompleteMember {
                    member_id: member.id,
                    member_name: member.name,
                    phone: member.phone,
                    email: member.email,
                    family_id: member.family_id,
                    family_name: member.family_name,
                    family_category: member.family_category,
                    completed_classes: progress.completed_classes,
                    missing_classes: progress.missing_classes,
                    completion_percent: progress.completion_percent,
                })
            })
            .collect();
        Ok(report)
    }

    pub async fn family_status(&self, viewer: &User, family_id: i64) -> AppResult<BccFamilyStatus> {
        if !(viewer.can_view_family(family_id) || viewer.is_youth_committee()) {
            return Err(AppError::access_denied());
        }

        let mut conn = self.pool.acquire().await?;
        fetch_family(&mut conn, family_id).await?;

        let members: Vec<FamilyMember> =
            query_as("SELECT * FROM family_members WHERE family_id = ? ORDER BY name")
                .bind(family_id)
                .fetch_all(&mut *conn)
                .await?;

        let mut incomplete_members = Vec::new();
        for member in members {
            let progress = member_progress(&mut conn, member).await?;
            if !progress.progress.is_complete {
                incomplete_members.push(progress);
            }
        }

        Ok(BccFamilyStatus {
            family_id,
            is_complete: incomplete_members.is_empty(),
            incomplete_members,
        })
    }
}

async fn member_progress(conn: &mut SqliteConnection, member: FamilyMember) -> AppResult<BccMemberProgress> {
    let classes: Vec<(i64,)> =
        query_as("SELECT class_number FROM bcc_class_completions WHERE member_id = ?")
            .bind(member.id)
            .fetch_all(&mut *conn)
            .await?;
    let classes: Vec<i64> = classes.into_iter().map(|(class,)| class).collect();

    Ok(BccMemberProgress {
        member_id: member.id,
        member_name: member.name,
        family_id: member.family_id,
        progress: BccProgress::compute(member.bcc_class_participation, &classes),
    })
}

async fn recorded_classes(conn: &mut SqliteConnection) -> AppResult<HashMap<i64, Vec<i64>>> {
    let rows: Vec<(i64, i64)> = query_as("SELECT member_id, class_number FROM bcc_class_completions")
        .fetch_all(&mut *conn)
        .await?;
    let mut by_member: HashMap<i64, Vec<i64>> = HashMap::new();
    for (member_id, class_number) in rows {
        by_member.entry(member_id).or_default().push(class_number);
    }
    Ok(by_member)
}
