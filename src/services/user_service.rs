//! User Service
//!
//! Account management. Non-admin accounts sign in with a generated 4-digit
//! access code which doubles as their initial password.

use std::sync::Arc;

use sqlx::{query, query_as, SqliteConnection, SqlitePool};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::user::{
    AccessCodeResponse, AdminUpdateUserRequest, CreateUserRequest, CreatedUserResponse, Gender,
    Role, UpdateProfileRequest, User,
};
use crate::services::auth_service::{generate_access_code, PasswordHasher};
use crate::services::family_service::get_or_create_family;
use crate::services::time_provider::TimeProvider;
use crate::services::validation::{normalize_email, normalize_phone, required, validate_password};

const ACCESS_CODE_ATTEMPTS: usize = 200;

#[derive(Clone)]
pub struct UserService {
    pool: SqlitePool,
    hasher: PasswordHasher,
    time_provider: Arc<dyn TimeProvider>,
}

impl UserService {
    pub fn new(pool: SqlitePool, hasher: PasswordHasher, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            hasher,
            time_provider,
        }
    }

    pub async fn create(&self, request: CreateUserRequest) -> AppResult<CreatedUserResponse> {
        let full_name = required("Full name", &request.full_name)?;
        let email = normalize_email(&request.email)?;
        let phone = normalize_phone(&request.phone)?;

        let mut tx = self.pool.begin().await?;

        if find_by_email(&mut tx, &email).await?.is_some() {
            return Err(AppError::conflict("Email already registered"));
        }

        let now = self.time_provider.now_utc();
        let family_id = match (request.family_category, request.family_name.as_deref()) {
            (Some(category), Some(name)) => {
                let name = required("Family name", name)?;
                Some(get_or_create_family(&mut tx, category, &name, now).await?.id)
            }
            (None, None) => None,
            _ => {
                return Err(AppError::validation_error(
                    "Family category and family name must be given together",
                ))
            }
        };

        let (hashed_password, access_code) = if request.role == Role::Admin {
            let password = request
                .password
                .as_deref()
                .ok_or_else(|| AppError::validation_error("Password is required for admin accounts"))?;
            validate_password(password)?;
            (self.hasher.hash(password)?, None)
        } else {
            let code = unique_access_code(&mut tx).await?;
            (self.hasher.hash(&code)?, Some(code))
        };

        let id = query(
            "INSERT INTO users (full_name, email, phone, gender, role, family_id, family_role, other,
                                biography, hashed_password, access_code, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, TRUE, ?, ?)",
        )
        .bind(&full_name)
        .bind(&email)
        .bind(&phone)
        .bind(request.gender)
        .bind(request.role)
        .bind(family_id)
        .bind(request.family_role.as_deref().map(str::trim))
        .bind(&request.other)
        .bind(&request.biography)
        .bind(&hashed_password)
        .bind(&access_code)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let user = fetch_user(&mut tx, id).await?;
        tx.commit().await?;

        info!(user_id = id, role = %user.role, "User account created");
        Ok(CreatedUserResponse { user, access_code })
    }

    pub async fn get(&self, user_id: i64) -> AppResult<User> {
        let mut conn = self.pool.acquire().await?;
        fetch_user(&mut conn, user_id).await
    }

    pub async fn list(&self) -> AppResult<Vec<User>> {
        let users = query_as("SELECT * FROM users ORDER BY full_name, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    /// Self-service update. Changing the password requires the current one.
    pub async fn update_profile(&self, user: &User, request: UpdateProfileRequest) -> AppResult<User> {
        let full_name = match request.full_name.as_deref() {
            Some(name) => required("Full name", name)?,
            None => user.full_name.clone(),
        };
        let phone = match request.phone.as_deref() {
            Some(phone) => normalize_phone(phone)?,
            None => user.phone.clone(),
        };

        let hashed_password = match request.new_password.as_deref() {
            Some(new_password) => {
                let current = request.current_password.as_deref().unwrap_or_default();
                if !self.hasher.verify(current, &user.hashed_password) {
                    return Err(AppError::bad_request("Current password is incorrect"));
                }
                validate_password(new_password)?;
                self.hasher.hash(new_password)?
            }
            None => user.hashed_password.clone(),
        };

        query(
            "UPDATE users SET full_name = ?, phone = ?, biography = ?, profile_pic = ?,
                              hashed_password = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&full_name)
        .bind(&phone)
        .bind(request.biography.as_ref().or(user.biography.as_ref()))
        .bind(request.profile_pic.as_ref().or(user.profile_pic.as_ref()))
        .bind(&hashed_password)
        .bind(self.time_provider.now_utc())
        .bind(user.id)
        .execute(&self.pool)
        .await?;

        self.get(user.id).await
    }

    pub async fn admin_update(&self, user_id: i64, request: AdminUpdateUserRequest) -> AppResult<User> {
        let mut tx = self.pool.begin().await?;
        let user = fetch_user(&mut tx, user_id).await?;

        if let Some(family_id) = request.family_id {
            let (exists,): (i64,) = query_as("SELECT COUNT(*) FROM families WHERE id = ?")
                .bind(family_id)
                .fetch_one(&mut *tx)
                .await?;
            if exists == 0 {
                return Err(AppError::not_found("Family"));
            }
        }

        let full_name = match request.full_name.as_deref() {
            Some(name) => required("Full name", name)?,
            None => user.full_name.clone(),
        };
        let phone = match request.phone.as_deref() {
            Some(phone) => normalize_phone(phone)?,
            None => user.phone.clone(),
        };

        query(
            "UPDATE users SET full_name = ?, phone = ?, role = ?, family_id = ?, family_role = ?,
                              is_active = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&full_name)
        .bind(&phone)
        .bind(request.role.unwrap_or(user.role))
        .bind(request.family_id.or(user.family_id))
        .bind(request.family_role.as_ref().or(user.family_role.as_ref()))
        .bind(request.is_active.unwrap_or(user.is_active))
        .bind(self.time_provider.now_utc())
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let updated = fetch_user(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Issue a fresh access code and make it the account's password
    pub async fn reset_access_code(&self, user_id: i64) -> AppResult<AccessCodeResponse> {
        let mut tx = self.pool.begin().await?;
        fetch_user(&mut tx, user_id).await?;

        let code = unique_access_code(&mut tx).await?;
        query("UPDATE users SET access_code = ?, hashed_password = ?, updated_at = ? WHERE id = ?")
            .bind(&code)
            .bind(self.hasher.hash(&code)?)
            .bind(self.time_provider.now_utc())
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(user_id, "Access code reset");
        Ok(AccessCodeResponse {
            user_id,
            access_code: code,
        })
    }

    pub async fn delete(&self, actor: &User, user_id: i64) -> AppResult<()> {
        if actor.id == user_id {
            return Err(AppError::bad_request("You cannot delete your own account"));
        }
        let result = query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("User"));
        }
        Ok(())
    }

    /// Create the configured bootstrap admin if no account uses that email.
    /// Returns whether an account was created.
    pub async fn ensure_admin(&self, email: &str, password: &str) -> AppResult<bool> {
        let email = normalize_email(email)?;
        validate_password(password)?;

        let mut conn = self.pool.acquire().await?;
        if find_by_email(&mut conn, &email).await?.is_some() {
            return Ok(false);
        }

        let now = self.time_provider.now_utc();
        query(
            "INSERT INTO users (full_name, email, phone, gender, role, hashed_password, is_active, created_at, updated_at)
             VALUES ('Administrator', ?, '', ?, ?, ?, TRUE, ?, ?)",
        )
        .bind(&email)
        .bind(Gender::Male)
        .bind(Role::Admin)
        .bind(self.hasher.hash(password)?)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        info!(email = %email, "Bootstrap admin account created");
        Ok(true)
    }
}

pub(crate) async fn fetch_user(conn: &mut SqliteConnection, user_id: i64) -> AppResult<User> {
    query_as("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("User"))
}

async fn find_by_email(conn: &mut SqliteConnection, email: &str) -> AppResult<Option<User>> {
    let user = query_as("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(user)
}

async fn unique_access_code(conn: &mut SqliteConnection) -> AppResult<String> {
    for _ in 0..ACCESS_CODE_ATTEMPTS {
        let code = generate_access_code();
        let (taken,): (i64,) = query_as("SELECT COUNT(*) FROM users WHERE access_code = ?")
            .bind(&code)
            .fetch_one(&mut *conn)
            .await?;
        if taken == 0 {
            return Ok(code);
        }
    }
    Err(AppError::internal_error("Could not allocate a unique access code"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseManager;
    use crate::models::user::FamilyCategory;
    use crate::services::time_provider::SystemTimeProvider;

    async fn service() -> UserService {
        let db = DatabaseManager::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        UserService::new(db.pool, PasswordHasher::new(10), Arc::new(SystemTimeProvider::new()))
    }

    fn request(email: &str, role: Role) -> CreateUserRequest {
        CreateUserRequest {
            full_name: "Jean Bosco".to_string(),
            email: email.to_string(),
            phone: "+250788000001".to_string(),
            gender: Gender::Male,
            role,
            password: None,
            family_category: Some(FamilyCategory::Young),
            family_name: Some("Emmaus".to_string()),
            family_role: None,
            other: None,
            biography: None,
        }
    }

    #[tokio::test]
    async fn test_parent_gets_access_code_and_family() {
        let service = service().await;
        let created = service.create(request("Jean@Example.com", Role::Pere)).await.unwrap();

        let code = created.access_code.unwrap();
        assert_eq!(code.len(), 4);
        assert_eq!(created.user.email, "jean@example.com");
        assert!(created.user.family_id.is_some());
        assert!(service.hasher.verify(&code, &created.user.hashed_password));

        let second = service.create(request("mere@example.com", Role::Mere)).await.unwrap();
        assert_eq!(second.user.family_id, created.user.family_id);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let service = service().await;
        service.create(request("a@example.com", Role::Other)).await.unwrap();
        let error = service.create(request("A@example.com", Role::Other)).await.unwrap_err();
        assert!(matches!(error, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_admin_requires_password() {
        let service = service().await;
        let error = service.create(request("root@example.com", Role::Admin)).await.unwrap_err();
        assert!(matches!(error, AppError::Validation(_)));

        let mut with_password = request("root@example.com", Role::Admin);
        with_password.password = Some("s3cret!".to_string());
        let created = service.create(with_password).await.unwrap();
        assert!(created.access_code.is_none());
    }

    #[tokio::test]
    async fn test_reset_access_code_changes_password() {
        let service = service().await;
        let created = service.create(request("b@example.com", Role::Mere)).await.unwrap();
        let reset = service.reset_access_code(created.user.id).await.unwrap();
        let user = service.get(created.user.id).await.unwrap();
        assert!(service.hasher.verify(&reset.access_code, &user.hashed_password));
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let service = service().await;
        assert!(service.ensure_admin("admin@church.org", "changeme").await.unwrap());
        assert!(!service.ensure_admin("admin@church.org", "changeme").await.unwrap());
    }
}
