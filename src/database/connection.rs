//! Database connection manager
//!
//! Owns the SQLite pool and creates the schema on startup.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::query;
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::AppResult;

/// Database connection manager
#[derive(Debug, Clone)]
pub struct DatabaseManager {
    pub pool: SqlitePool,
}

impl DatabaseManager {
    /// Connect to the given SQLite URL, creating the file when missing.
    ///
    /// In-memory databases are pinned to one connection that never expires,
    /// otherwise each new connection would see an empty database.
    pub async fn connect(database_url: &str) -> AppResult<Self> {
        info!("Connecting to database: {}", database_url);

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = if is_in_memory(database_url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(8)
                .connect_with(options)
                .await?
        };

        debug!("Successfully connected to SQLite database");

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> AppResult<()> {
        info!("Running database migrations");

        let mut tx = self.pool.begin().await?;
        for statement in SCHEMA {
            query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Liveness check for the health endpoint
    pub async fn ping(&self) -> bool {
        query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// Schema statements, applied in order. All are idempotent.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS families (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        category TEXT NOT NULL,
        name TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (category, name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        full_name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        phone TEXT NOT NULL,
        gender TEXT NOT NULL,
        role TEXT NOT NULL,
        family_id INTEGER REFERENCES families(id) ON DELETE SET NULL,
        family_role TEXT,
        other TEXT,
        profile_pic TEXT,
        biography TEXT,
        hashed_password TEXT NOT NULL,
        access_code TEXT UNIQUE,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_users_family ON users(family_id)",
    r#"
    CREATE TABLE IF NOT EXISTS family_members (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        family_id INTEGER NOT NULL REFERENCES families(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        phone TEXT NOT NULL UNIQUE,
        email TEXT UNIQUE,
        gender TEXT,
        date_of_birth TEXT,
        home_address TEXT,
        education_level TEXT,
        employment_status TEXT,
        bcc_class_participation BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_family_members_family ON family_members(family_id)",
    r#"
    CREATE TABLE IF NOT EXISTS bcc_class_completions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        member_id INTEGER NOT NULL REFERENCES family_members(id) ON DELETE CASCADE,
        class_number INTEGER NOT NULL CHECK (class_number BETWEEN 1 AND 7),
        recorded_by_user_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
        completed_at TEXT NOT NULL,
        UNIQUE (member_id, class_number)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS family_activities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        family_id INTEGER NOT NULL REFERENCES families(id) ON DELETE CASCADE,
        date TEXT NOT NULL,
        status TEXT NOT NULL,
        category TEXT NOT NULL,
        activity_type TEXT NOT NULL,
        description TEXT,
        start_time TEXT,
        end_time TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_family_activities_family ON family_activities(family_id)",
    r#"
    CREATE TABLE IF NOT EXISTS activity_checkin_sessions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        activity_id INTEGER NOT NULL UNIQUE REFERENCES family_activities(id) ON DELETE CASCADE,
        token TEXT NOT NULL UNIQUE,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        valid_from TEXT NOT NULL,
        valid_until TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS activity_attendances (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        activity_id INTEGER NOT NULL REFERENCES family_activities(id) ON DELETE CASCADE,
        attendee_name TEXT NOT NULL,
        family_of_origin_id INTEGER REFERENCES families(id) ON DELETE SET NULL,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_activity_attendances_activity ON activity_attendances(activity_id)",
    r#"
    CREATE TABLE IF NOT EXISTS announcements (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        announcement_type TEXT NOT NULL,
        flyer_path TEXT,
        flyer_filename TEXT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS announcement_views (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        announcement_id INTEGER NOT NULL REFERENCES announcements(id) ON DELETE CASCADE,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        viewed_at TEXT NOT NULL,
        UNIQUE (announcement_id, user_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS family_documents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        family_id INTEGER NOT NULL REFERENCES families(id) ON DELETE CASCADE,
        document_type TEXT NOT NULL,
        original_filename TEXT NOT NULL,
        stored_path TEXT NOT NULL,
        file_size INTEGER NOT NULL,
        checksum TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        uploaded_by INTEGER REFERENCES users(id) ON DELETE SET NULL,
        uploaded_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS shared_documents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        original_filename TEXT NOT NULL,
        stored_path TEXT NOT NULL,
        file_size INTEGER NOT NULL,
        mime_type TEXT NOT NULL,
        description TEXT,
        uploaded_by INTEGER REFERENCES users(id) ON DELETE SET NULL,
        is_public BOOLEAN NOT NULL DEFAULT TRUE,
        downloads INTEGER NOT NULL DEFAULT 0,
        uploaded_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS prayer_chains (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        family_id INTEGER NOT NULL UNIQUE REFERENCES families(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS prayer_schedules (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        prayer_chain_id INTEGER NOT NULL REFERENCES prayer_chains(id) ON DELETE CASCADE,
        day TEXT NOT NULL,
        start_time TEXT NOT NULL,
        end_time TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_prayer_schedules_chain_day ON prayer_schedules(prayer_chain_id, day)",
    r#"
    CREATE TABLE IF NOT EXISTS chat_rooms (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT,
        description TEXT,
        room_type TEXT NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        max_members INTEGER NOT NULL DEFAULT 100,
        message_retention_days INTEGER NOT NULL DEFAULT 0,
        created_by INTEGER REFERENCES users(id) ON DELETE SET NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        last_activity TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chat_room_members (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        chat_room_id INTEGER NOT NULL REFERENCES chat_rooms(id) ON DELETE CASCADE,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        role TEXT NOT NULL,
        can_send_messages BOOLEAN NOT NULL DEFAULT TRUE,
        can_add_members BOOLEAN NOT NULL DEFAULT FALSE,
        can_remove_members BOOLEAN NOT NULL DEFAULT FALSE,
        can_edit_room BOOLEAN NOT NULL DEFAULT FALSE,
        is_blocked BOOLEAN NOT NULL DEFAULT FALSE,
        joined_at TEXT NOT NULL,
        last_read_message_id INTEGER,
        UNIQUE (chat_room_id, user_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_chat_room_members_user ON chat_room_members(user_id)",
    r#"
    CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        chat_room_id INTEGER NOT NULL REFERENCES chat_rooms(id) ON DELETE CASCADE,
        sender_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        content TEXT,
        message_type TEXT NOT NULL,
        reply_to_message_id INTEGER REFERENCES messages(id) ON DELETE SET NULL,
        is_edited BOOLEAN NOT NULL DEFAULT FALSE,
        is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TEXT NOT NULL,
        edited_at TEXT,
        deleted_at TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_messages_room ON messages(chat_room_id, id)",
    r#"
    CREATE TABLE IF NOT EXISTS system_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        user_name TEXT NOT NULL,
        family_id INTEGER,
        family_name TEXT,
        family_category TEXT,
        action TEXT NOT NULL,
        description TEXT NOT NULL,
        table_name TEXT,
        record_id INTEGER,
        details TEXT,
        ip_address TEXT,
        user_agent TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_system_logs_created ON system_logs(created_at)",
    "CREATE INDEX IF NOT EXISTS idx_system_logs_user ON system_logs(user_id)",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_migrations_are_idempotent() {
        let db = DatabaseManager::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        db.migrate().await.unwrap();
        assert!(db.ping().await);

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&db.pool)
        .await
        .unwrap();
        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert!(names.contains(&"prayer_schedules"));
        assert!(names.contains(&"system_logs"));
        assert!(names.contains(&"chat_room_members"));
        assert!(names.contains(&"activity_attendances"));
        assert!(names.contains(&"shared_documents"));
    }

    #[tokio::test]
    async fn test_foreign_keys_cascade() {
        let db = DatabaseManager::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();

        query("INSERT INTO families (category, name, created_at, updated_at) VALUES ('Young', 'Abel', 'x', 'x')")
            .execute(&db.pool)
            .await
            .unwrap();
        query("INSERT INTO prayer_chains (family_id, created_at, updated_at) VALUES (1, 'x', 'x')")
            .execute(&db.pool)
            .await
            .unwrap();
        query("DELETE FROM families WHERE id = 1")
            .execute(&db.pool)
            .await
            .unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM prayer_chains")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_in_memory_detection() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite:file:test?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite:church_office.db"));
    }
}
