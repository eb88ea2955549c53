//! SQLite persistence for users, usage counters and the audit trail

use chrono::{DateTime, Utc};
use log::info;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

const PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
";

const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS users (
    email       TEXT PRIMARY KEY,
    approved    INTEGER NOT NULL DEFAULT 0,
    is_admin    INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS usage_counters (
    email       TEXT NOT NULL,
    period_type TEXT NOT NULL,
    period_key  TEXT NOT NULL,
    count       INTEGER NOT NULL DEFAULT 0,
    updated_at  TEXT NOT NULL,
    UNIQUE (email, period_type, period_key)
);

CREATE TABLE IF NOT EXISTS audit_logs (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    email       TEXT,
    event_type  TEXT NOT NULL,
    detail      TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_email ON audit_logs (email, created_at);
";

/// Persisted user record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub email: String,
    pub approved: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persisted audit event
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub id: i64,
    pub email: Option<String>,
    pub event_type: String,
    pub detail: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Quota bucket kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodType {
    Daily,
    Monthly,
}

impl PeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Daily => "daily",
            PeriodType::Monthly => "monthly",
        }
    }
}

/// Canonical identity key: trimmed, lower-cased email
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Thread-safe SQLite connection wrapper
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl Store {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Io(format!("create dir: {e}")))?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(PRAGMAS)
            .map_err(|e| StoreError::Database(format!("pragmas: {e}")))?;
        conn.execute_batch(CREATE_TABLES)
            .map_err(|e| StoreError::Database(format!("schema: {e}")))?;

        info!("database opened at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_owned(),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CREATE_TABLES)
            .map_err(|e| StoreError::Database(format!("schema: {e}")))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Drop `table` so later statements against it fail
    #[cfg(test)]
    pub(crate) fn break_table(&self, table: &str) {
        self.with_conn(|conn| Ok(conn.execute_batch(&format!("DROP TABLE {table}"))?))
            .unwrap();
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// Insert or overwrite the flags for `email`
    pub fn upsert_user(&self, email: &str, approved: bool, is_admin: bool) -> Result<User, StoreError> {
        let email = normalize_email(email);
        let now = Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (email, approved, is_admin, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(email) DO UPDATE SET
                    approved = excluded.approved,
                    is_admin = excluded.is_admin,
                    updated_at = excluded.updated_at",
                params![email, approved, is_admin, now],
            )?;
            Ok(())
        })?;
        self.get_user(&email)?
            .ok_or_else(|| StoreError::Database(format!("user {email} vanished after upsert")))
    }

    /// Insert `email` with the given flags only if absent
    pub fn insert_user_if_absent(&self, email: &str, approved: bool, is_admin: bool) -> Result<(), StoreError> {
        let email = normalize_email(email);
        let now = Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO users (email, approved, is_admin, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![email, approved, is_admin, now],
            )?;
            Ok(())
        })
    }

    pub fn get_user(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = normalize_email(email);
        self.with_conn(|conn| {
            let user = conn
                .query_row(
                    "SELECT email, approved, is_admin, created_at, updated_at
                     FROM users WHERE email = ?1 LIMIT 1",
                    params![email],
                    user_from_row,
                )
                .optional()?;
            Ok(user)
        })
    }

    /// Returns false when no such user exists
    pub fn set_approval(&self, email: &str, approved: bool) -> Result<bool, StoreError> {
        self.update_flag("approved", email, approved)
    }

    /// Returns false when no such user exists
    pub fn set_admin(&self, email: &str, is_admin: bool) -> Result<bool, StoreError> {
        self.update_flag("is_admin", email, is_admin)
    }

    fn update_flag(&self, column: &'static str, email: &str, value: bool) -> Result<bool, StoreError> {
        let email = normalize_email(email);
        let now = Utc::now().to_rfc3339();
        let sql = format!("UPDATE users SET {column} = ?1, updated_at = ?2 WHERE email = ?3");
        self.with_conn(|conn| {
            let changed = conn.execute(&sql, params![value, now, email])?;
            Ok(changed > 0)
        })
    }

    /// All users, most recently updated first
    pub fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT email, approved, is_admin, created_at, updated_at
                 FROM users ORDER BY updated_at DESC, email ASC",
            )?;
            let users = stmt
                .query_map([], user_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(users)
        })
    }

    // ------------------------------------------------------------------
    // Usage counters
    // ------------------------------------------------------------------

    /// Current count for one bucket; 0 when absent
    pub fn usage_get(&self, email: &str, period: PeriodType, period_key: &str) -> Result<u32, StoreError> {
        let email = normalize_email(email);
        self.with_conn(|conn| {
            let count: Option<i64> = conn
                .query_row(
                    "SELECT count FROM usage_counters
                     WHERE email = ?1 AND period_type = ?2 AND period_key = ?3 LIMIT 1",
                    params![email, period.as_str(), period_key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(count.unwrap_or(0).max(0) as u32)
        })
    }

    /// Write `count` into one bucket, creating it if needed
    pub fn usage_put(&self, email: &str, period: PeriodType, period_key: &str, count: u32) -> Result<(), StoreError> {
        let email = normalize_email(email);
        let now = Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO usage_counters (email, period_type, period_key, count, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(email, period_type, period_key) DO UPDATE SET
                    count = excluded.count,
                    updated_at = excluded.updated_at",
                params![email, period.as_str(), period_key, count, now],
            )?;
            Ok(())
        })
    }

    /// Add one to a bucket in a single statement, creating it at 1
    pub fn usage_increment(&self, email: &str, period: PeriodType, period_key: &str) -> Result<(), StoreError> {
        let email = normalize_email(email);
        let now = Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO usage_counters (email, period_type, period_key, count, updated_at)
                 VALUES (?1, ?2, ?3, 1, ?4)
                 ON CONFLICT(email, period_type, period_key) DO UPDATE SET
                    count = count + 1,
                    updated_at = excluded.updated_at",
                params![email, period.as_str(), period_key, now],
            )?;
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Audit trail
    // ------------------------------------------------------------------

    pub fn insert_audit(
        &self,
        email: Option<&str>,
        event_type: &str,
        detail: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let email = email.map(normalize_email);
        let detail = serde_json::to_string(detail)?;
        let now = Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO audit_logs (email, event_type, detail, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![email, event_type, detail, now],
            )?;
            Ok(())
        })
    }

    /// Most recent audit events, newest first
    pub fn recent_audit(&self, limit: usize) -> Result<Vec<AuditEvent>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, email, event_type, detail, created_at
                 FROM audit_logs ORDER BY id DESC LIMIT ?1",
            )?;
            let rows = stmt
                .query_map(params![limit as i64], |row| {
                    let detail: String = row.get(3)?;
                    let created_at: String = row.get(4)?;
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                        detail,
                        created_at,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(id, email, event_type, detail, created_at)| {
                    Ok(AuditEvent {
                        id,
                        email,
                        event_type,
                        detail: serde_json::from_str(&detail)?,
                        created_at: parse_timestamp(&created_at)?,
                    })
                })
                .collect()
        })
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let created_at: String = row.get(3)?;
    let updated_at: String = row.get(4)?;
    Ok(User {
        email: row.get(0)?,
        approved: row.get(1)?,
        is_admin: row.get(2)?,
        created_at: parse_timestamp(&created_at).map_err(to_sql_err)?,
        updated_at: parse_timestamp(&updated_at).map_err(to_sql_err)?,
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization(format!("timestamp '{raw}': {e}")))
}

fn to_sql_err(e: StoreError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_upsert_and_get_user() {
        let store = Store::in_memory().unwrap();
        let user = store.upsert_user(" Alice@Example.com ", false, false).unwrap();

        assert_eq!(user.email, "alice@example.com");
        assert!(!user.approved);

        let fetched = store.get_user("ALICE@example.com").unwrap().unwrap();
        assert_eq!(fetched.email, "alice@example.com");
    }

    #[test]
    fn test_upsert_overwrites_flags() {
        let store = Store::in_memory().unwrap();
        store.upsert_user("a@x.io", false, false).unwrap();
        let user = store.upsert_user("a@x.io", true, true).unwrap();
        assert!(user.approved && user.is_admin);
    }

    #[test]
    fn test_insert_if_absent_keeps_existing() {
        let store = Store::in_memory().unwrap();
        store.upsert_user("a@x.io", true, false).unwrap();
        store.insert_user_if_absent("a@x.io", false, false).unwrap();
        assert!(store.get_user("a@x.io").unwrap().unwrap().approved);
    }

    #[test]
    fn test_set_approval_reports_missing_user() {
        let store = Store::in_memory().unwrap();
        assert!(!store.set_approval("ghost@x.io", true).unwrap());

        store.upsert_user("b@x.io", false, false).unwrap();
        assert!(store.set_approval("b@x.io", true).unwrap());
        assert!(store.get_user("b@x.io").unwrap().unwrap().approved);

        assert!(store.set_admin("b@x.io", true).unwrap());
        assert!(store.get_user("b@x.io").unwrap().unwrap().is_admin);
    }

    #[test]
    fn test_list_users() {
        let store = Store::in_memory().unwrap();
        store.upsert_user("a@x.io", false, false).unwrap();
        store.upsert_user("b@x.io", true, false).unwrap();
        assert_eq!(store.list_users().unwrap().len(), 2);
    }

    #[test]
    fn test_usage_counter_roundtrip() {
        let store = Store::in_memory().unwrap();
        assert_eq!(store.usage_get("a@x.io", PeriodType::Daily, "2024-05-01").unwrap(), 0);

        store.usage_put("a@x.io", PeriodType::Daily, "2024-05-01", 3).unwrap();
        store.usage_put("a@x.io", PeriodType::Daily, "2024-05-01", 4).unwrap();

        assert_eq!(store.usage_get("a@x.io", PeriodType::Daily, "2024-05-01").unwrap(), 4);
        assert_eq!(store.usage_get("a@x.io", PeriodType::Monthly, "2024-05").unwrap(), 0);
        assert_eq!(store.usage_get("a@x.io", PeriodType::Daily, "2024-05-02").unwrap(), 0);
    }

    #[test]
    fn test_usage_increment_creates_and_adds() {
        let store = Store::in_memory().unwrap();
        store.usage_increment("A@x.io", PeriodType::Monthly, "2024-05").unwrap();
        store.usage_increment("a@x.io", PeriodType::Monthly, "2024-05").unwrap();
        store.usage_put("a@x.io", PeriodType::Daily, "2024-05-01", 7).unwrap();
        store.usage_increment("a@x.io", PeriodType::Daily, "2024-05-01").unwrap();

        assert_eq!(store.usage_get("a@x.io", PeriodType::Monthly, "2024-05").unwrap(), 2);
        assert_eq!(store.usage_get("a@x.io", PeriodType::Daily, "2024-05-01").unwrap(), 8);
    }

    #[test]
    fn test_audit_trail() {
        let store = Store::in_memory().unwrap();
        store.insert_audit(Some("A@x.io"), "login", &json!({"is_admin": false})).unwrap();
        store.insert_audit(None, "startup", &json!({})).unwrap();

        let events = store.recent_audit(10).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "startup");
        assert_eq!(events[1].email.as_deref(), Some("a@x.io"));
        assert_eq!(events[1].detail["is_admin"], json!(false));
    }
}
