//! Append-only activity log storage.
//!
//! Rows are inserted once and never updated or deleted by this service.

use sqlx::sqlite::SqlitePool;

/// A stored activity log entry.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ActivityEntry {
    pub id: i64,
    pub user_id: Option<i64>,
    pub action: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
    /// Serialized JSON payload, stored as text
    pub details: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct ActivityRow {
    id: i64,
    user_id: Option<i64>,
    action: String,
    entity_type: Option<String>,
    entity_id: Option<i64>,
    details: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: String,
}

impl From<ActivityRow> for ActivityEntry {
    fn from(row: ActivityRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            action: row.action,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            details: row.details,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            created_at: row.created_at,
        }
    }
}

/// Column values for a new entry. `created_at` is assigned by the database.
#[derive(Debug, Clone, Default)]
pub struct ActivityInsert<'a> {
    pub user_id: Option<i64>,
    pub action: &'a str,
    pub entity_type: Option<&'a str>,
    pub entity_id: Option<i64>,
    pub details: Option<&'a str>,
    pub ip_address: Option<&'a str>,
    pub user_agent: Option<&'a str>,
}

const SELECT_COLUMNS: &str = "SELECT id, user_id, action, entity_type, entity_id, details, ip_address, user_agent, created_at FROM activity_log";

/// Maximum number of entries returned by `list_recent`.
pub const RECENT_ACTIVITY_LIMIT: i64 = 1000;

#[derive(Clone)]
pub struct ActivityStore {
    pool: SqlitePool,
}

impl ActivityStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one entry. Returns the new row ID.
    pub async fn insert(&self, entry: &ActivityInsert<'_>) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO activity_log (user_id, action, entity_type, entity_id, details, ip_address, user_agent) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.user_id)
        .bind(entry.action)
        .bind(entry.entity_type)
        .bind(entry.entity_id)
        .bind(entry.details)
        .bind(entry.ip_address)
        .bind(entry.user_agent)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Newest entries first, capped at `RECENT_ACTIVITY_LIMIT`.
    pub async fn list_recent(&self) -> Result<Vec<ActivityEntry>, sqlx::Error> {
        let rows: Vec<ActivityRow> = sqlx::query_as(&format!(
            "{} ORDER BY created_at DESC, id DESC LIMIT ?",
            SELECT_COLUMNS
        ))
        .bind(RECENT_ACTIVITY_LIMIT)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ActivityEntry::from).collect())
    }

    /// All entries recorded for one actor, newest first.
    pub async fn list_by_user(&self, user_id: i64) -> Result<Vec<ActivityEntry>, sqlx::Error> {
        let rows: Vec<ActivityRow> = sqlx::query_as(&format!(
            "{} WHERE user_id = ? ORDER BY created_at DESC, id DESC",
            SELECT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ActivityEntry::from).collect())
    }
}
