//! Best-effort activity recording.
//!
//! Handlers call `ActivityRecorder::record` after a mutation. Recording never
//! fails the caller: every storage or serialization problem is logged and
//! folded into an `AuditOutcome::Dropped`. The audit write is independent of
//! the business write it describes, so a crash between the two loses the
//! entry but never rolls back the business change.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use serde::Serialize;
use tracing::error;

use crate::auth::{HasAuthBackend, extract_client_ip};
use crate::db::{ActivityInsert, Database};

/// Where a request came from, captured for the audit row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOrigin {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestOrigin {
    /// Origin for actions started by the operator rather than an HTTP request.
    pub fn system(label: &str) -> Self {
        Self {
            ip_address: None,
            user_agent: Some(label.to_string()),
        }
    }
}

impl<S> FromRequestParts<S> for RequestOrigin
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(RequestOrigin {
            ip_address: extract_client_ip(&*parts, state.ip_header()).ok(),
            user_agent,
        })
    }
}

/// An action to record.
#[derive(Debug, Clone)]
pub struct NewActivity {
    action: String,
    entity_type: Option<String>,
    entity_id: Option<i64>,
    details: Option<Result<String, String>>,
}

impl NewActivity {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            entity_type: None,
            entity_id: None,
            details: None,
        }
    }

    /// Set the entity type and ID.
    pub fn entity(mut self, entity_type: impl Into<String>, entity_id: i64) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id);
        self
    }

    /// Set only the entity type, for actions without a single target row.
    pub fn entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    /// Attach a details payload, serialized to JSON text.
    pub fn details<T: Serialize + ?Sized>(mut self, details: &T) -> Self {
        self.details = Some(serde_json::to_string(details).map_err(|e| e.to_string()));
        self
    }

    pub fn action(&self) -> &str {
        &self.action
    }
}

/// What happened to an audit write. Callers may inspect it; nothing requires them to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditOutcome {
    Recorded { id: i64 },
    Dropped { reason: String },
}

impl AuditOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, AuditOutcome::Recorded { .. })
    }
}

/// Appends activity log entries.
#[derive(Clone)]
pub struct ActivityRecorder {
    db: Database,
}

impl ActivityRecorder {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Append one entry. `actor` is `None` for anonymous or system actions; a
    /// user ID that no longer exists is stored as-is.
    pub async fn record(
        &self,
        actor: Option<i64>,
        origin: &RequestOrigin,
        activity: NewActivity,
    ) -> AuditOutcome {
        let details = match activity.details.transpose() {
            Ok(details) => details,
            Err(reason) => {
                error!(action = %activity.action, error = %reason, "Failed to serialize activity details");
                return AuditOutcome::Dropped { reason };
            }
        };

        let insert = ActivityInsert {
            user_id: actor,
            action: &activity.action,
            entity_type: activity.entity_type.as_deref(),
            entity_id: activity.entity_id,
            details: details.as_deref(),
            ip_address: origin.ip_address.as_deref(),
            user_agent: origin.user_agent.as_deref(),
        };

        match self.db.activity().insert(&insert).await {
            Ok(id) => AuditOutcome::Recorded { id },
            Err(e) => {
                error!(action = %activity.action, error = %e, "Failed to record activity");
                AuditOutcome::Dropped {
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn origin() -> RequestOrigin {
        RequestOrigin {
            ip_address: Some("198.51.100.4".into()),
            user_agent: Some("Mozilla/5.0".into()),
        }
    }

    #[tokio::test]
    async fn test_record_writes_full_row() {
        let db = Database::open(":memory:").await.unwrap();
        let recorder = ActivityRecorder::new(db.clone());

        let outcome = recorder
            .record(
                Some(3),
                &origin(),
                NewActivity::new("UPDATE")
                    .entity("patient", 12)
                    .details(&serde_json::json!({ "blood_type": "O+" })),
            )
            .await;
        assert!(outcome.is_recorded());

        let entries = db.activity().list_by_user(3).await.unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.action, "UPDATE");
        assert_eq!(entry.entity_type.as_deref(), Some("patient"));
        assert_eq!(entry.entity_id, Some(12));
        assert_eq!(entry.details.as_deref(), Some(r#"{"blood_type":"O+"}"#));
        assert_eq!(entry.ip_address.as_deref(), Some("198.51.100.4"));
        assert_eq!(entry.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert!(!entry.created_at.is_empty());
    }

    #[tokio::test]
    async fn test_record_anonymous_without_entity() {
        let db = Database::open(":memory:").await.unwrap();
        let recorder = ActivityRecorder::new(db.clone());

        let outcome = recorder
            .record(None, &RequestOrigin::default(), NewActivity::new("LOGIN_FAILED"))
            .await;
        assert!(outcome.is_recorded());

        let entries = db.activity().list_recent().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].user_id.is_none());
        assert!(entries[0].entity_type.is_none());
        assert!(entries[0].details.is_none());
    }

    #[tokio::test]
    async fn test_storage_failure_is_dropped_not_raised() {
        let db = Database::open(":memory:").await.unwrap();
        sqlx::query("DROP TABLE activity_log")
            .execute(db.pool())
            .await
            .unwrap();
        let recorder = ActivityRecorder::new(db);

        let outcome = recorder
            .record(Some(1), &origin(), NewActivity::new("DELETE").entity("doctor", 5))
            .await;

        assert!(matches!(outcome, AuditOutcome::Dropped { .. }));
    }

    #[tokio::test]
    async fn test_serialization_failure_is_dropped() {
        let db = Database::open(":memory:").await.unwrap();
        let recorder = ActivityRecorder::new(db.clone());

        // JSON object keys must be strings
        let mut bad = HashMap::new();
        bad.insert((1, 2), "x");

        let outcome = recorder
            .record(Some(1), &origin(), NewActivity::new("CREATE").details(&bad))
            .await;

        assert!(matches!(outcome, AuditOutcome::Dropped { .. }));
        assert!(db.activity().list_recent().await.unwrap().is_empty());
    }
}
