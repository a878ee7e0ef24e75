use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use crate::{
    error::{AppError, Result},
    models::audit::{AuditAction, AuditEvent, AuditOutcome, Severity},
};

/// The sink for security events. Events are append-only: no update or delete
/// surface exists by construction, only inserts and reads.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Appends one event.
    async fn insert(&self, event: &AuditEvent) -> Result<()>;

    /// Returns the most recent events, newest first.
    async fn recent(&self, limit: i64) -> Result<Vec<AuditEvent>>;
}

/// `AuditSink` backed by PostgreSQL.
pub struct PostgresAuditSink {
    pool: Pool,
}

impl PostgresAuditSink {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

/// A helper function to map a `tokio_postgres::Row` to an `AuditEvent`.
fn row_to_event(row: &Row) -> Result<AuditEvent> {
    let action: String = row.try_get("action").map_err(|_| AppError::MissingData("action".to_string()))?;
    let outcome: String = row.try_get("outcome").map_err(|_| AppError::MissingData("outcome".to_string()))?;
    let severity: String = row.try_get("severity").map_err(|_| AppError::MissingData("severity".to_string()))?;

    Ok(AuditEvent {
        timestamp: row.try_get("occurred_at").map_err(|_| AppError::MissingData("occurred_at".to_string()))?,
        actor_id: row.try_get("actor_id").map_err(|_| AppError::MissingData("actor_id".to_string()))?,
        action: AuditAction::parse(&action)
            .ok_or_else(|| AppError::MissingData(format!("unknown action '{}'", action)))?,
        resource_type: row.try_get("resource_type").map_err(|_| AppError::MissingData("resource_type".to_string()))?,
        resource_id: row.try_get("resource_id").map_err(|_| AppError::MissingData("resource_id".to_string()))?,
        outcome: AuditOutcome::parse(&outcome)
            .ok_or_else(|| AppError::MissingData(format!("unknown outcome '{}'", outcome)))?,
        ip_address: row.try_get("ip_address").map_err(|_| AppError::MissingData("ip_address".to_string()))?,
        severity: Severity::parse(&severity)
            .ok_or_else(|| AppError::MissingData(format!("unknown severity '{}'", severity)))?,
        details: row.try_get("details").map_err(|_| AppError::MissingData("details".to_string()))?,
    })
}

#[async_trait]
impl AuditSink for PostgresAuditSink {
    async fn insert(&self, event: &AuditEvent) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                r#"
                INSERT INTO audit_events
                    (occurred_at, actor_id, action, resource_type, resource_id,
                     outcome, ip_address, severity, details)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
                &[
                    &event.timestamp,
                    &event.actor_id,
                    &event.action.as_str(),
                    &event.resource_type,
                    &event.resource_id,
                    &event.outcome.as_str(),
                    &event.ip_address,
                    &event.severity.as_str(),
                    &event.details,
                ],
            )
            .await?;
        Ok(())
    }

    async fn recent(&self, limit: i64) -> Result<Vec<AuditEvent>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                r#"
                SELECT occurred_at, actor_id, action, resource_type, resource_id,
                       outcome, ip_address, severity, details
                FROM audit_events
                ORDER BY occurred_at DESC
                LIMIT $1
                "#,
                &[&limit],
            )
            .await?;
        rows.iter().map(row_to_event).collect()
    }
}
