use std::sync::Arc;
use crate::error::Result;
use crate::models::audit::AuditEvent;
use crate::repositories::audit::AuditSink;

/// Append-only recorder for security events.
///
/// A sink failure must never fail the caller's security decision, but it is
/// not swallowed either: the full event is replayed on the tracing error
/// channel as the fallback diagnostic path.
pub struct AuditLog {
    sink: Arc<dyn AuditSink>,
}

impl AuditLog {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Records one event, best-effort.
    pub async fn record(&self, event: AuditEvent) {
        tracing::info!(
            "📋 Audit: {} {} actor={:?} ip={} severity={}",
            event.action.as_str(),
            event.outcome.as_str(),
            event.actor_id,
            event.ip_address,
            event.severity.as_str(),
        );

        if let Err(e) = self.sink.insert(&event).await {
            tracing::error!(
                "❌ Audit sink write failed ({}); event: {} {} actor={:?} ip={} details={:?}",
                e,
                event.action.as_str(),
                event.outcome.as_str(),
                event.actor_id,
                event.ip_address,
                event.details,
            );
        }
    }

    /// Reads the most recent events, newest first, for the review screen.
    pub async fn recent(&self, limit: i64) -> Result<Vec<AuditEvent>> {
        self.sink.recent(limit).await
    }
}
