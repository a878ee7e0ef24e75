use std::sync::Arc;
use uuid::Uuid;
use crate::{
    error::{AppError, Result},
    models::audit::{AuditAction, AuditEvent, AuditOutcome, Severity},
    models::session::{RequestContext, Session},
    repositories::session::SessionStore,
    repositories::user::UserStore,
    services::audit::AuditLog,
};

/// A session that passed every per-request check.
#[derive(Debug, Clone)]
pub struct Authenticated {
    /// The id the session is currently stored under. Differs from the
    /// cookie the client sent when this request triggered a rotation.
    pub session_id: Uuid,
    /// The session record after the activity touch.
    pub session: Session,
    /// Whether the session id was rotated on this request; the caller must
    /// re-issue the cookie.
    pub rotated: bool,
}

/// Per-request authentication: idle expiry, client binding, account-status
/// re-check, and periodic id rotation.
///
/// States: Anonymous → Authenticated → {Expired | Revoked | Rotated} →
/// Anonymous, where Rotated continues serving under a fresh id.
pub struct SessionGuard {
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn UserStore>,
    audit: Arc<AuditLog>,
    /// Idle timeout in seconds.
    timeout_secs: i64,
    /// Session-id age that triggers rotation, in seconds.
    rotation_secs: i64,
    /// Whether a user-store error during the status re-check lets the
    /// request through.
    fail_open: bool,
}

impl SessionGuard {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserStore>,
        audit: Arc<AuditLog>,
        timeout_secs: i64,
        rotation_secs: i64,
        fail_open: bool,
    ) -> Self {
        Self { sessions, users, audit, timeout_secs, rotation_secs, fail_open }
    }

    /// Checks the session presented by a protected request.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The request's client context and clock.
    /// * `session_id` - The id from the session cookie.
    ///
    /// # Returns
    ///
    /// A `Result` containing the authenticated session. Any rejection has
    /// already destroyed the server-side record where the spec requires it.
    pub async fn authenticate(
        &self,
        ctx: &RequestContext,
        session_id: Uuid,
    ) -> Result<Authenticated> {
        let mut session = self
            .sessions
            .get(&session_id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        // Hijack defenses run before the idle check: a stolen cookie is
        // rejected no matter how fresh the session is.
        if session.bound_ip != ctx.ip {
            tracing::warn!(
                "🚨 Session IP mismatch for {}: bound {}, got {}",
                session.username,
                session.bound_ip,
                ctx.ip
            );
            self.revoke(
                &session_id,
                &session,
                ctx,
                Severity::Critical,
                format!("IP mismatch: bound {}, observed {}", session.bound_ip, ctx.ip),
            )
            .await;
            return Err(AppError::SessionAnomaly);
        }

        if session.bound_user_agent != ctx.user_agent {
            tracing::warn!("🚨 Session User-Agent mismatch for {}", session.username);
            self.revoke(
                &session_id,
                &session,
                ctx,
                Severity::Warning,
                "User-Agent mismatch".to_string(),
            )
            .await;
            return Err(AppError::SessionAnomaly);
        }

        let idle = (ctx.now - session.last_activity_at).num_seconds();
        if idle > self.timeout_secs {
            tracing::info!("⏱️ Session for {} idle {}s, expiring", session.username, idle);
            self.sessions.destroy(&session_id).await?;
            self.audit
                .record(
                    AuditEvent::new(
                        ctx.now,
                        AuditAction::Logout,
                        AuditOutcome::Success,
                        Severity::Info,
                        ctx.ip.clone(),
                    )
                    .actor(session.user_id)
                    .details(format!("session expired after {}s idle", idle)),
                )
                .await;
            return Err(AppError::SessionExpired);
        }

        // Account status is re-checked on every request, not only at login;
        // a lock applied mid-session takes effect on the very next request.
        if let Err(e) = self.check_account_status(&session_id, &session, ctx).await {
            match e {
                AppError::Database(_) | AppError::Pool(_) | AppError::Redis(_) | AppError::Internal(_)
                    if self.fail_open =>
                {
                    tracing::warn!(
                        "⚠️ Account status check failed for {} ({}); continuing (fail-open)",
                        session.username,
                        e
                    );
                }
                other => return Err(other),
            }
        }

        let age = (ctx.now - session.created_at).num_seconds();
        let mut current_id = session_id;
        let mut rotated = false;

        session.last_activity_at = ctx.now;

        if age > self.rotation_secs {
            // Mitigates fixation: a new id, everything else preserved.
            let new_id = Uuid::new_v4();
            session.created_at = ctx.now;
            self.sessions
                .rotate(&session_id, &new_id, &session, self.timeout_secs as u64)
                .await?;
            tracing::info!("🔄 Rotated session id for {} (age {}s)", session.username, age);
            self.audit
                .record(
                    AuditEvent::new(
                        ctx.now,
                        AuditAction::SessionRotated,
                        AuditOutcome::Success,
                        Severity::Info,
                        ctx.ip.clone(),
                    )
                    .actor(session.user_id),
                )
                .await;
            current_id = new_id;
            rotated = true;
        } else {
            self.sessions
                .put(&session_id, &session, self.timeout_secs as u64)
                .await?;
        }

        Ok(Authenticated { session_id: current_id, session, rotated })
    }

    /// Re-reads the persisted account and rejects locked/inactive users.
    async fn check_account_status(
        &self,
        session_id: &Uuid,
        session: &Session,
        ctx: &RequestContext,
    ) -> Result<()> {
        let user = self
            .users
            .find_by_id(&session.user_id)
            .await?
            .ok_or_else(|| AppError::Authentication(format!("user {} no longer exists", session.user_id)))?;

        if user.is_locked() {
            self.revoke(
                session_id,
                session,
                ctx,
                Severity::High,
                "account locked mid-session".to_string(),
            )
            .await;
            return Err(AppError::AccountLocked(user.username));
        }

        if !user.is_active {
            self.revoke(
                session_id,
                session,
                ctx,
                Severity::High,
                "account deactivated mid-session".to_string(),
            )
            .await;
            return Err(AppError::AccountInactive(user.username));
        }

        Ok(())
    }

    /// Destroys the session and records the blocked-login audit event.
    async fn revoke(
        &self,
        session_id: &Uuid,
        session: &Session,
        ctx: &RequestContext,
        severity: Severity,
        details: String,
    ) {
        if let Err(e) = self.sessions.destroy(session_id).await {
            tracing::error!("❌ Failed to destroy revoked session {}: {}", session_id, e);
        }
        self.audit
            .record(
                AuditEvent::new(ctx.now, AuditAction::Login, AuditOutcome::Blocked, severity, ctx.ip.clone())
                    .actor(session.user_id)
                    .resource("session", session_id.to_string())
                    .details(details),
            )
            .await;
    }
}
