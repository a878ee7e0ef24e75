use std::sync::Arc;
use uuid::Uuid;
use crate::{
    crypto::password::{hash_password, verify_credential},
    error::{AppError, Result},
    models::audit::{AuditAction, AuditEvent, AuditOutcome, Severity},
    models::session::{RequestContext, Session},
    repositories::session::SessionStore,
    repositories::user::UserStore,
    services::audit::AuditLog,
};

/// Login and logout orchestration: credential verification, lockout
/// accounting, legacy-hash migration, and session creation.
pub struct AuthService {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    audit: Arc<AuditLog>,
    /// Failed attempts at which the account locks.
    max_login_attempts: i32,
    /// TTL for freshly stored sessions, in seconds.
    session_ttl_secs: u64,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        audit: Arc<AuditLog>,
        max_login_attempts: i32,
        session_ttl_secs: u64,
    ) -> Self {
        Self { users, sessions, audit, max_login_attempts, session_ttl_secs }
    }

    /// Authenticates a user and creates a session bound to the request's
    /// client context.
    ///
    /// # Returns
    ///
    /// A `Result` containing the new session id and record. Every failure
    /// path has already been audited, and every error variant renders the
    /// same generic message to the client.
    pub async fn login(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
    ) -> Result<(Uuid, Session)> {
        tracing::debug!("🔐 Login attempt for: {}", username);

        let user = match self.users.find_by_username(username).await? {
            Some(user) => user,
            None => {
                // actor_id stays null: there is no account to attribute.
                self.audit
                    .record(
                        AuditEvent::new(ctx.now, AuditAction::Login, AuditOutcome::Failure, Severity::Warning, ctx.ip.clone())
                            .resource("account", username)
                            .details("unknown username"),
                    )
                    .await;
                return Err(AppError::Authentication(format!("unknown username: {}", username)));
            }
        };

        // Lock check precedes verification: a locked account is rejected
        // regardless of password correctness.
        if user.is_locked() {
            self.audit
                .record(
                    AuditEvent::new(ctx.now, AuditAction::Login, AuditOutcome::Blocked, Severity::High, ctx.ip.clone())
                        .actor(user.id)
                        .resource("account", username)
                        .details("login attempt against locked account"),
                )
                .await;
            return Err(AppError::AccountLocked(user.username));
        }

        if !user.is_active {
            self.audit
                .record(
                    AuditEvent::new(ctx.now, AuditAction::Login, AuditOutcome::Blocked, Severity::Warning, ctx.ip.clone())
                        .actor(user.id)
                        .resource("account", username)
                        .details("login attempt against inactive account"),
                )
                .await;
            return Err(AppError::AccountInactive(user.username));
        }

        let outcome = verify_credential(password, &user.credential())?;

        if !outcome.valid {
            let attempts = user.failed_attempts + 1;
            self.users.update_failed_attempts(&user.id, attempts).await?;

            if attempts >= self.max_login_attempts {
                self.users.lock_account(&user.id, ctx.now).await?;
                tracing::warn!(
                    "🔒 Account {} locked after {} failed attempts",
                    user.username,
                    attempts
                );
                self.audit
                    .record(
                        AuditEvent::new(ctx.now, AuditAction::AccountLocked, AuditOutcome::Blocked, Severity::High, ctx.ip.clone())
                            .actor(user.id)
                            .resource("account", username)
                            .details(format!("locked after {} failed attempts", attempts)),
                    )
                    .await;
            }

            self.audit
                .record(
                    AuditEvent::new(ctx.now, AuditAction::Login, AuditOutcome::Failure, Severity::Warning, ctx.ip.clone())
                        .actor(user.id)
                        .resource("account", username)
                        .details(format!("wrong password (attempt {})", attempts)),
                )
                .await;
            return Err(AppError::Authentication(format!("wrong password for: {}", username)));
        }

        if outcome.needs_rehash {
            // Best-effort migration off the legacy fast hash; a failure here
            // must not cost the user their login.
            match hash_password(password) {
                Ok(modern) => {
                    if let Err(e) = self.users.update_password_hash(&user.id, &modern).await {
                        tracing::error!("❌ Legacy hash migration failed for {}: {}", user.username, e);
                    } else {
                        tracing::info!("⬆️ Migrated {} to Argon2 credential", user.username);
                    }
                }
                Err(e) => tracing::error!("❌ Re-hash failed for {}: {}", user.username, e),
            }
        }

        if user.failed_attempts > 0 {
            self.users.update_failed_attempts(&user.id, 0).await?;
        }

        let session_id = Uuid::new_v4();
        let session = Session {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role.clone(),
            bound_ip: ctx.ip.clone(),
            bound_user_agent: ctx.user_agent.clone(),
            created_at: ctx.now,
            last_activity_at: ctx.now,
            csrf: None,
        };
        self.sessions.put(&session_id, &session, self.session_ttl_secs).await?;

        tracing::info!("✅ User logged in: {} ({})", user.username, user.id);
        self.audit
            .record(
                AuditEvent::new(ctx.now, AuditAction::Login, AuditOutcome::Success, Severity::Info, ctx.ip.clone())
                    .actor(user.id)
                    .resource("session", session_id.to_string()),
            )
            .await;

        Ok((session_id, session))
    }

    /// Destroys the session and records the logout.
    pub async fn logout(
        &self,
        ctx: &RequestContext,
        session_id: &Uuid,
        session: &Session,
    ) -> Result<()> {
        self.sessions.destroy(session_id).await?;

        tracing::info!("👋 User logged out: {}", session.username);
        self.audit
            .record(
                AuditEvent::new(ctx.now, AuditAction::Logout, AuditOutcome::Success, Severity::Info, ctx.ip.clone())
                    .actor(session.user_id)
                    .resource("session", session_id.to_string()),
            )
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::crypto::password::hash_with_salt;
    use crate::models::user::User;
    use crate::repositories::memory::{MemoryAuditSink, MemorySessionStore, MemoryUserStore};

    const MAX_ATTEMPTS: i32 = 5;

    struct Harness {
        auth: AuthService,
        users: Arc<MemoryUserStore>,
        sessions: Arc<MemorySessionStore>,
        sink: Arc<MemoryAuditSink>,
        user_id: Uuid,
    }

    fn ctx() -> RequestContext {
        RequestContext {
            ip: "10.0.0.1".to_string(),
            user_agent: "ward-terminal/1.0".to_string(),
            now: Utc::now(),
        }
    }

    fn harness_with(password_hash: String, password_salt: Option<String>) -> Harness {
        let users = Arc::new(MemoryUserStore::new());
        let sessions = Arc::new(MemorySessionStore::new());
        let sink = Arc::new(MemoryAuditSink::new());
        let audit = Arc::new(AuditLog::new(sink.clone()));

        let user_id = Uuid::new_v4();
        users.insert(User {
            id: user_id,
            username: "admin".to_string(),
            name: "Site Admin".to_string(),
            role: "admin".to_string(),
            password_hash,
            password_salt,
            failed_attempts: 0,
            locked_at: None,
            is_active: true,
            created_at: Utc::now(),
        });

        let auth = AuthService::new(users.clone(), sessions.clone(), audit, MAX_ATTEMPTS, 1440);
        Harness { auth, users, sessions, sink, user_id }
    }

    fn harness() -> Harness {
        harness_with(hash_password("Admin-Pass-1").unwrap(), None)
    }

    #[tokio::test]
    async fn successful_login_creates_bound_session() {
        let h = harness();
        let (session_id, session) = h.auth.login(&ctx(), "admin", "Admin-Pass-1").await.unwrap();

        assert_eq!(session.username, "admin");
        assert_eq!(session.bound_ip, "10.0.0.1");
        assert_eq!(session.bound_user_agent, "ward-terminal/1.0");
        assert_eq!(session.created_at, session.last_activity_at);
        assert!(h.sessions.get(&session_id).await.unwrap().is_some());

        let events = h.sink.events();
        assert!(events
            .iter()
            .any(|e| e.action == AuditAction::Login && e.outcome == AuditOutcome::Success));
    }

    #[tokio::test]
    async fn unknown_username_is_generic_and_audited_without_actor() {
        let h = harness();
        let err = h.auth.login(&ctx(), "ghost", "whatever").await.unwrap_err();
        assert!(matches!(err, AppError::Authentication(_)));

        let events = h.sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].actor_id, None);
        assert_eq!(events[0].outcome, AuditOutcome::Failure);
    }

    #[tokio::test]
    async fn five_failures_lock_and_sixth_is_rejected_regardless_of_password() {
        let h = harness();

        for _ in 0..MAX_ATTEMPTS {
            let err = h.auth.login(&ctx(), "admin", "wrong-password").await.unwrap_err();
            assert!(matches!(err, AppError::Authentication(_)));
        }

        let user = h.users.find_by_id(&h.user_id).await.unwrap().unwrap();
        assert!(user.is_locked());
        assert_eq!(user.failed_attempts, MAX_ATTEMPTS);

        // Sixth attempt with the CORRECT password: still rejected as locked.
        let err = h.auth.login(&ctx(), "admin", "Admin-Pass-1").await.unwrap_err();
        assert!(matches!(err, AppError::AccountLocked(_)));

        let events = h.sink.events();
        assert!(events.iter().any(|e| e.action == AuditAction::AccountLocked));
    }

    #[tokio::test]
    async fn success_resets_failed_attempts() {
        let h = harness();

        h.auth.login(&ctx(), "admin", "nope").await.unwrap_err();
        h.auth.login(&ctx(), "admin", "nope").await.unwrap_err();
        assert_eq!(
            h.users.find_by_id(&h.user_id).await.unwrap().unwrap().failed_attempts,
            2
        );

        h.auth.login(&ctx(), "admin", "Admin-Pass-1").await.unwrap();
        assert_eq!(
            h.users.find_by_id(&h.user_id).await.unwrap().unwrap().failed_attempts,
            0
        );
    }

    #[tokio::test]
    async fn legacy_credential_migrates_on_successful_login() {
        let (hash, salt) = hash_with_salt("Old-Ward-Pass", None).unwrap();
        let h = harness_with(hash, Some(salt));

        h.auth.login(&ctx(), "admin", "Old-Ward-Pass").await.unwrap();

        let user = h.users.find_by_id(&h.user_id).await.unwrap().unwrap();
        assert!(user.password_salt.is_none());
        assert!(user.password_hash.starts_with("$argon2"));

        // And the migrated credential still verifies.
        h.auth.login(&ctx(), "admin", "Old-Ward-Pass").await.unwrap();
    }

    #[tokio::test]
    async fn inactive_account_is_blocked() {
        let h = harness();
        let mut user = h.users.find_by_id(&h.user_id).await.unwrap().unwrap();
        user.is_active = false;
        h.users.insert(user);

        let err = h.auth.login(&ctx(), "admin", "Admin-Pass-1").await.unwrap_err();
        assert!(matches!(err, AppError::AccountInactive(_)));
    }

    #[tokio::test]
    async fn logout_destroys_session_and_audits() {
        let h = harness();
        let (session_id, session) = h.auth.login(&ctx(), "admin", "Admin-Pass-1").await.unwrap();

        h.auth.logout(&ctx(), &session_id, &session).await.unwrap();
        assert!(h.sessions.get(&session_id).await.unwrap().is_none());

        let events = h.sink.events();
        assert!(events.iter().any(|e| e.action == AuditAction::Logout));
    }
}
