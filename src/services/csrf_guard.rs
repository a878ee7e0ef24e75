use std::sync::Arc;
use uuid::Uuid;
use crate::{
    crypto::password::constant_time_eq,
    crypto::token,
    error::{AppError, Result},
    models::session::{CsrfState, RequestContext},
    repositories::session::SessionStore,
};

/// Per-session CSRF token issuance and time-boxed verification.
///
/// At most one token is active per session. Issuance is idempotent while the
/// stored token is inside its validity window; verification is constant-time
/// and clears an expired token so a byte-identical replay can never pass.
pub struct CsrfGuard {
    sessions: Arc<dyn SessionStore>,
    /// Token validity window in seconds.
    ttl_secs: i64,
    /// TTL applied when the session record is written back.
    store_ttl_secs: u64,
}

impl CsrfGuard {
    pub fn new(sessions: Arc<dyn SessionStore>, ttl_secs: i64, store_ttl_secs: u64) -> Self {
        Self { sessions, ttl_secs, store_ttl_secs }
    }

    /// Returns the session's active token, minting a fresh one when none
    /// exists or the stored one has aged out of the window.
    pub async fn issue(&self, session_id: &Uuid, ctx: &RequestContext) -> Result<String> {
        let mut session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if let Some(csrf) = &session.csrf {
            if (ctx.now - csrf.issued_at).num_seconds() <= self.ttl_secs {
                return Ok(csrf.token.clone());
            }
        }

        let fresh = token::generate_csrf_token();
        session.csrf = Some(CsrfState {
            token: fresh.clone(),
            issued_at: ctx.now,
        });
        self.sessions.put(session_id, &session, self.store_ttl_secs).await?;

        tracing::debug!("🔐 Issued CSRF token for session {}", session_id);
        Ok(fresh)
    }

    /// Verifies a candidate token for the session.
    ///
    /// # Returns
    ///
    /// `Ok(false)` when no token is stored, the stored token has expired
    /// (in which case it is also cleared), or the candidate does not match.
    pub async fn verify(
        &self,
        session_id: &Uuid,
        candidate: &str,
        ctx: &RequestContext,
    ) -> Result<bool> {
        let mut session = match self.sessions.get(session_id).await? {
            Some(session) => session,
            None => return Ok(false),
        };

        let csrf = match &session.csrf {
            Some(csrf) => csrf.clone(),
            None => return Ok(false),
        };

        if (ctx.now - csrf.issued_at).num_seconds() > self.ttl_secs {
            session.csrf = None;
            self.sessions.put(session_id, &session, self.store_ttl_secs).await?;
            tracing::warn!("⏱️ Expired CSRF token cleared for session {}", session_id);
            return Ok(false);
        }

        Ok(constant_time_eq(&csrf.token, candidate))
    }
}
