use std::sync::Arc;
use redis::aio::ConnectionManager;
use crate::config::Config;
use crate::crypto::cipher::FieldCipher;
use crate::error::Result;
use crate::repositories::audit::{AuditSink, PostgresAuditSink};
use crate::repositories::counter::{CounterStore, RedisCounterStore};
use crate::repositories::session::{RedisSessionStore, SessionStore};
use crate::repositories::user::{PostgresUserStore, UserStore};
use crate::services::audit::AuditLog;
use crate::services::auth::AuthService;
use crate::services::csrf_guard::CsrfGuard;
use crate::services::permissions::PermissionResolver;
use crate::services::rate_limiter::RateLimiter;
use crate::services::session_guard::SessionGuard;

/// The application's state: one explicitly constructed instance of every
/// security service, injected into the middleware and handlers.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Arc<Config>,
    /// PII field encryption, consumed by the business modules.
    pub cipher: Arc<FieldCipher>,
    /// The append-only security-event recorder.
    pub audit: Arc<AuditLog>,
    /// Per-request session checks.
    pub guard: Arc<SessionGuard>,
    /// CSRF issuance and verification.
    pub csrf: Arc<CsrfGuard>,
    /// Login/logout orchestration.
    pub auth: Arc<AuthService>,
    /// Fixed-window limiter for login attempts.
    pub login_limiter: Arc<RateLimiter>,
    /// Static role/module/action table.
    pub permissions: Arc<PermissionResolver>,
}

impl AppState {
    /// Creates the production state: PostgreSQL for credentials and audit,
    /// Redis for sessions and counters.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = crate::db::create_pool(&config.database_url)?;
        tracing::info!("✅ PostgreSQL pool initialized");

        let redis_client = redis::Client::open(config.redis_url.as_str())?;
        let redis = ConnectionManager::new(redis_client).await?;
        tracing::info!("✅ Redis connection manager initialized");

        let users: Arc<dyn UserStore> = Arc::new(PostgresUserStore::new(db.clone()));
        let sessions: Arc<dyn SessionStore> = Arc::new(RedisSessionStore::new(redis.clone()));
        let sink: Arc<dyn AuditSink> = Arc::new(PostgresAuditSink::new(db));
        let counters: Arc<dyn CounterStore> = Arc::new(RedisCounterStore::new(redis));

        Self::with_stores(config.clone(), users, sessions, sink, counters)
    }

    /// Wires the services over injected store backends. Used directly by the
    /// deterministic tests with the in-memory repositories.
    pub fn with_stores(
        config: Config,
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        sink: Arc<dyn AuditSink>,
        counters: Arc<dyn CounterStore>,
    ) -> Result<Self> {
        // Fails fast here when the configured key does not fit the cipher.
        let cipher = Arc::new(FieldCipher::new(&config.encryption_key)?);

        let audit = Arc::new(AuditLog::new(sink));

        let guard = Arc::new(SessionGuard::new(
            sessions.clone(),
            users.clone(),
            audit.clone(),
            config.session_timeout_secs,
            config.session_rotation_secs,
            config.fail_open_on_store_error,
        ));

        let csrf = Arc::new(CsrfGuard::new(
            sessions.clone(),
            config.csrf_ttl_secs,
            config.session_timeout_secs as u64,
        ));

        let auth = Arc::new(AuthService::new(
            users,
            sessions,
            audit.clone(),
            config.max_login_attempts,
            config.session_timeout_secs as u64,
        ));

        let login_limiter = Arc::new(RateLimiter::new(
            counters,
            config.login_rate_limit,
            config.login_rate_window_secs,
        ));

        Ok(AppState {
            config: Arc::new(config),
            cipher,
            audit,
            guard,
            csrf,
            auth,
            login_limiter,
            permissions: Arc::new(PermissionResolver::hospital_defaults()),
        })
    }
}
