use std::env;
use anyhow::{Context, Result};
use zeroize::{Zeroize, Zeroizing};

/// The only cipher this service supports for PII field encryption.
pub const SUPPORTED_CIPHER: &str = "aes-256-gcm";

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The URL of the PostgreSQL database.
    pub database_url: String,
    /// The URL of the Redis server.
    pub redis_url: String,
    /// The address the server binds to.
    pub bind_addr: String,
    /// The symmetric key used for PII field encryption.
    pub encryption_key: Zeroizing<Vec<u8>>,
    /// The configured cipher name. Anything but AES-256-GCM is rejected at startup.
    pub cipher: String,
    /// Idle timeout for sessions, in seconds.
    pub session_timeout_secs: i64,
    /// Age after which a session id is rotated, in seconds.
    pub session_rotation_secs: i64,
    /// Validity window for CSRF tokens, in seconds.
    pub csrf_ttl_secs: i64,
    /// Failed login attempts before an account is locked.
    pub max_login_attempts: i32,
    /// Login attempts allowed per client IP per window.
    pub login_rate_limit: u64,
    /// Fixed-window size for the login rate limit, in seconds.
    pub login_rate_window_secs: i64,
    /// Whether a persistence error during the mid-session account-status
    /// check lets the request through. Risky, but matches the documented
    /// baseline behavior; set to false to fail closed.
    pub fail_open_on_store_error: bool,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`. Invalid key material or an
    /// unsupported cipher is a fatal error.
    pub fn from_env() -> Result<Self> {
        let mut encryption_key_hex = env::var("ENCRYPTION_KEY")
            .context("ENCRYPTION_KEY must be set (generate with: openssl rand -hex 32)")?;

        let encryption_key_bytes = hex::decode(&encryption_key_hex)
            .context("ENCRYPTION_KEY must be valid hexadecimal")?;

        encryption_key_hex.zeroize();

        if encryption_key_bytes.len() != 32 {
            anyhow::bail!("ENCRYPTION_KEY must be exactly 32 bytes (64 hex characters)");
        }

        let cipher = env::var("ENCRYPTION_CIPHER")
            .unwrap_or_else(|_| SUPPORTED_CIPHER.to_string())
            .to_lowercase();

        if cipher != SUPPORTED_CIPHER {
            anyhow::bail!(
                "ENCRYPTION_CIPHER '{}' is not supported (only {})",
                cipher,
                SUPPORTED_CIPHER
            );
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .context("DATABASE_URL must be set")?,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:3000".to_string()),
            encryption_key: Zeroizing::new(encryption_key_bytes),
            cipher,
            session_timeout_secs: parse_env("SESSION_TIMEOUT_SECS", 1440)?,
            session_rotation_secs: parse_env("SESSION_ROTATION_SECS", 1800)?,
            csrf_ttl_secs: parse_env("CSRF_TTL_SECS", 3600)?,
            max_login_attempts: parse_env("MAX_LOGIN_ATTEMPTS", 5)?,
            login_rate_limit: parse_env("LOGIN_RATE_LIMIT", 10)?,
            login_rate_window_secs: parse_env("LOGIN_RATE_WINDOW_SECS", 900)?,
            fail_open_on_store_error: parse_env("FAIL_OPEN_ON_STORE_ERROR", true)?,
        })
    }
}

/// Parses an optional environment variable, falling back to a default.
fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("Invalid {}", name)),
        Err(_) => Ok(default),
    }
}
