use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// The application's error type.
///
/// Authentication-class variants deliberately collapse to the same generic
/// user-facing message so responses never reveal whether a username exists
/// or an account is locked.
#[derive(Error, Debug)]
pub enum AppError {
    /// A fatal startup configuration error (bad key, unknown cipher).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A database error.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// A connection-pool error.
    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// A Redis error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// An authentication error. The message is already generic.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The session exceeded its idle timeout.
    #[error("Session expired")]
    SessionExpired,

    /// The session was bound to a different client (IP or User-Agent).
    #[error("Session anomaly detected")]
    SessionAnomaly,

    /// A missing, mismatched, or expired CSRF token.
    #[error("CSRF verification failed")]
    CsrfViolation,

    /// The account is locked after repeated failed logins.
    #[error("Account locked: {0}")]
    AccountLocked(String),

    /// The account was deactivated.
    #[error("Account inactive: {0}")]
    AccountInactive(String),

    /// The role does not grant the requested module/action.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// An authorization error.
    #[error("Authorization failed")]
    Unauthorized,

    /// A resource not found error.
    #[error("Resource not found")]
    NotFound,

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A symmetric-cipher or password-hash failure. Fails closed per call.
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// A row was missing an expected column.
    #[error("Missing data: {0}")]
    MissingData(String),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),

    /// A rate limit exceeded error.
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

/// The generic message returned for every credential-class failure.
pub const GENERIC_AUTH_MESSAGE: &str = "Invalid username or password";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Configuration(ref msg) => {
                tracing::error!("Configuration error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Configuration error".to_string())
            }

            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }

            AppError::Pool(ref e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }

            AppError::Redis(ref e) => {
                tracing::error!("Redis error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Cache error".to_string())
            }

            AppError::Authentication(ref msg) => {
                tracing::warn!("Authentication failed: {}", msg);
                (StatusCode::UNAUTHORIZED, GENERIC_AUTH_MESSAGE.to_string())
            }

            AppError::SessionExpired => {
                tracing::info!("Session expired");
                (StatusCode::UNAUTHORIZED, "Session expired. Please sign in again".to_string())
            }

            AppError::SessionAnomaly => {
                tracing::warn!("Session anomaly - forcing re-authentication");
                (StatusCode::UNAUTHORIZED, "Session is no longer valid. Please sign in again".to_string())
            }

            AppError::CsrfViolation => {
                tracing::warn!("CSRF verification failed");
                (StatusCode::FORBIDDEN, "Request could not be verified".to_string())
            }

            // Full identity is logged internally; the body stays generic so
            // lockout state cannot be probed from the outside.
            AppError::AccountLocked(ref who) => {
                tracing::warn!("Account locked: {}", who);
                (StatusCode::UNAUTHORIZED, GENERIC_AUTH_MESSAGE.to_string())
            }

            AppError::AccountInactive(ref who) => {
                tracing::warn!("Account inactive: {}", who);
                (StatusCode::UNAUTHORIZED, GENERIC_AUTH_MESSAGE.to_string())
            }

            AppError::PermissionDenied(ref msg) => {
                tracing::warn!("Permission denied: {}", msg);
                (StatusCode::FORBIDDEN, "Forbidden".to_string())
            }

            AppError::Unauthorized => {
                tracing::warn!("Authorization failed");
                (StatusCode::FORBIDDEN, "Forbidden".to_string())
            }

            AppError::NotFound => {
                tracing::debug!("Resource not found");
                (StatusCode::NOT_FOUND, "Resource not found".to_string())
            }

            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            AppError::Crypto(ref msg) => {
                tracing::error!("Crypto error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Encryption error".to_string())
            }

            AppError::MissingData(ref col) => {
                tracing::error!("Missing data: {}", col);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }

            AppError::RateLimitExceeded(ref msg) => {
                tracing::warn!("Rate limit exceeded: {}", msg);
                (StatusCode::TOO_MANY_REQUESTS, "Too many attempts. Please try again later".to_string())
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "error": message
        }))
        .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());

        (status, body).into_response()
    }
}
