use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tower_cookies::{Cookie, Cookies};
use tower_cookies::cookie::time::Duration;
use uuid::Uuid;

use crate::{
    error::Result,
    models::audit::{AuditAction, AuditEvent, AuditOutcome, Severity},
    models::session::RequestContext,
    services::session_guard::Authenticated,
    state::AppState,
    validation::auth::validate_username,
};

/// The session cookie name.
pub const SESSION_COOKIE: &str = "session_id";

/// The request payload for user login.
#[derive(Deserialize, Debug)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// The response payload for a successful login.
#[derive(Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    /// Echoed back on state-changing requests via `X-CSRF-Token`.
    pub csrf_token: String,
}

/// The response payload for authentication-related requests.
#[derive(Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
}

/// The current-session payload backing the page `<meta>` CSRF tag.
#[derive(Serialize)]
pub struct SessionResponse {
    pub user_id: Uuid,
    pub username: String,
    pub role: String,
    pub csrf_token: String,
}

/// The permission-lookup payload.
#[derive(Serialize)]
pub struct PermissionResponse {
    pub module: String,
    pub action: String,
    pub allowed: bool,
}

/// Creates a hardened session-scope cookie.
pub(crate) fn create_secure_cookie(name: &str, value: String, max_age_secs: i64) -> Cookie<'static> {
    let mut cookie = Cookie::new(name.to_string(), value);

    let is_production = std::env::var("APP_ENV")
        .unwrap_or_else(|_| "development".to_string()) == "production";

    cookie.set_http_only(true);
    if is_production {
        cookie.set_secure(true);
    }
    cookie.set_same_site(tower_cookies::cookie::SameSite::Strict);
    cookie.set_max_age(Duration::seconds(max_age_secs));
    cookie.set_path("/");

    cookie
}

/// A cookie with an expiry in the past, clearing the client copy.
fn expired_cookie(name: &str) -> Cookie<'static> {
    let mut cookie = Cookie::new(name.to_string(), String::new());
    cookie.set_max_age(Duration::seconds(0));
    cookie.set_path("/");
    cookie
}

/// Handles user login.
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Extension(ctx): Extension<RequestContext>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response> {
    tracing::info!("🔐 Login attempt for: {}", payload.username);
    validate_username(&payload.username)?;

    let (session_id, _session) = state
        .auth
        .login(&ctx, &payload.username, &payload.password)
        .await?;

    cookies.add(create_secure_cookie(
        SESSION_COOKIE,
        session_id.to_string(),
        state.config.session_timeout_secs,
    ));
    tracing::debug!("✅ Session cookie added");

    let csrf_token = state.csrf.issue(&session_id, &ctx).await?;

    let response = LoginResponse {
        success: true,
        message: "Login successful".to_string(),
        csrf_token,
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Handles user logout.
#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    cookies: Cookies,
    Extension(ctx): Extension<RequestContext>,
    Extension(auth): Extension<Authenticated>,
) -> Result<Response> {
    state
        .auth
        .logout(&ctx, &auth.session_id, &auth.session)
        .await?;

    cookies.remove(expired_cookie(SESSION_COOKIE));

    let response = AuthResponse {
        success: true,
        message: "Logout successful".to_string(),
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Returns the current identity and its active CSRF token.
#[axum::debug_handler]
pub async fn session_info(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Extension(auth): Extension<Authenticated>,
) -> Result<Response> {
    let csrf_token = state.csrf.issue(&auth.session_id, &ctx).await?;

    let response = SessionResponse {
        user_id: auth.session.user_id,
        username: auth.session.username.clone(),
        role: auth.session.role.clone(),
        csrf_token,
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Permission lookup for UI gating: may the current role perform
/// `action` on `module`?
#[axum::debug_handler]
pub async fn check_permission(
    State(state): State<AppState>,
    Path((module, action)): Path<(String, String)>,
    Extension(ctx): Extension<RequestContext>,
    Extension(auth): Extension<Authenticated>,
) -> Result<Response> {
    let allowed = state
        .permissions
        .has_permission(&auth.session.role, &module, &action);

    if !allowed {
        state
            .audit
            .record(
                AuditEvent::new(ctx.now, AuditAction::PermissionDenied, AuditOutcome::Blocked, Severity::Info, ctx.ip.clone())
                    .actor(auth.session.user_id)
                    .resource("permission", format!("{}/{}", module, action))
                    .details(format!("role '{}'", auth.session.role)),
            )
            .await;
    }

    let response = PermissionResponse { module, action, allowed };

    Ok((StatusCode::OK, Json(response)).into_response())
}
