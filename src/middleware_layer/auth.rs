use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    error::AppError,
    handlers::auth::{create_secure_cookie, SESSION_COOKIE},
    models::session::RequestContext,
    state::AppState,
};

/// Extracts the session token from the request cookies.
fn extract_session_token(cookies: &Cookies) -> Option<Uuid> {
    cookies
        .get(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
}

/// Extracts the real IP address from the request extensions.
pub fn extract_real_ip(req: &Request<Body>) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Builds the per-request client context consumed by the guards.
pub fn request_context(req: &Request<Body>) -> RequestContext {
    let user_agent = req
        .headers()
        .get(http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    RequestContext::new(extract_real_ip(req), user_agent)
}

/// A middleware that requires a valid, non-anomalous, non-expired session.
///
/// On success the request carries `Authenticated` and `RequestContext`
/// extensions; when the guard rotated the session id, the cookie is
/// re-issued here.
pub async fn require_auth(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    tracing::debug!("🔐 Checking authentication...");

    let ctx = request_context(&request);

    let session_id = match extract_session_token(&cookies) {
        Some(id) => id,
        None => {
            tracing::warn!("❌ No session cookie found");
            return AppError::Unauthorized.into_response();
        }
    };

    let auth = match state.guard.authenticate(&ctx, session_id).await {
        Ok(auth) => auth,
        Err(e) => return e.into_response(),
    };

    if auth.rotated {
        cookies.add(create_secure_cookie(
            SESSION_COOKIE,
            auth.session_id.to_string(),
            state.config.session_timeout_secs,
        ));
        tracing::debug!("🔄 Session cookie re-issued after rotation");
    }

    tracing::debug!("✅ User authenticated: {}", auth.session.user_id);

    request.extensions_mut().insert(ctx);
    request.extensions_mut().insert(auth);

    next.run(request).await
}
