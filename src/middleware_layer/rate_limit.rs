use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    error::AppError,
    models::audit::{AuditAction, AuditEvent, AuditOutcome, Severity},
    state::AppState,
};

use super::auth::request_context;

/// A middleware that rate limits login attempts per client IP.
///
/// Fixed window, thresholds from configuration. Denials carry a generic
/// message and a Warning-severity audit event.
pub async fn rate_limit_login(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let ctx = request_context(&req);

    let allowed = match state.login_limiter.allow("login", &ctx.ip, ctx.now).await {
        Ok(allowed) => allowed,
        Err(e) => return e.into_response(),
    };

    if !allowed {
        state
            .audit
            .record(
                AuditEvent::new(ctx.now, AuditAction::RateLimited, AuditOutcome::Blocked, Severity::Warning, ctx.ip.clone())
                    .resource("endpoint", req.uri().path())
                    .details("login rate limit exceeded"),
            )
            .await;
        return AppError::RateLimitExceeded(format!("login attempts from {}", ctx.ip))
            .into_response();
    }

    // The login handler consumes the same context the limiter saw.
    req.extensions_mut().insert(ctx);

    next.run(req).await
}
