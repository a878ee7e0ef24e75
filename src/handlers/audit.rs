use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};

use crate::{
    error::Result,
    models::audit::{AuditAction, AuditEvent, AuditOutcome, Severity},
    models::session::RequestContext,
    services::session_guard::Authenticated,
    state::AppState,
};

/// How many events the review screen shows per request.
const EVENT_PAGE_SIZE: i64 = 100;

/// Returns the most recent security events, newest first.
///
/// Requires the `audit`/`view` permission; a denied request is itself
/// recorded before the 403 goes out.
#[axum::debug_handler]
pub async fn list_events(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Extension(auth): Extension<Authenticated>,
) -> Result<Response> {
    if let Err(denied) = state
        .permissions
        .ensure_permission(&auth.session.role, "audit", "view")
    {
        tracing::warn!(
            "⛔ Audit trail denied for {} (role {})",
            auth.session.username,
            auth.session.role
        );
        state
            .audit
            .record(
                AuditEvent::new(ctx.now, AuditAction::PermissionDenied, AuditOutcome::Blocked, Severity::Warning, ctx.ip.clone())
                    .actor(auth.session.user_id)
                    .resource("module", "audit")
                    .details(format!("role '{}' requested the audit trail", auth.session.role)),
            )
            .await;
        return Err(denied);
    }

    let events = state.audit.recent(EVENT_PAGE_SIZE).await?;
    Ok((StatusCode::OK, Json(events)).into_response())
}
