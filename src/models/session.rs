use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The CSRF token bound to a session. At most one is active at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrfState {
    /// The hex-encoded token value.
    pub token: String,
    /// When the token was issued.
    pub issued_at: DateTime<Utc>,
}

/// Represents a user session.
///
/// The record is bound to the client IP and User-Agent observed at login;
/// a mismatch on any later request revokes it. The session id under which
/// this record is stored rotates periodically while the fields survive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// The ID of the user this session belongs to.
    pub user_id: Uuid,
    /// The username, denormalized for audit events.
    pub username: String,
    /// The role captured at login.
    pub role: String,
    /// The client IP observed at login.
    pub bound_ip: String,
    /// The User-Agent observed at login.
    pub bound_user_agent: String,
    /// When the current session id was issued. Reset on rotation.
    pub created_at: DateTime<Utc>,
    /// The last request served under this session.
    pub last_activity_at: DateTime<Utc>,
    /// The active CSRF token, if one has been issued.
    pub csrf: Option<CsrfState>,
}

/// The client context of one request, injected into every security check.
///
/// Carrying `now` explicitly keeps the guards deterministic under test.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// The client IP address.
    pub ip: String,
    /// The client User-Agent header.
    pub user_agent: String,
    /// The instant the request was received.
    pub now: DateTime<Utc>,
}

impl RequestContext {
    /// Creates a context stamped with the current time.
    pub fn new(ip: String, user_agent: String) -> Self {
        Self { ip, user_agent, now: Utc::now() }
    }
}
