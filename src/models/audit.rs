use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The action a security event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    Login,
    Logout,
    CsrfAttack,
    AccountLocked,
    PermissionDenied,
    RateLimited,
    SessionRotated,
}

impl AuditAction {
    /// The stable wire/storage name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Login => "LOGIN",
            AuditAction::Logout => "LOGOUT",
            AuditAction::CsrfAttack => "CSRF_ATTACK",
            AuditAction::AccountLocked => "ACCOUNT_LOCKED",
            AuditAction::PermissionDenied => "PERMISSION_DENIED",
            AuditAction::RateLimited => "RATE_LIMITED",
            AuditAction::SessionRotated => "SESSION_ROTATED",
        }
    }

    /// The inverse of [`AuditAction::as_str`], for reading stored events.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LOGIN" => Some(AuditAction::Login),
            "LOGOUT" => Some(AuditAction::Logout),
            "CSRF_ATTACK" => Some(AuditAction::CsrfAttack),
            "ACCOUNT_LOCKED" => Some(AuditAction::AccountLocked),
            "PERMISSION_DENIED" => Some(AuditAction::PermissionDenied),
            "RATE_LIMITED" => Some(AuditAction::RateLimited),
            "SESSION_ROTATED" => Some(AuditAction::SessionRotated),
            _ => None,
        }
    }
}

/// How the recorded action ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Success,
    Failure,
    Blocked,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Success => "SUCCESS",
            AuditOutcome::Failure => "FAILURE",
            AuditOutcome::Blocked => "BLOCKED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SUCCESS" => Some(AuditOutcome::Success),
            "FAILURE" => Some(AuditOutcome::Failure),
            "BLOCKED" => Some(AuditOutcome::Blocked),
            _ => None,
        }
    }
}

/// Severity of a security event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INFO" => Some(Severity::Info),
            "WARNING" => Some(Severity::Warning),
            "HIGH" => Some(Severity::High),
            "CRITICAL" => Some(Severity::Critical),
            _ => None,
        }
    }
}

/// An append-only security event. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// The acting user, when known. Failed logins for unknown usernames
    /// carry `None`.
    pub actor_id: Option<Uuid>,
    /// The recorded action.
    pub action: AuditAction,
    /// The kind of resource acted on (e.g. "session", "account").
    pub resource_type: String,
    /// The specific resource, when one exists.
    pub resource_id: Option<String>,
    /// How the action ended.
    pub outcome: AuditOutcome,
    /// The client IP the request came from.
    pub ip_address: String,
    /// Event severity.
    pub severity: Severity,
    /// Free-form context for the reviewer.
    pub details: Option<String>,
}

impl AuditEvent {
    /// Creates an event stamped with the given instant and the minimum
    /// required fields; the rest default to empty.
    pub fn new(
        timestamp: DateTime<Utc>,
        action: AuditAction,
        outcome: AuditOutcome,
        severity: Severity,
        ip_address: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            actor_id: None,
            action,
            resource_type: "session".to_string(),
            resource_id: None,
            outcome,
            ip_address: ip_address.into(),
            severity,
            details: None,
        }
    }

    pub fn actor(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn resource(mut self, resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        self.resource_type = resource_type.into();
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}
