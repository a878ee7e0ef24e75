use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::crypto::password::StoredCredential;

/// Represents a staff account in the system.
#[derive(Clone, Debug)]
pub struct User {
    /// The unique identifier for the user.
    pub id: Uuid,
    /// The user's login name.
    pub username: String,
    /// The user's full name.
    pub name: String,
    /// The user's role (admin, doctor, nurse, ...).
    pub role: String,
    /// The stored password hash. Argon2 PHC string for migrated accounts,
    /// `hex(sha256(password || salt))` for legacy ones.
    pub password_hash: String,
    /// The hex-encoded legacy salt. `None` once the account is migrated.
    pub password_salt: Option<String>,
    /// Consecutive failed login attempts since the last success.
    pub failed_attempts: i32,
    /// When the account was locked, if it is.
    pub locked_at: Option<DateTime<Utc>>,
    /// Whether the user is active.
    pub is_active: bool,
    /// The timestamp when the user was created.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Returns the tagged credential variant for verification.
    pub fn credential(&self) -> StoredCredential {
        match &self.password_salt {
            Some(salt) => StoredCredential::Legacy {
                hash: self.password_hash.clone(),
                salt: salt.clone(),
            },
            None => StoredCredential::Modern {
                hash: self.password_hash.clone(),
            },
        }
    }

    /// Whether the account is currently locked.
    pub fn is_locked(&self) -> bool {
        self.locked_at.is_some()
    }
}
