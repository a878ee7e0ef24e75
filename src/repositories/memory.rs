//! In-memory store backends.
//!
//! Used by the deterministic test suites and for local development without
//! PostgreSQL/Redis. Consistency is whatever a mutexed map gives you, which
//! exceeds what the contracts demand.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;
use crate::{
    error::{AppError, Result},
    models::audit::AuditEvent,
    models::session::Session,
    models::user::User,
};
use super::audit::AuditSink;
use super::counter::CounterStore;
use super::session::SessionStore;
use super::user::UserStore;

/// `UserStore` over a mutexed map.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
    failing: AtomicBool,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds one user.
    pub fn insert(&self, user: User) {
        self.users.lock().unwrap().insert(user.id, user);
    }

    /// Makes every call return a storage error, for exercising the
    /// fail-open/fail-closed policy.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_failing(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Internal("simulated storage outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        self.check_failing()?;
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_id(&self, user_id: &Uuid) -> Result<Option<User>> {
        self.check_failing()?;
        Ok(self.users.lock().unwrap().get(user_id).cloned())
    }

    async fn update_failed_attempts(&self, user_id: &Uuid, attempts: i32) -> Result<()> {
        self.check_failing()?;
        if let Some(user) = self.users.lock().unwrap().get_mut(user_id) {
            user.failed_attempts = attempts;
        }
        Ok(())
    }

    async fn lock_account(&self, user_id: &Uuid, locked_at: DateTime<Utc>) -> Result<()> {
        self.check_failing()?;
        if let Some(user) = self.users.lock().unwrap().get_mut(user_id) {
            user.locked_at = Some(locked_at);
        }
        Ok(())
    }

    async fn update_password_hash(&self, user_id: &Uuid, hash: &str) -> Result<()> {
        self.check_failing()?;
        if let Some(user) = self.users.lock().unwrap().get_mut(user_id) {
            user.password_hash = hash.to_string();
            user.password_salt = None;
        }
        Ok(())
    }
}

/// `SessionStore` over a mutexed map. TTLs are ignored; the guards enforce
/// idle timeout themselves, which is what the tests exercise.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<Uuid, Session>>,
    failing: AtomicBool,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Makes every call return a storage error, for exercising the
    /// fail-closed paths.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_failing(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Internal("simulated storage outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session_id: &Uuid) -> Result<Option<Session>> {
        self.check_failing()?;
        Ok(self.sessions.lock().unwrap().get(session_id).cloned())
    }

    async fn put(&self, session_id: &Uuid, session: &Session, _ttl_secs: u64) -> Result<()> {
        self.check_failing()?;
        self.sessions.lock().unwrap().insert(*session_id, session.clone());
        Ok(())
    }

    async fn destroy(&self, session_id: &Uuid) -> Result<()> {
        self.check_failing()?;
        self.sessions.lock().unwrap().remove(session_id);
        Ok(())
    }

    async fn rotate(
        &self,
        old_id: &Uuid,
        new_id: &Uuid,
        session: &Session,
        _ttl_secs: u64,
    ) -> Result<()> {
        self.check_failing()?;
        let mut sessions = self.sessions.lock().unwrap();
        sessions.remove(old_id);
        sessions.insert(*new_id, session.clone());
        Ok(())
    }
}

/// `AuditSink` that appends to a vector, for assertions in tests.
#[derive(Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
    failing: AtomicBool,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Makes `insert` fail, for exercising the best-effort write policy.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn insert(&self, event: &AuditEvent) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Internal("simulated audit outage".to_string()));
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn recent(&self, limit: i64) -> Result<Vec<AuditEvent>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Internal("simulated audit outage".to_string()));
        }
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

/// `CounterStore` over a mutexed map of `(window_start, count)` pairs,
/// honoring the injected clock.
#[derive(Default)]
pub struct MemoryCounterStore {
    counters: Mutex<HashMap<String, (DateTime<Utc>, u64)>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr_window(&self, key: &str, window_secs: i64, now: DateTime<Utc>) -> Result<u64> {
        let mut counters = self.counters.lock().unwrap();
        let entry = counters.entry(key.to_string()).or_insert((now, 0));

        if (now - entry.0).num_seconds() > window_secs {
            *entry = (now, 0);
        }
        entry.1 += 1;
        Ok(entry.1)
    }
}
