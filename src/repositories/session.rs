use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use uuid::Uuid;
use crate::{
    error::{AppError, Result},
    models::session::Session,
};

/// Server-side session storage.
///
/// Read-your-write consistency is required within one session's lineage: a
/// rotation or destroy must be visible on the immediately following request
/// from the same client.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads the session stored under `session_id`.
    async fn get(&self, session_id: &Uuid) -> Result<Option<Session>>;

    /// Stores `session` under `session_id` with a TTL.
    async fn put(&self, session_id: &Uuid, session: &Session, ttl_secs: u64) -> Result<()>;

    /// Destroys the session stored under `session_id`.
    async fn destroy(&self, session_id: &Uuid) -> Result<()>;

    /// Moves `session` from `old_id` to `new_id`.
    ///
    /// The new id is written first; a failed delete of the old id is retried
    /// once, then logged, and the stale record lapses at its TTL.
    async fn rotate(
        &self,
        old_id: &Uuid,
        new_id: &Uuid,
        session: &Session,
        ttl_secs: u64,
    ) -> Result<()> {
        self.put(new_id, session, ttl_secs).await?;
        if let Err(e) = self.destroy(old_id).await {
            tracing::warn!("⚠️ Delete of rotated session {} failed, retrying: {}", old_id, e);
            if let Err(e) = self.destroy(old_id).await {
                tracing::error!(
                    "❌ Rotated session {} could not be deleted; it lapses at its TTL: {}",
                    old_id,
                    e
                );
            }
        }
        Ok(())
    }
}

/// `SessionStore` backed by Redis. Keys are `session:{uuid}` with the record
/// serialized as JSON, expiry enforced by the key TTL.
pub struct RedisSessionStore {
    redis: ConnectionManager,
}

impl RedisSessionStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    fn key(session_id: &Uuid) -> String {
        format!("session:{}", session_id)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, session_id: &Uuid) -> Result<Option<Session>> {
        let mut conn = self.redis.clone();
        let raw: Option<String> = conn.get(Self::key(session_id)).await?;
        match raw {
            Some(json) => {
                let session = sonic_rs::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Invalid session JSON: {}", e))
                })?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, session_id: &Uuid, session: &Session, ttl_secs: u64) -> Result<()> {
        let json = sonic_rs::to_string(session)
            .map_err(|e| AppError::Internal(format!("Session serialization failed: {}", e)))?;
        let mut conn = self.redis.clone();
        let _: () = conn.set_ex(Self::key(session_id), json, ttl_secs).await?;
        Ok(())
    }

    async fn destroy(&self, session_id: &Uuid) -> Result<()> {
        let mut conn = self.redis.clone();
        let _: () = conn.del(Self::key(session_id)).await?;
        Ok(())
    }
}
