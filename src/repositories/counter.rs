use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use crate::error::Result;

/// Fixed-window counter storage for rate limiting.
///
/// Counters tolerate best-effort consistency; small over/under-counts under
/// concurrent access to the same identifier are acceptable.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increments the counter for `key` inside the current fixed window and
    /// returns the count after the increment. A fresh or lapsed window
    /// restarts at 1.
    async fn incr_window(&self, key: &str, window_secs: i64, now: DateTime<Utc>) -> Result<u64>;
}

/// `CounterStore` backed by Redis: INCR plus an EXPIRE set on the first hit,
/// so the key TTL delimits the window. The injected `now` is unused; Redis
/// owns the clock here.
pub struct RedisCounterStore {
    redis: ConnectionManager,
}

impl RedisCounterStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn incr_window(&self, key: &str, window_secs: i64, _now: DateTime<Utc>) -> Result<u64> {
        let mut conn = self.redis.clone();

        let count: u64 = redis::cmd("INCR")
            .arg(key)
            .query_async(&mut conn)
            .await?;

        if count == 1 {
            let _: () = redis::cmd("EXPIRE")
                .arg(key)
                .arg(window_secs)
                .query_async(&mut conn)
                .await?;
        }

        Ok(count)
    }
}
