use std::sync::Arc;
use chrono::{DateTime, Utc};
use crate::error::Result;
use crate::repositories::counter::CounterStore;

/// Fixed-window rate limiter for sensitive actions.
///
/// Best-effort abuse mitigation: exactly `limit` requests succeed for one
/// identifier inside a window, then denial until the window lapses. Small
/// miscounts under heavy concurrency on one identifier are tolerated.
pub struct RateLimiter {
    counters: Arc<dyn CounterStore>,
    limit: u64,
    window_secs: i64,
}

impl RateLimiter {
    pub fn new(counters: Arc<dyn CounterStore>, limit: u64, window_secs: i64) -> Self {
        Self { counters, limit, window_secs }
    }

    /// Returns whether a request under `scope` from `identifier` is allowed
    /// at instant `now`.
    pub async fn allow(&self, scope: &str, identifier: &str, now: DateTime<Utc>) -> Result<bool> {
        let key = format!("rate_limit:{}:{}", scope, identifier);
        let count = self.counters.incr_window(&key, self.window_secs, now).await?;

        if count > self.limit {
            tracing::warn!("⛔ Rate limit hit: {} ({}/{})", key, count, self.limit);
            return Ok(false);
        }
        Ok(true)
    }
}
