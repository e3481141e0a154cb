//! Fixed-window rate limiting keyed by client identifier

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Bucket shared by every request that carries no client address header
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Per-client counter for the current window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRecord {
    /// Requests counted in the current window
    pub count: u32,
    /// First instant of the next window
    pub window_reset_at: DateTime<Utc>,
}

/// Outcome of a single rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Count after this check
    pub count: u32,
    /// First instant of the next window
    pub window_reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Whole seconds until the window resets, rounded up
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> u64 {
        let millis = (self.window_reset_at - now).num_milliseconds().max(0) as u64;
        millis.div_ceil(1000)
    }
}

/// Storage backend for rate limit records.
///
/// Implementations must make `check` atomic per identifier.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Count a request from `identifier` at time `now`
    async fn check_at(
        &self,
        identifier: &str,
        limit: u32,
        window: Duration,
        now: DateTime<Utc>,
    ) -> RateLimitDecision;

    /// Drop records whose window has ended. Returns how many were removed.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> usize;

    /// Number of tracked identifiers
    async fn tracked_clients(&self) -> usize;

    /// Count a request from `identifier` now
    async fn check(&self, identifier: &str, limit: u32, window: Duration) -> RateLimitDecision {
        self.check_at(identifier, limit, window, Utc::now()).await
    }

    /// Whether a request from `identifier` is allowed now
    async fn allow(&self, identifier: &str, limit: u32, window: Duration) -> bool {
        self.check(identifier, limit, window).await.allowed
    }
}

/// In-process store backed by a mutex-guarded map
#[derive(Debug, Clone, Default)]
pub struct InMemoryRateLimiter {
    records: Arc<Mutex<HashMap<String, RateLimitRecord>>>,
}

impl InMemoryRateLimiter {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Current record for `identifier`, if any
    pub async fn record(&self, identifier: &str) -> Option<RateLimitRecord> {
        self.records.lock().await.get(identifier).copied()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimiter {
    async fn check_at(
        &self,
        identifier: &str,
        limit: u32,
        window: Duration,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        let mut records = self.records.lock().await;

        match records.get_mut(identifier) {
            // The reset instant itself already belongs to the next window.
            Some(record) if now < record.window_reset_at => {
                if record.count >= limit {
                    return RateLimitDecision {
                        allowed: false,
                        count: record.count,
                        window_reset_at: record.window_reset_at,
                    };
                }

                record.count += 1;
                RateLimitDecision {
                    allowed: true,
                    count: record.count,
                    window_reset_at: record.window_reset_at,
                }
            }
            _ => {
                let record = RateLimitRecord {
                    count: 1,
                    window_reset_at: now
                        .checked_add_signed(window)
                        .unwrap_or(DateTime::<Utc>::MAX_UTC),
                };
                records.insert(identifier.to_string(), record);
                RateLimitDecision {
                    allowed: true,
                    count: record.count,
                    window_reset_at: record.window_reset_at,
                }
            }
        }
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, record| now < record.window_reset_at);
        let removed = before - records.len();

        if removed > 0 {
            debug!("Swept {} expired rate limit records, {} remain", removed, records.len());
        }

        removed
    }

    async fn tracked_clients(&self) -> usize {
        self.records.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> Duration {
        Duration::milliseconds(60_000)
    }

    #[tokio::test]
    async fn test_limit_th_request_allowed_next_denied() {
        let limiter = InMemoryRateLimiter::new();
        let now = Utc::now();

        for i in 1..=10 {
            let decision = limiter.check_at("10.0.0.1", 10, window(), now).await;
            assert!(decision.allowed, "request {} should be allowed", i);
            assert_eq!(decision.count, i);
        }

        let denied = limiter.check_at("10.0.0.1", 10, window(), now).await;
        assert!(!denied.allowed);
        assert_eq!(denied.count, 10);
    }

    #[tokio::test]
    async fn test_window_rollover_resets_count() {
        let limiter = InMemoryRateLimiter::new();
        let start = Utc::now();

        for _ in 0..3 {
            limiter.check_at("client", 2, window(), start).await;
        }
        assert!(!limiter.check_at("client", 2, window(), start).await.allowed);

        let later = start + window() + Duration::milliseconds(1);
        let decision = limiter.check_at("client", 2, window(), later).await;
        assert!(decision.allowed);
        assert_eq!(decision.count, 1);
        assert_eq!(decision.window_reset_at, later + window());
    }

    #[tokio::test]
    async fn test_reset_edge_is_inclusive() {
        let limiter = InMemoryRateLimiter::new();
        let start = Utc::now();

        limiter.check_at("client", 1, window(), start).await;
        assert!(!limiter.check_at("client", 1, window(), start).await.allowed);

        let edge = start + window();
        let decision = limiter.check_at("client", 1, window(), edge).await;
        assert!(decision.allowed);
        assert_eq!(decision.count, 1);
    }

    #[tokio::test]
    async fn test_window_past_calendar_end_saturates() {
        let limiter = InMemoryRateLimiter::new();
        let now = Utc::now();
        let huge = Duration::milliseconds(10_000_000_000_000_000);

        let first = limiter.check_at("client", 1, huge, now).await;
        assert!(first.allowed);
        assert_eq!(first.window_reset_at, DateTime::<Utc>::MAX_UTC);

        assert!(!limiter.check_at("client", 1, huge, now).await.allowed);
    }

    #[tokio::test]
    async fn test_identifiers_are_independent() {
        let limiter = InMemoryRateLimiter::new();
        let now = Utc::now();

        assert!(limiter.check_at("a", 1, window(), now).await.allowed);
        assert!(!limiter.check_at("a", 1, window(), now).await.allowed);
        assert!(limiter.check_at("b", 1, window(), now).await.allowed);

        assert_eq!(limiter.record("b").await.map(|r| r.count), Some(1));
    }

    #[tokio::test]
    async fn test_concurrent_clients_do_not_interfere() {
        let limiter = InMemoryRateLimiter::new();

        let mut handles = Vec::new();
        for client in ["10.0.0.1", "10.0.0.2"] {
            for _ in 0..5 {
                let limiter = limiter.clone();
                handles.push(tokio::spawn(async move {
                    limiter.allow(client, 10, window()).await
                }));
            }
        }

        for handle in handles {
            assert!(handle.await.unwrap());
        }

        assert_eq!(limiter.record("10.0.0.1").await.unwrap().count, 5);
        assert_eq!(limiter.record("10.0.0.2").await.unwrap().count, 5);
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let limiter = InMemoryRateLimiter::new();
        let start = Utc::now();

        limiter.check_at("old", 10, window(), start).await;
        limiter
            .check_at("fresh", 10, window(), start + Duration::seconds(30))
            .await;

        let removed = limiter.sweep_expired(start + window()).await;
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_clients().await, 1);
        assert!(limiter.record("old").await.is_none());
        assert!(limiter.record("fresh").await.is_some());
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let now = Utc::now();
        let decision = RateLimitDecision {
            allowed: false,
            count: 10,
            window_reset_at: now + Duration::milliseconds(1500),
        };
        assert_eq!(decision.retry_after_secs(now), 2);
        assert_eq!(decision.retry_after_secs(now + Duration::seconds(5)), 0);
    }
}
