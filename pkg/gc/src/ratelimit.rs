use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Token bucket for one policy: `rate` tokens per second, burst of `rate`.
pub struct PolicyRateLimiter {
    rate: u32,
    inner: DefaultDirectRateLimiter,
}

impl std::fmt::Debug for PolicyRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyRateLimiter")
            .field("rate", &self.rate)
            .finish()
    }
}

impl PolicyRateLimiter {
    pub fn new(rate: u32) -> Self {
        let per_second = NonZeroU32::new(rate.max(1)).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(per_second).allow_burst(per_second);
        Self {
            rate: per_second.get(),
            inner: RateLimiter::direct(quota),
        }
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// Take one token, waiting for the bucket to refill if needed.
    /// Returns false if `cancel` fires while waiting.
    pub async fn acquire(&self, cancel: &CancellationToken) -> bool {
        if self.inner.check().is_ok() {
            return true;
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = self.inner.until_ready() => true,
        }
    }
}

/// Per-policy rate limiters, created lazily and kept across cycles until the
/// policy goes away.
pub struct RateLimiterRegistry {
    default_rate: u32,
    limiters: RwLock<HashMap<String, Arc<PolicyRateLimiter>>>,
}

impl std::fmt::Debug for RateLimiterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterRegistry")
            .field("default_rate", &self.default_rate)
            .field("limiters", &"<HashMap>")
            .finish()
    }
}

impl RateLimiterRegistry {
    pub fn new(default_rate: u32) -> Self {
        Self {
            default_rate: default_rate.max(1),
            limiters: RwLock::new(HashMap::new()),
        }
    }

    /// Limiter for `policy_id` at `rate` (or the default). Concurrent first
    /// callers all receive the same instance. A changed rate replaces the
    /// entry under the write lock.
    pub async fn get_or_create(&self, policy_id: &str, rate: Option<u32>) -> Arc<PolicyRateLimiter> {
        let rate = rate.unwrap_or(self.default_rate).max(1);

        // Fast path: check if limiter exists
        {
            let read_guard = self.limiters.read().await;
            if let Some(limiter) = read_guard.get(policy_id)
                && limiter.rate() == rate
            {
                return Arc::clone(limiter);
            }
        }

        // Slow path: create new limiter
        let mut write_guard = self.limiters.write().await;

        // Double-check after acquiring write lock
        if let Some(limiter) = write_guard.get(policy_id) {
            if limiter.rate() == rate {
                return Arc::clone(limiter);
            }
            info!(
                "Rate for policy {} changed {} → {}/s, replacing limiter",
                policy_id,
                limiter.rate(),
                rate
            );
        } else {
            debug!("Creating rate limiter for policy {} ({}/s)", policy_id, rate);
        }

        let limiter = Arc::new(PolicyRateLimiter::new(rate));
        write_guard.insert(policy_id.to_string(), Arc::clone(&limiter));
        limiter
    }

    /// Drop the limiter of a deleted policy. Returns true if one existed.
    pub async fn remove(&self, policy_id: &str) -> bool {
        self.limiters.write().await.remove(policy_id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.limiters.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.limiters.read().await.is_empty()
    }
}
