use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sliding-window limiter keyed by client.
#[derive(Debug, Clone)]
pub struct ApiRateLimiter {
    window: Duration,
    max_requests: u32,
    buckets: Arc<DashMap<String, Vec<Instant>>>,
}

impl ApiRateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            buckets: Arc::new(DashMap::new()),
        }
    }

    /// Record a request for `key`; returns whether it is allowed and the slots left.
    pub fn allow(&self, key: &str) -> (bool, u32) {
        self.allow_at(key, Instant::now())
    }

    fn allow_at(&self, key: &str, now: Instant) -> (bool, u32) {
        let window = self.window;

        let mut entry = self.buckets.entry(key.to_string()).or_default();
        entry.retain(|instant| now.duration_since(*instant) < window);

        let remaining = self.max_requests.saturating_sub(entry.len() as u32);
        if remaining == 0 {
            return (false, 0);
        }

        entry.push(now);
        (true, remaining.saturating_sub(1))
    }

    /// Drop buckets whose requests have all left the window.
    pub fn prune(&self) {
        let now = Instant::now();
        let window = self.window;
        self.buckets.retain(|_, hits| {
            hits.retain(|instant| now.duration_since(*instant) < window);
            !hits.is_empty()
        });
    }

    pub fn retry_after_secs(&self) -> u64 {
        self.window.as_secs().max(1)
    }

    pub fn limit(&self) -> u32 {
        self.max_requests
    }
}
