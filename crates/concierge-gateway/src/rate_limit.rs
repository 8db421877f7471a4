use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Sliding-window rate limiter keyed by an arbitrary string (typically the
/// caller's IP), guarding the admin-facing auth surface (§6, §9 "auth rate
/// limiting on admin-facing auth endpoints").
pub struct RateLimiter {
    hits: DashMap<String, Vec<Instant>>,
    max_per_window: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_per_window: usize, window: Duration) -> Self {
        Self {
            hits: DashMap::new(),
            max_per_window,
            window,
        }
    }

    /// Records one attempt for `key` and reports whether it is within the
    /// limit. Always records, even when over limit, so a caller hammering
    /// the endpoint keeps being rejected rather than slipping back in once
    /// the window trims stale entries.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entry = self.hits.entry(key.to_string()).or_default();
        entry.retain(|t| now.duration_since(*t) < self.window);
        entry.push(now);
        entry.len() <= self.max_per_window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_limit_then_rejects() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.check("1.2.3.4"));
        assert!(limiter.check("1.2.3.4"));
        assert!(limiter.check("1.2.3.4"));
        assert!(!limiter.check("1.2.3.4"));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("a"));
        assert!(limiter.check("b"));
        assert!(!limiter.check("a"));
    }
}
