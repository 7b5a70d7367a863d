//! Per-key attempt limiter for login throttling

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Attempts allowed inside one window
    pub max_attempts: u32,
    pub window: Duration,
    /// Lockout once the window is exhausted
    pub lockout: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window: Duration::from_secs(5 * 60),
            lockout: Duration::from_secs(60 * 60),
        }
    }
}

/// Outcome of an attempt check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Allowed,
    /// Locked out; the value is the remaining lockout in seconds
    Banned(u64),
}

#[derive(Debug)]
enum Slot {
    Counting { since: Instant, attempts: u32 },
    Locked { until: Instant },
}

impl Slot {
    fn expired(&self, now: Instant, window: Duration) -> bool {
        match self {
            Slot::Counting { since, .. } => now.duration_since(*since) >= window,
            Slot::Locked { until } => now >= *until,
        }
    }
}

#[derive(Debug)]
struct Slots {
    entries: HashMap<String, Slot>,
    swept: Instant,
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    slots: Arc<Mutex<Slots>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            slots: Arc::new(Mutex::new(Slots {
                entries: HashMap::new(),
                swept: Instant::now(),
            })),
        }
    }

    /// Count one attempt for `key`
    pub async fn check(&self, key: &str) -> Attempt {
        let mut slots = self.slots.lock().await;
        let now = Instant::now();

        // Expired slots carry no state, drop them at most once per window
        if now.duration_since(slots.swept) >= self.config.window {
            let window = self.config.window;
            let before = slots.entries.len();
            slots.entries.retain(|_, slot| !slot.expired(now, window));
            slots.swept = now;
            debug!(dropped = before - slots.entries.len(), "Swept expired attempt slots");
        }

        let slot = slots.entries.entry(key.to_string()).or_insert(Slot::Counting {
            since: now,
            attempts: 0,
        });

        if let Slot::Locked { until } = slot {
            if now < *until {
                return Attempt::Banned((*until - now).as_secs().max(1));
            }
        }
        if slot.expired(now, self.config.window) {
            *slot = Slot::Counting {
                since: now,
                attempts: 0,
            };
        }

        if let Slot::Counting { attempts, .. } = slot {
            if *attempts < self.config.max_attempts {
                *attempts += 1;
                return Attempt::Allowed;
            }
        }

        info!(key, lockout = ?self.config.lockout, "Too many attempts, locking out");
        *slot = Slot::Locked {
            until: now + self.config.lockout,
        };
        Attempt::Banned(self.config.lockout.as_secs())
    }

    /// Forget `key`, e.g. after a successful login
    pub async fn reset(&self, key: &str) {
        self.slots.lock().await.entries.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_locks_out_after_max_attempts() {
        let limiter = RateLimiter::new(RateLimiterConfig::default());
        for _ in 0..5 {
            assert_eq!(limiter.check("a@b.c").await, Attempt::Allowed);
        }
        assert_eq!(limiter.check("a@b.c").await, Attempt::Banned(3600));
        assert!(matches!(limiter.check("a@b.c").await, Attempt::Banned(_)));

        assert_eq!(limiter.check("x@y.z").await, Attempt::Allowed);
    }

    #[tokio::test]
    async fn test_reset_clears_attempts() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_attempts: 1,
            ..Default::default()
        });
        assert_eq!(limiter.check("k").await, Attempt::Allowed);
        limiter.reset("k").await;
        assert_eq!(limiter.check("k").await, Attempt::Allowed);
    }

    #[tokio::test]
    async fn test_window_expiry_resets_count() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_attempts: 1,
            window: Duration::ZERO,
            lockout: Duration::from_secs(10),
        });
        assert_eq!(limiter.check("k").await, Attempt::Allowed);
        assert_eq!(limiter.check("k").await, Attempt::Allowed);
    }

    #[tokio::test]
    async fn test_expired_lockout_starts_a_new_window() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_attempts: 1,
            window: Duration::from_secs(60),
            lockout: Duration::ZERO,
        });
        assert_eq!(limiter.check("k").await, Attempt::Allowed);
        assert_eq!(limiter.check("k").await, Attempt::Banned(0));
        assert_eq!(limiter.check("k").await, Attempt::Allowed);
    }

    async fn tracked(limiter: &RateLimiter) -> usize {
        limiter.slots.lock().await.entries.len()
    }

    #[tokio::test]
    async fn test_expired_slots_are_dropped() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_attempts: 1,
            window: Duration::ZERO,
            lockout: Duration::ZERO,
        });
        for i in 0..1000 {
            limiter.check(&format!("user{}@spam.example", i)).await;
        }
        assert_eq!(tracked(&limiter).await, 1);
    }

    #[tokio::test]
    async fn test_sweep_keeps_active_lockouts() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_attempts: 1,
            window: Duration::from_millis(50),
            lockout: Duration::from_secs(3600),
        });
        assert_eq!(limiter.check("idle").await, Attempt::Allowed);
        assert_eq!(limiter.check("locked").await, Attempt::Allowed);
        assert_eq!(limiter.check("locked").await, Attempt::Banned(3600));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(limiter.check("fresh").await, Attempt::Allowed);

        assert_eq!(tracked(&limiter).await, 2);
        assert!(matches!(limiter.check("locked").await, Attempt::Banned(_)));
    }
}
