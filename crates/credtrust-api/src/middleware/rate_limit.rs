//! # Fixed-Window Rate Limiting
//!
//! In-memory limiter keyed by `(action, client)`. Each key holds a counter
//! and the instant its window resets. This is a fixed-window approximation
//! of a sliding window: a burst straddling a reset may see up to twice the
//! limit, in exchange for O(1) memory per key.
//!
//! Buckets live in a [`DashMap`], so the read-compare-increment for one key
//! runs under that key's shard lock and distinct keys do not contend.
//! Counts are per process. Several instances behind a load balancer each
//! enforce their own limit.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Throttled operation classes. Each class has its own policy and buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitAction {
    /// Public reads of credential data.
    Read,
    /// Anything that queries the ledger.
    LedgerQuery,
    /// Mutations and artifact generation.
    Write,
}

impl RateLimitAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::LedgerQuery => "ledger_query",
            Self::Write => "write",
        }
    }
}

/// Limit and window for one action class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Maximum requests per window.
    pub limit: u64,
    /// Window duration.
    pub window: Duration,
}

impl RateLimitPolicy {
    pub const fn new(limit: u64, window_secs: u64) -> Self {
        Self {
            limit,
            window: Duration::from_secs(window_secs),
        }
    }
}

/// Per-action policies.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub read: RateLimitPolicy,
    pub ledger_query: RateLimitPolicy,
    pub write: RateLimitPolicy,
}

impl RateLimitConfig {
    /// The policy for an action class.
    pub fn policy(&self, action: RateLimitAction) -> RateLimitPolicy {
        match action {
            RateLimitAction::Read => self.read,
            RateLimitAction::LedgerQuery => self.ledger_query,
            RateLimitAction::Write => self.write,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            read: RateLimitPolicy::new(100, 60),
            ledger_query: RateLimitPolicy::new(5, 60),
            write: RateLimitPolicy::new(20, 60),
        }
    }
}

/// Outcome of one [`RateLimiter::allow`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u64,
    pub reset_at: Instant,
}

impl RateLimitDecision {
    /// Whole seconds until the window resets, never less than one.
    pub fn retry_after_secs(&self, now: Instant) -> u64 {
        let remaining = self.reset_at.saturating_duration_since(now);
        let mut secs = remaining.as_secs();
        if remaining.subsec_nanos() > 0 {
            secs += 1;
        }
        secs.max(1)
    }
}

/// Per-key window state.
#[derive(Debug, Clone)]
struct BucketState {
    count: u64,
    reset_at: Instant,
}

/// Shared rate limiter state. Clones share buckets.
#[derive(Debug, Clone, Default)]
pub struct RateLimiter {
    buckets: Arc<DashMap<String, BucketState>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request against `key`.
    pub fn allow(&self, key: &str, limit: u64, window: Duration) -> RateLimitDecision {
        self.allow_at(key, limit, window, Instant::now())
    }

    /// [`allow`](Self::allow) with an explicit clock.
    pub fn allow_at(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
        now: Instant,
    ) -> RateLimitDecision {
        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| BucketState {
                count: 0,
                reset_at: now + window,
            });

        if bucket.count == 0 || now >= bucket.reset_at {
            bucket.count = 1;
            bucket.reset_at = now + window;
        } else {
            bucket.count = bucket.count.saturating_add(1);
        }

        let allowed = bucket.count <= limit;
        RateLimitDecision {
            allowed,
            remaining: if allowed { limit - bucket.count } else { 0 },
            reset_at: bucket.reset_at,
        }
    }

    /// Remove buckets whose window has elapsed. Returns how many were dropped.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| bucket.reset_at > now);
        before.saturating_sub(self.buckets.len())
    }

    /// Number of live buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Run [`sweep`](Self::sweep) every `interval` until the handle is shut down.
    pub fn spawn_sweeper(&self, interval: Duration) -> SweeperHandle {
        let limiter = self.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let dropped = limiter.sweep();
                        if dropped > 0 {
                            tracing::debug!(dropped, live = limiter.len(), "swept rate limit buckets");
                        }
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
        });
        SweeperHandle {
            shutdown_tx: Some(shutdown_tx),
            join,
        }
    }
}

/// Handle to the background sweeper task.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.join).await {
            tracing::warn!(error = %e, "rate limit sweeper exited abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    #[test]
    fn sixth_call_in_window_is_denied() {
        let limiter = RateLimiter::new();
        let start = Instant::now();
        for i in 0..5u64 {
            let d = limiter.allow_at("k", 5, WINDOW, start + Duration::from_secs(i));
            assert!(d.allowed, "call {} should pass", i + 1);
            assert_eq!(d.remaining, 4 - i);
        }
        let sixth = limiter.allow_at("k", 5, WINDOW, start + Duration::from_secs(10));
        assert!(!sixth.allowed);
        assert_eq!(sixth.remaining, 0);
        assert_eq!(sixth.reset_at, start + WINDOW);
    }

    #[test]
    fn denial_does_not_move_reset() {
        let limiter = RateLimiter::new();
        let start = Instant::now();
        limiter.allow_at("k", 1, WINDOW, start);
        let a = limiter.allow_at("k", 1, WINDOW, start + Duration::from_secs(5));
        let b = limiter.allow_at("k", 1, WINDOW, start + Duration::from_secs(30));
        assert!(!a.allowed && !b.allowed);
        assert_eq!(a.reset_at, b.reset_at);
    }

    #[test]
    fn fresh_window_after_elapse() {
        let limiter = RateLimiter::new();
        let start = Instant::now();
        for _ in 0..6 {
            limiter.allow_at("k", 5, WINDOW, start);
        }
        let later = start + WINDOW;
        let d = limiter.allow_at("k", 5, WINDOW, later);
        assert!(d.allowed);
        assert_eq!(d.remaining, 4);
        assert_eq!(d.reset_at, later + WINDOW);
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new();
        let now = Instant::now();
        assert!(limiter.allow_at("a", 1, WINDOW, now).allowed);
        assert!(!limiter.allow_at("a", 1, WINDOW, now).allowed);
        assert!(limiter.allow_at("b", 1, WINDOW, now).allowed);
    }

    #[test]
    fn zero_limit_denies_everything() {
        let limiter = RateLimiter::new();
        assert!(!limiter.allow("k", 0, WINDOW).allowed);
    }

    #[test]
    fn retry_after_rounds_up_and_is_bounded_by_window() {
        let limiter = RateLimiter::new();
        let start = Instant::now();
        limiter.allow_at("k", 1, WINDOW, start);
        let denied = limiter.allow_at("k", 1, WINDOW, start + Duration::from_millis(500));
        let retry = denied.retry_after_secs(start + Duration::from_millis(500));
        assert_eq!(retry, 60);
        assert_eq!(denied.retry_after_secs(start + WINDOW + WINDOW), 1);
    }

    #[test]
    fn sweep_drops_only_elapsed_buckets() {
        let limiter = RateLimiter::new();
        let start = Instant::now();
        limiter.allow_at("old", 5, Duration::from_secs(1), start);
        limiter.allow_at("new", 5, WINDOW, start);
        assert_eq!(limiter.sweep_at(start + Duration::from_secs(2)), 1);
        assert_eq!(limiter.len(), 1);
    }

    #[test]
    fn concurrent_calls_never_overrun() {
        let limiter = RateLimiter::new();
        let allowed = std::sync::atomic::AtomicU64::new(0);
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..50 {
                        if limiter.allow("shared", 100, WINDOW).allowed {
                            allowed.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        }
                    }
                });
            }
        });
        assert_eq!(allowed.into_inner(), 100);
    }

    #[tokio::test]
    async fn sweeper_shuts_down() {
        let limiter = RateLimiter::new();
        limiter.allow("k", 5, Duration::from_millis(1));
        let handle = limiter.spawn_sweeper(Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.shutdown().await;
        assert!(limiter.is_empty());
    }
}
