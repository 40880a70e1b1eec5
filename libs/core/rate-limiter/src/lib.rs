//! Adaptive token-bucket rate limiter for pacing requests against fragile
//! upstream portals (C1). One [`RateLimiter`] per upstream source, held in a
//! [`RateLimiterRegistry`] keyed by source name.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::time::sleep;

pub const DEFAULT_RATE: f64 = 2.0;
pub const DEFAULT_BURST: f64 = 5.0;
pub const DEFAULT_MIN_RATE: f64 = 0.5;
pub const DEFAULT_MAX_RATE: f64 = 5.0;
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;
pub const DEFAULT_MAX_BACKOFF_SECS: f64 = 300.0;
const SUCCESS_STREAK_THRESHOLD: u32 = 10;
const MIN_ACQUIRE_SLEEP_SECS: f64 = 0.01;

struct State {
    tokens: f64,
    rate: f64,
    last_refill: Instant,
    failure_count: u32,
    success_streak: u32,
    current_backoff: f64,
    total_requests: u64,
    total_waits: u64,
}

impl State {
    fn refill(&mut self, burst: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(burst);
        self.last_refill = now;
    }
}

/// Snapshot of a rate limiter's internal counters, exposed for `/status` and
/// `/metrics`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimiterStats {
    pub rate: f64,
    pub burst_size: f64,
    pub current_tokens: f64,
    pub total_requests: u64,
    pub total_waits: u64,
    pub failure_count: u32,
    pub current_backoff: f64,
}

/// Token-bucket rate limiter with adaptive rate and exponential back-off on
/// failure. All operations are safe to call from multiple tasks
/// concurrently; the critical section held under the lock is just the
/// bucket arithmetic, never the sleep.
pub struct RateLimiter {
    state: Mutex<State>,
    burst_size: f64,
    min_rate: f64,
    max_rate: f64,
    backoff_factor: f64,
    max_backoff: f64,
}

impl RateLimiter {
    pub fn new(
        initial_rate: f64,
        burst_size: f64,
        min_rate: f64,
        max_rate: f64,
        backoff_factor: f64,
        max_backoff: f64,
    ) -> Self {
        Self {
            state: Mutex::new(State {
                tokens: burst_size,
                rate: initial_rate,
                last_refill: Instant::now(),
                failure_count: 0,
                success_streak: 0,
                current_backoff: 0.0,
                total_requests: 0,
                total_waits: 0,
            }),
            burst_size,
            min_rate,
            max_rate,
            backoff_factor,
            max_backoff,
        }
    }

    /// The REGTECH-equivalent defaults: 2 req/s, burst 5, range 0.5–5.0,
    /// back-off base 2.0, ceiling 300s.
    pub fn with_defaults() -> Self {
        Self::new(
            DEFAULT_RATE,
            DEFAULT_BURST,
            DEFAULT_MIN_RATE,
            DEFAULT_MAX_RATE,
            DEFAULT_BACKOFF_FACTOR,
            DEFAULT_MAX_BACKOFF_SECS,
        )
    }

    /// Blocks until `tokens` are available or `timeout` elapses, sleeping in
    /// increments no smaller than 10ms. Returns `false` on timeout.
    pub async fn acquire(&self, tokens: f64, timeout: Option<Duration>) -> bool {
        let start = Instant::now();
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                state.refill(self.burst_size);
                if state.tokens >= tokens {
                    state.tokens -= tokens;
                    state.total_requests += 1;
                    if start.elapsed() > Duration::ZERO {
                        state.total_waits += 1;
                    }
                    None
                } else {
                    let needed = tokens - state.tokens;
                    Some((needed / state.rate).max(MIN_ACQUIRE_SLEEP_SECS))
                }
            };

            match wait {
                None => return true,
                Some(wait_secs) => {
                    if let Some(timeout) = timeout {
                        if start.elapsed() >= timeout {
                            tracing::warn!(timeout_secs = timeout.as_secs_f64(), "rate limiter acquire timed out");
                            return false;
                        }
                    }
                    sleep(Duration::from_secs_f64(wait_secs)).await;
                }
            }
        }
    }

    /// Convenience wrapper for the common `acquire(1, None)` call.
    pub async fn wait_if_needed(&self) {
        self.acquire(1.0, None).await;
    }

    /// Call after a successful upstream request. Resets back-off; after
    /// `SUCCESS_STREAK_THRESHOLD` consecutive successes, raises the rate by
    /// 20% up to `max_rate`.
    pub async fn on_success(&self) {
        let mut state = self.state.lock().await;
        if state.failure_count > 0 {
            state.failure_count = 0;
            state.current_backoff = 0.0;
        }
        state.success_streak += 1;
        if state.success_streak >= SUCCESS_STREAK_THRESHOLD && state.rate < self.max_rate {
            state.rate = (state.rate * 1.2).min(self.max_rate);
            state.success_streak = 0;
        }
    }

    /// Call after a failed upstream request. Halves the rate (floored at
    /// `min_rate`), computes an exponential back-off from the consecutive
    /// failure count, and — for HTTP 429/503 — doubles and sleeps out that
    /// back-off before returning.
    pub async fn on_failure(&self, http_status: Option<u16>) {
        let sleep_for = {
            let mut state = self.state.lock().await;
            state.failure_count += 1;
            state.success_streak = 0;
            state.rate = (state.rate * 0.5).max(self.min_rate);

            state.current_backoff = (self.backoff_factor.powi(state.failure_count as i32) * 0.5)
                .min(self.max_backoff);

            let is_rate_limited = matches!(http_status, Some(429) | Some(503));
            if is_rate_limited {
                state.current_backoff = (state.current_backoff * 2.0).min(self.max_backoff);
                tracing::warn!(
                    http_status,
                    backoff_secs = state.current_backoff,
                    "upstream rate limit signaled"
                );
                state.current_backoff
            } else {
                0.0
            }
        };

        if sleep_for > 0.0 {
            sleep(Duration::from_secs_f64(sleep_for)).await;
        }
    }

    pub async fn stats(&self) -> RateLimiterStats {
        let state = self.state.lock().await;
        RateLimiterStats {
            rate: state.rate,
            burst_size: self.burst_size,
            current_tokens: state.tokens,
            total_requests: state.total_requests,
            total_waits: state.total_waits,
            failure_count: state.failure_count,
            current_backoff: state.current_backoff,
        }
    }

    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.tokens = self.burst_size;
        state.last_refill = Instant::now();
        state.failure_count = 0;
        state.current_backoff = 0.0;
        state.success_streak = 0;
    }
}

/// Registry of per-source rate limiters, indexed by `service_name`.
#[derive(Default)]
pub struct RateLimiterRegistry {
    limiters: RwLock<HashMap<String, Arc<RateLimiter>>>,
}

impl RateLimiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the limiter for `source`, creating one with default
    /// parameters on first use.
    pub fn get_or_create(&self, source: &str) -> Arc<RateLimiter> {
        if let Some(limiter) = self.limiters.read().unwrap().get(source) {
            return limiter.clone();
        }
        let mut limiters = self.limiters.write().unwrap();
        limiters
            .entry(source.to_string())
            .or_insert_with(|| Arc::new(RateLimiter::with_defaults()))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_within_burst_does_not_wait() {
        let limiter = RateLimiter::with_defaults();
        for _ in 0..5 {
            assert!(limiter.acquire(1.0, Some(Duration::from_millis(50))).await);
        }
    }

    #[tokio::test]
    async fn on_failure_halves_rate_and_floors_at_min() {
        let limiter = RateLimiter::new(2.0, 5.0, 0.5, 5.0, 2.0, 300.0);
        limiter.on_failure(None).await;
        assert_eq!(limiter.stats().await.rate, 1.0);
        limiter.on_failure(None).await;
        assert_eq!(limiter.stats().await.rate, 0.5);
        limiter.on_failure(None).await;
        assert_eq!(limiter.stats().await.rate, 0.5);
    }

    #[tokio::test]
    async fn on_success_resets_backoff() {
        let limiter = RateLimiter::with_defaults();
        limiter.on_failure(Some(503)).await;
        assert!(limiter.stats().await.current_backoff > 0.0);
        limiter.on_success().await;
        assert_eq!(limiter.stats().await.current_backoff, 0.0);
    }

    #[tokio::test]
    async fn registry_returns_same_limiter_for_same_source() {
        let registry = RateLimiterRegistry::new();
        let a = registry.get_or_create("REGTECH");
        let b = registry.get_or_create("REGTECH");
        assert!(Arc::ptr_eq(&a, &b));
    }
}
