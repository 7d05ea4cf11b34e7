//! Fixed-window request limiter keyed by caller and operation.
//!
//! Purely a throttle in front of the HTTP handlers. Ledger correctness never
//! depends on it.

use crate::clock::Clock;
use crate::domain::TimeMs;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Minimum gap between sweeps of expired windows.
const SWEEP_INTERVAL_MS: i64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitPreset {
    Contribution,
    GapFunding,
    Purchase,
    Withdrawal,
    Deposit,
    CreditConversion,
}

impl RateLimitPreset {
    pub fn name(&self) -> &'static str {
        match self {
            RateLimitPreset::Contribution => "contribution",
            RateLimitPreset::GapFunding => "gap_funding",
            RateLimitPreset::Purchase => "purchase",
            RateLimitPreset::Withdrawal => "withdrawal",
            RateLimitPreset::Deposit => "deposit",
            RateLimitPreset::CreditConversion => "credit_conversion",
        }
    }

    pub fn limit(&self) -> u32 {
        match self {
            RateLimitPreset::Contribution => 10,
            RateLimitPreset::GapFunding => 5,
            RateLimitPreset::Purchase => 3,
            RateLimitPreset::Withdrawal => 3,
            RateLimitPreset::Deposit => 5,
            RateLimitPreset::CreditConversion => 10,
        }
    }

    pub fn window(&self) -> Duration {
        match self {
            RateLimitPreset::Withdrawal | RateLimitPreset::Deposit => Duration::from_secs(3600),
            _ => Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RateLimitEntry {
    count: u32,
    window_start: i64,
    window_end: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: TimeMs,
}

impl RateLimitDecision {
    /// Whole seconds until the window resets, at least one.
    pub fn retry_after_secs(&self, now: TimeMs) -> u64 {
        let wait_ms = (self.reset_at.as_ms() - now.as_ms()).max(0) as u64;
        wait_ms.div_ceil(1000).max(1)
    }
}

pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    store: DashMap<String, RateLimitEntry>,
    last_sweep: AtomicI64,
}

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let last_sweep = AtomicI64::new(clock.now().as_ms());
        Self {
            clock,
            store: DashMap::new(),
            last_sweep,
        }
    }

    /// Number of tracked (preset, caller) windows.
    pub fn tracked(&self) -> usize {
        self.store.len()
    }

    /// Drop windows that have ended. Runs at most once per interval; only
    /// the caller that wins the timestamp swap does the work.
    fn sweep_expired(&self, now: i64) {
        let last = self.last_sweep.load(Ordering::Relaxed);
        if now - last < SWEEP_INTERVAL_MS {
            return;
        }
        if self
            .last_sweep
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        let before = self.store.len();
        self.store.retain(|_, entry| entry.window_end > now);
        debug!(evicted = before.saturating_sub(self.store.len()), "rate limit windows swept");
    }

    pub fn now(&self) -> TimeMs {
        self.clock.now()
    }

    /// Count one request for `key` under `preset`.
    pub fn check(&self, key: &str, preset: RateLimitPreset) -> RateLimitDecision {
        let now = self.clock.now().as_ms();
        let window_ms = (preset.window().as_millis() as i64).max(1);
        let window_start = now - now.rem_euclid(window_ms);
        let reset_at = TimeMs::new(window_start + window_ms);
        let limit = preset.limit();

        // before taking an entry guard: retain locks every shard
        self.sweep_expired(now);

        let mut entry = self
            .store
            .entry(format!("{}:{}", preset.name(), key))
            .or_insert(RateLimitEntry {
                count: 0,
                window_start,
                window_end: window_start + window_ms,
            });

        if entry.window_start < window_start {
            entry.count = 0;
            entry.window_start = window_start;
            entry.window_end = window_start + window_ms;
        }

        if entry.count >= limit {
            return RateLimitDecision {
                allowed: false,
                limit,
                remaining: 0,
                reset_at,
            };
        }

        entry.count += 1;
        RateLimitDecision {
            allowed: true,
            limit,
            remaining: limit - entry.count,
            reset_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_purchase_allows_three_per_minute() {
        let clock = Arc::new(ManualClock::new(TimeMs::new(120_000)));
        let limiter = RateLimiter::new(clock.clone());

        for expected_remaining in [2, 1, 0] {
            let decision = limiter.check("alice", RateLimitPreset::Purchase);
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
        }
        let denied = limiter.check("alice", RateLimitPreset::Purchase);
        assert!(!denied.allowed);
        assert_eq!(denied.reset_at, TimeMs::new(180_000));
        assert_eq!(denied.retry_after_secs(clock.now()), 60);

        clock.advance(Duration::from_secs(60));
        assert!(limiter.check("alice", RateLimitPreset::Purchase).allowed);
    }

    #[test]
    fn test_keys_and_presets_are_independent() {
        let clock = Arc::new(ManualClock::new(TimeMs::new(0)));
        let limiter = RateLimiter::new(clock);

        for _ in 0..3 {
            limiter.check("alice", RateLimitPreset::Withdrawal);
        }
        assert!(!limiter.check("alice", RateLimitPreset::Withdrawal).allowed);
        assert!(limiter.check("bob", RateLimitPreset::Withdrawal).allowed);
        assert!(limiter.check("alice", RateLimitPreset::Contribution).allowed);
    }

    #[test]
    fn test_expired_windows_are_evicted() {
        let clock = Arc::new(ManualClock::new(TimeMs::new(0)));
        let limiter = RateLimiter::new(clock.clone());

        for i in 0..50 {
            limiter.check(&format!("user-{}", i), RateLimitPreset::Purchase);
        }
        limiter.check("hourly", RateLimitPreset::Withdrawal);
        assert_eq!(limiter.tracked(), 51);

        // minute windows have ended; the hourly one is still open
        clock.advance(Duration::from_secs(61));
        limiter.check("late", RateLimitPreset::Purchase);
        assert_eq!(limiter.tracked(), 2);

        for _ in 0..2 {
            limiter.check("hourly", RateLimitPreset::Withdrawal);
        }
        assert!(!limiter.check("hourly", RateLimitPreset::Withdrawal).allowed);
    }
}
