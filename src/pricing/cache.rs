//! TTL cache for exchange rates.

use crate::clock::Clock;
use crate::domain::TimeMs;
use dashmap::DashMap;
use rust_decimal::Decimal as RustDecimal;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
struct CachedRate {
    rate: RustDecimal,
    fetched_at: TimeMs,
}

pub struct RateCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: DashMap<String, CachedRate>,
}

impl RateCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: DashMap::new(),
        }
    }

    /// Cached rate, or `None` when missing or at least `ttl` old.
    pub fn get(&self, key: &str) -> Option<RustDecimal> {
        let now = self.clock.now();
        let ttl_ms = self.ttl.as_millis() as i64;
        let entry = self.entries.get(key).map(|e| *e)?;
        if now.as_ms() - entry.fetched_at.as_ms() >= ttl_ms {
            self.entries.remove(key);
            return None;
        }
        Some(entry.rate)
    }

    pub fn put(&self, key: &str, rate: RustDecimal) {
        self.entries.insert(
            key.to_string(),
            CachedRate {
                rate,
                fetched_at: self.clock.now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_entry_expires_at_ttl() {
        let clock = Arc::new(ManualClock::new(TimeMs::new(10_000)));
        let cache = RateCache::new(Duration::from_secs(60), clock.clone());
        assert_eq!(cache.get("BTC"), None);

        cache.put("BTC", RustDecimal::new(65_000, 0));
        clock.advance(Duration::from_millis(59_999));
        assert_eq!(cache.get("BTC"), Some(RustDecimal::new(65_000, 0)));

        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get("BTC"), None);
        assert!(cache.is_empty());
    }
}
