//! USD conversion for crypto-denominated deposits.
//!
//! A [`PriceSource`] answers "how many USD is one unit of this currency";
//! [`PriceService`] puts a [`RateCache`] in front of it so repeated quotes
//! within the TTL do not hit the network.

use crate::domain::Money;
use async_trait::async_trait;
use rust_decimal::Decimal as RustDecimal;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub mod cache;
pub mod coingecko;
pub mod mock;

pub use cache::RateCache;
pub use coingecko::CoinGeckoSource;
pub use mock::MockPriceSource;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },
    #[error("price source rate limited")]
    RateLimited,
    #[error("unparseable price response: {0}")]
    Parse(String),
    #[error("unsupported currency {0}")]
    UnsupportedCurrency(String),
    #[error("{amount} {currency} is out of range")]
    OutOfRange { currency: String, amount: RustDecimal },
}

#[async_trait]
pub trait PriceSource: Send + Sync + fmt::Debug {
    /// USD value of one unit of `currency` (already upper-cased).
    async fn usd_rate(&self, currency: &str) -> Result<RustDecimal, PriceError>;
}

/// CoinGecko coin id for a currency code. Network-suffixed stablecoin codes
/// price the same as the base token.
pub fn coingecko_id(currency: &str) -> Option<&'static str> {
    let id = match currency {
        "BTC" => "bitcoin",
        "ETH" => "ethereum",
        "BNB" => "binancecoin",
        "MATIC" => "matic-network",
        "USDT" | "USDT_POLYGON" | "USDT_BSC" => "tether",
        "USDC" | "USDC_POLYGON" | "USDC_BSC" => "usd-coin",
        _ => return None,
    };
    Some(id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub rate: RustDecimal,
    pub usd: Money,
}

#[derive(Clone)]
pub struct PriceService {
    source: Arc<dyn PriceSource>,
    cache: Arc<RateCache>,
}

impl PriceService {
    pub fn new(source: Arc<dyn PriceSource>, cache: Arc<RateCache>) -> Self {
        Self { source, cache }
    }

    /// Convert `amount` units of `currency` to USD, rounded to cents.
    pub async fn usd_quote(&self, currency: &str, amount: RustDecimal) -> Result<Quote, PriceError> {
        let currency = currency.trim().to_uppercase();
        if coingecko_id(&currency).is_none() {
            return Err(PriceError::UnsupportedCurrency(currency));
        }

        let rate = match self.cache.get(&currency) {
            Some(rate) => rate,
            None => {
                let rate = self.source.usd_rate(&currency).await?;
                self.cache.put(&currency, rate);
                debug!(currency = %currency, rate = %rate, "price cached");
                rate
            }
        };

        let usd = amount
            .checked_mul(rate)
            .ok_or(PriceError::OutOfRange { currency, amount })?;
        Ok(Quote {
            rate,
            usd: Money::round(usd),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::domain::TimeMs;
    use std::str::FromStr;
    use std::time::Duration;

    fn d(s: &str) -> RustDecimal {
        RustDecimal::from_str(s).unwrap()
    }

    fn service(source: Arc<MockPriceSource>, clock: Arc<ManualClock>) -> PriceService {
        let cache = Arc::new(RateCache::new(Duration::from_secs(60), clock));
        PriceService::new(source, cache)
    }

    #[tokio::test]
    async fn test_quote_rounds_to_cents_and_caches() {
        let source = Arc::new(MockPriceSource::new().with_rate("ETH", d("3012.345")));
        let clock = Arc::new(ManualClock::new(TimeMs::new(0)));
        let prices = service(source.clone(), clock.clone());

        let quote = prices.usd_quote("eth", d("0.5")).await.unwrap();
        assert_eq!(quote.usd, Money::parse("1506.17").unwrap());
        prices.usd_quote("ETH", d("1")).await.unwrap();
        assert_eq!(source.calls(), 1);

        clock.advance(Duration::from_secs(61));
        prices.usd_quote("ETH", d("1")).await.unwrap();
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_unknown_currency_is_rejected_before_lookup() {
        let source = Arc::new(MockPriceSource::new());
        let clock = Arc::new(ManualClock::new(TimeMs::new(0)));
        let prices = service(source.clone(), clock);

        let err = prices.usd_quote("DOGE", d("1")).await.unwrap_err();
        assert_eq!(err, PriceError::UnsupportedCurrency("DOGE".to_string()));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_oversized_amount_is_an_error() {
        let source = Arc::new(MockPriceSource::new().with_rate("BTC", d("60000")));
        let clock = Arc::new(ManualClock::new(TimeMs::new(0)));
        let prices = service(source, clock);

        let err = prices
            .usd_quote("BTC", RustDecimal::MAX)
            .await
            .unwrap_err();
        assert!(matches!(err, PriceError::OutOfRange { .. }));
    }

    #[test]
    fn test_network_variants_share_ids() {
        assert_eq!(coingecko_id("USDT_BSC"), Some("tether"));
        assert_eq!(coingecko_id("USDC_POLYGON"), Some("usd-coin"));
        assert_eq!(coingecko_id("XMR"), None);
    }
}
