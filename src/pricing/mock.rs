//! Fixed-rate price source for testing without network calls.

use super::{PriceError, PriceSource};
use async_trait::async_trait;
use rust_decimal::Decimal as RustDecimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct MockPriceSource {
    rates: HashMap<String, RustDecimal>,
    calls: AtomicUsize,
}

impl MockPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(mut self, currency: &str, rate: RustDecimal) -> Self {
        self.rates.insert(currency.to_uppercase(), rate);
        self
    }

    /// Number of `usd_rate` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSource for MockPriceSource {
    async fn usd_rate(&self, currency: &str) -> Result<RustDecimal, PriceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.rates
            .get(currency)
            .copied()
            .ok_or_else(|| PriceError::UnsupportedCurrency(currency.to_string()))
    }
}
