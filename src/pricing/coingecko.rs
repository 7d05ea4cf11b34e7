//! CoinGecko simple price client.

use super::{coingecko_id, PriceError, PriceSource};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use rust_decimal::Decimal as RustDecimal;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CoinGeckoSource {
    client: Client,
    base_url: String,
}

impl CoinGeckoSource {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get_json(&self, url: &str) -> Result<serde_json::Value, PriceError> {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(15)),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(PriceError::Network(e.to_string())))?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(PriceError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(PriceError::Http {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(PriceError::Http {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(PriceError::Parse(e.to_string())))
        })
        .await
    }
}

/// Pull `body[id]["usd"]` out of a `/simple/price` response.
fn parse_usd(body: &serde_json::Value, id: &str) -> Result<RustDecimal, PriceError> {
    let price = body
        .get(id)
        .and_then(|coin| coin.get("usd"))
        .and_then(|usd| usd.as_f64())
        .ok_or_else(|| PriceError::Parse(format!("no usd price for {}", id)))?;
    let rate = RustDecimal::try_from(price).map_err(|e| PriceError::Parse(e.to_string()))?;
    if rate <= RustDecimal::ZERO {
        return Err(PriceError::Parse(format!("non-positive price for {}", id)));
    }
    Ok(rate)
}

#[async_trait]
impl PriceSource for CoinGeckoSource {
    async fn usd_rate(&self, currency: &str) -> Result<RustDecimal, PriceError> {
        let id = coingecko_id(currency)
            .ok_or_else(|| PriceError::UnsupportedCurrency(currency.to_string()))?;
        let url = format!("{}/simple/price?ids={}&vs_currencies=usd", self.base_url, id);
        debug!(currency, url = %url, "fetching price");
        let body = self.get_json(&url).await?;
        parse_usd(&body, id)
    }
}
