use crate::domain::Money;
use crate::engine::{DebtFirst, DistributionPolicy, ProRataSplit};
use rust_decimal::Decimal as RustDecimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_PRICE_API_URL: &str = "https://api.coingecko.com/api/v3";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub admin_token: String,
    pub default_platform_fee: RustDecimal,
    pub access_price: Money,
    pub min_contribution: Money,
    pub distribution_policy: DistributionPolicyKind,
    pub price_api_url: String,
    pub price_cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionPolicyKind {
    DebtFirst,
    ProRata { loan_share: RustDecimal },
}

impl DistributionPolicyKind {
    pub fn build(&self) -> Arc<dyn DistributionPolicy> {
        match *self {
            DistributionPolicyKind::DebtFirst => Arc::new(DebtFirst),
            DistributionPolicyKind::ProRata { loan_share } => Arc::new(ProRataSplit { loan_share }),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let admin_token = env_map
            .get("ADMIN_TOKEN")
            .cloned()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnv("ADMIN_TOKEN".to_string()))?;

        let default_platform_fee = parse_fraction(&env_map, "DEFAULT_PLATFORM_FEE", "0.15")?;
        let access_price = parse_money(&env_map, "ACCESS_PRICE", "1.00")?;
        let min_contribution = parse_money(&env_map, "MIN_CONTRIBUTION", "1.00")?;

        let distribution_policy = match env_map
            .get("DISTRIBUTION_POLICY")
            .map(|s| s.as_str())
            .unwrap_or("debt_first")
        {
            "debt_first" => DistributionPolicyKind::DebtFirst,
            "pro_rata" => DistributionPolicyKind::ProRata {
                loan_share: parse_fraction(&env_map, "LOAN_REVENUE_SHARE", "0.5")?,
            },
            other => {
                return Err(ConfigError::InvalidValue(
                    "DISTRIBUTION_POLICY".to_string(),
                    format!("must be debt_first or pro_rata, got {}", other),
                ))
            }
        };

        let price_api_url = env_map
            .get("PRICE_API_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_PRICE_API_URL.to_string());

        let price_cache_ttl_secs = env_map
            .get("PRICE_CACHE_TTL_SECS")
            .map(|s| s.as_str())
            .unwrap_or("60")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "PRICE_CACHE_TTL_SECS".to_string(),
                    "must be a valid u64".to_string(),
                )
            })?;

        Ok(Config {
            port,
            database_path,
            admin_token,
            default_platform_fee,
            access_price,
            min_contribution,
            distribution_policy,
            price_api_url,
            price_cache_ttl_secs,
        })
    }
}

/// A decimal in `[0, 1]`.
fn parse_fraction(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<RustDecimal, ConfigError> {
    let raw = env_map.get(key).map(|s| s.as_str()).unwrap_or(default);
    let value = RustDecimal::from_str(raw.trim()).map_err(|_| {
        ConfigError::InvalidValue(key.to_string(), "must be a decimal".to_string())
    })?;
    if value < RustDecimal::ZERO || value > RustDecimal::ONE {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("must be between 0 and 1, got {}", value),
        ));
    }
    Ok(value)
}

fn parse_money(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<Money, ConfigError> {
    let raw = env_map.get(key).map(|s| s.as_str()).unwrap_or(default);
    Money::parse_amount(raw.trim())
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}
