//! Access grants.

use crate::domain::{AssetId, Money, PurchaseId, TimeMs, UserId};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How an access grant came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseSource {
    Contributor,
    GapLender,
    Buyer,
}

impl PurchaseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseSource::Contributor => "CONTRIBUTOR",
            PurchaseSource::GapLender => "GAP_LENDER",
            PurchaseSource::Buyer => "BUYER",
        }
    }
}

impl FromStr for PurchaseSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONTRIBUTOR" => Ok(PurchaseSource::Contributor),
            "GAP_LENDER" => Ok(PurchaseSource::GapLender),
            "BUYER" => Ok(PurchaseSource::Buyer),
            other => Err(format!("unknown purchase source {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetPurchase {
    pub id: PurchaseId,
    pub user: UserId,
    pub asset_id: AssetId,
    pub purchase_amount: Money,
    pub access_key: String,
    pub source: PurchaseSource,
    pub delivery_expiry: TimeMs,
    pub created_at: TimeMs,
}

/// Access grants are valid for a year from issue.
pub const ACCESS_VALIDITY_DAYS: i64 = 365;

/// Generate a fresh 256-bit access key as lowercase hex.
///
/// Mixes two random v4 UUIDs with the grant coordinates through SHA-256.
pub fn generate_access_key(user: &UserId, asset: &AssetId) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(uuid::Uuid::new_v4().as_bytes());
    hasher.update(user.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(asset.as_str().as_bytes());
    hasher.update(uuid::Uuid::new_v4().as_bytes());
    hex::encode(hasher.finalize())
}

/// How a user holds access to an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessType {
    Purchase,
    Contribution,
    None,
}
