//! Fundable digital asset and its lifecycle status.

use crate::domain::{AssetId, Money, TimeMs};
use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Asset lifecycle status.
///
/// The ledger drives only COLLECTING -> PURCHASED -> AVAILABLE. The remaining
/// states belong to the request/moderation workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetStatus {
    Requested,
    Approved,
    Collecting,
    Purchased,
    Available,
    Paused,
    Rejected,
}

impl AssetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::Requested => "REQUESTED",
            AssetStatus::Approved => "APPROVED",
            AssetStatus::Collecting => "COLLECTING",
            AssetStatus::Purchased => "PURCHASED",
            AssetStatus::Available => "AVAILABLE",
            AssetStatus::Paused => "PAUSED",
            AssetStatus::Rejected => "REJECTED",
        }
    }

    /// Position on the funding track, `None` for administrative states.
    fn funding_rank(&self) -> Option<u8> {
        match self {
            AssetStatus::Collecting => Some(0),
            AssetStatus::Purchased => Some(1),
            AssetStatus::Available => Some(2),
            _ => None,
        }
    }

    /// True when `next` is the immediate successor on the funding track.
    pub fn can_advance_to(&self, next: AssetStatus) -> bool {
        match (self.funding_rank(), next.funding_rank()) {
            (Some(a), Some(b)) => b == a + 1,
            _ => false,
        }
    }
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = match s {
            "REQUESTED" => AssetStatus::Requested,
            "APPROVED" => AssetStatus::Approved,
            "COLLECTING" => AssetStatus::Collecting,
            "PURCHASED" => AssetStatus::Purchased,
            "AVAILABLE" => AssetStatus::Available,
            "PAUSED" => AssetStatus::Paused,
            "REJECTED" => AssetStatus::Rejected,
            other => return Err(format!("unknown asset status {}", other)),
        };
        Ok(status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: AssetId,
    pub title: String,
    /// Pre-fee cost of the asset.
    pub target_price: Money,
    /// Platform fee as a fraction, e.g. 0.15.
    #[serde(with = "rust_decimal::serde::str")]
    pub platform_fee: RustDecimal,
    /// Flat post-funding access price.
    pub access_price: Money,
    pub current_collected: Money,
    pub status: AssetStatus,
    pub total_purchases: i64,
    pub total_revenue: Money,
    pub total_profit_distributed: Money,
    pub platform_margin: Money,
    /// Opaque fulfilment data recorded when the asset is processed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_info: Option<serde_json::Value>,
    pub created_at: TimeMs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchased_at: Option<TimeMs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_at: Option<TimeMs>,
}

impl Asset {
    /// Fee-inclusive funding target: `target_price * (1 + platform_fee)`.
    pub fn target_amount(&self) -> Money {
        self.target_price.multiply(RustDecimal::ONE + self.platform_fee)
    }

    /// Shortfall against the target, never negative.
    pub fn remaining_needed(&self) -> Money {
        (self.target_amount() - self.current_collected).max(Money::ZERO)
    }

    pub fn is_fully_funded(&self) -> bool {
        self.current_collected >= self.target_amount()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(price: &str, fee: &str, collected: &str) -> Asset {
        Asset {
            id: AssetId::new("a"),
            title: "Course".to_string(),
            target_price: Money::parse(price).unwrap(),
            platform_fee: RustDecimal::from_str(fee).unwrap(),
            access_price: Money::from_cents(100),
            current_collected: Money::parse(collected).unwrap(),
            status: AssetStatus::Collecting,
            total_purchases: 0,
            total_revenue: Money::ZERO,
            total_profit_distributed: Money::ZERO,
            platform_margin: Money::ZERO,
            delivery_info: None,
            created_at: TimeMs::new(0),
            purchased_at: None,
            available_at: None,
        }
    }

    #[test]
    fn test_target_amount_includes_fee() {
        let a = asset("100", "0.15", "80");
        assert_eq!(a.target_amount(), Money::parse("115").unwrap());
        assert_eq!(a.remaining_needed(), Money::parse("35").unwrap());
        assert!(!a.is_fully_funded());
    }

    #[test]
    fn test_remaining_is_clamped() {
        let a = asset("100", "0.15", "200");
        assert_eq!(a.remaining_needed(), Money::ZERO);
        assert!(a.is_fully_funded());
    }

    #[test]
    fn test_status_is_forward_only() {
        use AssetStatus::*;
        assert!(Collecting.can_advance_to(Purchased));
        assert!(Purchased.can_advance_to(Available));
        assert!(!Collecting.can_advance_to(Available));
        assert!(!Available.can_advance_to(Collecting));
        assert!(!Purchased.can_advance_to(Collecting));
        assert!(!Paused.can_advance_to(Purchased));
    }
}
