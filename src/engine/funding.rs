//! Asset funding state machine: COLLECTING -> PURCHASED -> AVAILABLE.

use crate::domain::{Asset, AssetStatus, Money, TimeMs};
use crate::error::LedgerError;
use tracing::info;

/// Result of feeding money into a collecting asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inflow {
    pub collected: Money,
    pub remaining_needed: Money,
    /// This inflow crossed the target and moved the asset to PURCHASED.
    pub completed_funding: bool,
}

/// Add `amount` to the asset's collected total, flipping it to PURCHASED when
/// the fee-inclusive target is reached.
pub fn record_inflow(asset: &mut Asset, amount: Money, now: TimeMs) -> Result<Inflow, LedgerError> {
    if asset.status != AssetStatus::Collecting {
        return Err(LedgerError::NotAcceptingFunds(asset.status));
    }
    if !amount.is_positive() {
        return Err(LedgerError::InvalidAmount(format!(
            "inflow must be positive, got {}",
            amount
        )));
    }

    asset.current_collected = asset.current_collected + amount;

    let completed_funding = asset.is_fully_funded();
    if completed_funding {
        advance(asset, AssetStatus::Purchased)?;
        asset.purchased_at = Some(now);
        info!(
            asset = %asset.id,
            collected = %asset.current_collected,
            target = %asset.target_amount(),
            "asset fully funded"
        );
    }

    Ok(Inflow {
        collected: asset.current_collected,
        remaining_needed: asset.remaining_needed(),
        completed_funding,
    })
}

/// PURCHASED -> AVAILABLE once the asset has been fulfilled.
pub fn mark_available(
    asset: &mut Asset,
    delivery_info: Option<serde_json::Value>,
    now: TimeMs,
) -> Result<(), LedgerError> {
    if asset.status != AssetStatus::Purchased {
        return Err(LedgerError::InvalidState(format!(
            "asset {} is {}, expected PURCHASED",
            asset.id, asset.status
        )));
    }
    advance(asset, AssetStatus::Available)?;
    asset.delivery_info = delivery_info;
    asset.available_at = Some(now);
    info!(asset = %asset.id, "asset available");
    Ok(())
}

fn advance(asset: &mut Asset, next: AssetStatus) -> Result<(), LedgerError> {
    if !asset.status.can_advance_to(next) {
        return Err(LedgerError::InvalidState(format!(
            "cannot move asset {} from {} to {}",
            asset.id, asset.status, next
        )));
    }
    asset.status = next;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AssetId;
    use rust_decimal::Decimal as RustDecimal;
    use std::str::FromStr;

    fn collecting(price: &str) -> Asset {
        Asset {
            id: AssetId::new("a1"),
            title: "Template pack".to_string(),
            target_price: Money::parse(price).unwrap(),
            platform_fee: RustDecimal::from_str("0.15").unwrap(),
            access_price: Money::from_cents(100),
            current_collected: Money::ZERO,
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

    fn m(s: &str) -> Money {
        Money::parse(s).unwrap()
    }

    #[test]
    fn test_partial_inflow_keeps_collecting() {
        let mut asset = collecting("100");
        let inflow = record_inflow(&mut asset, m("80"), TimeMs::new(5)).unwrap();
        assert!(!inflow.completed_funding);
        assert_eq!(inflow.remaining_needed, m("35"));
        assert_eq!(asset.status, AssetStatus::Collecting);
        assert_eq!(asset.purchased_at, None);
    }

    #[test]
    fn test_exact_inflow_completes() {
        let mut asset = collecting("100");
        let inflow = record_inflow(&mut asset, m("115"), TimeMs::new(5)).unwrap();
        assert!(inflow.completed_funding);
        assert!(inflow.remaining_needed.is_zero());
        assert_eq!(asset.status, AssetStatus::Purchased);
        assert_eq!(asset.purchased_at, Some(TimeMs::new(5)));
    }

    #[test]
    fn test_inflow_after_completion_rejected() {
        let mut asset = collecting("100");
        record_inflow(&mut asset, m("200"), TimeMs::new(5)).unwrap();
        let err = record_inflow(&mut asset, m("1"), TimeMs::new(6)).unwrap_err();
        assert_eq!(err, LedgerError::NotAcceptingFunds(AssetStatus::Purchased));
        assert_eq!(asset.current_collected, m("200"));
    }

    #[test]
    fn test_mark_available_requires_purchased() {
        let mut asset = collecting("100");
        let err = mark_available(&mut asset, None, TimeMs::new(1)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState(_)));

        record_inflow(&mut asset, m("115"), TimeMs::new(2)).unwrap();
        mark_available(&mut asset, Some(serde_json::json!({"url": "x"})), TimeMs::new(3)).unwrap();
        assert_eq!(asset.status, AssetStatus::Available);
        assert_eq!(asset.available_at, Some(TimeMs::new(3)));

        let err = mark_available(&mut asset, None, TimeMs::new(4)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState(_)));
    }
}
