//! Deposit confirmation event.

use crate::domain::{Money, TimeMs, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A confirmed inbound payment for a user's wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    /// `ref:<reference>` when the payment carries one, otherwise a fresh
    /// `evt:<uuid>` that never matches another event.
    pub event_key: String,
    pub user: UserId,
    pub time_ms: TimeMs,
    pub amount: Money,
    /// Free-form origin label, e.g. "crypto:ETH" or "card".
    pub source: String,
    /// Payment processor reference or on-chain transaction hash.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl Deposit {
    /// Create a new Deposit and compute its `event_key`.
    pub fn new(
        user: UserId,
        time_ms: TimeMs,
        amount: Money,
        source: String,
        reference: Option<String>,
    ) -> Self {
        let reference = normalize_reference(reference);
        let event_key = Self::event_key(reference.as_deref());
        Self {
            event_key,
            user,
            time_ms,
            amount,
            source,
            reference,
        }
    }

    /// Only an external reference identifies a replay. Reference-less
    /// confirmations are always distinct events.
    pub fn event_key(reference: Option<&str>) -> String {
        match reference.map(str::trim).filter(|r| !r.is_empty()) {
            Some(r) => format!("ref:{}", r.to_lowercase()),
            None => format!("evt:{}", Uuid::new_v4()),
        }
    }
}

fn normalize_reference(reference: Option<String>) -> Option<String> {
    reference
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_key_prefers_reference() {
        let deposit = Deposit::new(
            UserId::new("u1"),
            TimeMs::new(1000),
            Money::parse("1").unwrap(),
            "crypto:ETH".to_string(),
            Some("  0xDEADBEEF ".to_string()),
        );
        assert_eq!(deposit.event_key, "ref:0xdeadbeef");
        assert_eq!(deposit.reference.as_deref(), Some("0xdeadbeef"));
    }

    #[test]
    fn event_key_without_reference_is_unique() {
        let deposit = |reference: Option<&str>| {
            Deposit::new(
                UserId::new("u1"),
                TimeMs::new(1000),
                Money::parse("1.23").unwrap(),
                "card".to_string(),
                reference.map(str::to_string),
            )
        };
        let d1 = deposit(None);
        let d2 = deposit(Some("   "));
        assert!(d1.event_key.starts_with("evt:"));
        assert!(d2.event_key.starts_with("evt:"));
        assert_ne!(d1.event_key, d2.event_key);
        assert_eq!(d2.reference, None);
    }
}
