//! Contributions and gap loans: the two ways funds enter a collecting asset.

use crate::domain::{AssetId, ContributionId, LoanId, Money, Ratio, TimeMs, UserId};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContributionStatus {
    Active,
    /// Profit received has caught up with the excess paid in.
    ConvertedToInvestment,
}

impl ContributionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContributionStatus::Active => "ACTIVE",
            ContributionStatus::ConvertedToInvestment => "CONVERTED_TO_INVESTMENT",
        }
    }
}

impl FromStr for ContributionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(ContributionStatus::Active),
            "CONVERTED_TO_INVESTMENT" => Ok(ContributionStatus::ConvertedToInvestment),
            other => Err(format!("unknown contribution status {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    pub id: ContributionId,
    pub user: UserId,
    pub asset_id: AssetId,
    pub amount: Money,
    /// Set once, when the asset completes funding.
    pub excess_amount: Money,
    /// Locked at funding completion.
    pub profit_share_ratio: Ratio,
    pub total_profit_received: Money,
    pub status: ContributionStatus,
    pub created_at: TimeMs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    Active,
    FullyRepaid,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "ACTIVE",
            LoanStatus::FullyRepaid => "FULLY_REPAID",
        }
    }
}

impl FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(LoanStatus::Active),
            "FULLY_REPAID" => Ok(LoanStatus::FullyRepaid),
            other => Err(format!("unknown loan status {}", other)),
        }
    }
}

/// Gap financing recorded as a loan against future revenue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GapLoan {
    pub id: LoanId,
    pub user: UserId,
    pub asset_id: AssetId,
    pub loan_amount: Money,
    pub repaid_amount: Money,
    pub remaining_amount: Money,
    pub status: LoanStatus,
    pub created_at: TimeMs,
}

impl GapLoan {
    /// Apply a repayment, capped at the outstanding amount. Returns the amount applied.
    pub fn repay(&mut self, offered: Money) -> Money {
        if self.status == LoanStatus::FullyRepaid || !offered.is_positive() {
            return Money::ZERO;
        }
        let applied = offered.min(self.remaining_amount);
        self.repaid_amount = self.repaid_amount + applied;
        self.remaining_amount = self.remaining_amount - applied;
        if self.remaining_amount.is_zero() {
            self.status = LoanStatus::FullyRepaid;
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loan(amount: &str) -> GapLoan {
        let amount = Money::parse(amount).unwrap();
        GapLoan {
            id: LoanId::new("l"),
            user: UserId::new("u"),
            asset_id: AssetId::new("a"),
            loan_amount: amount,
            repaid_amount: Money::ZERO,
            remaining_amount: amount,
            status: LoanStatus::Active,
            created_at: TimeMs::new(0),
        }
    }

    #[test]
    fn test_repay_partial() {
        let mut l = loan("20");
        let applied = l.repay(Money::parse("1").unwrap());
        assert_eq!(applied, Money::parse("1").unwrap());
        assert_eq!(l.remaining_amount, Money::parse("19").unwrap());
        assert_eq!(l.repaid_amount, Money::parse("1").unwrap());
        assert_eq!(l.status, LoanStatus::Active);
    }

    #[test]
    fn test_repay_caps_and_terminates() {
        let mut l = loan("0.50");
        let applied = l.repay(Money::parse("1").unwrap());
        assert_eq!(applied, Money::parse("0.50").unwrap());
        assert!(l.remaining_amount.is_zero());
        assert_eq!(l.status, LoanStatus::FullyRepaid);
        assert_eq!(l.repay(Money::parse("1").unwrap()), Money::ZERO);
    }
}
