//! Append-only wallet journal entries.

use crate::domain::{
    AssetId, BalanceField, ContributionId, LoanId, Money, PurchaseId, Ratio, TimeMs,
    TransactionId, WalletId, WithdrawalId,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Pledge,
    AssetPurchase,
    GapLoanDisbursement,
    GapLoanRepayment,
    ProfitDistribution,
    WithdrawalRequest,
    Withdrawal,
    WithdrawalReversal,
    StoreCreditConversion,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Pledge => "PLEDGE",
            TransactionType::AssetPurchase => "ASSET_PURCHASE",
            TransactionType::GapLoanDisbursement => "GAP_LOAN_DISBURSEMENT",
            TransactionType::GapLoanRepayment => "GAP_LOAN_REPAYMENT",
            TransactionType::ProfitDistribution => "PROFIT_DISTRIBUTION",
            TransactionType::WithdrawalRequest => "WITHDRAWAL_REQUEST",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::WithdrawalReversal => "WITHDRAWAL_REVERSAL",
            TransactionType::StoreCreditConversion => "STORE_CREDIT_CONVERSION",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "DEPOSIT" => TransactionType::Deposit,
            "PLEDGE" => TransactionType::Pledge,
            "ASSET_PURCHASE" => TransactionType::AssetPurchase,
            "GAP_LOAN_DISBURSEMENT" => TransactionType::GapLoanDisbursement,
            "GAP_LOAN_REPAYMENT" => TransactionType::GapLoanRepayment,
            "PROFIT_DISTRIBUTION" => TransactionType::ProfitDistribution,
            "WITHDRAWAL_REQUEST" => TransactionType::WithdrawalRequest,
            "WITHDRAWAL" => TransactionType::Withdrawal,
            "WITHDRAWAL_REVERSAL" => TransactionType::WithdrawalReversal,
            "STORE_CREDIT_CONVERSION" => TransactionType::StoreCreditConversion,
            other => return Err(format!("unknown transaction type {}", other)),
        };
        Ok(kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Reversed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Reversed => "REVERSED",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TransactionStatus::Pending),
            "COMPLETED" => Ok(TransactionStatus::Completed),
            "REVERSED" => Ok(TransactionStatus::Reversed),
            other => Err(format!("unknown transaction status {}", other)),
        }
    }
}

/// Which balance a purchase was paid from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentSource {
    #[default]
    Balance,
    StoreCredit,
}

impl PaymentSource {
    pub fn field(&self) -> BalanceField {
        match self {
            PaymentSource::Balance => BalanceField::Spendable,
            PaymentSource::StoreCredit => BalanceField::StoreCredit,
        }
    }
}

/// Typed payload for each journal entry kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionDetail {
    Deposit {
        event_key: String,
        source: String,
    },
    Pledge {
        asset_id: AssetId,
        contribution_id: ContributionId,
    },
    AssetPurchase {
        asset_id: AssetId,
        purchase_id: PurchaseId,
        paid_with: PaymentSource,
    },
    GapLoanDisbursement {
        asset_id: AssetId,
        loan_id: LoanId,
    },
    GapLoanRepayment {
        asset_id: AssetId,
        loan_id: LoanId,
        remaining_after: Money,
    },
    ProfitDistribution {
        asset_id: AssetId,
        contribution_id: ContributionId,
        share_ratio: Ratio,
        revenue: Money,
    },
    WithdrawalRequest {
        withdrawal_id: WithdrawalId,
        locked_before: Money,
        locked_after: Money,
    },
    Withdrawal {
        withdrawal_id: WithdrawalId,
        #[serde(skip_serializing_if = "Option::is_none")]
        tx_hash: Option<String>,
        address: String,
    },
    WithdrawalReversal {
        withdrawal_id: WithdrawalId,
        reason: String,
        locked_before: Money,
        locked_after: Money,
    },
    StoreCreditConversion {
        credit_before: Money,
        credit_after: Money,
    },
}

impl TransactionDetail {
    pub fn kind(&self) -> TransactionType {
        match self {
            TransactionDetail::Deposit { .. } => TransactionType::Deposit,
            TransactionDetail::Pledge { .. } => TransactionType::Pledge,
            TransactionDetail::AssetPurchase { .. } => TransactionType::AssetPurchase,
            TransactionDetail::GapLoanDisbursement { .. } => TransactionType::GapLoanDisbursement,
            TransactionDetail::GapLoanRepayment { .. } => TransactionType::GapLoanRepayment,
            TransactionDetail::ProfitDistribution { .. } => TransactionType::ProfitDistribution,
            TransactionDetail::WithdrawalRequest { .. } => TransactionType::WithdrawalRequest,
            TransactionDetail::Withdrawal { .. } => TransactionType::Withdrawal,
            TransactionDetail::WithdrawalReversal { .. } => TransactionType::WithdrawalReversal,
            TransactionDetail::StoreCreditConversion { .. } => {
                TransactionType::StoreCreditConversion
            }
        }
    }

    /// `(reference_id, reference_type)` linking the row to the entity it concerns.
    pub fn reference(&self) -> Option<(String, &'static str)> {
        match self {
            TransactionDetail::Deposit { event_key, .. } => Some((event_key.clone(), "DEPOSIT")),
            TransactionDetail::Pledge { asset_id, .. } => {
                Some((asset_id.to_string(), "ASSET_CONTRIBUTION"))
            }
            TransactionDetail::AssetPurchase { asset_id, .. } => {
                Some((asset_id.to_string(), "ASSET_PURCHASE"))
            }
            TransactionDetail::GapLoanDisbursement { loan_id, .. }
            | TransactionDetail::GapLoanRepayment { loan_id, .. } => {
                Some((loan_id.to_string(), "GAP_LOAN"))
            }
            TransactionDetail::ProfitDistribution { asset_id, .. } => {
                Some((asset_id.to_string(), "PROFIT_SHARE"))
            }
            TransactionDetail::WithdrawalRequest { withdrawal_id, .. }
            | TransactionDetail::Withdrawal { withdrawal_id, .. }
            | TransactionDetail::WithdrawalReversal { withdrawal_id, .. } => {
                Some((withdrawal_id.to_string(), "WITHDRAWAL_REQUEST"))
            }
            TransactionDetail::StoreCreditConversion { .. } => None,
        }
    }
}

/// One immutable journal row.
///
/// `amount` is signed: `balance_after - balance_before == amount` for `field`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub wallet_id: WalletId,
    pub kind: TransactionType,
    pub status: TransactionStatus,
    pub field: BalanceField,
    pub amount: Money,
    pub balance_before: Money,
    pub balance_after: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_type: Option<String>,
    pub detail: TransactionDetail,
    pub created_at: TimeMs,
}

impl Transaction {
    pub fn is_balanced(&self) -> bool {
        self.balance_after - self.balance_before == self.amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_is_tagged_by_kind() {
        let detail = TransactionDetail::GapLoanDisbursement {
            asset_id: AssetId::new("a1"),
            loan_id: LoanId::new("l1"),
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["type"], "GAP_LOAN_DISBURSEMENT");
        assert_eq!(json["loan_id"], "l1");
        assert_eq!(detail.kind(), TransactionType::GapLoanDisbursement);

        let back: TransactionDetail = serde_json::from_value(json).unwrap();
        assert_eq!(back, detail);
    }

    #[test]
    fn test_reference_links_entity() {
        let detail = TransactionDetail::Pledge {
            asset_id: AssetId::new("a1"),
            contribution_id: ContributionId::new("c1"),
        };
        assert_eq!(
            detail.reference(),
            Some(("a1".to_string(), "ASSET_CONTRIBUTION"))
        );
        let conversion = TransactionDetail::StoreCreditConversion {
            credit_before: Money::ZERO,
            credit_after: Money::from_cents(100),
        };
        assert_eq!(conversion.reference(), None);
    }

    #[test]
    fn test_type_string_round_trip() {
        for kind in [
            TransactionType::Deposit,
            TransactionType::GapLoanRepayment,
            TransactionType::StoreCreditConversion,
        ] {
            assert_eq!(TransactionType::from_str(kind.as_str()), Ok(kind));
        }
        assert!(TransactionType::from_str("BOGUS").is_err());
    }
}
