//! Domain types for the pooled funding ledger.
//!
//! This module provides:
//! - Cent-exact money and ratio arithmetic
//! - Opaque identifiers and millisecond timestamps
//! - Wallet, journal, asset, contribution, loan, access and withdrawal records

pub mod access;
pub mod asset;
pub mod contribution;
pub mod deposit;
pub mod distribution;
pub mod money;
pub mod primitives;
pub mod transaction;
pub mod wallet;
pub mod withdrawal;

pub use access::{generate_access_key, AccessType, AssetPurchase, PurchaseSource, ACCESS_VALIDITY_DAYS};
pub use asset::{Asset, AssetStatus};
pub use contribution::{Contribution, ContributionStatus, GapLoan, LoanStatus};
pub use deposit::Deposit;
pub use distribution::{ProfitDistribution, ProfitShare};
pub use money::{Money, MoneyError, Ratio};
pub use primitives::{
    AssetId, ContributionId, DistributionId, LoanId, PurchaseId, TimeMs, TransactionId, UserId,
    WalletId, WithdrawalId,
};
pub use transaction::{
    PaymentSource, Transaction, TransactionDetail, TransactionStatus, TransactionType,
};
pub use wallet::{BalanceField, Wallet};
pub use withdrawal::{Destination, WithdrawalOutcome, WithdrawalRequest, WithdrawalStatus};
