//! Per-user wallet balances and lifetime counters.

use crate::domain::{Money, TimeMs, UserId, WalletId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the four balance buckets a journal row can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BalanceField {
    /// Spendable balance: deposits, loan repayments.
    Spendable,
    /// Profit proceeds eligible for cash-out.
    Withdrawable,
    /// Withdrawable funds held by a pending withdrawal.
    Locked,
    /// Non-withdrawable, spend-only credit.
    StoreCredit,
}

impl BalanceField {
    pub fn as_str(&self) -> &'static str {
        match self {
            BalanceField::Spendable => "SPENDABLE",
            BalanceField::Withdrawable => "WITHDRAWABLE",
            BalanceField::Locked => "LOCKED",
            BalanceField::StoreCredit => "STORE_CREDIT",
        }
    }
}

impl fmt::Display for BalanceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BalanceField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SPENDABLE" => Ok(BalanceField::Spendable),
            "WITHDRAWABLE" => Ok(BalanceField::Withdrawable),
            "LOCKED" => Ok(BalanceField::Locked),
            "STORE_CREDIT" => Ok(BalanceField::StoreCredit),
            other => Err(format!("unknown balance field {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub id: WalletId,
    pub user: UserId,
    pub balance: Money,
    pub withdrawable_balance: Money,
    pub locked_balance: Money,
    pub store_credit: Money,
    pub total_deposited: Money,
    pub total_withdrawn: Money,
    pub total_contributed: Money,
    pub total_converted_to_credit: Money,
    pub total_profit_received: Money,
    pub created_at: TimeMs,
    pub updated_at: TimeMs,
}

impl Wallet {
    /// A fresh, empty wallet for `user`.
    pub fn open(user: UserId, now: TimeMs) -> Self {
        Self {
            id: WalletId::generate(),
            user,
            balance: Money::ZERO,
            withdrawable_balance: Money::ZERO,
            locked_balance: Money::ZERO,
            store_credit: Money::ZERO,
            total_deposited: Money::ZERO,
            total_withdrawn: Money::ZERO,
            total_contributed: Money::ZERO,
            total_converted_to_credit: Money::ZERO,
            total_profit_received: Money::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn get(&self, field: BalanceField) -> Money {
        match field {
            BalanceField::Spendable => self.balance,
            BalanceField::Withdrawable => self.withdrawable_balance,
            BalanceField::Locked => self.locked_balance,
            BalanceField::StoreCredit => self.store_credit,
        }
    }

    pub fn set(&mut self, field: BalanceField, value: Money) {
        match field {
            BalanceField::Spendable => self.balance = value,
            BalanceField::Withdrawable => self.withdrawable_balance = value,
            BalanceField::Locked => self.locked_balance = value,
            BalanceField::StoreCredit => self.store_credit = value,
        }
    }

    /// Sum of every bucket the user still holds.
    pub fn holdings(&self) -> Money {
        self.balance + self.withdrawable_balance + self.locked_balance + self.store_credit
    }
}
