//! Withdrawal requests against withdrawable balance.

use crate::domain::{Money, TimeMs, UserId, WalletId, WithdrawalId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WithdrawalStatus {
    Pending,
    Processing,
    Completed,
    Rejected,
    Cancelled,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "PENDING",
            WithdrawalStatus::Processing => "PROCESSING",
            WithdrawalStatus::Completed => "COMPLETED",
            WithdrawalStatus::Rejected => "REJECTED",
            WithdrawalStatus::Cancelled => "CANCELLED",
        }
    }

    /// Still holding locked funds.
    pub fn is_open(&self) -> bool {
        matches!(self, WithdrawalStatus::Pending | WithdrawalStatus::Processing)
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WithdrawalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = match s {
            "PENDING" => WithdrawalStatus::Pending,
            "PROCESSING" => WithdrawalStatus::Processing,
            "COMPLETED" => WithdrawalStatus::Completed,
            "REJECTED" => WithdrawalStatus::Rejected,
            "CANCELLED" => WithdrawalStatus::Cancelled,
            other => return Err(format!("unknown withdrawal status {}", other)),
        };
        Ok(status)
    }
}

/// Where the funds go once an admin pays out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    pub currency: String,
    pub address: String,
}

/// Admin decision on an open withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WithdrawalOutcome {
    Processing {
        #[serde(default, rename = "adminNotes")]
        admin_notes: Option<String>,
    },
    Completed {
        #[serde(default, rename = "txHash")]
        tx_hash: Option<String>,
        #[serde(default, rename = "adminNotes")]
        admin_notes: Option<String>,
    },
    Rejected {
        #[serde(default, rename = "rejectionReason")]
        reason: Option<String>,
        #[serde(default, rename = "adminNotes")]
        admin_notes: Option<String>,
    },
}

impl WithdrawalOutcome {
    pub fn target_status(&self) -> WithdrawalStatus {
        match self {
            WithdrawalOutcome::Processing { .. } => WithdrawalStatus::Processing,
            WithdrawalOutcome::Completed { .. } => WithdrawalStatus::Completed,
            WithdrawalOutcome::Rejected { .. } => WithdrawalStatus::Rejected,
        }
    }

    pub fn admin_notes(&self) -> Option<&str> {
        match self {
            WithdrawalOutcome::Processing { admin_notes }
            | WithdrawalOutcome::Completed { admin_notes, .. }
            | WithdrawalOutcome::Rejected { admin_notes, .. } => admin_notes.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub id: WithdrawalId,
    pub wallet_id: WalletId,
    pub user: UserId,
    pub amount: Money,
    pub destination: Destination,
    pub status: WithdrawalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    pub created_at: TimeMs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<TimeMs>,
}
