//! Deposit intake from the payment confirmation side.

use super::wallet_ops;
use super::Ledger;
use crate::db::UnitOfWork;
use crate::domain::{BalanceField, Deposit, Money, TransactionDetail, UserId};
use crate::error::LedgerError;
use serde::Serialize;
use tracing::{debug, info};

/// A confirmed payment to credit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositRequest {
    pub user: UserId,
    pub amount: Money,
    /// Origin label, e.g. "card" or "crypto:ETH".
    pub source: String,
    /// Processor reference or transaction hash. Replays with the same
    /// reference are ignored; without one every request is credited.
    pub reference: Option<String>,
}

impl DepositRequest {
    pub fn new(user: UserId, amount: Money, source: impl Into<String>) -> Self {
        Self {
            user,
            amount,
            source: source.into(),
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositReceipt {
    pub new_balance: Money,
    pub duplicate: bool,
    pub event_key: String,
}

impl Ledger {
    /// Credit a confirmed payment to the user's spendable balance, opening
    /// the wallet on first use.
    pub async fn deposit(&self, request: DepositRequest) -> Result<DepositReceipt, LedgerError> {
        let mut uow = self.repo.begin().await?;
        let receipt = self.deposit_in(&mut uow, request).await?;
        uow.commit().await?;
        Ok(receipt)
    }

    pub(crate) async fn deposit_in(
        &self,
        uow: &mut UnitOfWork,
        request: DepositRequest,
    ) -> Result<DepositReceipt, LedgerError> {
        wallet_ops::ensure_amount(request.amount)?;
        let now = self.clock.now();
        let deposit = Deposit::new(
            request.user.clone(),
            now,
            request.amount,
            request.source,
            request.reference,
        );

        if !uow.insert_deposit(&deposit).await? {
            let balance = uow
                .wallet_by_user(&deposit.user)
                .await?
                .map(|w| w.balance)
                .unwrap_or(Money::ZERO);
            debug!(event_key = %deposit.event_key, "duplicate deposit ignored");
            return Ok(DepositReceipt {
                new_balance: balance,
                duplicate: true,
                event_key: deposit.event_key,
            });
        }

        let mut wallet = wallet_ops::load_or_open_wallet(uow, &deposit.user, now).await?;
        wallet.total_deposited = wallet.total_deposited + deposit.amount;
        let detail = TransactionDetail::Deposit {
            event_key: deposit.event_key.clone(),
            source: deposit.source.clone(),
        };
        wallet_ops::credit(uow, &mut wallet, BalanceField::Spendable, deposit.amount, detail, now)
            .await?;

        info!(
            user = %deposit.user,
            amount = %deposit.amount,
            source = %deposit.source,
            "deposit credited"
        );
        Ok(DepositReceipt {
            new_balance: wallet.balance,
            duplicate: false,
            event_key: deposit.event_key,
        })
    }
}
