//! Withdrawal desk and store credit conversion.

use super::{wallet_ops, Ledger};
use crate::db::UnitOfWork;
use crate::domain::{
    Destination, Money, TransactionStatus, UserId, Wallet, WithdrawalId, WithdrawalOutcome,
    WithdrawalRequest, WithdrawalStatus,
};
use crate::error::LedgerError;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditReceipt {
    pub converted: Money,
    pub store_credit: Money,
    pub withdrawable_balance: Money,
}

async fn withdrawal_wallet(
    uow: &mut UnitOfWork,
    request: &WithdrawalRequest,
) -> Result<Wallet, LedgerError> {
    uow.wallet_by_id(&request.wallet_id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("wallet {}", request.wallet_id)))
}

async fn load_withdrawal(
    uow: &mut UnitOfWork,
    id: &WithdrawalId,
) -> Result<WithdrawalRequest, LedgerError> {
    uow.withdrawal(id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("withdrawal {}", id)))
}

impl Ledger {
    /// Lock withdrawable funds pending an admin payout.
    pub async fn request_withdrawal(
        &self,
        user: &UserId,
        amount: Money,
        destination: Destination,
    ) -> Result<WithdrawalRequest, LedgerError> {
        let mut uow = self.repo.begin().await?;
        let request = self
            .request_withdrawal_in(&mut uow, user, amount, destination)
            .await?;
        uow.commit().await?;
        Ok(request)
    }

    pub(crate) async fn request_withdrawal_in(
        &self,
        uow: &mut UnitOfWork,
        user: &UserId,
        amount: Money,
        destination: Destination,
    ) -> Result<WithdrawalRequest, LedgerError> {
        wallet_ops::ensure_amount(amount)?;
        if destination.address.trim().is_empty() || destination.currency.trim().is_empty() {
            return Err(LedgerError::InvalidOperation(
                "withdrawal destination needs a currency and an address".to_string(),
            ));
        }

        let now = self.clock.now();
        let mut wallet = wallet_ops::require_wallet(uow, user).await?;
        let id = WithdrawalId::generate();
        wallet_ops::lock(uow, &mut wallet, amount, &id, now).await?;

        let request = WithdrawalRequest {
            id,
            wallet_id: wallet.id.clone(),
            user: user.clone(),
            amount,
            destination,
            status: WithdrawalStatus::Pending,
            admin_notes: None,
            rejection_reason: None,
            tx_hash: None,
            created_at: now,
            processed_at: None,
        };
        uow.insert_withdrawal(&request).await?;
        info!(user = %user, withdrawal = %request.id, amount = %amount, "withdrawal requested");
        Ok(request)
    }

    /// Admin decision on an open withdrawal.
    pub async fn resolve_withdrawal(
        &self,
        id: &WithdrawalId,
        outcome: WithdrawalOutcome,
    ) -> Result<WithdrawalRequest, LedgerError> {
        let mut uow = self.repo.begin().await?;
        let request = self.resolve_withdrawal_in(&mut uow, id, outcome).await?;
        uow.commit().await?;
        Ok(request)
    }

    pub(crate) async fn resolve_withdrawal_in(
        &self,
        uow: &mut UnitOfWork,
        id: &WithdrawalId,
        outcome: WithdrawalOutcome,
    ) -> Result<WithdrawalRequest, LedgerError> {
        let mut request = load_withdrawal(uow, id).await?;
        if !request.status.is_open() {
            return Err(LedgerError::InvalidState(format!(
                "withdrawal {} is {}",
                id, request.status
            )));
        }

        let now = self.clock.now();
        if let Some(notes) = outcome.admin_notes() {
            request.admin_notes = Some(notes.to_string());
        }
        let target = outcome.target_status();

        match outcome {
            WithdrawalOutcome::Processing { .. } => {}
            WithdrawalOutcome::Completed { tx_hash, .. } => {
                let mut wallet = withdrawal_wallet(uow, &request).await?;
                wallet_ops::settle_locked(
                    uow,
                    &mut wallet,
                    request.amount,
                    id,
                    tx_hash.clone(),
                    &request.destination.address,
                    now,
                )
                .await?;
                uow.close_withdrawal_request_row(id, TransactionStatus::Completed)
                    .await?;
                request.tx_hash = tx_hash;
                request.processed_at = Some(now);
            }
            WithdrawalOutcome::Rejected { reason, .. } => {
                let mut wallet = withdrawal_wallet(uow, &request).await?;
                let why = reason.as_deref().unwrap_or("rejected");
                wallet_ops::unlock(uow, &mut wallet, request.amount, id, why, now).await?;
                uow.close_withdrawal_request_row(id, TransactionStatus::Reversed)
                    .await?;
                request.rejection_reason = reason;
                request.processed_at = Some(now);
            }
        }

        request.status = target;
        uow.save_withdrawal(&request).await?;
        info!(withdrawal = %id, status = %target, "withdrawal resolved");
        Ok(request)
    }

    /// Owner-initiated cancellation of a still-pending withdrawal.
    pub async fn cancel_withdrawal(
        &self,
        user: &UserId,
        id: &WithdrawalId,
    ) -> Result<WithdrawalRequest, LedgerError> {
        let mut uow = self.repo.begin().await?;
        let request = self.cancel_withdrawal_in(&mut uow, user, id).await?;
        uow.commit().await?;
        Ok(request)
    }

    pub(crate) async fn cancel_withdrawal_in(
        &self,
        uow: &mut UnitOfWork,
        user: &UserId,
        id: &WithdrawalId,
    ) -> Result<WithdrawalRequest, LedgerError> {
        let mut request = load_withdrawal(uow, id).await?;
        if &request.user != user {
            return Err(LedgerError::not_found(format!("withdrawal {}", id)));
        }
        if request.status != WithdrawalStatus::Pending {
            return Err(LedgerError::InvalidState(format!(
                "only pending withdrawals can be cancelled, {} is {}",
                id, request.status
            )));
        }

        let now = self.clock.now();
        let mut wallet = withdrawal_wallet(uow, &request).await?;
        wallet_ops::unlock(uow, &mut wallet, request.amount, id, "cancelled by user", now).await?;
        uow.close_withdrawal_request_row(id, TransactionStatus::Reversed)
            .await?;

        request.status = WithdrawalStatus::Cancelled;
        request.processed_at = Some(now);
        uow.save_withdrawal(&request).await?;
        info!(user = %user, withdrawal = %id, "withdrawal cancelled");
        Ok(request)
    }

    /// Move withdrawable funds into store credit. There is no way back.
    pub async fn convert_to_credit(
        &self,
        user: &UserId,
        amount: Money,
    ) -> Result<CreditReceipt, LedgerError> {
        let mut uow = self.repo.begin().await?;
        let receipt = self.convert_to_credit_in(&mut uow, user, amount).await?;
        uow.commit().await?;
        Ok(receipt)
    }

    pub(crate) async fn convert_to_credit_in(
        &self,
        uow: &mut UnitOfWork,
        user: &UserId,
        amount: Money,
    ) -> Result<CreditReceipt, LedgerError> {
        let now = self.clock.now();
        let mut wallet = wallet_ops::require_wallet(uow, user).await?;
        wallet_ops::convert_to_credit(uow, &mut wallet, amount, now).await?;
        info!(user = %user, amount = %amount, "converted to store credit");
        Ok(CreditReceipt {
            converted: amount,
            store_credit: wallet.store_credit,
            withdrawable_balance: wallet.withdrawable_balance,
        })
    }
}
