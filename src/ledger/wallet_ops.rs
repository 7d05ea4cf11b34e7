//! Wallet postings.
//!
//! Every balance change goes through [`post`], which validates the target
//! field stays non-negative, writes the wallet back and appends exactly one
//! journal row describing that field's before and after. Moves between two
//! fields (lock, unlock, conversion) update the second field on the wallet
//! before posting and record it in the row's detail.

use crate::db::UnitOfWork;
use crate::domain::{
    BalanceField, Money, TimeMs, Transaction, TransactionDetail, TransactionId,
    TransactionStatus, UserId, Wallet, WithdrawalId,
};
use crate::error::LedgerError;

pub(crate) fn ensure_amount(amount: Money) -> Result<(), LedgerError> {
    if !amount.is_positive() {
        return Err(LedgerError::InvalidAmount(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    if amount > Money::max_amount() {
        return Err(LedgerError::InvalidAmount(format!(
            "amount {} exceeds the maximum of {}",
            amount,
            Money::max_amount()
        )));
    }
    Ok(())
}

fn ensure_covers(wallet: &Wallet, field: BalanceField, amount: Money) -> Result<(), LedgerError> {
    let available = wallet.get(field);
    if available < amount {
        return Err(LedgerError::InsufficientFunds {
            field,
            available,
            requested: amount,
        });
    }
    Ok(())
}

pub(crate) async fn require_wallet(
    uow: &mut UnitOfWork,
    user: &UserId,
) -> Result<Wallet, LedgerError> {
    uow.wallet_by_user(user)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("wallet for user {}", user)))
}

/// Wallets are created on first deposit and never removed.
pub(crate) async fn load_or_open_wallet(
    uow: &mut UnitOfWork,
    user: &UserId,
    now: TimeMs,
) -> Result<Wallet, LedgerError> {
    if let Some(wallet) = uow.wallet_by_user(user).await? {
        return Ok(wallet);
    }
    let wallet = Wallet::open(user.clone(), now);
    uow.insert_wallet(&wallet).await?;
    tracing::debug!(user = %user, wallet = %wallet.id, "opened wallet");
    Ok(wallet)
}

async fn post(
    uow: &mut UnitOfWork,
    wallet: &mut Wallet,
    field: BalanceField,
    delta: Money,
    status: TransactionStatus,
    detail: TransactionDetail,
    now: TimeMs,
) -> Result<Transaction, LedgerError> {
    let balance_before = wallet.get(field);
    let balance_after = balance_before + delta;
    if balance_after.is_negative() {
        return Err(LedgerError::InsufficientFunds {
            field,
            available: balance_before,
            requested: -delta,
        });
    }

    wallet.set(field, balance_after);
    wallet.updated_at = now;
    uow.save_wallet(wallet).await?;

    let (reference_id, reference_type) = match detail.reference() {
        Some((id, kind)) => (Some(id), Some(kind.to_string())),
        None => (None, None),
    };
    let row = Transaction {
        id: TransactionId::generate(),
        wallet_id: wallet.id.clone(),
        kind: detail.kind(),
        status,
        field,
        amount: delta,
        balance_before,
        balance_after,
        reference_id,
        reference_type,
        detail,
        created_at: now,
    };
    uow.insert_transaction(&row).await?;
    Ok(row)
}

pub(crate) async fn credit(
    uow: &mut UnitOfWork,
    wallet: &mut Wallet,
    field: BalanceField,
    amount: Money,
    detail: TransactionDetail,
    now: TimeMs,
) -> Result<Transaction, LedgerError> {
    ensure_amount(amount)?;
    post(uow, wallet, field, amount, TransactionStatus::Completed, detail, now).await
}

pub(crate) async fn debit(
    uow: &mut UnitOfWork,
    wallet: &mut Wallet,
    field: BalanceField,
    amount: Money,
    detail: TransactionDetail,
    now: TimeMs,
) -> Result<Transaction, LedgerError> {
    ensure_amount(amount)?;
    ensure_covers(wallet, field, amount)?;
    post(uow, wallet, field, -amount, TransactionStatus::Completed, detail, now).await
}

/// Withdrawable -> locked. The journal row stays PENDING until the
/// withdrawal is resolved.
pub(crate) async fn lock(
    uow: &mut UnitOfWork,
    wallet: &mut Wallet,
    amount: Money,
    withdrawal_id: &WithdrawalId,
    now: TimeMs,
) -> Result<Transaction, LedgerError> {
    ensure_amount(amount)?;
    ensure_covers(wallet, BalanceField::Withdrawable, amount)?;

    let locked_before = wallet.locked_balance;
    wallet.locked_balance = locked_before + amount;
    let detail = TransactionDetail::WithdrawalRequest {
        withdrawal_id: withdrawal_id.clone(),
        locked_before,
        locked_after: wallet.locked_balance,
    };
    post(
        uow,
        wallet,
        BalanceField::Withdrawable,
        -amount,
        TransactionStatus::Pending,
        detail,
        now,
    )
    .await
}

/// Locked -> withdrawable, undoing a [`lock`].
pub(crate) async fn unlock(
    uow: &mut UnitOfWork,
    wallet: &mut Wallet,
    amount: Money,
    withdrawal_id: &WithdrawalId,
    reason: &str,
    now: TimeMs,
) -> Result<Transaction, LedgerError> {
    ensure_amount(amount)?;
    ensure_covers(wallet, BalanceField::Locked, amount)?;

    let locked_before = wallet.locked_balance;
    wallet.locked_balance = locked_before - amount;
    let detail = TransactionDetail::WithdrawalReversal {
        withdrawal_id: withdrawal_id.clone(),
        reason: reason.to_string(),
        locked_before,
        locked_after: wallet.locked_balance,
    };
    post(
        uow,
        wallet,
        BalanceField::Withdrawable,
        amount,
        TransactionStatus::Completed,
        detail,
        now,
    )
    .await
}

/// Locked funds leave the ledger: the payout has been sent.
pub(crate) async fn settle_locked(
    uow: &mut UnitOfWork,
    wallet: &mut Wallet,
    amount: Money,
    withdrawal_id: &WithdrawalId,
    tx_hash: Option<String>,
    address: &str,
    now: TimeMs,
) -> Result<Transaction, LedgerError> {
    ensure_amount(amount)?;
    ensure_covers(wallet, BalanceField::Locked, amount)?;

    wallet.total_withdrawn = wallet.total_withdrawn + amount;
    let detail = TransactionDetail::Withdrawal {
        withdrawal_id: withdrawal_id.clone(),
        tx_hash,
        address: address.to_string(),
    };
    post(
        uow,
        wallet,
        BalanceField::Locked,
        -amount,
        TransactionStatus::Completed,
        detail,
        now,
    )
    .await
}

/// Withdrawable -> store credit. One way: store credit can only be spent.
pub(crate) async fn convert_to_credit(
    uow: &mut UnitOfWork,
    wallet: &mut Wallet,
    amount: Money,
    now: TimeMs,
) -> Result<Transaction, LedgerError> {
    ensure_amount(amount)?;
    ensure_covers(wallet, BalanceField::Withdrawable, amount)?;

    let credit_before = wallet.store_credit;
    wallet.store_credit = credit_before + amount;
    wallet.total_converted_to_credit = wallet.total_converted_to_credit + amount;
    let detail = TransactionDetail::StoreCreditConversion {
        credit_before,
        credit_after: wallet.store_credit,
    };
    post(
        uow,
        wallet,
        BalanceField::Withdrawable,
        -amount,
        TransactionStatus::Completed,
        detail,
        now,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_db, Repository};
    use tempfile::TempDir;

    async fn setup() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    fn m(s: &str) -> Money {
        Money::parse(s).unwrap()
    }

    fn deposit_detail() -> TransactionDetail {
        TransactionDetail::Deposit {
            event_key: "ref:test".to_string(),
            source: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_debit_rejects_overdraft_without_writing() {
        let (repo, _tmp) = setup().await;
        let user = UserId::new("dana");
        let now = TimeMs::new(1);

        let mut uow = repo.begin().await.unwrap();
        let mut wallet = load_or_open_wallet(&mut uow, &user, now).await.unwrap();
        credit(&mut uow, &mut wallet, BalanceField::Spendable, m("5"), deposit_detail(), now)
            .await
            .unwrap();
        let err = debit(&mut uow, &mut wallet, BalanceField::Spendable, m("5.01"), deposit_detail(), now)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientFunds {
                field: BalanceField::Spendable,
                available: m("5"),
                requested: m("5.01"),
            }
        );
        assert_eq!(wallet.balance, m("5"));
    }

    #[tokio::test]
    async fn test_lock_then_unlock_restores_withdrawable() {
        let (repo, _tmp) = setup().await;
        let user = UserId::new("erin");
        let now = TimeMs::new(1);
        let wid = WithdrawalId::new("w1");

        let mut uow = repo.begin().await.unwrap();
        let mut wallet = load_or_open_wallet(&mut uow, &user, now).await.unwrap();
        wallet.withdrawable_balance = m("10");
        uow.save_wallet(&wallet).await.unwrap();

        let row = lock(&mut uow, &mut wallet, m("4"), &wid, now).await.unwrap();
        assert_eq!(row.status, TransactionStatus::Pending);
        assert_eq!(row.field, BalanceField::Withdrawable);
        assert!(row.is_balanced());
        assert_eq!(wallet.withdrawable_balance, m("6"));
        assert_eq!(wallet.locked_balance, m("4"));

        let row = unlock(&mut uow, &mut wallet, m("4"), &wid, "rejected", now)
            .await
            .unwrap();
        assert!(row.is_balanced());
        assert_eq!(wallet.withdrawable_balance, m("10"));
        assert!(wallet.locked_balance.is_zero());
        uow.commit().await.unwrap();

        let stored = repo.wallet_by_user(&user).await.unwrap().unwrap();
        assert_eq!(stored.withdrawable_balance, m("10"));
        assert_eq!(repo.all_transactions().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_conversion_moves_withdrawable_to_credit() {
        let (repo, _tmp) = setup().await;
        let user = UserId::new("finn");
        let now = TimeMs::new(1);

        let mut uow = repo.begin().await.unwrap();
        let mut wallet = load_or_open_wallet(&mut uow, &user, now).await.unwrap();
        wallet.withdrawable_balance = m("3");
        let row = convert_to_credit(&mut uow, &mut wallet, m("2.50"), now)
            .await
            .unwrap();
        assert_eq!(row.amount, -m("2.50"));
        assert_eq!(wallet.store_credit, m("2.50"));
        assert_eq!(wallet.total_converted_to_credit, m("2.50"));
        assert_eq!(wallet.withdrawable_balance, m("0.50"));

        let err = convert_to_credit(&mut uow, &mut wallet, m("1"), now)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
    }
}
