//! Wallet, journal and deposit operations for the repository.

use crate::domain::{
    Deposit, Transaction, TransactionStatus, UserId, Wallet, WalletId, WithdrawalId,
};
use sqlx::sqlite::{SqliteExecutor, SqliteRow};
use sqlx::Row;

use super::{parse_col, time_col, Repository, UnitOfWork};

const WALLET_COLUMNS: &str = r#"
    id, user_id, balance, withdrawable_balance, locked_balance, store_credit,
    total_deposited, total_withdrawn, total_contributed, total_converted_to_credit,
    total_profit_received, created_at, updated_at
"#;

fn wallet_from_row(row: &SqliteRow) -> Result<Wallet, sqlx::Error> {
    Ok(Wallet {
        id: WalletId::new(row.try_get::<String, _>("id")?),
        user: UserId::new(row.try_get::<String, _>("user_id")?),
        balance: parse_col(row, "balance")?,
        withdrawable_balance: parse_col(row, "withdrawable_balance")?,
        locked_balance: parse_col(row, "locked_balance")?,
        store_credit: parse_col(row, "store_credit")?,
        total_deposited: parse_col(row, "total_deposited")?,
        total_withdrawn: parse_col(row, "total_withdrawn")?,
        total_contributed: parse_col(row, "total_contributed")?,
        total_converted_to_credit: parse_col(row, "total_converted_to_credit")?,
        total_profit_received: parse_col(row, "total_profit_received")?,
        created_at: time_col(row, "created_at")?,
        updated_at: time_col(row, "updated_at")?,
    })
}

fn transaction_from_row(row: &SqliteRow) -> Result<Transaction, sqlx::Error> {
    let detail_json: String = row.try_get("detail")?;
    let detail = serde_json::from_str(&detail_json).map_err(|e| sqlx::Error::ColumnDecode {
        index: "detail".to_string(),
        source: Box::new(e),
    })?;
    Ok(Transaction {
        id: crate::domain::TransactionId::new(row.try_get::<String, _>("id")?),
        wallet_id: WalletId::new(row.try_get::<String, _>("wallet_id")?),
        kind: parse_col(row, "type")?,
        status: parse_col(row, "status")?,
        field: parse_col(row, "balance_field")?,
        amount: parse_col(row, "amount")?,
        balance_before: parse_col(row, "balance_before")?,
        balance_after: parse_col(row, "balance_after")?,
        reference_id: row.try_get("reference_id")?,
        reference_type: row.try_get("reference_type")?,
        detail,
        created_at: time_col(row, "created_at")?,
    })
}

async fn fetch_wallet_by_user<'e, E: SqliteExecutor<'e>>(
    ex: E,
    user: &UserId,
) -> Result<Option<Wallet>, sqlx::Error> {
    let sql = format!("SELECT {} FROM wallets WHERE user_id = ?", WALLET_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(user.as_str())
        .fetch_optional(ex)
        .await?;
    row.as_ref().map(wallet_from_row).transpose()
}

async fn fetch_wallet_by_id<'e, E: SqliteExecutor<'e>>(
    ex: E,
    id: &WalletId,
) -> Result<Option<Wallet>, sqlx::Error> {
    let sql = format!("SELECT {} FROM wallets WHERE id = ?", WALLET_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.as_str())
        .fetch_optional(ex)
        .await?;
    row.as_ref().map(wallet_from_row).transpose()
}

impl UnitOfWork {
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn wallet_by_user(&mut self, user: &UserId) -> Result<Option<Wallet>, sqlx::Error> {
        fetch_wallet_by_user(self.conn(), user).await
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn wallet_by_id(&mut self, id: &WalletId) -> Result<Option<Wallet>, sqlx::Error> {
        fetch_wallet_by_id(self.conn(), id).await
    }

    /// # Errors
    /// Returns an error if the insert fails, including when the user already has a wallet.
    pub async fn insert_wallet(&mut self, wallet: &Wallet) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO wallets
            (id, user_id, balance, withdrawable_balance, locked_balance, store_credit,
             total_deposited, total_withdrawn, total_contributed, total_converted_to_credit,
             total_profit_received, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(wallet.id.as_str())
        .bind(wallet.user.as_str())
        .bind(wallet.balance.to_canonical_string())
        .bind(wallet.withdrawable_balance.to_canonical_string())
        .bind(wallet.locked_balance.to_canonical_string())
        .bind(wallet.store_credit.to_canonical_string())
        .bind(wallet.total_deposited.to_canonical_string())
        .bind(wallet.total_withdrawn.to_canonical_string())
        .bind(wallet.total_contributed.to_canonical_string())
        .bind(wallet.total_converted_to_credit.to_canonical_string())
        .bind(wallet.total_profit_received.to_canonical_string())
        .bind(wallet.created_at.as_ms())
        .bind(wallet.updated_at.as_ms())
        .execute(self.conn())
        .await?;
        Ok(())
    }

    /// Write back every balance and counter of an existing wallet.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn save_wallet(&mut self, wallet: &Wallet) -> Result<(), sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE wallets SET
                balance = ?, withdrawable_balance = ?, locked_balance = ?, store_credit = ?,
                total_deposited = ?, total_withdrawn = ?, total_contributed = ?,
                total_converted_to_credit = ?, total_profit_received = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(wallet.balance.to_canonical_string())
        .bind(wallet.withdrawable_balance.to_canonical_string())
        .bind(wallet.locked_balance.to_canonical_string())
        .bind(wallet.store_credit.to_canonical_string())
        .bind(wallet.total_deposited.to_canonical_string())
        .bind(wallet.total_withdrawn.to_canonical_string())
        .bind(wallet.total_contributed.to_canonical_string())
        .bind(wallet.total_converted_to_credit.to_canonical_string())
        .bind(wallet.total_profit_received.to_canonical_string())
        .bind(wallet.updated_at.as_ms())
        .bind(wallet.id.as_str())
        .execute(self.conn())
        .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }
        Ok(())
    }

    /// Append one journal row.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_transaction(&mut self, tx: &Transaction) -> Result<(), sqlx::Error> {
        let detail = serde_json::to_string(&tx.detail)
            .map_err(|e| sqlx::Error::Protocol(format!("unserializable detail: {}", e)))?;
        sqlx::query(
            r#"
            INSERT INTO transactions
            (id, wallet_id, type, status, balance_field, amount, balance_before, balance_after,
             reference_id, reference_type, detail, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(tx.id.as_str())
        .bind(tx.wallet_id.as_str())
        .bind(tx.kind.as_str())
        .bind(tx.status.as_str())
        .bind(tx.field.as_str())
        .bind(tx.amount.to_canonical_string())
        .bind(tx.balance_before.to_canonical_string())
        .bind(tx.balance_after.to_canonical_string())
        .bind(tx.reference_id.as_deref())
        .bind(tx.reference_type.as_deref())
        .bind(detail)
        .bind(tx.created_at.as_ms())
        .execute(self.conn())
        .await?;
        Ok(())
    }

    /// Close the PENDING journal row opened when a withdrawal locked its funds.
    ///
    /// This is the only status change a journal row ever sees.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn close_withdrawal_request_row(
        &mut self,
        withdrawal: &WithdrawalId,
        status: TransactionStatus,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE transactions SET status = ?
            WHERE type = 'WITHDRAWAL_REQUEST' AND reference_id = ? AND status = 'PENDING'
            "#,
        )
        .bind(status.as_str())
        .bind(withdrawal.as_str())
        .execute(self.conn())
        .await?;
        Ok(result.rows_affected())
    }

    /// Record a deposit idempotently.
    ///
    /// Returns `false` when the event key has been seen before.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_deposit(&mut self, deposit: &Deposit) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO deposits (event_key, user_id, time_ms, amount, source, reference)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(event_key) DO NOTHING
            "#,
        )
        .bind(deposit.event_key.as_str())
        .bind(deposit.user.as_str())
        .bind(deposit.time_ms.as_ms())
        .bind(deposit.amount.to_canonical_string())
        .bind(deposit.source.as_str())
        .bind(deposit.reference.as_deref())
        .execute(self.conn())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl Repository {
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn wallet_by_user(&self, user: &UserId) -> Result<Option<Wallet>, sqlx::Error> {
        fetch_wallet_by_user(&self.pool, user).await
    }

    /// Journal rows for a wallet, newest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn transactions_for_wallet(
        &self,
        wallet: &WalletId,
        limit: i64,
    ) -> Result<Vec<Transaction>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, wallet_id, type, status, balance_field, amount, balance_before,
                   balance_after, reference_id, reference_type, detail, created_at
            FROM transactions
            WHERE wallet_id = ?
            ORDER BY seq DESC
            LIMIT ?
            "#,
        )
        .bind(wallet.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(transaction_from_row).collect()
    }

    /// Every wallet, for whole-ledger audits.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn all_wallets(&self) -> Result<Vec<Wallet>, sqlx::Error> {
        let sql = format!("SELECT {} FROM wallets ORDER BY created_at ASC", WALLET_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(wallet_from_row).collect()
    }

    /// Every journal row in insertion order.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn all_transactions(&self) -> Result<Vec<Transaction>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, wallet_id, type, status, balance_field, amount, balance_before,
                   balance_after, reference_id, reference_type, detail, created_at
            FROM transactions
            ORDER BY seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(transaction_from_row).collect()
    }
}
