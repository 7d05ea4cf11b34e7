//! Withdrawal request operations for the repository.

use crate::domain::{Destination, UserId, WalletId, WithdrawalId, WithdrawalRequest};
use sqlx::sqlite::{SqliteExecutor, SqliteRow};
use sqlx::Row;

use super::{opt_time_col, parse_col, time_col, Repository, UnitOfWork};

const WITHDRAWAL_COLUMNS: &str = r#"
    id, wallet_id, user_id, amount, currency, address, status, admin_notes,
    rejection_reason, tx_hash, created_at, processed_at
"#;

fn withdrawal_from_row(row: &SqliteRow) -> Result<WithdrawalRequest, sqlx::Error> {
    Ok(WithdrawalRequest {
        id: WithdrawalId::new(row.try_get::<String, _>("id")?),
        wallet_id: WalletId::new(row.try_get::<String, _>("wallet_id")?),
        user: UserId::new(row.try_get::<String, _>("user_id")?),
        amount: parse_col(row, "amount")?,
        destination: Destination {
            currency: row.try_get("currency")?,
            address: row.try_get("address")?,
        },
        status: parse_col(row, "status")?,
        admin_notes: row.try_get("admin_notes")?,
        rejection_reason: row.try_get("rejection_reason")?,
        tx_hash: row.try_get("tx_hash")?,
        created_at: time_col(row, "created_at")?,
        processed_at: opt_time_col(row, "processed_at")?,
    })
}

async fn fetch_withdrawal<'e, E: SqliteExecutor<'e>>(
    ex: E,
    id: &WithdrawalId,
) -> Result<Option<WithdrawalRequest>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM withdrawal_requests WHERE id = ?",
        WITHDRAWAL_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(id.as_str())
        .fetch_optional(ex)
        .await?;
    row.as_ref().map(withdrawal_from_row).transpose()
}

impl UnitOfWork {
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn withdrawal(
        &mut self,
        id: &WithdrawalId,
    ) -> Result<Option<WithdrawalRequest>, sqlx::Error> {
        fetch_withdrawal(self.conn(), id).await
    }

    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_withdrawal(&mut self, w: &WithdrawalRequest) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO withdrawal_requests
            (id, wallet_id, user_id, amount, currency, address, status, admin_notes,
             rejection_reason, tx_hash, created_at, processed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(w.id.as_str())
        .bind(w.wallet_id.as_str())
        .bind(w.user.as_str())
        .bind(w.amount.to_canonical_string())
        .bind(w.destination.currency.as_str())
        .bind(w.destination.address.as_str())
        .bind(w.status.as_str())
        .bind(w.admin_notes.as_deref())
        .bind(w.rejection_reason.as_deref())
        .bind(w.tx_hash.as_deref())
        .bind(w.created_at.as_ms())
        .bind(w.processed_at.map(|t| t.as_ms()))
        .execute(self.conn())
        .await?;
        Ok(())
    }

    /// # Errors
    /// Returns an error if the update fails.
    pub async fn save_withdrawal(&mut self, w: &WithdrawalRequest) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE withdrawal_requests SET
                status = ?, admin_notes = ?, rejection_reason = ?, tx_hash = ?, processed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(w.status.as_str())
        .bind(w.admin_notes.as_deref())
        .bind(w.rejection_reason.as_deref())
        .bind(w.tx_hash.as_deref())
        .bind(w.processed_at.map(|t| t.as_ms()))
        .bind(w.id.as_str())
        .execute(self.conn())
        .await?;
        Ok(())
    }
}

impl Repository {
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn withdrawal(
        &self,
        id: &WithdrawalId,
    ) -> Result<Option<WithdrawalRequest>, sqlx::Error> {
        fetch_withdrawal(&self.pool, id).await
    }

    /// A user's withdrawal requests, newest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn withdrawals_for_user(
        &self,
        user: &UserId,
    ) -> Result<Vec<WithdrawalRequest>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM withdrawal_requests WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
            WITHDRAWAL_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(withdrawal_from_row).collect()
    }
}
