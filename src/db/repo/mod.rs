//! Repository layer for database operations.
//!
//! `Repository` serves read-only queries straight from the pool. Every
//! mutation goes through a `UnitOfWork`, which wraps one SQLite transaction;
//! nothing it writes is visible until `commit`, and dropping it rolls back.
//! Methods are organized across submodules by domain:
//! - `wallets.rs` - Wallets, journal rows and deposit idempotency records
//! - `assets.rs` - Assets, contributions, gap loans and access grants
//! - `withdrawals.rs` - Withdrawal requests
//! - `distributions.rs` - Profit distributions and per-contributor shares

mod assets;
mod distributions;
mod wallets;
mod withdrawals;

use crate::domain::TimeMs;
use sqlx::sqlite::{Sqlite, SqliteConnection, SqlitePool, SqliteRow};
use sqlx::{Row, Transaction};
use std::str::FromStr;

type BoxDynError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Open a unit of work.
    ///
    /// SQLite runs it with serializable isolation: if another unit commits a
    /// write after this one has read, this one's first write (or its commit)
    /// fails with a busy error instead of acting on stale data.
    ///
    /// # Errors
    /// Returns an error if no connection is available.
    pub async fn begin(&self) -> Result<UnitOfWork, sqlx::Error> {
        Ok(UnitOfWork {
            tx: self.pool.begin().await?,
        })
    }
}

/// One all-or-nothing scope of ledger reads and writes.
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

impl UnitOfWork {
    /// # Errors
    /// Returns an error if the commit fails, including on a write conflict.
    pub async fn commit(self) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }

    fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }
}

/// Decode a TEXT column through the type's `FromStr`.
fn parse_col<T>(row: &SqliteRow, col: &str) -> Result<T, sqlx::Error>
where
    T: FromStr,
    T::Err: Into<BoxDynError>,
{
    let raw: String = row.try_get(col)?;
    T::from_str(&raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: col.to_string(),
        source: e.into(),
    })
}

fn time_col(row: &SqliteRow, col: &str) -> Result<TimeMs, sqlx::Error> {
    Ok(TimeMs::new(row.try_get::<i64, _>(col)?))
}

fn opt_time_col(row: &SqliteRow, col: &str) -> Result<Option<TimeMs>, sqlx::Error> {
    Ok(row.try_get::<Option<i64>, _>(col)?.map(TimeMs::new))
}

/// True when the error is a UNIQUE (or PRIMARY KEY) constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::domain::{
        Asset, AssetId, AssetStatus, BalanceField, Contribution, ContributionId,
        ContributionStatus, Money, Ratio, Transaction as JournalRow, TransactionDetail,
        TransactionId, TransactionStatus, UserId, Wallet,
    };
    use rust_decimal::Decimal as RustDecimal;
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

    fn asset(id: &str) -> Asset {
        Asset {
            id: AssetId::new(id),
            title: "Course".to_string(),
            target_price: Money::parse("100").unwrap(),
            platform_fee: RustDecimal::new(15, 2),
            access_price: Money::from_cents(100),
            current_collected: Money::ZERO,
            status: AssetStatus::Collecting,
            total_purchases: 0,
            total_revenue: Money::ZERO,
            total_profit_distributed: Money::ZERO,
            platform_margin: Money::ZERO,
            delivery_info: Some(serde_json::json!({"url": "https://example.com/dl"})),
            created_at: TimeMs::new(1),
            purchased_at: None,
            available_at: None,
        }
    }

    #[tokio::test]
    async fn test_wallet_persists_and_reloads() {
        let (repo, _tmp) = setup().await;
        let mut wallet = Wallet::open(UserId::new("alice"), TimeMs::new(10));
        wallet.balance = Money::parse("12.34").unwrap();

        let mut uow = repo.begin().await.unwrap();
        uow.insert_wallet(&wallet).await.unwrap();
        uow.commit().await.unwrap();

        let loaded = repo
            .wallet_by_user(&UserId::new("alice"))
            .await
            .unwrap()
            .expect("wallet");
        assert_eq!(loaded, wallet);
    }

    #[tokio::test]
    async fn test_dropped_unit_of_work_rolls_back() {
        let (repo, _tmp) = setup().await;
        {
            let mut uow = repo.begin().await.unwrap();
            uow.insert_asset(&asset("a1")).await.unwrap();
        }
        assert!(repo.asset(&AssetId::new("a1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_asset_round_trips_delivery_info() {
        let (repo, _tmp) = setup().await;
        let a = asset("a1");
        let mut uow = repo.begin().await.unwrap();
        uow.insert_asset(&a).await.unwrap();
        uow.commit().await.unwrap();
        assert_eq!(repo.asset(&a.id).await.unwrap(), Some(a));
    }

    #[tokio::test]
    async fn test_duplicate_contribution_is_unique_violation() {
        let (repo, _tmp) = setup().await;
        let a = asset("a1");
        let contribution = |id: &str| Contribution {
            id: ContributionId::new(id),
            user: UserId::new("bob"),
            asset_id: a.id.clone(),
            amount: Money::parse("10").unwrap(),
            excess_amount: Money::ZERO,
            profit_share_ratio: Ratio::ZERO,
            total_profit_received: Money::ZERO,
            status: ContributionStatus::Active,
            created_at: TimeMs::new(2),
        };

        let mut uow = repo.begin().await.unwrap();
        uow.insert_asset(&a).await.unwrap();
        uow.insert_contribution(&contribution("c1")).await.unwrap();
        let err = uow
            .insert_contribution(&contribution("c2"))
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_journal_rows_listed_newest_first() {
        let (repo, _tmp) = setup().await;
        let wallet = Wallet::open(UserId::new("carol"), TimeMs::new(1));
        let mut uow = repo.begin().await.unwrap();
        uow.insert_wallet(&wallet).await.unwrap();
        for (i, cents) in [100i64, 250].iter().enumerate() {
            let amount = Money::from_cents(*cents);
            let row = JournalRow {
                id: TransactionId::generate(),
                wallet_id: wallet.id.clone(),
                kind: crate::domain::TransactionType::Deposit,
                status: TransactionStatus::Completed,
                field: BalanceField::Spendable,
                amount,
                balance_before: Money::ZERO,
                balance_after: amount,
                reference_id: Some(format!("ref:{}", i)),
                reference_type: Some("DEPOSIT".to_string()),
                detail: TransactionDetail::Deposit {
                    event_key: format!("ref:{}", i),
                    source: "card".to_string(),
                },
                created_at: TimeMs::new(5),
            };
            uow.insert_transaction(&row).await.unwrap();
        }
        uow.commit().await.unwrap();

        let rows = repo.transactions_for_wallet(&wallet.id, 10).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].amount, Money::from_cents(250));
        assert!(rows.iter().all(|r| r.is_balanced()));
    }
}
