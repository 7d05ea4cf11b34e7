//! Pool construction and embedded schema.
//!
//! Every connection runs in WAL mode with a bounded `busy_timeout`: a writer
//! that cannot take the lock within it surfaces `SQLITE_BUSY`, which the
//! ledger maps to a retryable concurrency conflict.

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// How long a connection waits on a locked database.
pub const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

const MAX_CONNECTIONS: u32 = 8;

fn connect_options(db_path: &str) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(BUSY_TIMEOUT)
}

/// Open (creating if needed) the ledger database and apply the schema.
pub async fn init_db(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(connect_options(db_path))
        .await?;

    let applied = run_migrations(&pool).await?;
    info!(path = %db_path, statements = applied, "ledger database ready");
    Ok(pool)
}

/// Apply `schema.sql` in one transaction. Every statement is
/// `IF NOT EXISTS`, so reruns are no-ops.
async fn run_migrations(pool: &SqlitePool) -> Result<usize, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut applied = 0;
    for statement in include_str!("schema.sql")
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        sqlx::query(statement).execute(&mut *tx).await?;
        applied += 1;
    }
    tx.commit().await?;
    debug!(statements = applied, "schema applied");
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const LEDGER_TABLES: [&str; 10] = [
        "wallets",
        "transactions",
        "deposits",
        "assets",
        "contributions",
        "gap_loans",
        "asset_purchases",
        "withdrawal_requests",
        "profit_distributions",
        "profit_shares",
    ];

    async fn open(temp_dir: &TempDir) -> (String, SqlitePool) {
        let db_path = temp_dir
            .path()
            .join("nested")
            .join("ledger.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (db_path, pool)
    }

    async fn table_count(pool: &SqlitePool) -> i64 {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type='table'")
                .fetch_one(pool)
                .await
                .expect("query failed");
        count
    }

    #[tokio::test]
    async fn test_init_db_creates_file_and_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let (db_path, _pool) = open(&temp_dir).await;
        assert!(Path::new(&db_path).exists());
    }

    #[tokio::test]
    async fn test_schema_creates_ledger_tables() {
        let temp_dir = TempDir::new().unwrap();
        let (_, pool) = open(&temp_dir).await;

        for table in LEDGER_TABLES {
            let found: Option<(String,)> =
                sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name=?")
                    .bind(table)
                    .fetch_optional(&pool)
                    .await
                    .unwrap();
            assert!(found.is_some(), "missing table {}", table);
        }
    }

    #[tokio::test]
    async fn test_rerunning_schema_changes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let (_, pool) = open(&temp_dir).await;
        let before = table_count(&pool).await;

        let applied = run_migrations(&pool).await.expect("second run failed");
        assert!(applied >= LEDGER_TABLES.len());
        assert_eq!(table_count(&pool).await, before);
    }

    #[tokio::test]
    async fn test_connections_wait_on_locks_before_conflicting() {
        let temp_dir = TempDir::new().unwrap();
        let (_, pool) = open(&temp_dir).await;

        // check several pooled connections, not just the first
        let mut conns = Vec::new();
        for _ in 0..3 {
            conns.push(pool.acquire().await.unwrap());
        }
        for conn in conns.iter_mut() {
            let (timeout,): (i64,) = sqlx::query_as("PRAGMA busy_timeout")
                .fetch_one(&mut **conn)
                .await
                .unwrap();
            assert_eq!(timeout, BUSY_TIMEOUT.as_millis() as i64);

            let (foreign_keys,): (i64,) = sqlx::query_as("PRAGMA foreign_keys")
                .fetch_one(&mut **conn)
                .await
                .unwrap();
            assert_eq!(foreign_keys, 1);

            // NORMAL
            let (synchronous,): (i64,) = sqlx::query_as("PRAGMA synchronous")
                .fetch_one(&mut **conn)
                .await
                .unwrap();
            assert_eq!(synchronous, 1);
        }

        let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(mode, "wal");
    }
}
