//! Database module for quota-monitor.
//!
//! SQLite persistence through sqlx: connection pools, migrations, models and
//! repositories.

pub mod models;
pub mod repositories;
pub mod retry;
pub mod time;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Row, Sqlite, SqliteConnection};
use std::str::FromStr;
use std::time::Duration;

use crate::Result;

/// Read pool.
pub type DbPool = Pool<Sqlite>;

/// Single-connection pool all writes go through.
pub type WritePool = Pool<Sqlite>;

const READ_POOL_SIZE: u32 = 4;
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);
const WAL_AUTOCHECKPOINT_PAGES: i32 = 1000;

#[derive(Debug, Clone, Copy)]
enum PoolRole {
    Read,
    Write,
}

impl PoolRole {
    fn name(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }

    fn acquire_timeout(self) -> Duration {
        match self {
            Self::Read => Duration::from_secs(30),
            Self::Write => Duration::from_secs(60),
        }
    }
}

async fn connection_pragmas(conn: &mut SqliteConnection) -> std::result::Result<(), sqlx::Error> {
    sqlx::query(&format!("PRAGMA wal_autocheckpoint = {WAL_AUTOCHECKPOINT_PAGES}"))
        .execute(&mut *conn)
        .await?;
    sqlx::query("PRAGMA temp_store = MEMORY")
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn build_pool(
    database_url: &str,
    role: PoolRole,
    max_connections: u32,
) -> Result<Pool<Sqlite>> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(role.acquire_timeout())
        .after_connect(|conn, _meta| Box::pin(async move { connection_pragmas(conn).await }))
        .connect_with(options)
        .await?;

    let mode: String = sqlx::query("PRAGMA journal_mode")
        .fetch_one(&pool)
        .await?
        .get(0);
    // In-memory databases stay in "memory" mode.
    if mode != "wal" && mode != "memory" {
        tracing::warn!(pool = role.name(), mode = %mode, "Journal mode is not WAL, switching");
        sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    }

    tracing::info!(pool = role.name(), max_connections, "Database pool ready");
    Ok(pool)
}

/// Open a read pool of the given size.
///
/// `database_url` is a sqlx SQLite URL such as `sqlite:quota-monitor.db?mode=rwc`.
pub async fn init_pool_with_size(database_url: &str, max_connections: u32) -> Result<DbPool> {
    build_pool(database_url, PoolRole::Read, max_connections).await
}

pub async fn init_pool(database_url: &str) -> Result<DbPool> {
    init_pool_with_size(database_url, READ_POOL_SIZE).await
}

/// Open the write pool. One connection, so writers queue in the pool instead
/// of contending for the SQLite write lock.
pub async fn init_write_pool(database_url: &str) -> Result<WritePool> {
    build_pool(database_url, PoolRole::Write, 1).await
}

/// Apply the embedded `migrations/` directory.
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database schema is up to date");
    Ok(())
}

/// Connectivity probe for the health endpoint.
pub async fn ping(pool: &DbPool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_pool() {
        let pool = init_pool_with_size("sqlite::memory:", 1).await.unwrap();

        let result: (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .unwrap();

        // In-memory databases use "memory" journal mode, not WAL
        assert!(result.0 == "memory" || result.0 == "wal");
        ping(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_run_migrations_creates_accounts_table() {
        let pool = init_pool_with_size("sqlite::memory:", 1).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'accounts'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1);
    }
}
