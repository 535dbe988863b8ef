//! Account repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::AccountDbModel;
use crate::database::retry::retry_on_sqlite_busy;
use crate::database::time::now_ms;
use crate::domain::AccountStats;
use crate::{Error, Result};

/// Persistence of monitored accounts.
///
/// Reads only see active accounts. Mutations of a missing or soft-deleted
/// account fail with [`Error::NotFound`]. Session and snapshot are stored as
/// given.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Create a new active account and return the stored row.
    async fn create(&self, name: &str, session: &str) -> Result<AccountDbModel>;

    /// All active accounts, oldest first.
    async fn list_active(&self) -> Result<Vec<AccountDbModel>>;

    /// Get an active account by id.
    async fn get_by_id(&self, id: &str) -> Result<Option<AccountDbModel>>;

    /// Replace the stored session.
    async fn update_session(&self, id: &str, session: &str) -> Result<()>;

    /// Replace the stored snapshot.
    async fn update_snapshot(&self, id: &str, snapshot: &str) -> Result<()>;

    /// Clear the active flag.
    async fn soft_delete(&self, id: &str) -> Result<()>;

    /// Counts over active accounts.
    async fn stats(&self) -> Result<AccountStats>;
}

/// SQLx implementation of AccountRepository.
pub struct SqlxAccountRepository {
    pool: SqlitePool,
    write_pool: SqlitePool,
}

impl SqlxAccountRepository {
    pub fn new(pool: SqlitePool, write_pool: SqlitePool) -> Self {
        Self { pool, write_pool }
    }

    async fn update_column(
        &self,
        op_name: &'static str,
        sql: &'static str,
        id: &str,
        value: &str,
    ) -> Result<()> {
        let result = retry_on_sqlite_busy(op_name, || async {
            let now = now_ms();
            Ok(sqlx::query(sql)
                .bind(value)
                .bind(now)
                .bind(id)
                .execute(&self.write_pool)
                .await?)
        })
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("Account", id));
        }
        Ok(())
    }
}

#[async_trait]
impl AccountRepository for SqlxAccountRepository {
    async fn create(&self, name: &str, session: &str) -> Result<AccountDbModel> {
        let account = AccountDbModel::new(name, session);

        retry_on_sqlite_busy("create_account", || async {
            sqlx::query(
                r#"
                INSERT INTO accounts (
                    id, name, session, snapshot, is_active, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&account.id)
            .bind(&account.name)
            .bind(&account.session)
            .bind(&account.snapshot)
            .bind(account.is_active)
            .bind(account.created_at)
            .bind(account.updated_at)
            .execute(&self.write_pool)
            .await?;
            Ok(())
        })
        .await?;

        Ok(account)
    }

    async fn list_active(&self) -> Result<Vec<AccountDbModel>> {
        let accounts = sqlx::query_as::<_, AccountDbModel>(
            "SELECT * FROM accounts WHERE is_active = 1 ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(accounts)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<AccountDbModel>> {
        let account = sqlx::query_as::<_, AccountDbModel>(
            "SELECT * FROM accounts WHERE id = ? AND is_active = 1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn update_session(&self, id: &str, session: &str) -> Result<()> {
        self.update_column(
            "update_account_session",
            "UPDATE accounts SET session = ?, updated_at = ? WHERE id = ? AND is_active = 1",
            id,
            session,
        )
        .await
    }

    async fn update_snapshot(&self, id: &str, snapshot: &str) -> Result<()> {
        self.update_column(
            "update_account_snapshot",
            "UPDATE accounts SET snapshot = ?, updated_at = ? WHERE id = ? AND is_active = 1",
            id,
            snapshot,
        )
        .await
    }

    async fn soft_delete(&self, id: &str) -> Result<()> {
        let result = retry_on_sqlite_busy("soft_delete_account", || async {
            Ok(sqlx::query(
                "UPDATE accounts SET is_active = 0, updated_at = ? WHERE id = ? AND is_active = 1",
            )
            .bind(now_ms())
            .bind(id)
            .execute(&self.write_pool)
            .await?)
        })
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("Account", id));
        }
        Ok(())
    }

    async fn stats(&self) -> Result<AccountStats> {
        let (accounts, accounts_with_snapshot): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN snapshot IS NOT NULL THEN 1 ELSE 0 END), 0)
            FROM accounts
            WHERE is_active = 1
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(AccountStats {
            accounts: accounts.max(0) as u64,
            accounts_with_snapshot: accounts_with_snapshot.max(0) as u64,
        })
    }
}
