//! PostgreSQL store.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::{info, warn};

use pairledger_common::{Account, AccountId, LedgerError, Money, NewAccount, Result};

use crate::store::{AccountStore, StoreTransaction};

/// SQLSTATE raised when `lock_timeout` expires.
const LOCK_NOT_AVAILABLE: &str = "55P03";
/// SQLSTATE raised when PostgreSQL breaks a deadlock.
const DEADLOCK_DETECTED: &str = "40P01";
/// SQLSTATE raised on serialization conflicts.
const SERIALIZATION_FAILURE: &str = "40001";

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS accounts (
        account_id BIGINT PRIMARY KEY,
        balance NUMERIC(19, 5) NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#;

/// Connection settings for [`PostgresStore`].
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Connection string.
    pub database_url: String,
    /// Maximum pooled connections.
    pub max_connections: u32,
    /// How long to wait for a free connection.
    pub acquire_timeout: Duration,
    /// Per-transaction `lock_timeout`.
    pub lock_timeout: Duration,
    /// Connection attempts before giving up at startup.
    pub connect_attempts: u32,
    /// Pause between connection attempts.
    pub connect_backoff: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/pairledger".to_string(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
            lock_timeout: Duration::from_secs(5),
            connect_attempts: 5,
            connect_backoff: Duration::from_secs(1),
        }
    }
}

/// Map a driver error onto the ledger taxonomy.
fn store_failure(context: &str, err: sqlx::Error) -> LedgerError {
    let code = err
        .as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.into_owned());

    match code.as_deref() {
        Some(LOCK_NOT_AVAILABLE) => {
            LedgerError::StoreFailure(format!("{context}: lock timeout"))
        }
        Some(DEADLOCK_DETECTED) => {
            LedgerError::StoreFailure(format!("{context}: deadlock detected"))
        }
        Some(SERIALIZATION_FAILURE) => {
            LedgerError::StoreFailure(format!("{context}: serialization failure"))
        }
        _ => LedgerError::StoreFailure(format!("{context}: {err}")),
    }
}

fn account_from_row(row: &PgRow) -> Result<Account> {
    let id: i64 = row
        .try_get("account_id")
        .map_err(|e| store_failure("could not read account_id", e))?;
    let balance: Decimal = row
        .try_get("balance")
        .map_err(|e| store_failure("could not read balance", e))?;
    let created_at: DateTime<Utc> = row
        .try_get("created_at")
        .map_err(|e| store_failure("could not read created_at", e))?;

    Ok(Account {
        id: AccountId::new(id),
        balance: Money::new(balance),
        created_at,
    })
}

/// [`AccountStore`] backed by a PostgreSQL connection pool.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresStore {
    /// Connect, retrying a few times, and create the schema if needed.
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let attempts = config.connect_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            let connected = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .acquire_timeout(config.acquire_timeout)
                .connect(&config.database_url)
                .await;

            match connected {
                Ok(pool) => {
                    info!(attempt, "PostgreSQL connection pool established");
                    let store = Self::from_pool(pool, config.lock_timeout);
                    store.init_schema().await?;
                    return Ok(store);
                }
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "Could not connect to database");
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(config.connect_backoff).await;
                    }
                }
            }
        }

        Err(match last_error {
            Some(e) => store_failure("could not connect to database after retries", e),
            None => LedgerError::StoreFailure("could not connect to database".to_string()),
        })
    }

    /// Wrap an existing pool. The schema is not touched.
    pub fn from_pool(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the `accounts` table if it does not exist.
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| store_failure("could not initialize schema", e))?;
        Ok(())
    }
}

#[async_trait]
impl AccountStore for PostgresStore {
    async fn insert_if_absent(&self, account: &NewAccount) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (account_id, balance)
            VALUES ($1, $2)
            ON CONFLICT (account_id) DO NOTHING
            "#,
        )
        .bind(account.id.get())
        .bind(account.initial_balance.value())
        .execute(&self.pool)
        .await
        .map_err(|e| store_failure("could not create account", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn fetch(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query(
            "SELECT account_id, balance, created_at FROM accounts WHERE account_id = $1",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_failure("could not query account", e))?;

        row.as_ref().map(account_from_row).transpose()
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_failure("could not begin transaction", e))?;

        // SET does not take bind parameters.
        let statement = format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout.as_millis());
        sqlx::query(&statement)
            .execute(&mut *tx)
            .await
            .map_err(|e| store_failure("could not set lock timeout", e))?;

        Ok(Box::new(PostgresTransaction { tx: Some(tx) }))
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| store_failure("health check failed", e))?;
        Ok(())
    }
}

/// Transaction over a pooled connection.
///
/// sqlx rolls the connection back when a [`Transaction`] is dropped.
pub struct PostgresTransaction {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PostgresTransaction {
    fn active(&mut self) -> Result<&mut Transaction<'static, Postgres>> {
        self.tx
            .as_mut()
            .ok_or_else(|| LedgerError::StoreFailure("transaction already finished".to_string()))
    }
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn lock_accounts(&mut self, ids: &[AccountId]) -> Result<Vec<Account>> {
        let raw: Vec<i64> = ids.iter().map(AccountId::get).collect();
        let tx = self.active()?;

        let rows = sqlx::query(
            r#"
            SELECT account_id, balance, created_at FROM accounts
            WHERE account_id = ANY($1)
            ORDER BY account_id
            FOR UPDATE
            "#,
        )
        .bind(raw)
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| store_failure("could not query accounts for update", e))?;

        rows.iter().map(account_from_row).collect()
    }

    async fn apply_delta(&mut self, id: AccountId, delta: Money) -> Result<()> {
        let tx = self.active()?;

        let result = sqlx::query("UPDATE accounts SET balance = balance + $1 WHERE account_id = $2")
            .bind(delta.value())
            .bind(id.get())
            .execute(&mut **tx)
            .await
            .map_err(|e| store_failure("could not update balance", e))?;

        if result.rows_affected() != 1 {
            return Err(LedgerError::StoreFailure(format!(
                "balance update touched {} rows for account {id}",
                result.rows_affected()
            )));
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| LedgerError::StoreFailure("transaction already finished".to_string()))?;
        tx.commit()
            .await
            .map_err(|e| store_failure("could not commit transaction", e))
    }

    async fn rollback(&mut self) -> Result<()> {
        match self.tx.take() {
            Some(tx) => tx
                .rollback()
                .await
                .map_err(|e| store_failure("could not roll back transaction", e)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PostgresConfig::default();
        assert_eq!(config.max_connections, 10);
        assert!(config.connect_attempts > 0);
    }

    #[test]
    fn test_non_database_error_is_store_failure() {
        let err = store_failure("could not begin transaction", sqlx::Error::PoolTimedOut);
        assert_eq!(err.error_code(), "STORE_FAILURE");
        assert!(err.is_retryable());
        assert!(err.to_string().contains("could not begin transaction"));
    }
}
