//! Postgres-backed ledger store.
//!
//! Persists account rows and the append-only entry log, enforcing
//! per-account optimistic concurrency inside one transaction per unit of
//! work. Expected schema:
//!
//! ```sql
//! CREATE TABLE accounts (
//!     id           UUID PRIMARY KEY,
//!     number       TEXT NOT NULL UNIQUE,
//!     owner_id     UUID NOT NULL,
//!     balance      BIGINT NOT NULL,
//!     credit_limit BIGINT NOT NULL,
//!     version      BIGINT NOT NULL
//! );
//!
//! CREATE TABLE entries (
//!     id          UUID PRIMARY KEY,
//!     account_id  UUID NOT NULL,
//!     kind        TEXT NOT NULL,
//!     amount      BIGINT NOT NULL,
//!     occurred_at TIMESTAMPTZ NOT NULL,
//!     description TEXT
//! );
//!
//! CREATE INDEX entries_account_idx
//!     ON entries (account_id, occurred_at DESC, id DESC);
//! ```
//!
//! ## Error mapping
//!
//! | sqlx error | code | StoreError |
//! |------------|------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | any | `Unavailable` |
//! | pool/network/decode | — | `Unavailable` |
//!
//! Missing rows are detected with `fetch_optional` and surface as
//! `NotFound`; a conditional update touching zero rows is a `Conflict`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use contabank_core::{AccountId, ClientId, EntryId, ExpectedVersion, Money};
use contabank_ledger::{
    Account, AccountNumber, LedgerEntry, LedgerStore, StoreError, UnitOfWork,
};

/// Postgres-backed `LedgerStore`.
///
/// Thread-safe via the sqlx connection pool. Each `commit` runs one
/// database transaction: conditional account updates in ascending id order
/// (row locks are therefore always taken in the same order, so concurrent
/// opposite-direction transfers cannot deadlock), then entry inserts.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    #[instrument(skip(self), fields(%id), err)]
    pub async fn fetch_account(&self, id: AccountId) -> Result<Account, StoreError> {
        let row = sqlx::query(
            "SELECT id, number, owner_id, balance, credit_limit, version \
             FROM accounts WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_account", e))?;

        row.map(account_from_row).transpose()?.ok_or(StoreError::NotFound)
    }

    #[instrument(skip(self), fields(%number), err)]
    pub async fn fetch_account_by_number(
        &self,
        number: &AccountNumber,
    ) -> Result<Account, StoreError> {
        let row = sqlx::query(
            "SELECT id, number, owner_id, balance, credit_limit, version \
             FROM accounts WHERE number = $1",
        )
        .bind(number.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_account_by_number", e))?;

        row.map(account_from_row).transpose()?.ok_or(StoreError::NotFound)
    }

    #[instrument(skip(self), fields(%owner), err)]
    pub async fn fetch_accounts_of(&self, owner: ClientId) -> Result<Vec<Account>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, number, owner_id, balance, credit_limit, version \
             FROM accounts WHERE owner_id = $1 ORDER BY id ASC",
        )
        .bind(owner.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_accounts_of", e))?;

        rows.into_iter().map(account_from_row).collect()
    }

    #[instrument(skip(self), fields(%owner), err)]
    pub async fn fetch_sum_balances(&self, owner: ClientId) -> Result<Money, StoreError> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(balance), 0)::BIGINT AS total \
             FROM accounts WHERE owner_id = $1",
        )
        .bind(owner.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_sum_balances", e))?;

        let total: i64 = row
            .try_get("total")
            .map_err(|e| decode_error("total", e))?;
        Ok(Money::from_cents(total))
    }

    #[instrument(skip(self, account), fields(id = %account.id, number = %account.number), err)]
    pub async fn insert_account(&self, account: Account) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO accounts (id, number, owner_id, balance, credit_limit, version) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(account.id.as_uuid())
        .bind(account.number.as_str())
        .bind(account.owner_id.as_uuid())
        .bind(account.balance.cents())
        .bind(account.limit.cents())
        .bind(account.version as i64)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_account", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(%id), err)]
    pub async fn remove_account(&self, id: AccountId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("remove_account", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(%account_id), err)]
    pub async fn fetch_entries(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, account_id, kind, amount, occurred_at, description \
             FROM entries WHERE account_id = $1 \
             ORDER BY occurred_at DESC, id DESC",
        )
        .bind(account_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_entries", e))?;

        rows.into_iter().map(entry_from_row).collect()
    }

    /// Apply one unit of work in a single transaction.
    ///
    /// Each conditional update is `UPDATE … WHERE id = $1 AND version = $2`;
    /// zero affected rows means another writer got there first and the whole
    /// transaction rolls back with `Conflict`, leaving nothing applied.
    #[instrument(
        skip(self, unit),
        fields(updates = unit.updates.len(), entries = unit.entries.len()),
        err
    )]
    pub async fn commit_unit(&self, unit: UnitOfWork) -> Result<(), StoreError> {
        let mut updates = unit.updates;
        updates.sort_by_key(|u| u.id);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        for update in &updates {
            let affected = conditional_update(
                &mut tx,
                update.id,
                update.balance,
                update.limit,
                update.expected_version,
            )
            .await?;
            if affected == 0 {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(StoreError::Conflict(format!(
                    "account {} version check failed (expected {:?})",
                    update.id, update.expected_version
                )));
            }
        }

        for entry in &unit.entries {
            sqlx::query(
                "INSERT INTO entries (id, account_id, kind, amount, occurred_at, description) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(entry.id.as_uuid())
            .bind(entry.account_id.as_uuid())
            .bind(entry.kind.code())
            .bind(entry.amount.cents())
            .bind(entry.occurred_at)
            .bind(entry.description.as_deref())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_entry", e))?;
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(())
    }
}

async fn conditional_update(
    tx: &mut Transaction<'_, Postgres>,
    id: AccountId,
    balance: Money,
    limit: Money,
    expected: ExpectedVersion,
) -> Result<u64, StoreError> {
    let result = match expected {
        ExpectedVersion::Exact(version) => {
            sqlx::query(
                "UPDATE accounts SET balance = $2, credit_limit = $3, version = version + 1 \
                 WHERE id = $1 AND version = $4",
            )
            .bind(id.as_uuid())
            .bind(balance.cents())
            .bind(limit.cents())
            .bind(version as i64)
            .execute(&mut **tx)
            .await
        }
        ExpectedVersion::Any => {
            sqlx::query(
                "UPDATE accounts SET balance = $2, credit_limit = $3, version = version + 1 \
                 WHERE id = $1",
            )
            .bind(id.as_uuid())
            .bind(balance.cents())
            .bind(limit.cents())
            .execute(&mut **tx)
            .await
        }
    };

    result
        .map(|r| r.rows_affected())
        .map_err(|e| map_sqlx_error("conditional_update", e))
}

fn account_from_row(row: sqlx::postgres::PgRow) -> Result<Account, StoreError> {
    let id: uuid::Uuid = row.try_get("id").map_err(|e| decode_error("id", e))?;
    let number: String = row
        .try_get("number")
        .map_err(|e| decode_error("number", e))?;
    let owner_id: uuid::Uuid = row
        .try_get("owner_id")
        .map_err(|e| decode_error("owner_id", e))?;
    let balance: i64 = row
        .try_get("balance")
        .map_err(|e| decode_error("balance", e))?;
    let credit_limit: i64 = row
        .try_get("credit_limit")
        .map_err(|e| decode_error("credit_limit", e))?;
    let version: i64 = row
        .try_get("version")
        .map_err(|e| decode_error("version", e))?;

    Ok(Account {
        id: AccountId::from_uuid(id),
        number: number
            .parse()
            .map_err(|e| StoreError::Unavailable(format!("corrupt account number: {e}")))?,
        owner_id: ClientId::from_uuid(owner_id),
        balance: Money::from_cents(balance),
        limit: Money::from_cents(credit_limit),
        version: version as u64,
    })
}

fn entry_from_row(row: sqlx::postgres::PgRow) -> Result<LedgerEntry, StoreError> {
    let id: uuid::Uuid = row.try_get("id").map_err(|e| decode_error("id", e))?;
    let account_id: uuid::Uuid = row
        .try_get("account_id")
        .map_err(|e| decode_error("account_id", e))?;
    let kind: String = row.try_get("kind").map_err(|e| decode_error("kind", e))?;
    let amount: i64 = row
        .try_get("amount")
        .map_err(|e| decode_error("amount", e))?;
    let occurred_at: DateTime<Utc> = row
        .try_get("occurred_at")
        .map_err(|e| decode_error("occurred_at", e))?;
    let description: Option<String> = row
        .try_get("description")
        .map_err(|e| decode_error("description", e))?;

    Ok(LedgerEntry {
        id: EntryId::from_uuid(id),
        account_id: AccountId::from_uuid(account_id),
        kind: kind
            .parse()
            .map_err(|e| StoreError::Unavailable(format!("corrupt entry kind: {e}")))?,
        amount: Money::from_cents(amount),
        occurred_at,
        description,
    })
}

fn decode_error(column: &str, err: sqlx::Error) -> StoreError {
    StoreError::Unavailable(format!("failed to decode column '{column}': {err}"))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            if db_err.code().as_deref() == Some("23505") {
                StoreError::Conflict(msg)
            } else {
                StoreError::Unavailable(msg)
            }
        }
        other => StoreError::Unavailable(format!("sqlx error in {operation}: {other}")),
    }
}

// The LedgerStore trait is synchronous while sqlx is async; bridge through
// the ambient tokio runtime. Calls must come from within a runtime context.

fn runtime_handle() -> Result<tokio::runtime::Handle, StoreError> {
    tokio::runtime::Handle::try_current().map_err(|_| {
        StoreError::Unavailable(
            "PostgresStore requires an ambient tokio runtime".to_string(),
        )
    })
}

impl LedgerStore for PostgresStore {
    fn account(&self, id: AccountId) -> Result<Account, StoreError> {
        runtime_handle()?.block_on(self.fetch_account(id))
    }

    fn account_by_number(&self, number: &AccountNumber) -> Result<Account, StoreError> {
        runtime_handle()?.block_on(self.fetch_account_by_number(number))
    }

    fn accounts_of(&self, owner: ClientId) -> Result<Vec<Account>, StoreError> {
        runtime_handle()?.block_on(self.fetch_accounts_of(owner))
    }

    fn sum_balances(&self, owner: ClientId) -> Result<Money, StoreError> {
        runtime_handle()?.block_on(self.fetch_sum_balances(owner))
    }

    fn create_account(&self, account: Account) -> Result<(), StoreError> {
        runtime_handle()?.block_on(self.insert_account(account))
    }

    fn delete_account(&self, id: AccountId) -> Result<(), StoreError> {
        runtime_handle()?.block_on(self.remove_account(id))
    }

    fn entries(&self, account_id: AccountId) -> Result<Vec<LedgerEntry>, StoreError> {
        runtime_handle()?.block_on(self.fetch_entries(account_id))
    }

    fn commit(&self, unit: UnitOfWork) -> Result<(), StoreError> {
        runtime_handle()?.block_on(self.commit_unit(unit))
    }
}
