//! Store seam: the persistence contract the engine writes through.

use std::sync::Arc;

use thiserror::Error;

use contabank_core::{AccountId, ClientId, ExpectedVersion, LedgerError, Money};

use crate::account::{Account, AccountNumber};
use crate::entry::LedgerEntry;

/// Store operation error.
///
/// Infrastructure failures only; domain validation never reaches the store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    /// Unique-constraint or optimistic-concurrency violation. Feeds the
    /// number-generation retry loop and the caller's intent retry.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage unreachable or failed mid-flight (pool, network, timeout).
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for LedgerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => LedgerError::AccountNotFound,
            StoreError::Conflict(msg) => LedgerError::Conflict(msg),
            StoreError::Unavailable(msg) => LedgerError::Store(msg),
        }
    }
}

/// Conditional write of one account row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountUpdate {
    pub id: AccountId,
    pub balance: Money,
    pub limit: Money,
    pub expected_version: ExpectedVersion,
}

/// One atomic, all-or-nothing group of balance writes and entry appends.
///
/// Partial application (balance updated but entry missing, or vice versa)
/// must never be observable; a version mismatch on any update aborts the
/// whole unit with `Conflict` and nothing persisted.
#[derive(Debug, Clone, Default)]
pub struct UnitOfWork {
    pub updates: Vec<AccountUpdate>,
    pub entries: Vec<LedgerEntry>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(mut self, update: AccountUpdate) -> Self {
        self.updates.push(update);
        self
    }

    pub fn append(mut self, entry: LedgerEntry) -> Self {
        self.entries.push(entry);
        self
    }
}

/// Transactional account + entry store.
///
/// Implementations must:
/// - serialize writers per account (version check inside the commit);
/// - apply `commit` account writes in ascending `AccountId` order, so
///   concurrent opposite-direction transfers cannot deadlock;
/// - keep entries append-only (never mutated, never deleted);
/// - return `entries` ordered by timestamp descending with a stable
///   tiebreak, so re-querying yields the same logical order.
pub trait LedgerStore: Send + Sync {
    /// Load one account row. `NotFound` if absent.
    fn account(&self, id: AccountId) -> Result<Account, StoreError>;

    /// Load one account row by its externally visible number.
    fn account_by_number(&self, number: &AccountNumber) -> Result<Account, StoreError>;

    /// All accounts of one owner.
    fn accounts_of(&self, owner: ClientId) -> Result<Vec<Account>, StoreError>;

    /// Sum of balances across all of an owner's accounts. Recomputed per
    /// call, never cached: the bonus rule reads it inside each deposit.
    fn sum_balances(&self, owner: ClientId) -> Result<Money, StoreError>;

    /// Insert a new account row. `Conflict` if the number already exists.
    fn create_account(&self, account: Account) -> Result<(), StoreError>;

    /// Remove an account row. Eligibility (ownership, zero balance) is
    /// checked by the lifecycle manager before this is called.
    fn delete_account(&self, id: AccountId) -> Result<(), StoreError>;

    /// Entries of one account, newest first.
    fn entries(&self, account_id: AccountId) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Atomically apply the unit of work, or nothing at all.
    fn commit(&self, unit: UnitOfWork) -> Result<(), StoreError>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn account(&self, id: AccountId) -> Result<Account, StoreError> {
        (**self).account(id)
    }

    fn account_by_number(&self, number: &AccountNumber) -> Result<Account, StoreError> {
        (**self).account_by_number(number)
    }

    fn accounts_of(&self, owner: ClientId) -> Result<Vec<Account>, StoreError> {
        (**self).accounts_of(owner)
    }

    fn sum_balances(&self, owner: ClientId) -> Result<Money, StoreError> {
        (**self).sum_balances(owner)
    }

    fn create_account(&self, account: Account) -> Result<(), StoreError> {
        (**self).create_account(account)
    }

    fn delete_account(&self, id: AccountId) -> Result<(), StoreError> {
        (**self).delete_account(id)
    }

    fn entries(&self, account_id: AccountId) -> Result<Vec<LedgerEntry>, StoreError> {
        (**self).entries(account_id)
    }

    fn commit(&self, unit: UnitOfWork) -> Result<(), StoreError> {
        (**self).commit(unit)
    }
}
