//! The ledger engine: validates, atomically applies, and records every
//! balance-changing operation.
//!
//! Each intent is split in two:
//! - a **pure decision** `(account state, params, policy, now) -> (new state,
//!   entries)` that performs all validation and derived-amount computation
//!   without IO or side effects;
//! - an **orchestration** method that loads current state through the store,
//!   runs the decision, and commits balance write(s) plus entry append(s) as
//!   one atomic unit of work.
//!
//! Nothing here caches balances: every intent re-reads state inside its own
//! unit of work, and a store-level version conflict surfaces as a typed
//! `Conflict` the caller may retry.

use chrono::{DateTime, Utc};
use tracing::instrument;

use contabank_core::{
    AccountId, ClientId, ExpectedVersion, LedgerError, LedgerResult, Money, OwnedEntity,
};

use crate::account::{Account, AccountNumber, AccountSnapshot};
use crate::entry::{EntryKind, LedgerEntry, StatementLine};
use crate::policy::LedgerPolicy;
use crate::store::{AccountUpdate, LedgerStore, UnitOfWork};

/// Transfer destination: internal id or externally visible number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountRef {
    Id(AccountId),
    Number(AccountNumber),
}

impl From<AccountId> for AccountRef {
    fn from(id: AccountId) -> Self {
        Self::Id(id)
    }
}

impl From<AccountNumber> for AccountRef {
    fn from(number: AccountNumber) -> Self {
        Self::Number(number)
    }
}

/// Outcome of a single-account intent: the updated snapshot and the
/// entries recorded with it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Receipt {
    pub account: AccountSnapshot,
    pub entries: Vec<LedgerEntry>,
}

/// Outcome of a transfer: both updated snapshots and all recorded entries
/// (debit on source, credit on destination, fee on source if applied).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TransferReceipt {
    pub source: AccountSnapshot,
    pub destination: AccountSnapshot,
    pub entries: Vec<LedgerEntry>,
}

/// The engine. Cheap to clone when `S` is (e.g. an `Arc`-wrapped store);
/// invoked concurrently by many independent callers.
#[derive(Debug, Clone)]
pub struct LedgerEngine<S> {
    store: S,
    policy: LedgerPolicy,
}

impl<S> LedgerEngine<S> {
    pub fn new(store: S, policy: LedgerPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }
}

impl<S: LedgerStore> LedgerEngine<S> {
    /// Deposit `amount` into the caller's account.
    ///
    /// When the sum of the owner's balances across all accounts is strictly
    /// below `amount`, a promotional bonus is credited on top and recorded
    /// as its own `BONUS` entry. The sum is read outside the version-guarded
    /// write set, so the bonus check is best-effort with respect to
    /// concurrent mutations of sibling accounts.
    #[instrument(skip(self, description), fields(%account_id, %amount), err)]
    pub fn deposit(
        &self,
        caller: ClientId,
        account_id: AccountId,
        amount: Money,
        description: Option<String>,
    ) -> LedgerResult<Receipt> {
        let account = self.store.account(account_id)?;
        account.ensure_owned_by(caller)?;
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount);
        }

        // Recomputed inside every deposit; never cached across invocations.
        let owner_total = self.store.sum_balances(caller)?;
        let (updated, entries) =
            decide_deposit(&account, amount, owner_total, &self.policy, Utc::now(), description)?;

        self.store.commit(single_account_unit(&account, &updated, &entries))?;
        Ok(Receipt {
            account: AccountSnapshot::from(&updated),
            entries,
        })
    }

    /// Withdraw `amount` from the caller's account. The credit limit
    /// extends usable funds below zero, down to `-limit`.
    #[instrument(skip(self, description), fields(%account_id, %amount), err)]
    pub fn withdraw(
        &self,
        caller: ClientId,
        account_id: AccountId,
        amount: Money,
        description: Option<String>,
    ) -> LedgerResult<Receipt> {
        let account = self.store.account(account_id)?;
        account.ensure_owned_by(caller)?;

        let (updated, entries) = decide_withdraw(&account, amount, Utc::now(), description)?;

        self.store.commit(single_account_unit(&account, &updated, &entries))?;
        Ok(Receipt {
            account: AccountSnapshot::from(&updated),
            entries,
        })
    }

    /// Raise the caller's credit limit. Limits never decrease.
    #[instrument(skip(self), fields(%account_id, %new_limit), err)]
    pub fn adjust_limit(
        &self,
        caller: ClientId,
        account_id: AccountId,
        new_limit: Money,
    ) -> LedgerResult<Receipt> {
        let account = self.store.account(account_id)?;
        account.ensure_owned_by(caller)?;

        let (updated, entries) = decide_adjust_limit(&account, new_limit, Utc::now())?;

        self.store.commit(single_account_unit(&account, &updated, &entries))?;
        Ok(Receipt {
            account: AccountSnapshot::from(&updated),
            entries,
        })
    }

    /// Transfer `amount` from the caller's account to another account,
    /// addressed by id or number. Cross-owner transfers pay a fee taken out
    /// of the credited amount; the source is always debited in full.
    #[instrument(skip(self, description), fields(%source_id, %amount), err)]
    pub fn transfer(
        &self,
        caller: ClientId,
        source_id: AccountId,
        destination: AccountRef,
        amount: Money,
        description: Option<String>,
    ) -> LedgerResult<TransferReceipt> {
        let source = self.store.account(source_id)?;
        source.ensure_owned_by(caller)?;
        let destination = self.resolve(destination)?;

        let (source_after, destination_after, entries) =
            decide_transfer(&source, &destination, amount, &self.policy, Utc::now(), description)?;

        // The store applies updates in ascending account-id order; push
        // order here carries no meaning.
        let mut unit = UnitOfWork::new()
            .update(update_row(&source, &source_after))
            .update(update_row(&destination, &destination_after));
        unit.entries = entries.clone();
        self.store.commit(unit)?;

        Ok(TransferReceipt {
            source: AccountSnapshot::from(&source_after),
            destination: AccountSnapshot::from(&destination_after),
            entries,
        })
    }

    /// The caller's statement: entries newest first, annotated with their
    /// display labels.
    #[instrument(skip(self), fields(%account_id), err)]
    pub fn statement(
        &self,
        caller: ClientId,
        account_id: AccountId,
    ) -> LedgerResult<Vec<StatementLine>> {
        let account = self.store.account(account_id)?;
        account.ensure_owned_by(caller)?;
        let lines = self
            .store
            .entries(account_id)?
            .into_iter()
            .map(StatementLine::from)
            .collect();
        Ok(lines)
    }

    fn resolve(&self, reference: AccountRef) -> LedgerResult<Account> {
        let account = match reference {
            AccountRef::Id(id) => self.store.account(id)?,
            AccountRef::Number(number) => self.store.account_by_number(&number)?,
        };
        Ok(account)
    }
}

fn update_row(before: &Account, after: &Account) -> AccountUpdate {
    AccountUpdate {
        id: after.id,
        balance: after.balance,
        limit: after.limit,
        expected_version: ExpectedVersion::Exact(before.version),
    }
}

fn single_account_unit(before: &Account, after: &Account, entries: &[LedgerEntry]) -> UnitOfWork {
    let mut unit = UnitOfWork::new().update(update_row(before, after));
    unit.entries = entries.to_vec();
    unit
}

// Pure decisions. No IO, no clock, no randomness: everything they need is a
// parameter, which is what makes the transition table below testable in
// isolation.

fn decide_deposit(
    account: &Account,
    amount: Money,
    owner_total: Money,
    policy: &LedgerPolicy,
    now: DateTime<Utc>,
    description: Option<String>,
) -> LedgerResult<(Account, Vec<LedgerEntry>)> {
    if !amount.is_positive() {
        return Err(LedgerError::InvalidAmount);
    }

    let bonus = if owner_total < amount {
        amount.rate_bps(policy.deposit_bonus_bps)
    } else {
        Money::ZERO
    };

    let credited = amount.checked_add(bonus).ok_or(LedgerError::InvalidAmount)?;
    let mut updated = account.clone();
    updated.balance = account
        .balance
        .checked_add(credited)
        .ok_or(LedgerError::InvalidAmount)?;

    let mut entries = vec![LedgerEntry::record(
        account.id,
        EntryKind::Credit,
        amount,
        now,
        description,
    )?];
    if bonus.is_positive() {
        entries.push(LedgerEntry::record(
            account.id,
            EntryKind::Bonus,
            bonus,
            now,
            None,
        )?);
    }

    Ok((updated, entries))
}

fn decide_withdraw(
    account: &Account,
    amount: Money,
    now: DateTime<Utc>,
    description: Option<String>,
) -> LedgerResult<(Account, Vec<LedgerEntry>)> {
    if !amount.is_positive() {
        return Err(LedgerError::InvalidAmount);
    }
    if !account.can_cover(amount) {
        return Err(LedgerError::InsufficientFunds);
    }

    let mut updated = account.clone();
    updated.balance = account
        .balance
        .checked_sub(amount)
        .ok_or(LedgerError::InvalidAmount)?;

    let entries = vec![LedgerEntry::record(
        account.id,
        EntryKind::Debit,
        amount,
        now,
        description,
    )?];

    Ok((updated, entries))
}

fn decide_adjust_limit(
    account: &Account,
    new_limit: Money,
    now: DateTime<Utc>,
) -> LedgerResult<(Account, Vec<LedgerEntry>)> {
    if new_limit < account.limit {
        return Err(LedgerError::LimitDecreaseRejected {
            current: account.limit,
            requested: new_limit,
        });
    }

    let mut updated = account.clone();
    updated.limit = new_limit;

    // Balance untouched; the entry is valued at the new limit.
    let entries = vec![LedgerEntry::record(
        account.id,
        EntryKind::LimitAdjustment,
        new_limit,
        now,
        None,
    )?];

    Ok((updated, entries))
}

fn decide_transfer(
    source: &Account,
    destination: &Account,
    amount: Money,
    policy: &LedgerPolicy,
    now: DateTime<Utc>,
    description: Option<String>,
) -> LedgerResult<(Account, Account, Vec<LedgerEntry>)> {
    if !amount.is_positive() {
        return Err(LedgerError::InvalidAmount);
    }
    if source.id == destination.id {
        return Err(LedgerError::SameAccountTransfer);
    }
    if !source.can_cover(amount) {
        return Err(LedgerError::InsufficientFunds);
    }

    // The fee reduces what the destination receives, never what the source
    // pays: the source is debited the full amount.
    let fee = if source.owner_id != destination.owner_id {
        amount.rate_bps(policy.transfer_fee_bps)
    } else {
        Money::ZERO
    };
    let net = amount.checked_sub(fee).ok_or(LedgerError::InvalidAmount)?;
    if !net.is_positive() {
        return Err(LedgerError::FeeMakesAmountNonPositive);
    }

    let mut source_after = source.clone();
    source_after.balance = source
        .balance
        .checked_sub(amount)
        .ok_or(LedgerError::InvalidAmount)?;

    let mut destination_after = destination.clone();
    destination_after.balance = destination
        .balance
        .checked_add(net)
        .ok_or(LedgerError::InvalidAmount)?;

    // The source's entries must reconcile with its balance drop: the full
    // debit splits into `TransferDebit(net)` plus `Fee(fee)`.
    let mut entries = vec![
        LedgerEntry::record(source.id, EntryKind::TransferDebit, net, now, description)?,
        LedgerEntry::record(destination.id, EntryKind::TransferCredit, net, now, None)?,
    ];
    if fee.is_positive() {
        entries.push(LedgerEntry::record(source.id, EntryKind::Fee, fee, now, None)?);
    }

    Ok((source_after, destination_after, entries))
}
