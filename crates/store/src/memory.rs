use std::collections::HashMap;
use std::sync::RwLock;

use contabank_core::{AccountId, ClientId, Money};
use contabank_ledger::{
    Account, AccountNumber, LedgerEntry, LedgerStore, StoreError, UnitOfWork,
};

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<AccountId, Account>,
    by_number: HashMap<AccountNumber, AccountId>,
    entries: Vec<LedgerEntry>,
}

/// In-memory ledger store.
///
/// Intended for tests/dev, never production state. One lock over the whole
/// state keeps every commit trivially atomic; the version check still runs
/// so concurrency behavior matches the Postgres backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

impl LedgerStore for MemoryStore {
    fn account(&self, id: AccountId) -> Result<Account, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        state.accounts.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    fn account_by_number(&self, number: &AccountNumber) -> Result<Account, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        state
            .by_number
            .get(number)
            .and_then(|id| state.accounts.get(id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn accounts_of(&self, owner: ClientId) -> Result<Vec<Account>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        let mut accounts: Vec<Account> = state
            .accounts
            .values()
            .filter(|a| a.owner_id == owner)
            .cloned()
            .collect();
        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }

    fn sum_balances(&self, owner: ClientId) -> Result<Money, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        let total: i64 = state
            .accounts
            .values()
            .filter(|a| a.owner_id == owner)
            .map(|a| a.balance.cents())
            .sum();
        Ok(Money::from_cents(total))
    }

    fn create_account(&self, account: Account) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        if state.by_number.contains_key(&account.number) {
            return Err(StoreError::Conflict(format!(
                "account number {} already exists",
                account.number
            )));
        }
        if state.accounts.contains_key(&account.id) {
            return Err(StoreError::Conflict(format!(
                "account id {} already exists",
                account.id
            )));
        }
        state.by_number.insert(account.number.clone(), account.id);
        state.accounts.insert(account.id, account);
        Ok(())
    }

    fn delete_account(&self, id: AccountId) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        let account = state.accounts.remove(&id).ok_or(StoreError::NotFound)?;
        state.by_number.remove(&account.number);
        // Entries are append-only: they survive the account row.
        Ok(())
    }

    fn entries(&self, account_id: AccountId) -> Result<Vec<LedgerEntry>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        let mut entries: Vec<LedgerEntry> = state
            .entries
            .iter()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect();
        // Newest first; id (time-ordered) breaks timestamp ties so the
        // order is stable across re-queries.
        entries.sort_by(|a, b| (b.occurred_at, b.id).cmp(&(a.occurred_at, a.id)));
        Ok(entries)
    }

    fn commit(&self, unit: UnitOfWork) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;

        let mut updates = unit.updates;
        updates.sort_by_key(|u| u.id);

        // Validate the whole batch before touching anything: a failed check
        // must leave no partial application behind.
        for pair in updates.windows(2) {
            if pair[0].id == pair[1].id {
                return Err(StoreError::Conflict(format!(
                    "unit of work touches account {} twice",
                    pair[0].id
                )));
            }
        }
        for update in &updates {
            let current = state.accounts.get(&update.id).ok_or(StoreError::NotFound)?;
            if !update.expected_version.matches(current.version) {
                return Err(StoreError::Conflict(format!(
                    "account {} expected {:?}, found {}",
                    update.id, update.expected_version, current.version
                )));
            }
        }

        for update in &updates {
            let account = state
                .accounts
                .get_mut(&update.id)
                .expect("validated above");
            account.balance = update.balance;
            account.limit = update.limit;
            account.version += 1;
        }
        state.entries.extend(unit.entries);
        Ok(())
    }
}
