//! Account lifecycle: opening, listing and closing accounts.
//!
//! A thin layer over the store and the number generator; balances and
//! entries are never touched here, only through the engine.

use rand::Rng;
use tracing::instrument;

use contabank_core::{AccountId, ClientId, LedgerError, LedgerResult, OwnedEntity};

use crate::account::{Account, AccountNumber, AccountSnapshot};
use crate::policy::LedgerPolicy;
use crate::store::{LedgerStore, StoreError};

#[derive(Debug, Clone)]
pub struct AccountLifecycle<S> {
    store: S,
    policy: LedgerPolicy,
}

impl<S> AccountLifecycle<S> {
    pub fn new(store: S, policy: LedgerPolicy) -> Self {
        Self { store, policy }
    }
}

impl<S: LedgerStore> AccountLifecycle<S> {
    /// Open a new account for `owner`, starting at zero balance and zero
    /// limit. The candidate number is regenerated on collision, capped at
    /// `policy.max_number_attempts` attempts.
    #[instrument(skip(self, seed_name), fields(%owner), err)]
    pub fn open(&self, owner: ClientId, seed_name: &str) -> LedgerResult<AccountSnapshot> {
        self.open_with_rng(owner, seed_name, &mut rand::thread_rng())
    }

    /// Same as [`open`](Self::open) with an explicit random source.
    pub fn open_with_rng(
        &self,
        owner: ClientId,
        seed_name: &str,
        rng: &mut impl Rng,
    ) -> LedgerResult<AccountSnapshot> {
        for _ in 0..self.policy.max_number_attempts {
            let number = AccountNumber::generate(seed_name, rng);
            let account = Account::open(AccountId::new(), number, owner);
            match self.store.create_account(account.clone()) {
                Ok(()) => return Ok(AccountSnapshot::from(&account)),
                // Number collision: try the next candidate.
                Err(StoreError::Conflict(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(LedgerError::ResourceExhausted {
            attempts: self.policy.max_number_attempts,
        })
    }

    /// Close the caller's account. Unless the policy allows otherwise, the
    /// balance must be exactly zero; a remaining balance (positive or
    /// negative) blocks the closing.
    #[instrument(skip(self), fields(%account_id), err)]
    pub fn close(&self, caller: ClientId, account_id: AccountId) -> LedgerResult<()> {
        let account = self.store.account(account_id)?;
        account.ensure_owned_by(caller)?;

        if !self.policy.allow_closing_with_balance && !account.balance.is_zero() {
            return Err(LedgerError::BalanceNotZero);
        }

        self.store.delete_account(account_id)?;
        Ok(())
    }

    /// Snapshots of all the caller's accounts.
    pub fn accounts_of(&self, caller: ClientId) -> LedgerResult<Vec<AccountSnapshot>> {
        let snapshots = self
            .store
            .accounts_of(caller)?
            .iter()
            .map(AccountSnapshot::from)
            .collect();
        Ok(snapshots)
    }
}
