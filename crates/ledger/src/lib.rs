//! `contabank-ledger` — accounts, ledger entries and the ledger engine.
//!
//! The engine is the only writer of balances and entries: it validates an
//! intent, computes derived amounts (bonus, fee), and commits the balance
//! write(s) plus entry append(s) as one atomic unit of work against a
//! [`store::LedgerStore`].

pub mod account;
pub mod engine;
pub mod entry;
pub mod lifecycle;
pub mod policy;
pub mod store;

pub use account::{Account, AccountNumber, AccountSnapshot};
pub use engine::{AccountRef, LedgerEngine, Receipt, TransferReceipt};
pub use entry::{EntryKind, LedgerEntry, StatementLine};
pub use lifecycle::AccountLifecycle;
pub use policy::LedgerPolicy;
pub use store::{AccountUpdate, LedgerStore, StoreError, UnitOfWork};
