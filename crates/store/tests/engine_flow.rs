//! End-to-end intent flows against the in-memory store: engine and
//! lifecycle wired together the way a service process would wire them.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use contabank_core::{AccountId, ClientId, LedgerError, Money};
use contabank_ledger::{
    Account, AccountLifecycle, AccountRef, EntryKind, LedgerEngine, LedgerPolicy, LedgerStore,
};
use contabank_store::MemoryStore;
use rand::RngCore;
use rand::SeedableRng;
use rand::rngs::StdRng;

fn engine(store: &Arc<MemoryStore>) -> LedgerEngine<Arc<MemoryStore>> {
    LedgerEngine::new(Arc::clone(store), LedgerPolicy::default())
}

fn lifecycle(store: &Arc<MemoryStore>) -> AccountLifecycle<Arc<MemoryStore>> {
    AccountLifecycle::new(Arc::clone(store), LedgerPolicy::default())
}

fn seed_account(
    store: &Arc<MemoryStore>,
    owner: ClientId,
    number: &str,
    balance: Money,
    limit: Money,
) -> Account {
    let mut account = Account::open(AccountId::new(), number.parse().unwrap(), owner);
    account.balance = balance;
    account.limit = limit;
    store.create_account(account.clone()).unwrap();
    account
}

#[test]
fn deposit_bonus_applies_end_to_end() {
    let store = Arc::new(MemoryStore::new());
    let owner = ClientId::new();
    let account = seed_account(&store, owner, "JO111111", Money::from_major(50), Money::ZERO);

    let receipt = engine(&store)
        .deposit(owner, account.id, Money::from_major(100), None)
        .unwrap();

    assert_eq!(receipt.account.balance, Money::from_major(160));
    assert_eq!(receipt.entries.len(), 2);
    assert_eq!(receipt.entries[0].kind, EntryKind::Credit);
    assert_eq!(receipt.entries[0].amount, Money::from_major(100));
    assert_eq!(receipt.entries[1].kind, EntryKind::Bonus);
    assert_eq!(receipt.entries[1].amount, Money::from_major(10));

    let reread = store.account(account.id).unwrap();
    assert_eq!(reread.balance, Money::from_major(160));
    assert_eq!(reread.version, 1);
}

#[test]
fn bonus_considers_every_account_of_the_owner() {
    let store = Arc::new(MemoryStore::new());
    let owner = ClientId::new();
    let target = seed_account(&store, owner, "JO111111", Money::from_major(30), Money::ZERO);
    seed_account(&store, owner, "JO222222", Money::from_major(70), Money::ZERO);

    // 30 + 70 across the owner's accounts is not below the 100 deposited.
    let receipt = engine(&store)
        .deposit(owner, target.id, Money::from_major(100), None)
        .unwrap();

    assert_eq!(receipt.account.balance, Money::from_major(130));
    assert_eq!(receipt.entries.len(), 1);
    assert_eq!(receipt.entries[0].kind, EntryKind::Credit);
}

#[test]
fn failed_intents_leave_no_trace() {
    let store = Arc::new(MemoryStore::new());
    let owner = ClientId::new();
    let account = seed_account(&store, owner, "JO111111", Money::from_major(10), Money::ZERO);
    let engine = engine(&store);

    let err = engine
        .withdraw(owner, account.id, Money::from_major(11), None)
        .unwrap_err();
    assert_eq!(err, LedgerError::InsufficientFunds);

    let reread = store.account(account.id).unwrap();
    assert_eq!(reread.balance, Money::from_major(10));
    assert_eq!(reread.version, 0);
    assert!(store.entries(account.id).unwrap().is_empty());
}

#[test]
fn intents_by_non_owners_are_rejected() {
    let store = Arc::new(MemoryStore::new());
    let owner = ClientId::new();
    let account = seed_account(&store, owner, "JO111111", Money::from_major(10), Money::ZERO);
    let engine = engine(&store);
    let stranger = ClientId::new();

    let deposit = engine.deposit(stranger, account.id, Money::from_major(1), None);
    assert_eq!(deposit.unwrap_err(), LedgerError::Unauthorized);
    let statement = engine.statement(stranger, account.id);
    assert_eq!(statement.unwrap_err(), LedgerError::Unauthorized);
}

#[test]
fn raised_limit_extends_withdrawals_to_the_boundary() {
    let store = Arc::new(MemoryStore::new());
    let owner = ClientId::new();
    let account = seed_account(&store, owner, "JO111111", Money::ZERO, Money::ZERO);
    let engine = engine(&store);

    let receipt = engine
        .adjust_limit(owner, account.id, Money::from_major(50))
        .unwrap();
    assert_eq!(receipt.account.limit, Money::from_major(50));
    assert_eq!(receipt.entries[0].kind, EntryKind::LimitAdjustment);
    assert_eq!(receipt.entries[0].amount, Money::from_major(50));

    let over = engine.withdraw(owner, account.id, Money::from_cents(50_01), None);
    assert_eq!(over.unwrap_err(), LedgerError::InsufficientFunds);

    let receipt = engine
        .withdraw(owner, account.id, Money::from_major(50), None)
        .unwrap();
    assert_eq!(receipt.account.balance, Money::from_major(-50));
}

#[test]
fn limits_never_decrease_end_to_end() {
    let store = Arc::new(MemoryStore::new());
    let owner = ClientId::new();
    let account = seed_account(&store, owner, "JO111111", Money::ZERO, Money::ZERO);
    let engine = engine(&store);

    engine
        .adjust_limit(owner, account.id, Money::from_major(100))
        .unwrap();
    let err = engine
        .adjust_limit(owner, account.id, Money::from_major(80))
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::LimitDecreaseRejected {
            current: Money::from_major(100),
            requested: Money::from_major(80),
        }
    );
    assert_eq!(store.account(account.id).unwrap().limit, Money::from_major(100));
}

#[test]
fn transfer_by_number_debits_fee_from_the_credited_amount() {
    let store = Arc::new(MemoryStore::new());
    let alice = ClientId::new();
    let bruno = ClientId::new();
    let source = seed_account(&store, alice, "AL111111", Money::from_major(500), Money::ZERO);
    let destination = seed_account(&store, bruno, "BR222222", Money::ZERO, Money::ZERO);
    let engine = engine(&store);

    let receipt = engine
        .transfer(
            alice,
            source.id,
            AccountRef::Number(destination.number.clone()),
            Money::from_major(100),
            Some("aluguel".to_string()),
        )
        .unwrap();

    assert_eq!(receipt.source.balance, Money::from_major(400));
    assert_eq!(receipt.destination.balance, Money::from_major(90));
    assert_eq!(receipt.entries.len(), 3);

    // Both rows were committed in the same unit.
    assert_eq!(store.account(source.id).unwrap().version, 1);
    assert_eq!(store.account(destination.id).unwrap().version, 1);

    let source_entries = store.entries(source.id).unwrap();
    assert_eq!(source_entries.len(), 2);
    assert!(source_entries.iter().any(|e| e.kind == EntryKind::TransferDebit
        && e.amount == Money::from_major(90)));
    assert!(source_entries.iter().any(|e| e.kind == EntryKind::Fee
        && e.amount == Money::from_major(10)));
    // Debit plus fee reconcile with the 100.00 that left the source.
    let signed_sum: i64 = source_entries.iter().map(|e| e.signed_cents()).sum();
    assert_eq!(signed_sum, -10_000);
    let destination_entries = store.entries(destination.id).unwrap();
    assert_eq!(destination_entries.len(), 1);
    assert_eq!(destination_entries[0].kind, EntryKind::TransferCredit);
    assert_eq!(destination_entries[0].amount, Money::from_major(90));
}

#[test]
fn same_owner_transfer_moves_the_full_amount() {
    let store = Arc::new(MemoryStore::new());
    let owner = ClientId::new();
    let source = seed_account(&store, owner, "JO111111", Money::from_major(100), Money::ZERO);
    let savings = seed_account(&store, owner, "JO222222", Money::ZERO, Money::ZERO);

    let receipt = engine(&store)
        .transfer(
            owner,
            source.id,
            AccountRef::Id(savings.id),
            Money::from_major(100),
            None,
        )
        .unwrap();

    assert_eq!(receipt.source.balance, Money::ZERO);
    assert_eq!(receipt.destination.balance, Money::from_major(100));
    assert!(receipt.entries.iter().all(|e| e.kind != EntryKind::Fee));
}

#[test]
fn transfer_destination_must_exist_and_differ() {
    let store = Arc::new(MemoryStore::new());
    let owner = ClientId::new();
    let source = seed_account(&store, owner, "JO111111", Money::from_major(100), Money::ZERO);
    let engine = engine(&store);

    let missing = engine.transfer(
        owner,
        source.id,
        AccountRef::Number("ZZ999999".parse().unwrap()),
        Money::from_major(10),
        None,
    );
    assert_eq!(missing.unwrap_err(), LedgerError::AccountNotFound);

    let own = engine.transfer(
        owner,
        source.id,
        AccountRef::Id(source.id),
        Money::from_major(10),
        None,
    );
    assert_eq!(own.unwrap_err(), LedgerError::SameAccountTransfer);
}

#[test]
fn statement_lists_entries_newest_first_with_labels() {
    let store = Arc::new(MemoryStore::new());
    let owner = ClientId::new();
    let account = seed_account(&store, owner, "JO111111", Money::ZERO, Money::ZERO);
    let engine = engine(&store);

    engine
        .deposit(owner, account.id, Money::from_major(100), None)
        .unwrap();
    thread::sleep(Duration::from_millis(3));
    engine
        .withdraw(owner, account.id, Money::from_major(30), None)
        .unwrap();
    thread::sleep(Duration::from_millis(3));
    engine
        .deposit(owner, account.id, Money::from_major(5), None)
        .unwrap();

    let statement = engine.statement(owner, account.id).unwrap();
    let kinds: Vec<EntryKind> = statement.iter().map(|l| l.entry.kind).collect();
    // Newest first: the second deposit (no bonus, owner total 80 >= 5),
    // the withdrawal, then the first deposit's pair. Entries within one
    // commit share a timestamp, so their relative order is unspecified.
    assert_eq!(statement.len(), 4);
    assert_eq!(kinds[0], EntryKind::Credit);
    assert_eq!(statement[0].entry.amount, Money::from_major(5));
    assert_eq!(kinds[1], EntryKind::Debit);
    assert!(kinds[2..].contains(&EntryKind::Bonus));
    assert!(kinds[2..].contains(&EntryKind::Credit));
    assert_eq!(statement[0].label, "Depósito em conta");
    assert_eq!(statement[1].label, "Saque em conta");
}

#[test]
fn concurrent_withdrawals_admit_exactly_one_winner() {
    let store = Arc::new(MemoryStore::new());
    let owner = ClientId::new();
    let account = seed_account(&store, owner, "JO111111", Money::from_major(100), Money::ZERO);

    // Two callers race to withdraw 60 from a 100 balance. The loser's
    // version check fails, and on retry it sees the drained balance.
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let engine = LedgerEngine::new(store, LedgerPolicy::default());
                loop {
                    match engine.withdraw(owner, account.id, Money::from_major(60), None) {
                        Err(LedgerError::Conflict(_)) => continue,
                        outcome => return outcome,
                    }
                }
            })
        })
        .collect();

    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let wins = outcomes.iter().filter(|o| o.is_ok()).count();
    assert_eq!(wins, 1);
    assert!(outcomes
        .iter()
        .any(|o| o.as_ref().err() == Some(&LedgerError::InsufficientFunds)));

    let reread = store.account(account.id).unwrap();
    assert_eq!(reread.balance, Money::from_major(40));
    assert_eq!(store.entries(account.id).unwrap().len(), 1);
}

#[test]
fn opened_accounts_start_empty_and_are_listed() {
    let store = Arc::new(MemoryStore::new());
    let owner = ClientId::new();
    let lifecycle = lifecycle(&store);

    let mut rng = StdRng::seed_from_u64(11);
    let first = lifecycle.open_with_rng(owner, "Joana Prado", &mut rng).unwrap();
    let second = lifecycle.open_with_rng(owner, "Joana Prado", &mut rng).unwrap();

    assert!(first.number.as_str().starts_with("JO"));
    assert_eq!(first.balance, Money::ZERO);
    assert_eq!(first.limit, Money::ZERO);
    assert_ne!(first.number, second.number);

    let mut listed = lifecycle.accounts_of(owner).unwrap();
    listed.sort_by(|a, b| a.number.as_str().cmp(b.number.as_str()));
    assert_eq!(listed.len(), 2);

    // Freshly opened accounts plug straight into the engine.
    let receipt = engine(&store)
        .deposit(owner, first.id, Money::from_major(20), None)
        .unwrap();
    assert_eq!(receipt.account.balance, Money::from_major(22)); // bonus applied
}

#[test]
fn closing_requires_a_zero_balance() {
    let store = Arc::new(MemoryStore::new());
    let owner = ClientId::new();
    let lifecycle = lifecycle(&store);
    let engine = engine(&store);

    let account = lifecycle.open(owner, "Maria").unwrap();
    engine
        .deposit(owner, account.id, Money::from_major(10), None)
        .unwrap();

    let err = lifecycle.close(owner, account.id).unwrap_err();
    assert_eq!(err, LedgerError::BalanceNotZero);

    // Draining the account unblocks the closing; entries survive it.
    let balance = store.account(account.id).unwrap().balance;
    engine.withdraw(owner, account.id, balance, None).unwrap();
    lifecycle.close(owner, account.id).unwrap();
    assert_eq!(
        engine.statement(owner, account.id).unwrap_err(),
        LedgerError::AccountNotFound
    );
    assert!(!store.entries(account.id).unwrap().is_empty());
}

#[test]
fn closing_with_balance_can_be_allowed_by_policy() {
    let store = Arc::new(MemoryStore::new());
    let owner = ClientId::new();
    let policy = LedgerPolicy {
        allow_closing_with_balance: true,
        ..LedgerPolicy::default()
    };
    let lifecycle = AccountLifecycle::new(Arc::clone(&store), policy);

    let account = lifecycle.open(owner, "Maria").unwrap();
    engine(&store)
        .deposit(owner, account.id, Money::from_major(10), None)
        .unwrap();
    lifecycle.close(owner, account.id).unwrap();
}

#[test]
fn closing_someone_elses_account_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let owner = ClientId::new();
    let lifecycle = lifecycle(&store);
    let account = lifecycle.open(owner, "Maria").unwrap();

    let err = lifecycle.close(ClientId::new(), account.id).unwrap_err();
    assert_eq!(err, LedgerError::Unauthorized);
}

/// Always emits zero, so every generated account number is identical.
struct StuckRng;

impl RngCore for StuckRng {
    fn next_u32(&mut self) -> u32 {
        0
    }

    fn next_u64(&mut self) -> u64 {
        0
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        dest.fill(0);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

#[test]
fn exhausted_number_generation_is_reported() {
    let store = Arc::new(MemoryStore::new());
    let lifecycle = lifecycle(&store);

    lifecycle
        .open_with_rng(ClientId::new(), "Maria", &mut StuckRng)
        .unwrap();
    let err = lifecycle
        .open_with_rng(ClientId::new(), "Maria", &mut StuckRng)
        .unwrap_err();
    assert_eq!(err, LedgerError::ResourceExhausted { attempts: 16 });
}
