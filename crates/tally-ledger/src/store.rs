// crates/tally-ledger/src/store.rs
//
// The balance table, keyed by (account, token).
//
// Locking model: one lock token per balance key, held for the duration of
// a `with_keys` transaction. Multi-key operations (transfers, batch reward
// claims) dedupe and sort their keys first, so every caller acquires locks
// in the same canonical order and no lock cycle can form. Acquisition polls
// `try_lock` against a bounded deadline; on expiry the operation fails with
// `LockTimeout` and nothing has been mutated.
//
// Mutations run against a staged view (`LedgerTxn`) and commit to the table
// only when the closure returns Ok. A failure discovered after a partial
// mutation (e.g. the credit side of a transfer hitting the balance cap)
// therefore rolls back for free.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

use tally_core::account::{AccountId, BalanceKey};
use tally_core::error::TallyError;
use tally_core::token::{TokenRegistry, TokenType};

/// Default bound on lock acquisition.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(2000);

/// The balance table. Balances are created implicitly on first credit.
pub struct LedgerStore {
    registry: TokenRegistry,
    lock_timeout: Duration,
    /// One lock token per key, created on first touch.
    locks: Mutex<HashMap<BalanceKey, Arc<Mutex<()>>>>,
    /// Committed balances. Only mutated while holding the key's lock token.
    balances: RwLock<HashMap<BalanceKey, u64>>,
}

impl LedgerStore {
    /// Create an empty store with the default lock timeout.
    pub fn new(registry: TokenRegistry) -> Self {
        Self::with_balances(registry, DEFAULT_LOCK_TIMEOUT, HashMap::new())
    }

    /// Create a store seeded with existing balances (snapshot restore).
    pub fn with_balances(
        registry: TokenRegistry,
        lock_timeout: Duration,
        balances: HashMap<BalanceKey, u64>,
    ) -> Self {
        Self {
            registry,
            lock_timeout,
            locks: Mutex::new(HashMap::new()),
            balances: RwLock::new(balances),
        }
    }

    /// The token registry this store validates caps against.
    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    /// Current balance for (account, token). 0 if the key has never been
    /// credited.
    pub fn balance(&self, account: &AccountId, token: TokenType) -> u64 {
        let key = BalanceKey {
            account: account.clone(),
            token,
        };
        self.read_table(|table| table.get(&key).copied().unwrap_or(0))
    }

    /// All token balances for one account (absent keys read as 0).
    pub fn balances_for(&self, account: &AccountId) -> HashMap<TokenType, u64> {
        self.read_table(|table| {
            TokenType::ALL
                .iter()
                .map(|&token| {
                    let key = BalanceKey {
                        account: account.clone(),
                        token,
                    };
                    (token, table.get(&key).copied().unwrap_or(0))
                })
                .collect()
        })
    }

    /// Copy of the full committed balance table. Commits are atomic under
    /// the table's write lock, so this never observes a half-applied
    /// transaction.
    pub fn export_balances(&self) -> HashMap<BalanceKey, u64> {
        self.read_table(|table| table.clone())
    }

    /// Atomically increase (account, token) by `amount`. Returns the new
    /// balance. Fails with `Validation` on a non-positive amount and
    /// `CapExceeded` if the result would pass the token's cap.
    pub fn credit(
        &self,
        account: &AccountId,
        token: TokenType,
        amount: u64,
    ) -> Result<u64, TallyError> {
        let key = BalanceKey {
            account: account.clone(),
            token,
        };
        self.with_keys(std::slice::from_ref(&key), |txn| txn.credit(&key, amount))
    }

    /// Atomically decrease (account, token) by `amount`. Returns the new
    /// balance. Fails with `Validation` on a non-positive amount and
    /// `InsufficientBalance` if the current balance is smaller.
    pub fn debit(
        &self,
        account: &AccountId,
        token: TokenType,
        amount: u64,
    ) -> Result<u64, TallyError> {
        let key = BalanceKey {
            account: account.clone(),
            token,
        };
        self.with_keys(std::slice::from_ref(&key), |txn| txn.debit(&key, amount))
    }

    /// Run `f` with exclusive access to the given keys.
    ///
    /// Keys are deduped and locked in canonical sorted order. The closure
    /// sees a staged view; its writes reach the committed table only if it
    /// returns Ok. Returns `LockTimeout` if any lock cannot be acquired
    /// within the configured bound (nothing mutated, safe to retry).
    pub fn with_keys<R>(
        &self,
        keys: &[BalanceKey],
        f: impl FnOnce(&mut LedgerTxn) -> Result<R, TallyError>,
    ) -> Result<R, TallyError> {
        let mut sorted: Vec<BalanceKey> = keys.to_vec();
        sorted.sort();
        sorted.dedup();

        let tokens: Vec<Arc<Mutex<()>>> = {
            let mut registry = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            sorted
                .iter()
                .map(|key| {
                    registry
                        .entry(key.clone())
                        .or_insert_with(|| Arc::new(Mutex::new(())))
                        .clone()
                })
                .collect()
        };

        let deadline = Instant::now() + self.lock_timeout;
        let mut guards = Vec::with_capacity(tokens.len());
        for (i, token) in tokens.iter().enumerate() {
            loop {
                match token.try_lock() {
                    Ok(guard) => {
                        guards.push(guard);
                        break;
                    }
                    Err(TryLockError::Poisoned(poisoned)) => {
                        // The () token carries no data; the lock is still
                        // valid for mutual exclusion.
                        guards.push(poisoned.into_inner());
                        break;
                    }
                    Err(TryLockError::WouldBlock) => {
                        if Instant::now() >= deadline {
                            return Err(TallyError::LockTimeout(sorted[i].to_string()));
                        }
                        thread::yield_now();
                    }
                }
            }
        }

        let staged: HashMap<BalanceKey, u64> = self.read_table(|table| {
            sorted
                .iter()
                .map(|key| (key.clone(), table.get(key).copied().unwrap_or(0)))
                .collect()
        });

        let mut txn = LedgerTxn {
            registry: &self.registry,
            staged,
        };
        let out = f(&mut txn)?;

        let mut table = self
            .balances
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for (key, value) in txn.staged {
            table.insert(key, value);
        }
        Ok(out)
        // Key lock guards drop here, after the commit.
    }

    fn read_table<R>(&self, f: impl FnOnce(&HashMap<BalanceKey, u64>) -> R) -> R {
        let table = self
            .balances
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&table)
    }
}

/// Staged view over the keys locked by a `with_keys` transaction.
///
/// Reads and writes touch only the staged copies; the store commits them
/// atomically after the transaction closure succeeds.
pub struct LedgerTxn<'a> {
    registry: &'a TokenRegistry,
    staged: HashMap<BalanceKey, u64>,
}

impl LedgerTxn<'_> {
    /// Staged balance of a locked key.
    pub fn balance(&self, key: &BalanceKey) -> Result<u64, TallyError> {
        self.staged
            .get(key)
            .copied()
            .ok_or_else(|| TallyError::Validation(format!("key {} not locked by this transaction", key)))
    }

    /// Stage a credit. Validates `amount > 0`, `amount <= i64::MAX` (so the
    /// log's signed delta cannot overflow), and the token's balance cap.
    pub fn credit(&mut self, key: &BalanceKey, amount: u64) -> Result<u64, TallyError> {
        validate_amount(amount)?;
        let balance = self.balance(key)?;
        let cap = self.registry.max_balance(key.token);
        let next = balance
            .checked_add(amount)
            .filter(|&n| n <= cap)
            .ok_or(TallyError::CapExceeded {
                balance,
                credit: amount,
                cap,
            })?;
        self.staged.insert(key.clone(), next);
        Ok(next)
    }

    /// Stage a debit. Validates `amount > 0` and sufficient staged balance.
    pub fn debit(&mut self, key: &BalanceKey, amount: u64) -> Result<u64, TallyError> {
        validate_amount(amount)?;
        let balance = self.balance(key)?;
        if balance < amount {
            return Err(TallyError::InsufficientBalance {
                available: balance,
                required: amount,
            });
        }
        let next = balance - amount;
        self.staged.insert(key.clone(), next);
        Ok(next)
    }
}

fn validate_amount(amount: u64) -> Result<(), TallyError> {
    if amount == 0 {
        return Err(TallyError::Validation(
            "amount must be positive".to_string(),
        ));
    }
    if amount > i64::MAX as u64 {
        return Err(TallyError::Validation(format!(
            "amount {} exceeds the representable maximum",
            amount
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn store() -> LedgerStore {
        LedgerStore::new(TokenRegistry::default())
    }

    fn alice() -> AccountId {
        AccountId::from("alice")
    }

    #[test]
    fn test_balance_defaults_to_zero() {
        let store = store();
        assert_eq!(store.balance(&alice(), TokenType::Spark), 0);
    }

    #[test]
    fn test_credit_creates_balance_implicitly() {
        let store = store();
        let new = store.credit(&alice(), TokenType::Spark, 500).unwrap();
        assert_eq!(new, 500);
        assert_eq!(store.balance(&alice(), TokenType::Spark), 500);
    }

    #[test]
    fn test_credit_zero_is_validation_error() {
        let store = store();
        let err = store.credit(&alice(), TokenType::Spark, 0).unwrap_err();
        assert!(matches!(err, TallyError::Validation(_)));
    }

    #[test]
    fn test_credit_past_cap_is_rejected_and_unchanged() {
        let registry = TokenRegistry::default();
        let cap = registry.max_balance(TokenType::Honor);
        let store = LedgerStore::new(registry);
        store.credit(&alice(), TokenType::Honor, cap).unwrap();

        let err = store.credit(&alice(), TokenType::Honor, 1).unwrap_err();
        assert!(matches!(err, TallyError::CapExceeded { .. }));
        assert_eq!(store.balance(&alice(), TokenType::Honor), cap);
    }

    #[test]
    fn test_debit_insufficient_carries_context() {
        let store = store();
        store.credit(&alice(), TokenType::Spark, 3).unwrap();
        let err = store.debit(&alice(), TokenType::Spark, 5).unwrap_err();
        match err {
            TallyError::InsufficientBalance {
                available,
                required,
            } => {
                assert_eq!(available, 3);
                assert_eq!(required, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.balance(&alice(), TokenType::Spark), 3);
    }

    #[test]
    fn test_multi_key_rollback_on_failure() {
        let registry = TokenRegistry::default();
        let cap = registry.max_balance(TokenType::Honor);
        let store = LedgerStore::new(registry);
        let from = BalanceKey::new("alice", TokenType::Honor);
        let to = BalanceKey::new("bob", TokenType::Honor);
        store.credit(&alice(), TokenType::Honor, 100).unwrap();
        store.credit(&AccountId::from("bob"), TokenType::Honor, cap).unwrap();

        // Debit succeeds in the staged view, then the credit hits the cap;
        // the whole transaction must roll back.
        let err = store
            .with_keys(&[from.clone(), to.clone()], |txn| {
                txn.debit(&from, 100)?;
                txn.credit(&to, 100)?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, TallyError::CapExceeded { .. }));
        assert_eq!(store.balance(&alice(), TokenType::Honor), 100);
        assert_eq!(
            store.balance(&AccountId::from("bob"), TokenType::Honor),
            cap
        );
    }

    #[test]
    fn test_concurrent_credits_are_not_lost() {
        let store = Arc::new(store());
        let threads: u64 = 8;
        let per_thread: u64 = 200;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..per_thread {
                        store.credit(&AccountId::from("alice"), TokenType::Spark, 1).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(
            store.balance(&AccountId::from("alice"), TokenType::Spark),
            threads * per_thread
        );
    }

    #[test]
    fn test_concurrent_debits_never_double_spend() {
        // Balance covers exactly (N-1) debits of cost C: exactly one
        // thread must observe InsufficientBalance.
        let store = Arc::new(store());
        let n = 6u64;
        let cost = 10u64;
        store
            .credit(&AccountId::from("alice"), TokenType::Spark, (n - 1) * cost)
            .unwrap();

        let handles: Vec<_> = (0..n)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || store.debit(&AccountId::from("alice"), TokenType::Spark, cost))
            })
            .collect();

        let mut successes = 0;
        let mut insufficient = 0;
        for handle in handles {
            match handle.join().unwrap() {
                Ok(_) => successes += 1,
                Err(TallyError::InsufficientBalance { .. }) => insufficient += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(successes, n - 1);
        assert_eq!(insufficient, 1);
        assert_eq!(store.balance(&AccountId::from("alice"), TokenType::Spark), 0);
    }

    #[test]
    fn test_lock_timeout_is_bounded_and_retryable() {
        let store = Arc::new(LedgerStore::with_balances(
            TokenRegistry::default(),
            Duration::from_millis(50),
            HashMap::new(),
        ));
        let key = BalanceKey::new("alice", TokenType::Spark);

        let blocker = {
            let store = store.clone();
            let key = key.clone();
            thread::spawn(move || {
                store
                    .with_keys(std::slice::from_ref(&key), |_txn| {
                        thread::sleep(Duration::from_millis(300));
                        Ok(())
                    })
                    .unwrap();
            })
        };
        // Let the blocker take the key lock first.
        thread::sleep(Duration::from_millis(50));

        let err = store
            .credit(&AccountId::from("alice"), TokenType::Spark, 1)
            .unwrap_err();
        assert!(matches!(err, TallyError::LockTimeout(_)));
        assert!(err.is_retryable());

        blocker.join().unwrap();
        // After the blocker releases, the retry succeeds.
        assert_eq!(
            store
                .credit(&AccountId::from("alice"), TokenType::Spark, 1)
                .unwrap(),
            1
        );
    }

    #[test]
    fn test_opposing_transfers_do_not_deadlock() {
        // a->b and b->a concurrently; canonical lock order prevents the
        // classic two-lock deadlock.
        let store = Arc::new(store());
        let a = AccountId::from("alice");
        let b = AccountId::from("bob");
        store.credit(&a, TokenType::Spark, 1_000).unwrap();
        store.credit(&b, TokenType::Spark, 1_000).unwrap();

        let mut handles = Vec::new();
        for i in 0..40 {
            let store = store.clone();
            let (from, to) = if i % 2 == 0 {
                (AccountId::from("alice"), AccountId::from("bob"))
            } else {
                (AccountId::from("bob"), AccountId::from("alice"))
            };
            handles.push(thread::spawn(move || {
                let from_key = BalanceKey {
                    account: from,
                    token: TokenType::Spark,
                };
                let to_key = BalanceKey {
                    account: to,
                    token: TokenType::Spark,
                };
                store
                    .with_keys(&[from_key.clone(), to_key.clone()], |txn| {
                        txn.debit(&from_key, 5)?;
                        txn.credit(&to_key, 5)?;
                        Ok(())
                    })
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // Equal traffic both ways: totals conserved.
        let total = store.balance(&a, TokenType::Spark) + store.balance(&b, TokenType::Spark);
        assert_eq!(total, 2_000);
    }
}
