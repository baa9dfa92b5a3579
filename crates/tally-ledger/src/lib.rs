// crates/tally-ledger/src/lib.rs
//
// tally-ledger: the durable heart of the Tally economy.
//
// Two components live here:
//   - `LedgerStore`: the balance table keyed by (account, token), with
//     per-key locking so concurrent credits and debits on the same key are
//     fully serialized.
//   - `TransactionLog`: the append-only, strictly ordered record of every
//     balance-affecting operation. Replaying it reproduces the store's
//     balances exactly; older entries can be archived behind a balance
//     snapshot without breaking that equivalence.

pub mod log;
pub mod store;

pub use log::{BalanceSnapshot, LogExport, TransactionLog};
pub use store::{LedgerStore, LedgerTxn};
