// crates/tally-service/src/lib.rs
//
// tally-service: the public service surface of the Tally economy.
//
// The orchestrator composes the ledger store, transaction log, policy
// tables, and staking engine into atomic, auditable operations: grant,
// check/execute action, stake, claim, unstake, transfer. Every successful
// mutation returns the resulting balance(s) plus the transaction log id
// that recorded it.

pub mod config;
pub mod orchestrator;
pub mod snapshot;

pub use config::ServiceConfig;
pub use orchestrator::{
    ActionOutcome, ClaimOutcome, GrantOutcome, Orchestrator, StakeOutcome, TransferOutcome,
    UnstakeOutcome,
};
pub use snapshot::ServiceSnapshot;
