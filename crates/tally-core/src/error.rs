// crates/tally-core/src/error.rs
//
// Ledger-wide error taxonomy.
//
// Every variant is a typed result — operations never swallow failures.
// Denial variants carry enough context (current balance, required amount)
// for the caller to explain the refusal without consulting the log.
// `LockTimeout` and `RateLimited` are retryable: nothing was mutated.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::token::TokenType;

/// Error taxonomy for the Tally ledger.
#[derive(Debug, Error)]
pub enum TallyError {
    /// Malformed input: non-positive amount, out-of-range quality score,
    /// self-transfer, and similar caller mistakes.
    #[error("validation error: {0}")]
    Validation(String),

    /// Spendable balance is too small for the requested debit.
    #[error("insufficient balance: have {available}, need {required}")]
    InsufficientBalance { available: u64, required: u64 },

    /// Credit would push the balance past the token's cap.
    #[error("balance cap exceeded: {balance} + {credit} > cap {cap}")]
    CapExceeded { balance: u64, credit: u64, cap: u64 },

    /// Earning event is not registered in the reward policy.
    #[error("unknown earning event: {0}")]
    UnknownEvent(String),

    /// Action name is not registered in the action gate.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// Pool type is not registered in the staking configuration.
    #[error("unknown staking pool: {0}")]
    UnknownPool(String),

    /// Position has not reached its unlock time yet.
    #[error("position {position} is locked until {unlock_at}")]
    StillLocked {
        position: Uuid,
        unlock_at: DateTime<Utc>,
    },

    /// Token type's policy forbids account-to-account transfers.
    #[error("token {0} is not transferable")]
    NonTransferable(TokenType),

    /// Could not acquire the balance lock(s) within the bounded timeout.
    /// No state changed; the operation is safe to retry.
    #[error("timed out acquiring balance lock for {0}")]
    LockTimeout(String),

    /// Unknown account or position reference.
    #[error("not found: {0}")]
    NotFound(String),

    /// The injected authorization provider refused the operation.
    #[error("operation denied: {0}")]
    Denied(String),

    /// An eligibility predicate failed on execution.
    #[error("not eligible: {0}")]
    NotEligible(String),

    /// Hourly call window exhausted. Retry at `next_available`.
    #[error("rate limited until {next_available}")]
    RateLimited { next_available: DateTime<Utc> },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for TallyError {
    fn from(e: serde_json::Error) -> Self {
        TallyError::Serialization(e.to_string())
    }
}

impl TallyError {
    /// True for errors that may succeed on retry without new input.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TallyError::LockTimeout(_) | TallyError::RateLimited { .. }
        )
    }
}
